use herald_bot::{Credentials, HeraldConfig};
use herald_core::Dependency;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_bundled_defaults_match_builtin_defaults() {
    let loaded = HeraldConfig::load_with_env(None, HashMap::new()).unwrap();
    assert_eq!(loaded, HeraldConfig::default());
    assert!(loaded.validate().is_empty(), "{:?}", loaded.validate());
}

#[test]
fn test_dependency_defaults() {
    let config = HeraldConfig::default();
    let platform = config
        .dependencies()
        .for_dependency(Dependency::SocialPlatform);
    assert_eq!(*platform.max_calls(), 50);
    assert_eq!(platform.window(), Duration::from_secs(900));

    let generator = config
        .dependencies()
        .for_dependency(Dependency::ContentGenerator);
    assert_eq!(*generator.max_calls(), 60);
    assert_eq!(generator.window(), Duration::from_secs(3600));

    assert_eq!(*config.retry().max_attempts(), 3);
    assert_eq!(config.cycle_interval(), Duration::from_secs(6 * 3600));
}

#[test]
fn test_explicit_file_and_env_layers() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        "cycle_interval_minutes = 30\n\
         [dependencies.social_platform]\nmax_calls = 7\n\
         [retry]\nmax_attempts = 4"
    )
    .unwrap();

    let env = HashMap::from([
        ("HERALD__RETRY__MAX_ATTEMPTS".to_string(), "5".to_string()),
        ("HERALD__TRENDS__ENABLED".to_string(), "false".to_string()),
    ]);
    let config = HeraldConfig::load_with_env(Some(file.path()), env).unwrap();

    assert_eq!(*config.cycle_interval_minutes(), 30);
    let platform = config
        .dependencies()
        .for_dependency(Dependency::SocialPlatform);
    assert_eq!(*platform.max_calls(), 7);
    // Unset keys keep the bundled values.
    assert_eq!(*platform.window_seconds(), 900);
    assert_eq!(*config.retry().max_attempts(), 5);
    assert!(!*config.trends().enabled());
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(HeraldConfig::load_with_env(Some(&missing), HashMap::new()).is_err());
}

#[test]
fn test_validate_reports_problems() {
    let config = HeraldConfig::from_toml_str(
        "cycle_interval_minutes = 0\n\
         [content]\nprompt_template = \"Write something\"\nfallback_topics = []\n\
         [image]\nenabled = true\n\
         [api]\nbind = \"not-an-address\"\n\
         [dependencies.trend_monitor]\nmax_calls = 0",
    )
    .unwrap();

    let warnings = config.validate().join("\n");
    assert!(warnings.contains("cycle_interval_minutes"));
    assert!(warnings.contains("{topic}"));
    assert!(warnings.contains("fallback_topics"));
    assert!(warnings.contains("image.endpoint"));
    assert!(warnings.contains("api.bind"));
    assert!(warnings.contains("dependencies.trend_monitor"));
}

#[test]
fn test_prompt_substitutes_topic() {
    let config = HeraldConfig::from_toml_str(
        "[content]\nprompt_template = \"Post about {topic} now\"",
    )
    .unwrap();
    assert_eq!(config.content().prompt_for("rust"), "Post about rust now");
}

#[test]
fn test_credentials_ignore_blank_values() {
    let vars = HashMap::from([
        ("GROK_API_KEY", "xai-123"),
        ("X_USER_ACCESS_TOKEN", "   "),
        ("SERPAPI_API_KEY", "serp"),
    ]);
    let credentials = Credentials::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

    assert_eq!(credentials.grok_api_key().as_deref(), Some("xai-123"));
    assert!(credentials.x_user_access_token().is_none());

    let config = HeraldConfig::default();
    let missing = credentials.missing(&config, false);
    assert_eq!(missing, vec!["X_USER_ACCESS_TOKEN is not set".to_string()]);
    assert!(credentials.missing(&config, true).is_empty());
}
