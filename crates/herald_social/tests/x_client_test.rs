use herald_core::{ImageRef, PostRequest};
use herald_error::{Classify, FailureClass, PlatformErrorKind};
use herald_interface::SocialPlatform;
use herald_social::{DryRunPlatform, XClient};
use serde_json::json;
use wiremock::matchers::{bearer_token, body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_post_returns_platform_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(bearer_token("user-token"))
        .and(body_json(json!({"text": "hello world"})))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"data": {"id": "1850", "text": "hello world"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = XClient::new("user-token").with_base_url(server.uri());
    let receipt = client.post(&PostRequest::new("hello world")).await.unwrap();
    assert_eq!(receipt.id(), "1850");
}

#[tokio::test]
async fn test_post_attaches_media_ids() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(body_json(json!({"text": "pic", "media": {"media_ids": ["m-1"]}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "7"}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = XClient::new("t").with_base_url(server.uri());
    let request = PostRequest::new("pic").with_media("m-1");
    assert_eq!(client.post(&request).await.unwrap().id(), "7");
}

#[tokio::test]
async fn test_reply_continues_thread() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(body_json(json!({
            "text": "part two.",
            "reply": {"in_reply_to_tweet_id": "1850"}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "1851"}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = XClient::new("t").with_base_url(server.uri());
    let request = PostRequest::new("part two.").with_reply_to("1850");
    assert_eq!(client.post(&request).await.unwrap().id(), "1851");
}

#[tokio::test]
async fn test_engagement_reads_public_metrics() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/tweets"))
        .and(query_param("ids", "1850,1851"))
        .and(query_param("tweet.fields", "public_metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": "1850",
                "text": "hello",
                "public_metrics": {
                    "retweet_count": 3,
                    "reply_count": 1,
                    "like_count": 12,
                    "quote_count": 0,
                    "impression_count": 480
                }
            }],
            "errors": [{"value": "1851", "detail": "Could not find tweet with ids: [1851]."}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = XClient::new("t").with_base_url(server.uri());
    let ids = vec!["1850".to_string(), "1851".to_string()];
    let found = client.engagement(&ids).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].post_id(), "1850");
    assert_eq!(*found[0].impressions(), 480);
    assert_eq!(*found[0].likes(), 12);
    assert_eq!(*found[0].reposts(), 3);
    assert_eq!(*found[0].replies(), 1);

    // Nothing to look up means no request.
    assert!(client.engagement(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_status_mapping() {
    let cases = [
        (429, FailureClass::RateLimited),
        (401, FailureClass::Auth),
        (403, FailureClass::Auth),
        (400, FailureClass::Permanent),
        (422, FailureClass::Permanent),
        (408, FailureClass::Transient),
        (502, FailureClass::Transient),
        (404, FailureClass::Permanent),
    ];

    for (status, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let client = XClient::new("t").with_base_url(server.uri());
        let err = client.post(&PostRequest::new("x")).await.unwrap_err();
        assert_eq!(err.failure_class(), expected, "status {status}");
    }
}

#[tokio::test]
async fn test_connection_refused_is_transient() {
    let client = XClient::new("t").with_base_url("http://127.0.0.1:9");
    let err = client.post(&PostRequest::new("x")).await.unwrap_err();
    assert!(matches!(err.kind, PlatformErrorKind::Transient(_)));
}

#[tokio::test]
async fn test_upload_media_fetches_and_uploads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/images/a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, 0x50, 0x4e, 0x47]))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/media/upload"))
        .and(body_json(json!({"media": "iVBORw==", "media_category": "tweet_image"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "media-9"}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = XClient::new("t").with_base_url(server.uri());
    let image = ImageRef::new(format!("{}/images/a.png", server.uri()), None);
    assert_eq!(client.upload_media(&image).await.unwrap(), "media-9");
}

#[tokio::test]
async fn test_dry_run_accepts_everything() {
    let platform = DryRunPlatform::new(280);
    let receipt = platform.post(&PostRequest::new("hi")).await.unwrap();
    assert!(receipt.id().starts_with("dry-run-"));
    assert_eq!(platform.max_text_length(), 280);
}
