//! X (formerly Twitter) API v2 client.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use herald_core::{ImageRef, PostEngagement, PostReceipt, PostRequest};
use herald_error::{PlatformError, PlatformErrorKind};
use herald_interface::SocialPlatform;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

const DEFAULT_BASE_URL: &str = "https://api.x.com";

/// Longest post X accepts on a standard account.
pub const X_MAX_TEXT_LENGTH: usize = 280;

/// Most post ids one lookup request may carry.
pub const X_MAX_LOOKUP_IDS: usize = 100;

#[derive(Debug, Serialize)]
struct TweetBody<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<TweetMedia<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<TweetReply<'a>>,
}

#[derive(Debug, Serialize)]
struct TweetReply<'a> {
    in_reply_to_tweet_id: &'a str,
}

#[derive(Debug, Serialize)]
struct TweetMedia<'a> {
    media_ids: &'a [String],
}

#[derive(Debug, Serialize)]
struct MediaUploadBody {
    media: String,
    media_category: &'static str,
}

#[derive(Debug, Deserialize)]
struct DataEnvelope {
    data: CreatedObject,
}

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct LookupEnvelope {
    #[serde(default)]
    data: Vec<LookedUpTweet>,
}

#[derive(Debug, Deserialize)]
struct LookedUpTweet {
    id: String,
    #[serde(default)]
    public_metrics: PublicMetrics,
}

#[derive(Debug, Default, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    impression_count: u64,
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    reply_count: u64,
}

impl From<LookedUpTweet> for PostEngagement {
    fn from(tweet: LookedUpTweet) -> Self {
        let metrics = tweet.public_metrics;
        PostEngagement::new(
            tweet.id,
            metrics.impression_count,
            metrics.like_count,
            metrics.retweet_count,
            metrics.reply_count,
        )
    }
}

fn transport_error(err: reqwest::Error) -> PlatformError {
    let kind = if err.is_timeout() || err.is_connect() || err.is_request() {
        PlatformErrorKind::Transient(err.to_string())
    } else if let Some(status) = err.status() {
        PlatformErrorKind::from_status(status.as_u16(), err.to_string())
    } else if err.is_decode() {
        // The platform may already have accepted the post; retrying risks a duplicate.
        PlatformErrorKind::Permanent(format!("unreadable response: {err}"))
    } else {
        PlatformErrorKind::Transient(err.to_string())
    };
    PlatformError::new(kind)
}

async fn status_error(response: reqwest::Response) -> PlatformError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    PlatformError::new(PlatformErrorKind::from_status(
        status,
        format!("HTTP {status}: {body}"),
    ))
}

/// Client for the X API v2.
///
/// Authenticates with an OAuth 2.0 user-context bearer token that carries
/// the `tweet.read`, `tweet.write` and `media.write` scopes.
#[derive(Debug, Clone)]
pub struct XClient {
    client: Client,
    access_token: String,
    base_url: String,
    max_text_length: usize,
}

impl XClient {
    /// Creates a client for api.x.com.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            access_token: access_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_text_length: X_MAX_TEXT_LENGTH,
        }
    }

    /// Use a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the text limit, e.g. for premium accounts.
    pub fn with_max_text_length(mut self, max_text_length: usize) -> Self {
        self.max_text_length = max_text_length;
        self
    }

    async fn fetch_image(&self, image: &ImageRef) -> Result<Vec<u8>, PlatformError> {
        let response = self
            .client
            .get(image.url())
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            // The image host failing is not the platform rejecting our post.
            let kind = if status >= 500 {
                PlatformErrorKind::Transient(format!("image fetch returned HTTP {status}"))
            } else {
                PlatformErrorKind::Permanent(format!("image fetch returned HTTP {status}"))
            };
            return Err(PlatformError::new(kind));
        }
        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SocialPlatform for XClient {
    #[instrument(skip(self, request), fields(text_len = request.text().chars().count(), media = request.media_ids().len(), reply = request.in_reply_to().is_some()))]
    async fn post(&self, request: &PostRequest) -> Result<PostReceipt, PlatformError> {
        let body = TweetBody {
            text: request.text(),
            media: (!request.media_ids().is_empty()).then(|| TweetMedia {
                media_ids: request.media_ids(),
            }),
            reply: request.in_reply_to().as_deref().map(|id| TweetReply {
                in_reply_to_tweet_id: id,
            }),
        };

        let response = self
            .client
            .post(format!("{}/2/tweets", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let created: DataEnvelope = response.json().await.map_err(transport_error)?;
        info!(post_id = %created.data.id, "Post published");
        Ok(PostReceipt::new(created.data.id, Utc::now()))
    }

    #[instrument(skip(self, image), fields(url = %image.url()))]
    async fn upload_media(&self, image: &ImageRef) -> Result<String, PlatformError> {
        let bytes = self.fetch_image(image).await?;
        debug!(bytes = bytes.len(), "Uploading media");

        let response = self
            .client
            .post(format!("{}/2/media/upload", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&MediaUploadBody {
                media: STANDARD.encode(&bytes),
                media_category: "tweet_image",
            })
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let created: DataEnvelope = response.json().await.map_err(transport_error)?;
        Ok(created.data.id)
    }

    #[instrument(skip(self, post_ids), fields(count = post_ids.len()))]
    async fn engagement(&self, post_ids: &[String]) -> Result<Vec<PostEngagement>, PlatformError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .get(format!("{}/2/tweets", self.base_url))
            .bearer_auth(&self.access_token)
            .query(&[
                ("ids", post_ids.join(",")),
                ("tweet.fields", "public_metrics".to_string()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        // Deleted posts come back under `errors` and are skipped.
        let lookup: LookupEnvelope = response.json().await.map_err(transport_error)?;
        debug!(found = lookup.data.len(), "Engagement fetched");
        Ok(lookup.data.into_iter().map(PostEngagement::from).collect())
    }

    fn name(&self) -> &str {
        "x"
    }

    fn max_text_length(&self) -> usize {
        self.max_text_length
    }
}
