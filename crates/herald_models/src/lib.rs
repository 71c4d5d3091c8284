//! Provider clients for content generation, image generation and trends.
//!
//! Each client implements a capability trait from `herald_interface` and
//! converts every HTTP or network failure into a classified
//! [`herald_error::GenerationError`].
//!
//! | Client | Capability | Service |
//! |--------|------------|---------|
//! | [`GrokClient`] | `ContentGenerator` | x.ai chat completions |
//! | [`ModalImageClient`] | `ImageGenerator` | Modal image endpoint |
//! | [`SerpApiTrends`] | `TrendSource` | SerpAPI Google Trends |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod grok;
mod http;
mod image;
mod trends;

pub use grok::{
    GrokChoice, GrokClient, GrokMessage, GrokRequest, GrokRequestBuilder, GrokResponse,
};
pub use http::{error_from_reqwest, error_from_status};
pub use image::ModalImageClient;
pub use trends::SerpApiTrends;
