//! Typed submission payloads.
//!
//! The tracker treats payloads as opaque JSON; these types are what the
//! HTTP implementation expects inside
//! [`SubmitRequest::payload`](crate::service::SubmitRequest).

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default SVD motion bucket (amount of motion in the clip).
pub const DEFAULT_MOTION_BUCKET_ID: u16 = 127;
/// Default frames per second of the rendered clip.
pub const DEFAULT_FPS: u16 = 6;
/// Default number of frames to synthesize.
pub const DEFAULT_FRAMES: u16 = 14;

/// Image-to-video synthesis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoRequest {
    #[validate(url)]
    pub image_url: String,
    #[serde(default = "default_motion_bucket_id")]
    #[validate(range(min = 1, max = 255))]
    pub motion_bucket_id: u16,
    #[serde(default = "default_fps")]
    #[validate(range(min = 1, max = 30))]
    pub fps: u16,
    #[serde(default = "default_frames")]
    #[validate(range(min = 1, max = 25))]
    pub frames: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
}

fn default_motion_bucket_id() -> u16 {
    DEFAULT_MOTION_BUCKET_ID
}

fn default_fps() -> u16 {
    DEFAULT_FPS
}

fn default_frames() -> u16 {
    DEFAULT_FRAMES
}

impl GenerateVideoRequest {
    /// Request with default motion parameters for a source image.
    pub fn new(image_url: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            motion_bucket_id: DEFAULT_MOTION_BUCKET_ID,
            fps: DEFAULT_FPS,
            frames: DEFAULT_FRAMES,
            article_id: None,
            domain_id: None,
        }
    }
}

/// New article draft to be created and then processed by the AI writer.
///
/// `original_topic` keeps its snake_case name on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ArticleDraftRequest {
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(length(min = 1))]
    pub topic: String,
    pub original_topic: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub author: String,
}

fn default_domain() -> String {
    "dashboard".to_string()
}
