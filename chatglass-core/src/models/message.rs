use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A badge reference as carried on an inbound event: the badge set and the
/// version within it. Both tag encodings (`badges` map and `badges-raw`
/// string) normalize into this shape at the router boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BadgeRef {
    pub set_id: String,
    pub version: String,
}

impl BadgeRef {
    pub fn new(set_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            set_id: set_id.into(),
            version: version.into(),
        }
    }
}

/// An inline emote annotation. `start` and `end` are UTF-16 code-unit
/// offsets into the message body, `end` inclusive, matching the upstream
/// convention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmotePosition {
    pub id: String,
    pub start: u32,
    pub end: u32,
}

/// A chat message as decoded from an inbound protocol event, before badge
/// and emote resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Unique within the active window. Derived from the upstream message id
    /// plus the author id, or from the author id plus the arrival tick when
    /// the upstream id is absent.
    pub id: String,
    pub author_id: String,
    pub display_name: String,
    pub color: Option<String>,
    pub badges: Vec<BadgeRef>,
    pub emote_positions: Vec<EmotePosition>,
    pub body: String,
    pub arrival: DateTime<Utc>,
}

/// One piece of a composited message body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MessageFragment {
    Text { text: String },
    Emote { id: String, image_url: String },
}

impl MessageFragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// The display form of a message: badges resolved to image references and
/// the body composited into fragments. This is what the message window owns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenderedMessage {
    pub id: String,
    pub author_id: String,
    pub display_name: String,
    pub color: Option<String>,
    /// Badge image references, order preserved as given upstream.
    pub badge_images: Vec<String>,
    pub fragments: Vec<MessageFragment>,
    pub arrival: DateTime<Utc>,
}
