use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::{BadgeRef, ChatMessage, EmotePosition};

/// A single tag value on an inbound protocol event. Upstream tags are
/// loosely typed: strings for most keys, booleans for flags, and nested
/// maps for `badges` and `emotes`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TagValue {
    Flag(bool),
    Text(String),
    Map(serde_json::Map<String, serde_json::Value>),
}

/// An inbound event from the chat-protocol client, decoded once at the
/// router boundary. Downstream components never touch raw tags.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProtocolEvent {
    #[serde(default)]
    pub tags: HashMap<String, TagValue>,
    #[serde(default)]
    pub body: String,
    /// Set by the protocol client for the bot's own echoed messages.
    #[serde(default)]
    pub is_self: bool,
}

impl ProtocolEvent {
    /// The tag's text value, if present and textual.
    pub fn text_tag(&self, key: &str) -> Option<&str> {
        match self.tags.get(key) {
            Some(TagValue::Text(value)) if !value.is_empty() => Some(value),
            _ => None,
        }
    }

    /// A boolean flag tag. Upstream sends either a real boolean or the
    /// strings `"1"` / `"true"`; anything else reads as unset.
    pub fn flag_tag(&self, key: &str) -> bool {
        match self.tags.get(key) {
            Some(TagValue::Flag(value)) => *value,
            Some(TagValue::Text(value)) => value == "1" || value.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    fn map_tag(&self, key: &str) -> Option<&serde_json::Map<String, serde_json::Value>> {
        match self.tags.get(key) {
            Some(TagValue::Map(map)) => Some(map),
            _ => None,
        }
    }

    /// Badge references, normalized from either encoding.
    ///
    /// `badges-raw` (comma-separated `type/version` pairs) preserves the
    /// exact given order and wins when both tags are present; the `badges`
    /// map encoding yields the map's own key order.
    pub fn badge_refs(&self) -> Vec<BadgeRef> {
        if let Some(raw) = self.text_tag("badges-raw") {
            return raw
                .split(',')
                .filter_map(|pair| {
                    let (set_id, version) = pair.trim().split_once('/')?;
                    if set_id.is_empty() || version.is_empty() {
                        return None;
                    }
                    Some(BadgeRef::new(set_id, version))
                })
                .collect();
        }

        self.map_tag("badges")
            .map(|map| {
                map.iter()
                    .filter_map(|(set_id, version)| {
                        let version = match version {
                            serde_json::Value::String(value) => value.clone(),
                            serde_json::Value::Number(value) => value.to_string(),
                            _ => return None,
                        };
                        Some(BadgeRef::new(set_id.clone(), version))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Emote annotations from the `emotes` tag: a map of emote id to a list
    /// of `"start-end"` range strings. Malformed ranges are skipped.
    pub fn emote_positions(&self) -> Vec<EmotePosition> {
        let Some(map) = self.map_tag("emotes") else {
            return Vec::new();
        };

        let mut positions = Vec::new();
        for (id, ranges) in map {
            let Some(ranges) = ranges.as_array() else {
                continue;
            };
            for range in ranges {
                let Some(range) = range.as_str() else {
                    continue;
                };
                let Some((start, end)) = range.split_once('-') else {
                    continue;
                };
                let (Ok(start), Ok(end)) = (start.parse::<u32>(), end.parse::<u32>()) else {
                    continue;
                };
                if end < start {
                    continue;
                }
                positions.push(EmotePosition {
                    id: id.clone(),
                    start,
                    end,
                });
            }
        }
        positions
    }
}

/// A presence sighting decoded from an event: the author was seen now.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceSighting {
    pub user_id: String,
    pub display_name: String,
    pub color: Option<String>,
    pub at: DateTime<Utc>,
}

/// A recognized moderation command. Commands are a separate non-displayed
/// stream: recognition short-circuits chat-message admission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModerationCommand {
    /// The matched trigger, lowercased.
    pub trigger: String,
    pub author_id: String,
}

/// The router's one-time classification of an inbound event. All downstream
/// components consume this variant, never raw payload fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedEvent {
    Chat {
        message: ChatMessage,
        first_time: bool,
        returning: bool,
    },
    Presence(PresenceSighting),
    Command(ModerationCommand),
}
