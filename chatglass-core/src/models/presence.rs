use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A presence entity: one live entry per user. A repeat sighting updates
/// `last_seen` in place rather than creating a new entity.
///
/// Serialized as-is into the persisted chatter snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chatter {
    pub user_id: String,
    pub display_name: String,
    pub color: Option<String>,
    pub last_seen: DateTime<Utc>,
}
