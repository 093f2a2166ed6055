use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    FirstTimeChatter,
    ReturningChatter,
}

/// A celebratory alert. Transient: lives only inside the presentation queue
/// and is destroyed once its lifecycle completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    pub subject_id: String,
    pub display_name: String,
    pub color: Option<String>,
    pub visit_count: u64,
    pub kind: AlertKind,
    pub created: DateTime<Utc>,
}
