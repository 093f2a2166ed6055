//! Badge catalog cache: remote badge-set definitions keyed by scope, set id
//! and version, with a legacy URL fallback so resolution never fails.

use std::collections::HashMap;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::CatalogResponse;

/// Catalog scope. Channel-scope entries shadow global-scope entries with
/// the same (set id, version).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BadgeScope {
    Global,
    Channel,
}

/// Resolved image references for one badge version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeImage {
    pub low_res: String,
    pub high_res: String,
}

/// Legacy URL-construction rule used when neither scope knows the set.
/// A missing badge must not block message rendering, so this is the
/// fail-open floor of the lookup chain.
pub fn legacy_badge_url(set_id: &str, version: &str) -> String {
    format!("https://static-cdn.jtvnw.net/chat-badges/{set_id}-{version}.png")
}

/// In-memory badge catalog. Populated once per session; never refreshed
/// (stale for the session's duration is accepted).
#[derive(Debug, Default)]
pub struct BadgeCatalog {
    global: HashMap<(String, String), BadgeImage>,
    channel: HashMap<(String, String), BadgeImage>,
}

impl BadgeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingests a catalog response under the given scope. Idempotent:
    /// repeated loads overwrite prior entries for each set in the payload.
    pub fn load(&mut self, scope: BadgeScope, payload: &CatalogResponse) {
        let entries = match scope {
            BadgeScope::Global => &mut self.global,
            BadgeScope::Channel => &mut self.channel,
        };

        let incoming: HashSet<&str> = payload.data.iter().map(|set| set.set_id.as_str()).collect();
        entries.retain(|(set_id, _), _| !incoming.contains(set_id.as_str()));

        let mut loaded = 0usize;
        for set in &payload.data {
            for version in &set.versions {
                let high_res = version
                    .image_url_4x
                    .clone()
                    .or_else(|| version.image_url_2x.clone())
                    .unwrap_or_else(|| version.image_url_1x.clone());
                entries.insert(
                    (set.set_id.clone(), version.id.clone()),
                    BadgeImage {
                        low_res: version.image_url_1x.clone(),
                        high_res,
                    },
                );
                loaded += 1;
            }
        }
        tracing::info!(?scope, sets = payload.data.len(), versions = loaded, "badge catalog loaded");
    }

    /// Resolves (set id, version) to image references: channel scope first,
    /// then global, then the legacy URL rule. Never fails.
    pub fn resolve(&self, set_id: &str, version: &str) -> BadgeImage {
        let key = (set_id.to_owned(), version.to_owned());
        if let Some(image) = self.channel.get(&key).or_else(|| self.global.get(&key)) {
            return image.clone();
        }
        let url = legacy_badge_url(set_id, version);
        BadgeImage {
            high_res: url.clone(),
            low_res: url,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.channel.is_empty()
    }
}
