//! Overlay configuration: file (TOML or JSON), then environment overrides,
//! then validation.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alerts::AlertTimings;
use crate::error::{WidgetError, WidgetResult};

/// What a recognized moderation command does.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    /// Reset the message window.
    ClearMessages,
    /// Reset the presence list (and its persisted snapshot).
    ResetChatters,
}

/// Badge catalog endpoint settings. Fetches are skipped entirely when the
/// client id is empty; the resolve path then runs on the legacy fallback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HelixConfig {
    pub base_url: String,
    pub client_id: String,
    pub token: String,
    pub broadcaster_id: String,
}

impl Default for HelixConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twitch.tv/helix/".to_owned(),
            client_id: String::new(),
            token: String::new(),
            broadcaster_id: String::new(),
        }
    }
}

/// The main configuration for one widget session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OverlayConfig {
    /// Channel whose feed this widget renders.
    pub channel: String,

    /// The bot's own login; its echoed messages are dropped even when the
    /// protocol client forgets to set `is_self`.
    pub bot_login: Option<String>,

    /// Author logins whose events are ignored outright.
    pub ignore_users: Vec<String>,

    /// Case-insensitive literal command triggers and their actions.
    pub commands: HashMap<String, CommandAction>,

    /// Optional acknowledgement text sent after a recognized command.
    pub command_ack: Option<String>,

    /// Max chat messages retained on screen.
    pub message_capacity: usize,

    /// Seconds before a message expires off screen. 0 keeps messages until
    /// capacity pressure evicts them.
    pub message_ttl_secs: u64,

    /// Max presence entries retained.
    pub chatter_capacity: usize,

    /// A chatter not seen for this many seconds is dropped by the sweep.
    pub presence_window_secs: u64,

    /// Fixed tick of the presence sweep.
    pub sweep_interval_secs: u64,

    pub alerts: AlertTimings,

    pub helix: HelixConfig,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            channel: String::new(),
            bot_login: None,
            ignore_users: Vec::new(),
            commands: HashMap::from([("!clear".to_owned(), CommandAction::ClearMessages)]),
            command_ack: None,
            message_capacity: 12,
            message_ttl_secs: 60,
            chatter_capacity: 256,
            presence_window_secs: 300,
            sweep_interval_secs: 30,
            alerts: AlertTimings::default(),
            helix: HelixConfig::default(),
        }
    }
}

impl OverlayConfig {
    /// Loads the configuration from an optional file, then applies
    /// environment overrides, then validates.
    pub fn load(path: Option<&Path>) -> WidgetResult<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .map_err(|err| WidgetError::Config(format!("{}: {err}", path.display())))?;
                match path.extension().and_then(|ext| ext.to_str()) {
                    Some("toml") => toml::from_str(&raw)
                        .map_err(|err| WidgetError::Config(err.to_string()))?,
                    Some("json") => serde_json::from_str(&raw)
                        .map_err(|err| WidgetError::Config(err.to_string()))?,
                    _ => {
                        return Err(WidgetError::Config(
                            "unsupported configuration format; use .toml or .json".to_owned(),
                        ));
                    }
                }
            }
            None => Self::default(),
        };

        if let Ok(channel) = env::var("CHATGLASS_CHANNEL") {
            config.channel = channel;
        }
        if let Ok(client_id) = env::var("CHATGLASS_CLIENT_ID") {
            config.helix.client_id = client_id;
        }
        if let Ok(token) = env::var("CHATGLASS_TOKEN") {
            config.helix.token = token;
        }
        if let Ok(broadcaster_id) = env::var("CHATGLASS_BROADCASTER_ID") {
            config.helix.broadcaster_id = broadcaster_id;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> WidgetResult<()> {
        let mut errors = Vec::new();
        if self.message_capacity == 0 {
            errors.push("message_capacity must be greater than 0".to_owned());
        }
        if self.chatter_capacity == 0 {
            errors.push("chatter_capacity must be greater than 0".to_owned());
        }
        if self.sweep_interval_secs == 0 {
            errors.push("sweep_interval_secs must be greater than 0".to_owned());
        }
        if self.presence_window_secs == 0 {
            errors.push("presence_window_secs must be greater than 0".to_owned());
        }
        for trigger in self.commands.keys() {
            if trigger.trim().is_empty() {
                errors.push("command triggers must be non-empty".to_owned());
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(WidgetError::Config(errors.join("; ")))
        }
    }

    /// TTL for the message window; 0 disables scheduled expiry.
    pub fn message_ttl(&self) -> Option<Duration> {
        (self.message_ttl_secs > 0).then(|| Duration::from_secs(self.message_ttl_secs))
    }

    pub fn presence_window(&self) -> Duration {
        Duration::from_secs(self.presence_window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Looks up a command action for a message body, matching the trigger
    /// literally and case-insensitively.
    pub fn command_for(&self, body: &str) -> Option<(String, CommandAction)> {
        let needle = body.trim().to_lowercase();
        self.commands
            .iter()
            .find(|(trigger, _)| trigger.to_lowercase() == needle)
            .map(|(trigger, action)| (trigger.to_lowercase(), *action))
    }
}
