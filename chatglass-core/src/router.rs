//! Event router: consumes upstream protocol events, deduplicates,
//! classifies, and feeds the windows, the badge/emote pipeline, and the
//! alert queue. One router instance owns all mutable feed state for a
//! widget session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use metrics::counter;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

use crate::alerts::AlertQueue;
use crate::badges::{BadgeCatalog, BadgeScope};
use crate::config::{CommandAction, OverlayConfig};
use crate::emotes;
use crate::error::{WidgetError, WidgetResult};
use crate::models::{
    Alert, AlertKind, ChatMessage, Chatter, ClassifiedEvent, ModerationCommand, PresenceSighting,
    ProtocolEvent, RenderedMessage,
};
use crate::providers::{BadgeProvider, ChatSink};
use crate::storage::{keys, StateStore};
use crate::surface::{Surface, SurfaceCommand};
use crate::window::{BoundedWindow, WindowConfig};

/// The router and the state it exclusively owns. Construct with [`new`],
/// call [`seed`] once before serving events, then feed [`on_event`].
///
/// [`new`]: EventRouter::new
/// [`seed`]: EventRouter::seed
/// [`on_event`]: EventRouter::on_event
#[derive(Debug)]
pub struct EventRouter {
    session_id: Uuid,
    config: OverlayConfig,
    surface: Surface,
    badges: BadgeCatalog,
    messages: BoundedWindow<RenderedMessage>,
    chatters: BoundedWindow<Chatter>,
    alerts: AlertQueue,
    store: Arc<dyn StateStore>,
    sink: Arc<dyn ChatSink>,
    visits: Mutex<HashMap<String, u64>>,
    persistence_ok: AtomicBool,
    arrival_tick: AtomicU64,
}

impl EventRouter {
    pub fn new(
        config: OverlayConfig,
        surface: Surface,
        store: Arc<dyn StateStore>,
        sink: Arc<dyn ChatSink>,
    ) -> Self {
        let messages = BoundedWindow::new(
            WindowConfig {
                capacity: config.message_capacity,
                ttl: config.message_ttl(),
            },
            surface.clone(),
        );
        let chatters = BoundedWindow::new(
            WindowConfig {
                capacity: config.chatter_capacity,
                ttl: None,
            },
            surface.clone(),
        );
        let alerts = AlertQueue::new(config.alerts, surface.clone());

        Self {
            session_id: Uuid::new_v4(),
            config,
            surface,
            badges: BadgeCatalog::new(),
            messages,
            chatters,
            alerts,
            store,
            sink,
            visits: Mutex::new(HashMap::new()),
            persistence_ok: AtomicBool::new(true),
            arrival_tick: AtomicU64::new(0),
        }
    }

    /// Seeds initial state: restores the persisted mirror, then loads badge
    /// catalogs once for the session. Both paths fail open — a dead store
    /// disables persistence and a failed fetch leaves the legacy fallback
    /// in effect; neither blocks the feed.
    #[instrument(skip_all, fields(session = %self.session_id))]
    pub async fn seed(&mut self, provider: Option<&dyn BadgeProvider>) {
        self.restore_persisted();

        let Some(provider) = provider else {
            tracing::info!("no badge provider; legacy badge fallback in effect");
            return;
        };

        match provider.global_badges().await {
            Ok(payload) => self.badges.load(BadgeScope::Global, &payload),
            Err(err) => {
                tracing::warn!(error = %err, "global badge catalog fetch failed");
                self.surface.push_lossy(SurfaceCommand::Status {
                    subsystem: "badges",
                    detail: err.to_string(),
                });
            }
        }

        if self.config.helix.broadcaster_id.is_empty() {
            return;
        }
        match provider
            .channel_badges(&self.config.helix.broadcaster_id)
            .await
        {
            Ok(payload) => self.badges.load(BadgeScope::Channel, &payload),
            Err(err) => {
                tracing::warn!(error = %err, "channel badge catalog fetch failed");
                self.surface.push_lossy(SurfaceCommand::Status {
                    subsystem: "badges",
                    detail: err.to_string(),
                });
            }
        }
    }

    /// Routes one inbound event. Never fails: a malformed event skips its
    /// feature and is logged, everything else continues.
    #[instrument(skip_all, fields(session = %self.session_id))]
    pub async fn on_event(&self, event: ProtocolEvent) {
        if event.is_self {
            tracing::trace!("dropped self-authored event");
            return;
        }
        if let Some(login) = event.text_tag("username") {
            if self.is_ignored(login) {
                tracing::debug!(login, "dropped event from ignored author");
                return;
            }
        }

        let classified = match self.classify(&event) {
            Ok(classified) => classified,
            Err(err) => {
                counter!("chatglass_events_malformed_total").increment(1);
                tracing::warn!(error = %err, "event skipped");
                return;
            }
        };

        match classified {
            ClassifiedEvent::Presence(sighting) => self.note_presence(&sighting),
            ClassifiedEvent::Command(command) => {
                self.note_presence(&sighting_of(&event, &command.author_id));
                self.handle_command(command).await;
            }
            ClassifiedEvent::Chat {
                message,
                first_time,
                returning,
            } => {
                self.note_presence(&PresenceSighting {
                    user_id: message.author_id.clone(),
                    display_name: message.display_name.clone(),
                    color: message.color.clone(),
                    at: message.arrival,
                });

                if self.messages.contains(&message.id) {
                    counter!("chatglass_messages_deduped_total").increment(1);
                    tracing::debug!(id = %message.id, "duplicate message dropped");
                    return;
                }

                if first_time || returning {
                    let visit_count = self.record_visit(&message.author_id);
                    let kind = if first_time {
                        AlertKind::FirstTimeChatter
                    } else {
                        AlertKind::ReturningChatter
                    };
                    self.alerts.enqueue(Alert {
                        subject_id: message.author_id.clone(),
                        display_name: message.display_name.clone(),
                        color: message.color.clone(),
                        visit_count,
                        kind,
                        created: message.arrival,
                    });
                }

                let rendered = self.render(&message);
                self.messages.insert(rendered);
            }
        }
    }

    /// One-time decode of the raw payload into the event variant all
    /// downstream components consume.
    fn classify(&self, event: &ProtocolEvent) -> WidgetResult<ClassifiedEvent> {
        let user_id = event
            .text_tag("user-id")
            .ok_or(WidgetError::MissingTag("user-id"))?
            .to_owned();
        let display_name = event
            .text_tag("display-name")
            .or_else(|| event.text_tag("username"))
            .unwrap_or(&user_id)
            .to_owned();
        let color = event.text_tag("color").map(str::to_owned);
        let now = Utc::now();

        if let Some((trigger, _)) = self.config.command_for(&event.body) {
            return Ok(ClassifiedEvent::Command(ModerationCommand {
                trigger,
                author_id: user_id,
            }));
        }

        if event.body.trim().is_empty() {
            return Ok(ClassifiedEvent::Presence(PresenceSighting {
                user_id,
                display_name,
                color,
                at: now,
            }));
        }

        let id = match event.text_tag("message-id") {
            Some(message_id) => format!("{message_id}:{user_id}"),
            None => {
                let tick = self.arrival_tick.fetch_add(1, Ordering::Relaxed);
                format!("{user_id}:{tick}")
            }
        };

        Ok(ClassifiedEvent::Chat {
            message: ChatMessage {
                id,
                author_id: user_id,
                display_name,
                color,
                badges: event.badge_refs(),
                emote_positions: event.emote_positions(),
                body: event.body.clone(),
                arrival: now,
            },
            first_time: event.flag_tag("first-msg"),
            returning: event.flag_tag("returning-chatter"),
        })
    }

    fn is_ignored(&self, login: &str) -> bool {
        self.config
            .bot_login
            .as_deref()
            .is_some_and(|bot| bot.eq_ignore_ascii_case(login))
            || self
                .config
                .ignore_users
                .iter()
                .any(|user| user.eq_ignore_ascii_case(login))
    }

    /// Badge resolution plus emote compositing: the display form the
    /// message window owns.
    fn render(&self, message: &ChatMessage) -> RenderedMessage {
        let badge_images = message
            .badges
            .iter()
            .map(|badge| self.badges.resolve(&badge.set_id, &badge.version).low_res)
            .collect();
        let fragments = emotes::composite(&message.body, &message.emote_positions);
        RenderedMessage {
            id: message.id.clone(),
            author_id: message.author_id.clone(),
            display_name: message.display_name.clone(),
            color: message.color.clone(),
            badge_images,
            fragments,
            arrival: message.arrival,
        }
    }

    fn note_presence(&self, sighting: &PresenceSighting) {
        let updated = self.chatters.touch(&sighting.user_id, |chatter| {
            chatter.last_seen = sighting.at;
            chatter.display_name = sighting.display_name.clone();
            if sighting.color.is_some() {
                chatter.color = sighting.color.clone();
            }
        });
        if !updated {
            self.chatters.insert(Chatter {
                user_id: sighting.user_id.clone(),
                display_name: sighting.display_name.clone(),
                color: sighting.color.clone(),
                last_seen: sighting.at,
            });
            self.push_chatter_list();
            self.persist_chatters();
        }
    }

    async fn handle_command(&self, command: ModerationCommand) {
        counter!("chatglass_commands_total").increment(1);
        let Some((_, action)) = self.config.command_for(&command.trigger) else {
            return;
        };
        tracing::info!(trigger = %command.trigger, author = %command.author_id, ?action, "moderation command");

        match action {
            CommandAction::ClearMessages => {
                self.messages.clear();
            }
            CommandAction::ResetChatters => {
                self.chatters.clear();
                self.persist_chatters();
            }
        }

        if let Some(ack) = &self.config.command_ack {
            if let Err(err) = self.sink.send(&self.config.channel, ack).await {
                tracing::warn!(error = %err, "command acknowledgement failed");
            }
        }
    }

    /// One presence sweep tick: drop chatters outside the liveness window
    /// in bulk, then rebuild the snapshot and persisted mirror only if the
    /// set changed.
    pub fn sweep(&self) {
        let horizon = chrono::Duration::seconds(self.config.presence_window_secs as i64);
        let now = Utc::now();
        let removed = self
            .chatters
            .remove_where(|chatter| now.signed_duration_since(chatter.last_seen) >= horizon);
        if removed > 0 {
            tracing::debug!(removed, "presence sweep dropped stale chatters");
            self.push_chatter_list();
            self.persist_chatters();
        }
    }

    /// Spawns the periodic presence sweep on a fixed tick. Holds only a
    /// weak handle so a dropped router stops the task.
    pub fn spawn_sweeper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let router = Arc::downgrade(self);
        let interval = self.config.sweep_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // the immediate first tick
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => return,
                    _ = ticker.tick() => {
                        let Some(router) = router.upgrade() else { return };
                        router.sweep();
                    }
                }
            }
        })
    }

    fn record_visit(&self, author_id: &str) -> u64 {
        let count = {
            let mut visits = self.lock_visits();
            let entry = visits.entry(author_id.to_owned()).or_insert(0);
            *entry += 1;
            *entry
        };
        self.persist_visits();
        count
    }

    pub fn visit_count(&self, author_id: &str) -> u64 {
        self.lock_visits().get(author_id).copied().unwrap_or(0)
    }

    pub fn message_window(&self) -> &BoundedWindow<RenderedMessage> {
        &self.messages
    }

    pub fn chatter_window(&self) -> &BoundedWindow<Chatter> {
        &self.chatters
    }

    /// True once every enqueued alert has finished its lifecycle.
    pub fn alerts_idle(&self) -> bool {
        self.alerts.is_idle()
    }

    fn lock_visits(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.visits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_chatter_list(&self) {
        self.surface.push_lossy(SurfaceCommand::ChatterList {
            chatters: self.chatters.snapshot(),
        });
    }

    fn restore_persisted(&mut self) {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let stored_day = match self.store.get(keys::SESSION_DAY) {
            Ok(day) => day,
            Err(err) => {
                self.disable_persistence(&err);
                return;
            }
        };

        if stored_day.as_deref() == Some(today.as_str()) {
            if let Ok(Some(raw)) = self.store.get(keys::VISITS) {
                match serde_json::from_str::<HashMap<String, u64>>(&raw) {
                    Ok(restored) => *self.lock_visits() = restored,
                    Err(err) => tracing::warn!(error = %err, "discarding unreadable visit counters"),
                }
            }
        } else {
            // A new calendar day starts the visit counters over.
            if let Err(err) = self
                .store
                .set(keys::VISITS, "{}")
                .and_then(|()| self.store.set(keys::SESSION_DAY, &today))
            {
                self.disable_persistence(&err);
                return;
            }
        }

        if let Ok(Some(raw)) = self.store.get(keys::CHATTERS) {
            match serde_json::from_str::<Vec<Chatter>>(&raw) {
                Ok(restored) => {
                    let count = restored.len();
                    for chatter in restored {
                        self.chatters.insert(chatter);
                    }
                    if count > 0 {
                        self.push_chatter_list();
                    }
                    tracing::info!(count, "restored persisted chatters");
                }
                Err(err) => tracing::warn!(error = %err, "discarding unreadable chatter snapshot"),
            }
        }
    }

    fn persist_chatters(&self) {
        if !self.persistence_ok.load(Ordering::SeqCst) {
            return;
        }
        let snapshot = self.chatters.snapshot();
        let raw = match serde_json::to_string(&snapshot) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "chatter snapshot not serializable");
                return;
            }
        };
        if let Err(err) = self.store.set(keys::CHATTERS, &raw) {
            self.disable_persistence(&err);
        }
    }

    fn persist_visits(&self) {
        if !self.persistence_ok.load(Ordering::SeqCst) {
            return;
        }
        let raw = match serde_json::to_string(&*self.lock_visits()) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "visit counters not serializable");
                return;
            }
        };
        if let Err(err) = self.store.set(keys::VISITS, &raw) {
            self.disable_persistence(&err);
        }
    }

    fn disable_persistence(&self, err: &WidgetError) {
        if self.persistence_ok.swap(false, Ordering::SeqCst) {
            tracing::warn!(error = %err, "persistence disabled for this session");
            self.surface.push_lossy(SurfaceCommand::Status {
                subsystem: "persistence",
                detail: err.to_string(),
            });
        }
    }
}

fn sighting_of(event: &ProtocolEvent, user_id: &str) -> PresenceSighting {
    PresenceSighting {
        user_id: user_id.to_owned(),
        display_name: event
            .text_tag("display-name")
            .or_else(|| event.text_tag("username"))
            .unwrap_or(user_id)
            .to_owned(),
        color: event.text_tag("color").map(str::to_owned),
        at: Utc::now(),
    }
}
