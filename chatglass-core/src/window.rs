//! Time-windowed, size-capped ordered collections of display entities.
//!
//! A window exclusively owns every entity inserted into it until eviction,
//! expiry, or a reset. Deferred removals capture an entity's stable
//! sequence number, never a reference, and re-check presence under the lock
//! before acting, so a TTL firing after capacity eviction is a no-op.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use metrics::counter;

use crate::models::{Chatter, RenderedMessage};
use crate::surface::{RemovalCause, Surface, SurfaceCommand};

/// An entity a window can own. The optional surface commands let each
/// parameterization decide its render side effects: messages draw and erase
/// individually, chatters are snapshot-driven and return `None`.
pub trait WindowEntity: Clone + Debug + Send + Sync + 'static {
    const LABEL: &'static str;

    /// Stable identity within the window, used for dedup and liveness
    /// re-checks.
    fn entity_id(&self) -> &str;

    fn added_command(&self) -> Option<SurfaceCommand> {
        None
    }

    fn removed_command(&self, cause: RemovalCause) -> Option<SurfaceCommand> {
        let _ = cause;
        None
    }
}

impl WindowEntity for RenderedMessage {
    const LABEL: &'static str = "messages";

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn added_command(&self) -> Option<SurfaceCommand> {
        Some(SurfaceCommand::MessageAdded {
            message: self.clone(),
        })
    }

    fn removed_command(&self, cause: RemovalCause) -> Option<SurfaceCommand> {
        Some(SurfaceCommand::MessageRemoved {
            id: self.id.clone(),
            cause,
        })
    }
}

impl WindowEntity for Chatter {
    const LABEL: &'static str = "chatters";

    fn entity_id(&self) -> &str {
        &self.user_id
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WindowConfig {
    /// Maximum entities retained; oldest evicted first on overflow.
    pub capacity: usize,
    /// Maximum age before scheduled removal. `None` disables per-entity
    /// expiry (the presence window is swept in bulk instead).
    pub ttl: Option<Duration>,
}

#[derive(Debug)]
struct Entry<T> {
    seq: u64,
    entity: T,
}

#[derive(Debug)]
struct WindowState<T> {
    entries: VecDeque<Entry<T>>,
    next_seq: u64,
}

/// Bounded, ordered collection with scheduled per-entity expiry.
#[derive(Debug)]
pub struct BoundedWindow<T: WindowEntity> {
    state: Arc<Mutex<WindowState<T>>>,
    config: WindowConfig,
    surface: Surface,
}

impl<T: WindowEntity> BoundedWindow<T> {
    pub fn new(config: WindowConfig, surface: Surface) -> Self {
        Self {
            state: Arc::new(Mutex::new(WindowState {
                entries: VecDeque::new(),
                next_seq: 0,
            })),
            config,
            surface,
        }
    }

    fn lock(&self) -> MutexGuard<'_, WindowState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends at the newest end, evicting oldest-first past capacity. When
    /// a TTL is configured the entity independently schedules its own
    /// deferred removal.
    pub fn insert(&self, entity: T) {
        let seq = {
            let mut state = self.lock();
            let seq = state.next_seq;
            state.next_seq += 1;

            if let Some(command) = entity.added_command() {
                self.surface.push_lossy(command);
            }
            state.entries.push_back(Entry { seq, entity });
            counter!("chatglass_window_admitted_total", "window" => T::LABEL).increment(1);

            while state.entries.len() > self.config.capacity {
                if let Some(evicted) = state.entries.pop_front() {
                    removal_effects::<T>(&evicted.entity, RemovalCause::Evicted, &self.surface);
                }
            }
            seq
        };

        if let Some(ttl) = self.config.ttl {
            let state = Arc::downgrade(&self.state);
            let surface = self.surface.clone();
            tokio::spawn(expire_after::<T>(state, surface, seq, ttl));
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock()
            .entries
            .iter()
            .any(|entry| entry.entity.entity_id() == id)
    }

    /// Updates a live entity in place. Returns false when no entity with
    /// the id is present.
    pub fn touch(&self, id: &str, update: impl FnOnce(&mut T)) -> bool {
        let mut state = self.lock();
        match state
            .entries
            .iter_mut()
            .find(|entry| entry.entity.entity_id() == id)
        {
            Some(entry) => {
                update(&mut entry.entity);
                true
            }
            None => false,
        }
    }

    /// Drops every entity matching the predicate in bulk, firing no
    /// per-entity render commands. The caller rebuilds the snapshot only
    /// when the returned count is non-zero.
    pub fn remove_where(&self, pred: impl Fn(&T) -> bool) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|entry| !pred(&entry.entity));
        let removed = before - state.entries.len();
        if removed > 0 {
            counter!(
                "chatglass_window_removed_total",
                "window" => T::LABEL,
                "cause" => RemovalCause::Swept.as_str()
            )
            .increment(removed as u64);
            tracing::debug!(window = T::LABEL, removed, "bulk removal");
        }
        removed
    }

    /// Removes everything at once. A reset, not organic expiry: no
    /// individual removal commands fire, only a cleared notice.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut state = self.lock();
            let removed = state.entries.len();
            state.entries.clear();
            removed
        };
        if removed > 0 {
            counter!(
                "chatglass_window_removed_total",
                "window" => T::LABEL,
                "cause" => RemovalCause::Cleared.as_str()
            )
            .increment(removed as u64);
        }
        tracing::info!(window = T::LABEL, removed, "window cleared");
        self.surface
            .push_lossy(SurfaceCommand::WindowCleared { window: T::LABEL });
        removed
    }

    /// Entities in arrival order, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.lock()
            .entries
            .iter()
            .map(|entry| entry.entity.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

fn removal_effects<T: WindowEntity>(entity: &T, cause: RemovalCause, surface: &Surface) {
    counter!(
        "chatglass_window_removed_total",
        "window" => T::LABEL,
        "cause" => cause.as_str()
    )
    .increment(1);
    tracing::debug!(
        window = T::LABEL,
        id = entity.entity_id(),
        cause = cause.as_str(),
        "entity removed"
    );
    if let Some(command) = entity.removed_command(cause) {
        surface.push_lossy(command);
    }
}

/// Deferred TTL removal. Holds only a weak handle and the entity's sequence
/// number; if the entity is already gone by the deadline this is a no-op.
async fn expire_after<T: WindowEntity>(
    state: Weak<Mutex<WindowState<T>>>,
    surface: Surface,
    seq: u64,
    ttl: Duration,
) {
    tokio::time::sleep(ttl).await;
    let Some(state) = state.upgrade() else {
        return;
    };
    let expired = {
        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        let index = guard.entries.iter().position(|entry| entry.seq == seq);
        index.and_then(|index| guard.entries.remove(index))
    };
    if let Some(entry) = expired {
        removal_effects::<T>(&entry.entity, RemovalCause::Expired, &surface);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn message(id: &str) -> RenderedMessage {
        RenderedMessage {
            id: id.into(),
            author_id: "42".into(),
            display_name: "tester".into(),
            color: None,
            badge_images: Vec::new(),
            fragments: Vec::new(),
            arrival: Utc::now(),
        }
    }

    fn window(
        capacity: usize,
        ttl: Option<Duration>,
    ) -> (
        BoundedWindow<RenderedMessage>,
        UnboundedReceiver<SurfaceCommand>,
    ) {
        let (surface, rx) = Surface::channel();
        (BoundedWindow::new(WindowConfig { capacity, ttl }, surface), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<SurfaceCommand>) -> Vec<SurfaceCommand> {
        let mut commands = Vec::new();
        while let Ok(command) = rx.try_recv() {
            commands.push(command);
        }
        commands
    }

    #[tokio::test]
    async fn size_never_exceeds_capacity_and_eviction_is_oldest_first() {
        let (window, mut rx) = window(3, None);
        for index in 0..10 {
            window.insert(message(&format!("m{index}")));
            assert!(window.len() <= 3);
        }
        let snapshot = window.snapshot();
        let ids: Vec<&str> = snapshot.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m7", "m8", "m9"]);

        let removed: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|command| match command {
                SurfaceCommand::MessageRemoved { id, cause } => {
                    assert_eq!(cause, RemovalCause::Evicted);
                    Some(id)
                }
                _ => None,
            })
            .collect();
        assert_eq!(removed, vec!["m0", "m1", "m2", "m3", "m4", "m5", "m6"]);
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_removal_fires_no_earlier_than_arrival_plus_ttl() {
        let ttl = Duration::from_secs(30);
        let (window, mut rx) = window(10, Some(ttl));
        window.insert(message("m0"));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(window.contains("m0"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!window.contains("m0"));

        let causes: Vec<RemovalCause> = drain(&mut rx)
            .into_iter()
            .filter_map(|command| match command {
                SurfaceCommand::MessageRemoved { cause, .. } => Some(cause),
                _ => None,
            })
            .collect();
        assert_eq!(causes, vec![RemovalCause::Expired]);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_after_eviction_is_a_no_op() {
        let ttl = Duration::from_secs(10);
        let (window, mut rx) = window(1, Some(ttl));
        window.insert(message("m0"));
        // Capacity pressure evicts m0 long before its TTL.
        window.insert(message("m1"));

        tokio::time::sleep(ttl + Duration::from_secs(1)).await;

        let removals: Vec<(String, RemovalCause)> = drain(&mut rx)
            .into_iter()
            .filter_map(|command| match command {
                SurfaceCommand::MessageRemoved { id, cause } => Some((id, cause)),
                _ => None,
            })
            .collect();
        // m0 removed exactly once (evicted); its scheduled expiry found it
        // gone. m1 expired normally.
        assert_eq!(
            removals,
            vec![
                ("m0".to_owned(), RemovalCause::Evicted),
                ("m1".to_owned(), RemovalCause::Expired),
            ]
        );
    }

    #[tokio::test]
    async fn clear_fires_no_individual_removals() {
        let (window, mut rx) = window(5, None);
        window.insert(message("m0"));
        window.insert(message("m1"));
        drain(&mut rx);

        assert_eq!(window.clear(), 2);
        assert!(window.is_empty());

        let commands = drain(&mut rx);
        assert_eq!(
            commands,
            vec![SurfaceCommand::WindowCleared { window: "messages" }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_after_clear_is_a_no_op() {
        let ttl = Duration::from_secs(5);
        let (window, mut rx) = window(5, Some(ttl));
        window.insert(message("m0"));
        window.clear();
        drain(&mut rx);

        tokio::time::sleep(ttl + Duration::from_secs(1)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn remove_where_reports_count_and_emits_nothing() {
        let (window, mut rx) = window(5, None);
        window.insert(message("m0"));
        window.insert(message("m1"));
        window.insert(message("keep"));
        drain(&mut rx);

        let removed = window.remove_where(|m| m.id.starts_with('m'));
        assert_eq!(removed, 2);
        assert_eq!(window.remove_where(|m| m.id.starts_with('m')), 0);
        assert_eq!(window.len(), 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn touch_updates_in_place_without_reordering() {
        let (window, _rx) = window(5, None);
        window.insert(message("m0"));
        window.insert(message("m1"));

        assert!(window.touch("m0", |m| m.display_name = "renamed".into()));
        assert!(!window.touch("missing", |_| unreachable!()));

        let snapshot = window.snapshot();
        assert_eq!(snapshot[0].display_name, "renamed");
        assert_eq!(snapshot[0].id, "m0");
    }
}
