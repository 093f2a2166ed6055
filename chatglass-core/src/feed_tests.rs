//! End-to-end feed scenarios: router, windows, badge/emote pipeline, and
//! alert queue wired together the way a real session runs them.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::WidgetResult;
use crate::models::{CatalogResponse, MessageFragment, ProtocolEvent};
use crate::providers::{BadgeProvider, NullSink};
use crate::router::EventRouter;
use crate::storage::MemoryStore;
use crate::surface::{AlertStage, RemovalCause, Surface, SurfaceCommand};
use crate::OverlayConfig;

struct CannedCatalog(CatalogResponse);

#[async_trait::async_trait]
impl BadgeProvider for CannedCatalog {
    async fn global_badges(&self) -> WidgetResult<CatalogResponse> {
        Ok(self.0.clone())
    }

    async fn channel_badges(&self, _broadcaster_id: &str) -> WidgetResult<CatalogResponse> {
        Ok(CatalogResponse { data: Vec::new() })
    }
}

fn event(value: serde_json::Value) -> ProtocolEvent {
    serde_json::from_value(value).unwrap()
}

fn drain(rx: &mut UnboundedReceiver<SurfaceCommand>) -> Vec<SurfaceCommand> {
    let mut commands = Vec::new();
    while let Ok(command) = rx.try_recv() {
        commands.push(command);
    }
    commands
}

#[tokio::test(start_paused = true)]
async fn full_session_renders_alerts_evictions_and_clear() {
    let config = OverlayConfig {
        message_capacity: 3,
        message_ttl_secs: 0,
        ..OverlayConfig::default()
    };
    let (surface, mut rx) = Surface::channel();
    let mut router = EventRouter::new(
        config,
        surface,
        Arc::new(MemoryStore::new()),
        Arc::new(NullSink),
    );

    let provider = CannedCatalog(
        serde_json::from_value(json!({
            "data": [{
                "set_id": "subscriber",
                "versions": [{ "id": "1", "image_url_1x": "https://cdn/sub-1x" }]
            }]
        }))
        .unwrap(),
    );
    router.seed(Some(&provider as &dyn BadgeProvider)).await;

    // A brand new chatter with a badge and an emote in their first message.
    router
        .on_event(event(json!({
            "tags": {
                "user-id": "100",
                "display-name": "Anna",
                "message-id": "a1",
                "first-msg": true,
                "badges-raw": "subscriber/1",
                "emotes": { "25": ["0-4"] }
            },
            "body": "Kappa hi"
        })))
        .await;

    // Three more plain messages push the first one out (capacity 3).
    for (user, id) in [("101", "b1"), ("102", "c1"), ("103", "d1")] {
        router
            .on_event(event(json!({
                "tags": { "user-id": user, "display-name": user, "message-id": id },
                "body": "hello"
            })))
            .await;
    }

    // Let the first-time alert play out on the paused clock.
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(router.alerts_idle());

    // A moderator resets the message window.
    router
        .on_event(event(json!({
            "tags": { "user-id": "200", "display-name": "Moddy" },
            "body": "!clear"
        })))
        .await;

    let commands = drain(&mut rx);

    let added: Vec<String> = commands
        .iter()
        .filter_map(|command| match command {
            SurfaceCommand::MessageAdded { message } => Some(message.id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(added, vec!["a1:100", "b1:101", "c1:102", "d1:103"]);

    // Anna's message carried the resolved badge and composited emote.
    let anna = commands
        .iter()
        .find_map(|command| match command {
            SurfaceCommand::MessageAdded { message } if message.id == "a1:100" => Some(message),
            _ => None,
        })
        .unwrap();
    assert_eq!(anna.badge_images, vec!["https://cdn/sub-1x".to_owned()]);
    assert_eq!(
        anna.fragments,
        vec![
            MessageFragment::Emote {
                id: "25".into(),
                image_url: crate::emotes::emote_url("25"),
            },
            MessageFragment::text(" hi"),
        ]
    );

    // Capacity eviction removed exactly the oldest message.
    let evictions: Vec<&str> = commands
        .iter()
        .filter_map(|command| match command {
            SurfaceCommand::MessageRemoved { id, cause } if *cause == RemovalCause::Evicted => {
                Some(id.as_str())
            }
            _ => None,
        })
        .collect();
    assert_eq!(evictions, vec!["a1:100"]);

    // The first-time alert ran its whole lifecycle for Anna.
    let stages: Vec<AlertStage> = commands
        .iter()
        .filter_map(|command| match command {
            SurfaceCommand::Alert { alert, stage } if alert.subject_id == "100" => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            AlertStage::Enter,
            AlertStage::Hold,
            AlertStage::Exit,
            AlertStage::Done
        ]
    );

    // The clear arrived as a window reset, not individual removals.
    assert!(commands
        .iter()
        .any(|command| matches!(command, SurfaceCommand::WindowCleared { window: "messages" })));
    assert!(router.message_window().is_empty());

    // Everyone who spoke is still present, including the command author.
    assert_eq!(router.chatter_window().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn restart_restores_presence_and_visit_counters_same_day() {
    let store = Arc::new(MemoryStore::new());

    {
        let (surface, _rx) = Surface::channel();
        let mut router = EventRouter::new(
            OverlayConfig::default(),
            surface,
            store.clone(),
            Arc::new(NullSink),
        );
        router.seed(None).await;
        router
            .on_event(event(json!({
                "tags": { "user-id": "100", "display-name": "Anna", "first-msg": true, "message-id": "a1" },
                "body": "hi"
            })))
            .await;
        assert_eq!(router.visit_count("100"), 1);
        tokio::time::sleep(Duration::from_secs(6)).await;
    }

    // Same-day restart: the persisted mirror seeds the new session.
    let (surface, mut rx) = Surface::channel();
    let mut router = EventRouter::new(
        OverlayConfig::default(),
        surface,
        store,
        Arc::new(NullSink),
    );
    router.seed(None).await;

    assert!(router.chatter_window().contains("100"));
    assert_eq!(router.visit_count("100"), 1);
    let restored_list = drain(&mut rx).into_iter().any(|command| {
        matches!(
            command,
            SurfaceCommand::ChatterList { chatters } if chatters.len() == 1
        )
    });
    assert!(restored_list);
}
