//! Sequential presentation queue: serializes transient alerts so only one
//! is ever mid-animation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::error::WidgetResult;
use crate::models::Alert;
use crate::surface::{AlertStage, Surface, SurfaceCommand};

/// Fixed phase durations of the alert lifecycle, in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AlertTimings {
    pub enter_ms: u64,
    pub hold_ms: u64,
    pub exit_ms: u64,
}

impl Default for AlertTimings {
    fn default() -> Self {
        Self {
            enter_ms: 400,
            hold_ms: 4_000,
            exit_ms: 400,
        }
    }
}

impl AlertTimings {
    pub const fn enter(&self) -> Duration {
        Duration::from_millis(self.enter_ms)
    }

    pub const fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    pub const fn exit(&self) -> Duration {
        Duration::from_millis(self.exit_ms)
    }
}

#[derive(Debug)]
struct QueueState {
    queue: VecDeque<Alert>,
    presenting: bool,
}

/// FIFO alert queue with a single-flight presentation worker.
///
/// `enqueue` never blocks. The worker runs each alert's lifecycle
/// (enter → hold → exit) to completion before looking at the next item, so
/// at most one alert is in its hold phase at any time and presentation
/// order is strict FIFO.
#[derive(Debug, Clone)]
pub struct AlertQueue {
    state: Arc<Mutex<QueueState>>,
    surface: Surface,
    timings: AlertTimings,
}

impl AlertQueue {
    pub fn new(timings: AlertTimings, surface: Surface) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                queue: VecDeque::new(),
                presenting: false,
            })),
            surface,
            timings,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends to the queue and wakes the worker if idle.
    pub fn enqueue(&self, alert: Alert) {
        let start_worker = {
            let mut state = self.lock();
            state.queue.push_back(alert);
            if state.presenting {
                false
            } else {
                state.presenting = true;
                true
            }
        };

        if start_worker {
            let queue = self.clone();
            tokio::spawn(async move { queue.drain().await });
        }
    }

    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// True when nothing is queued and nothing is mid-presentation.
    pub fn is_idle(&self) -> bool {
        let state = self.lock();
        state.queue.is_empty() && !state.presenting
    }

    async fn drain(&self) {
        loop {
            let next = {
                let mut state = self.lock();
                match state.queue.pop_front() {
                    Some(alert) => alert,
                    None => {
                        state.presenting = false;
                        return;
                    }
                }
            };

            // Presentation is best-effort, not guaranteed-delivery: an
            // unpresentable alert is logged and dropped, never requeued.
            if let Err(err) = self.present(next).await {
                tracing::warn!(error = %err, "alert presentation failed; skipping to next");
            }
        }
    }

    async fn present(&self, alert: Alert) -> WidgetResult<()> {
        self.surface.push(SurfaceCommand::Alert {
            alert: alert.clone(),
            stage: AlertStage::Enter,
        })?;
        tokio::time::sleep(self.timings.enter()).await;

        self.surface.push(SurfaceCommand::Alert {
            alert: alert.clone(),
            stage: AlertStage::Hold,
        })?;
        tokio::time::sleep(self.timings.hold()).await;

        self.surface.push(SurfaceCommand::Alert {
            alert: alert.clone(),
            stage: AlertStage::Exit,
        })?;
        tokio::time::sleep(self.timings.exit()).await;

        self.surface.push(SurfaceCommand::Alert {
            alert,
            stage: AlertStage::Done,
        })?;
        counter!("chatglass_alerts_presented_total").increment(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertKind;
    use chrono::Utc;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn alert(subject: &str) -> Alert {
        Alert {
            subject_id: subject.into(),
            display_name: subject.into(),
            color: None,
            visit_count: 1,
            kind: AlertKind::FirstTimeChatter,
            created: Utc::now(),
        }
    }

    fn stages(rx: &mut UnboundedReceiver<SurfaceCommand>) -> Vec<(String, AlertStage)> {
        let mut seen = Vec::new();
        while let Ok(command) = rx.try_recv() {
            if let SurfaceCommand::Alert { alert, stage } = command {
                seen.push((alert.subject_id, stage));
            }
        }
        seen
    }

    fn total(timings: AlertTimings) -> Duration {
        timings.enter() + timings.hold() + timings.exit()
    }

    #[tokio::test(start_paused = true)]
    async fn presents_in_fifo_order_one_hold_at_a_time() {
        let (surface, mut rx) = Surface::channel();
        let timings = AlertTimings::default();
        let queue = AlertQueue::new(timings, surface);

        for subject in ["a", "b", "c"] {
            queue.enqueue(alert(subject));
        }

        tokio::time::sleep(total(timings) * 3 + Duration::from_millis(10)).await;

        let seen = stages(&mut rx);
        let holds: Vec<&str> = seen
            .iter()
            .filter(|(_, stage)| *stage == AlertStage::Hold)
            .map(|(subject, _)| subject.as_str())
            .collect();
        assert_eq!(holds, vec!["a", "b", "c"]);

        // A hold is always closed by the same subject's exit before the
        // next hold begins.
        let mut in_hold: Option<&str> = None;
        for (subject, stage) in &seen {
            match stage {
                AlertStage::Hold => {
                    assert!(in_hold.is_none(), "two alerts in hold at once");
                    in_hold = Some(subject.as_str());
                }
                AlertStage::Exit => {
                    assert_eq!(in_hold, Some(subject.as_str()));
                    in_hold = None;
                }
                _ => {}
            }
        }
        assert!(in_hold.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_while_presenting_does_not_spawn_second_worker() {
        let (surface, mut rx) = Surface::channel();
        let timings = AlertTimings::default();
        let queue = AlertQueue::new(timings, surface);

        queue.enqueue(alert("a"));
        // Let "a" reach its hold phase, then enqueue the next one.
        tokio::time::sleep(timings.enter() + Duration::from_millis(10)).await;
        queue.enqueue(alert("b"));
        assert_eq!(queue.pending(), 1);

        tokio::time::sleep(total(timings) * 2).await;

        let seen = stages(&mut rx);
        let order: Vec<(String, AlertStage)> = seen;
        let positions: Vec<usize> = order
            .iter()
            .enumerate()
            .filter(|(_, (_, stage))| *stage == AlertStage::Hold)
            .map(|(index, _)| index)
            .collect();
        assert_eq!(positions.len(), 2);
        // b's hold strictly follows a's full lifecycle.
        assert!(order[..positions[1]]
            .iter()
            .any(|(subject, stage)| subject == "a" && *stage == AlertStage::Done));
    }

    #[tokio::test(start_paused = true)]
    async fn worker_goes_idle_and_restarts_for_later_alerts() {
        let (surface, mut rx) = Surface::channel();
        let timings = AlertTimings::default();
        let queue = AlertQueue::new(timings, surface);

        queue.enqueue(alert("a"));
        tokio::time::sleep(total(timings) + Duration::from_millis(10)).await;
        assert_eq!(queue.pending(), 0);

        queue.enqueue(alert("b"));
        tokio::time::sleep(total(timings) + Duration::from_millis(10)).await;

        let holds: Vec<String> = stages(&mut rx)
            .into_iter()
            .filter(|(_, stage)| *stage == AlertStage::Hold)
            .map(|(subject, _)| subject)
            .collect();
        assert_eq!(holds, vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_surface_abandons_lifecycle_without_wedging_the_worker() {
        let (surface, rx) = Surface::channel();
        let timings = AlertTimings::default();
        let queue = AlertQueue::new(timings, surface);
        drop(rx);

        queue.enqueue(alert("a"));
        queue.enqueue(alert("b"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Both presentations failed fast; the worker drained the queue and
        // parked instead of retrying.
        assert_eq!(queue.pending(), 0);
        assert!(!queue.lock().presenting);
    }
}
