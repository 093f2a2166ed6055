use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{WidgetError, WidgetResult};
use crate::models::{Alert, Chatter, RenderedMessage};

/// Why an entity left a window. The terminal states are externally
/// equivalent (the entity is gone) but logged and counted distinctly.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemovalCause {
    /// Pushed out oldest-first by capacity pressure.
    Evicted,
    /// Scheduled per-entity TTL removal fired.
    Expired,
    /// Dropped in bulk by the presence sweep.
    Swept,
    /// The window was reset wholesale.
    Cleared,
}

impl RemovalCause {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Evicted => "evicted",
            Self::Expired => "expired",
            Self::Swept => "swept",
            Self::Cleared => "cleared",
        }
    }
}

/// Presentation phase of an alert. Exactly one alert is ever in `Hold`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertStage {
    Enter,
    Hold,
    Exit,
    Done,
}

/// One instruction to the drawing layer. What an entity looks like is the
/// renderer's business; these commands define what exists and when.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "command")]
pub enum SurfaceCommand {
    MessageAdded {
        message: RenderedMessage,
    },
    MessageRemoved {
        id: String,
        cause: RemovalCause,
    },
    /// Full rebuilt chatter list. Sent only when the set actually changed.
    ChatterList {
        chatters: Vec<Chatter>,
    },
    WindowCleared {
        window: &'static str,
    },
    Alert {
        alert: Alert,
        stage: AlertStage,
    },
    /// A subsystem changed availability (e.g. persistence disabled itself).
    Status {
        subsystem: &'static str,
        detail: String,
    },
}

/// Handle onto the render surface: an unbounded channel of commands. Cheap
/// to clone; every component that mutates visible state holds one.
#[derive(Debug, Clone)]
pub struct Surface {
    tx: mpsc::UnboundedSender<SurfaceCommand>,
}

impl Surface {
    /// Creates a surface and the receiving end the drawing layer consumes.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SurfaceCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Pushes a command. Fails only when the drawing layer is gone.
    pub fn push(&self, command: SurfaceCommand) -> WidgetResult<()> {
        self.tx
            .send(command)
            .map_err(|_| WidgetError::SurfaceClosed)
    }

    /// Pushes a command, logging instead of failing. Used on paths where a
    /// missing surface must not stop state upkeep (e.g. TTL expiry).
    pub fn push_lossy(&self, command: SurfaceCommand) {
        if self.tx.send(command).is_err() {
            tracing::debug!("render surface closed; dropping command");
        }
    }
}
