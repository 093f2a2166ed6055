#![cfg_attr(not(test), forbid(unsafe_code))]
#![deny(warnings, clippy::pedantic)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]

//! Core engine of the chatglass overlay: badge catalog cache, emote
//! compositing, bounded message and presence windows, the sequential alert
//! queue, and the event router that ties them together. Rendering is out of
//! scope; consumers drain [`surface::SurfaceCommand`]s and draw.

pub mod alerts;
pub mod badges;
pub mod config;
pub mod emotes;
pub mod error;
pub mod models;
pub mod providers;
pub mod router;
pub mod storage;
pub mod surface;
pub mod window;

#[cfg(test)]
mod feed_tests;

pub use alerts::{AlertQueue, AlertTimings};
pub use badges::{BadgeCatalog, BadgeImage, BadgeScope};
pub use config::{CommandAction, OverlayConfig};
pub use error::{WidgetError, WidgetResult};
pub use providers::{BadgeProvider, ChatSink, HelixBadgeProvider, NullSink};
pub use router::EventRouter;
pub use storage::{JsonFileStore, MemoryStore, StateStore};
pub use surface::{AlertStage, RemovalCause, Surface, SurfaceCommand};
pub use window::{BoundedWindow, WindowConfig, WindowEntity};
