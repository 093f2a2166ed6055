pub mod alert;
pub mod catalog;
pub mod event;
pub mod message;
pub mod presence;

pub use alert::{Alert, AlertKind};
pub use catalog::{CatalogResponse, CatalogSet, CatalogVersion};
pub use event::{ClassifiedEvent, ModerationCommand, PresenceSighting, ProtocolEvent, TagValue};
pub use message::{BadgeRef, ChatMessage, EmotePosition, MessageFragment, RenderedMessage};
pub use presence::Chatter;
