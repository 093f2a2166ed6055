use thiserror::Error;

/// Errors raised by the overlay engine.
///
/// Every variant is local to the event or operation that caused it: the
/// router logs and degrades, it never tears down the feed. See the per-module
/// docs for which variants are swallowed where.
#[derive(Debug, Error)]
pub enum WidgetError {
    /// Badge catalog fetch failed. The cache keeps its prior state and
    /// `resolve` falls back to the legacy URL rule.
    #[error("catalog fetch failed: {0}")]
    CatalogFetch(String),

    /// Outbound chat send failed. Not retried, to avoid duplicate command
    /// side effects.
    #[error("outbound send failed: {0}")]
    Send(String),

    /// An inbound event lacked a tag the feature needs. Only that feature is
    /// skipped for that event.
    #[error("malformed event: missing tag `{0}`")]
    MissingTag(&'static str),

    /// The key-value store is unavailable. Persistence disables itself and
    /// reports status; everything else continues.
    #[error("storage unavailable: {0}")]
    Storage(String),

    /// The render surface receiver was dropped.
    #[error("render surface closed")]
    SurfaceClosed,

    /// Configuration could not be loaded or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type WidgetResult<T> = Result<T, WidgetError>;
