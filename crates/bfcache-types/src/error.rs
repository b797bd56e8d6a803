//! Error types for the session-history subsystem.

use std::io;

use crate::ids::{FrameId, ItemId};
use crate::load_type::FrameLoadType;

/// Errors produced by the history, loader and cache layers.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("config error: {0}")]
    Config(String),

    #[error("unknown frame: {0}")]
    UnknownFrame(FrameId),

    #[error("unknown history item: {0}")]
    UnknownItem(ItemId),

    #[error("no provisional load in {0}")]
    NoProvisionalLoad(FrameId),

    #[error("cached page already restored or cleared")]
    CachedPageConsumed,

    #[error("cannot restore cached page into a page with {0} subframe(s)")]
    PageHasSubframes(usize),

    #[error("page is not cacheable: {0}")]
    NotCacheable(NotCacheableReason),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Why the current page was not put in the page cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NotCacheableReason {
    #[error("page cache disabled")]
    Disabled,

    #[error("page cache capacity is zero")]
    ZeroCapacity,

    #[error("no current history item")]
    NoCurrentItem,

    #[error("current item is not in the back/forward list")]
    NotInBackForwardList,

    #[error("last visit failed")]
    FailedLoad,

    #[error("main frame has no document")]
    NoDocument,

    #[error("document in {0} cannot suspend")]
    DocumentCannotSuspend(FrameId),

    #[error("{0} is still loading")]
    LoadInProgress(FrameId),

    #[error("{0:?} loads are not cached")]
    LoadType(FrameLoadType),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, HistoryError>;
