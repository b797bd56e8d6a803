//! Session history and the back/forward cache.
//!
//! A [`Page`] owns a frame tree, the history items describing where each
//! frame has been, the back/forward list of entries, and a cache of frozen
//! pages that back/forward traversals can restore without reloading.
//! Network and script work is delegated to a [`HistoryClient`]; the
//! embedder answers loads through [`Page::did_commit_load`] and friends.

pub mod back_forward;
pub mod cache;
pub mod client;
pub mod frame;
pub mod history;
pub mod item;
pub mod loader;
pub mod page;

#[cfg(test)]
pub(crate) mod test_utils;

#[cfg(test)]
mod tests;

// -----------------------------------------------------------------------
// Public re-exports
// -----------------------------------------------------------------------

pub use back_forward::BackForwardList;
pub use cache::{BackForwardCache, CachedFrame, CachedPage, NotCacheableReason};
pub use client::{
    HistoryClient, LoadRequest, LoadResponse, NavigationNavigationType, NoopClient, PolicyTicket,
    ProcessSwapDisposition, ShouldGoToHistoryItem,
};
pub use frame::{BackForwardCacheState, Document, DocumentLoader, Frame, FrameTree, FrameView};
pub use history::{
    ControllerState, DeferredNavigation, History, HistoryController, HistoryUpdateType,
    TraversalDecision, TraversalStep, plan_traversal,
};
pub use item::{FormData, HistoryItem, ItemArena, ScrollPosition};
pub use loader::NavigationRequest;
pub use page::Page;

pub use bfcache_types::{
    Clock, DocumentId, FrameId, FrameLoadType, HistoryConfig, HistoryError, IdGenerator, ItemId,
    ManualClock, MonotonicTime, PageCacheConfig, Result, SystemClock,
};
