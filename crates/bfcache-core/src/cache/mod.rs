//! The back/forward cache.
//!
//! Leaving a page may freeze it into a [`CachedPage`] stored under the
//! history item it was showing. Traversing back to that item restores the
//! frozen frames instead of loading from the network.

mod back_forward_cache;
mod cached_frame;
mod cached_page;

pub use back_forward_cache::BackForwardCache;
pub use bfcache_types::NotCacheableReason;
pub use cached_frame::CachedFrame;
pub use cached_page::CachedPage;
