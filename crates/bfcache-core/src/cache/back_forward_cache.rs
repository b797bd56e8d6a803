//! Page-wide store of cached pages, keyed by history item.

use std::collections::{HashMap, VecDeque};

use bfcache_types::{FrameLoadType, HistoryError, ItemId, NotCacheableReason, Result};

use super::cached_page::CachedPage;
use crate::page::Page;

/// LRU store of [`CachedPage`]s.
///
/// Expired pages are never handed out: lookups evict them on sight and
/// [`BackForwardCache::prune_expired`] sweeps the rest.
#[derive(Debug)]
pub struct BackForwardCache {
    pages: HashMap<ItemId, CachedPage>,
    /// Most recently used first.
    lru: VecDeque<ItemId>,
    capacity: usize,
}

impl BackForwardCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            pages: HashMap::new(),
            lru: VecDeque::new(),
            capacity,
        }
    }

    /// Store `page` under `item`, replacing any earlier entry. Returns the
    /// items evicted to stay within capacity.
    pub fn add(&mut self, item: ItemId, page: CachedPage) -> Vec<ItemId> {
        self.remove(item);
        if self.capacity == 0 {
            log::debug!("page cache has no capacity; dropping page for {item}");
            return Vec::new();
        }
        self.pages.insert(item, page);
        self.lru.push_front(item);
        log::debug!("cached page for {item} ({} cached)", self.pages.len());
        self.evict_over_capacity()
    }

    /// The page cached under `item`, promoted to most recently used.
    pub fn get(&mut self, item: ItemId) -> Option<&CachedPage> {
        if self.evict_if_expired(item) {
            return None;
        }
        if !self.pages.contains_key(&item) {
            return None;
        }
        self.touch(item);
        self.pages.get(&item)
    }

    /// Remove and return the page cached under `item`, unless it expired.
    pub fn take(&mut self, item: ItemId) -> Option<CachedPage> {
        if self.evict_if_expired(item) {
            return None;
        }
        self.lru.retain(|&i| i != item);
        let page = self.pages.remove(&item)?;
        log::debug!("took cached page for {item}");
        Some(page)
    }

    /// Drop the page cached under `item`. Returns whether there was one.
    pub fn remove(&mut self, item: ItemId) -> bool {
        self.lru.retain(|&i| i != item);
        let removed = self.pages.remove(&item).is_some();
        if removed {
            log::debug!("removed cached page for {item}");
        }
        removed
    }

    /// Whether a live page is cached under `item`.
    pub fn contains(&self, item: ItemId) -> bool {
        self.pages.get(&item).is_some_and(|page| !page.has_expired())
    }

    /// Drop every expired page. Returns the items dropped.
    pub fn prune_expired(&mut self) -> Vec<ItemId> {
        let expired: Vec<ItemId> = self
            .lru
            .iter()
            .copied()
            .filter(|item| self.pages.get(item).is_some_and(CachedPage::has_expired))
            .collect();
        for &item in &expired {
            log::debug!("cached page for {item} expired");
            self.remove(item);
        }
        expired
    }

    pub fn clear(&mut self) {
        if !self.pages.is_empty() {
            log::debug!("clearing {} cached pages", self.pages.len());
        }
        self.pages.clear();
        self.lru.clear();
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shrink or grow the cache, evicting least recently used pages.
    pub fn set_capacity(&mut self, capacity: usize) -> Vec<ItemId> {
        self.capacity = capacity;
        self.evict_over_capacity()
    }

    /// Cached items, most recently used first.
    pub fn cached_items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.lru.iter().copied()
    }

    pub fn mark_pages_for_device_or_page_scale_changed(&mut self) {
        self.pages
            .values_mut()
            .for_each(CachedPage::mark_for_device_or_page_scale_changed);
    }

    pub fn mark_pages_for_caption_preferences_changed(&mut self) {
        self.pages
            .values_mut()
            .for_each(CachedPage::mark_for_caption_preferences_changed);
    }

    pub fn mark_pages_for_contents_size_changed(&mut self) {
        self.pages
            .values_mut()
            .for_each(CachedPage::mark_for_contents_size_changed);
    }

    /// History items kept alive by cached pages, keys included.
    pub(crate) fn referenced_items(&self) -> Vec<ItemId> {
        let mut out: Vec<ItemId> = self.pages.keys().copied().collect();
        for page in self.pages.values() {
            page.referenced_items(&mut out);
        }
        out
    }

    fn touch(&mut self, item: ItemId) {
        self.lru.retain(|&i| i != item);
        self.lru.push_front(item);
    }

    fn evict_if_expired(&mut self, item: ItemId) -> bool {
        let expired = self.pages.get(&item).is_some_and(CachedPage::has_expired);
        if expired {
            log::debug!("cached page for {item} expired");
            self.remove(item);
        }
        expired
    }

    fn evict_over_capacity(&mut self) -> Vec<ItemId> {
        let mut evicted = Vec::new();
        while self.lru.len() > self.capacity {
            let Some(item) = self.lru.pop_back() else { break };
            self.pages.remove(&item);
            log::debug!("evicted cached page for {item}");
            evicted.push(item);
        }
        evicted
    }
}

impl Page {
    /// Whether the page could be cached if navigated away from with a load
    /// of `load_type`. Returns the item the page would be stored under.
    pub fn check_cacheability(
        &self,
        load_type: FrameLoadType,
    ) -> std::result::Result<ItemId, NotCacheableReason> {
        if !self.config.page_cache.enabled {
            return Err(NotCacheableReason::Disabled);
        }
        if self.cache.capacity() == 0 {
            return Err(NotCacheableReason::ZeroCapacity);
        }
        if !(load_type == FrameLoadType::Standard || load_type.is_back_forward()) {
            return Err(NotCacheableReason::LoadType(load_type));
        }
        let main = self.frames.main();
        let item = self
            .frames
            .get(main)
            .and_then(|f| f.history.current_item())
            .ok_or(NotCacheableReason::NoCurrentItem)?;
        if !self.back_forward.contains(item) {
            return Err(NotCacheableReason::NotInBackForwardList);
        }
        if self.items.get(item).is_none_or(|i| i.last_visit_was_failure) {
            return Err(NotCacheableReason::FailedLoad);
        }
        if self.frames.get(main).is_none_or(|f| f.document.is_none()) {
            return Err(NotCacheableReason::NoDocument);
        }
        for frame in self.frames.traverse(main) {
            let Some(live) = self.frames.get(frame) else {
                continue;
            };
            if live.document.as_ref().is_some_and(|d| !d.can_suspend) {
                return Err(NotCacheableReason::DocumentCannotSuspend(frame));
            }
            if frame != main && !live.loader.is_complete {
                return Err(NotCacheableReason::LoadInProgress(frame));
            }
        }
        Ok(item)
    }

    /// Freeze the current page into the cache under the main frame's
    /// current item.
    pub fn add_if_cacheable(&mut self, load_type: FrameLoadType) -> Result<ItemId> {
        let item = self.check_cacheability(load_type).map_err(|reason| {
            log::debug!("not caching page: {reason}");
            HistoryError::NotCacheable(reason)
        })?;
        let main = self.frames.main();
        if let Some(document) = self.frames.get_mut(main).and_then(|f| f.document.as_mut()) {
            document.back_forward_cache_state =
                crate::frame::BackForwardCacheState::AboutToEnterBackForwardCache;
        }
        let cached = CachedPage::new(self);
        let evicted = self.cache.add(item, cached);
        if !evicted.is_empty() {
            log::debug!("page cache evicted {evicted:?}");
        }
        Ok(item)
    }
}
