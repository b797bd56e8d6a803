//! The page: frame tree, item arena, back/forward list and cache.
//!
//! A [`Page`] owns everything the history machinery touches. Frames and
//! history items refer to each other by id only; the page is the single
//! owner, and [`Page::collect_garbage`] releases items nothing refers to.

use std::collections::HashSet;
use std::rc::Rc;

use bfcache_types::{
    Clock, FrameId, HistoryConfig, HistoryError, IdGenerator, ItemId, MonotonicTime, Result,
    SystemClock,
};

use crate::back_forward::BackForwardList;
use crate::cache::BackForwardCache;
use crate::client::HistoryClient;
use crate::frame::{Frame, FrameTree};
use crate::history::History;
use crate::item::{HistoryItem, ItemArena, ScrollPosition};

pub struct Page {
    pub(crate) config: HistoryConfig,
    pub(crate) ids: IdGenerator,
    pub(crate) clock: Rc<dyn Clock>,
    pub(crate) items: ItemArena,
    pub(crate) frames: FrameTree,
    pub(crate) back_forward: BackForwardList,
    pub(crate) cache: BackForwardCache,
    pub(crate) client: Box<dyn HistoryClient>,
    pub(crate) visited_links: HashSet<String>,
    pub(crate) focused_frame: Option<FrameId>,
    pub(crate) page_scale_factor: f32,
    pub(crate) view_scale_factor: f32,
    pub(crate) in_swipe_animation: bool,
    pub(crate) restoring_cached_page: bool,
    pub(crate) needs_style_recalc: bool,
}

impl Page {
    pub fn new(config: HistoryConfig, client: Box<dyn HistoryClient>) -> Self {
        Self::with_clock_and_ids(config, client, Rc::new(SystemClock::new()), IdGenerator::new())
    }

    /// A page with an explicit time source and id generator, for
    /// reproducible sessions.
    pub fn with_clock_and_ids(
        config: HistoryConfig,
        client: Box<dyn HistoryClient>,
        clock: Rc<dyn Clock>,
        ids: IdGenerator,
    ) -> Self {
        let main = Frame::new(ids.next_frame_id(), "", ids.next_document_id());
        log::debug!("new page with main frame {}", main.id());
        Self {
            back_forward: BackForwardList::new(config.back_forward_list_capacity),
            cache: BackForwardCache::new(config.page_cache.capacity),
            config,
            ids,
            clock,
            items: ItemArena::new(),
            frames: FrameTree::new(main),
            client,
            visited_links: HashSet::new(),
            focused_frame: None,
            page_scale_factor: 1.0,
            view_scale_factor: 1.0,
            in_swipe_animation: false,
            restoring_cached_page: false,
            needs_style_recalc: false,
        }
    }

    // -- Accessors ----------------------------------------------------------

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn main_frame(&self) -> &Frame {
        self.frames.main_frame()
    }

    pub fn main_frame_id(&self) -> FrameId {
        self.frames.main()
    }

    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id)
    }

    pub fn frames(&self) -> &FrameTree {
        &self.frames
    }

    pub fn subframe_count(&self) -> usize {
        self.frames.subframe_count()
    }

    /// History handle for `frame`.
    pub fn history(&mut self, frame: FrameId) -> Result<History<'_>> {
        if !self.frames.contains(frame) {
            return Err(HistoryError::UnknownFrame(frame));
        }
        Ok(History::new(self, frame))
    }

    pub fn main_history(&mut self) -> History<'_> {
        let main = self.frames.main();
        History::new(self, main)
    }

    pub fn item(&self, id: ItemId) -> Option<&HistoryItem> {
        self.items.get(id)
    }

    pub fn items(&self) -> &ItemArena {
        &self.items
    }

    pub fn back_forward(&self) -> &BackForwardList {
        &self.back_forward
    }

    pub fn cache(&self) -> &BackForwardCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut BackForwardCache {
        &mut self.cache
    }

    pub fn now(&self) -> MonotonicTime {
        self.clock.now()
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited_links.contains(url)
    }

    pub fn page_scale_factor(&self) -> f32 {
        self.page_scale_factor
    }

    pub fn needs_style_recalc(&self) -> bool {
        self.needs_style_recalc
    }

    pub fn clear_needs_style_recalc(&mut self) {
        self.needs_style_recalc = false;
    }

    pub fn is_restoring_cached_page(&self) -> bool {
        self.restoring_cached_page
    }

    pub fn in_swipe_animation(&self) -> bool {
        self.in_swipe_animation
    }

    // -- Embedder notifications ----------------------------------------------

    /// Zoom changed. Cached pages are told when they come back.
    pub fn set_page_scale_factor(&mut self, scale: f32) {
        self.page_scale_factor = scale;
        self.cache.mark_pages_for_device_or_page_scale_changed();
        self.client.device_or_page_scale_factor_changed();
    }

    pub fn set_view_scale_factor(&mut self, scale: f32) {
        if scale > 0.0 {
            self.view_scale_factor = scale;
        }
    }

    pub fn caption_preferences_changed(&mut self) {
        self.cache.mark_pages_for_caption_preferences_changed();
        self.client.caption_preferences_changed();
    }

    pub fn contents_size_changed(&mut self) {
        self.cache.mark_pages_for_contents_size_changed();
        let main = self.frames.main();
        self.client.update_contents_size(main);
    }

    /// The user scrolled `frame`.
    pub fn scroll_frame(&mut self, frame: FrameId, position: ScrollPosition) -> Result<()> {
        let view = &mut self.frame_mut(frame)?.view;
        view.scroll_position = position.clamped();
        view.was_scrolled_by_user = true;
        Ok(())
    }

    /// Replace the form control state of `frame`'s document.
    pub fn set_form_state(&mut self, frame: FrameId, state: Vec<String>) -> Result<()> {
        if let Some(document) = self.frame_mut(frame)?.document.as_mut() {
            document.form_state = state;
        }
        Ok(())
    }

    /// Mark whether `frame`'s document may be frozen into the cache.
    pub fn set_document_can_suspend(&mut self, frame: FrameId, can_suspend: bool) -> Result<()> {
        if let Some(document) = self.frame_mut(frame)?.document.as_mut() {
            document.can_suspend = can_suspend;
        }
        Ok(())
    }

    /// Focus `element` in `frame`, making it the focused frame.
    pub fn set_focused_element(&mut self, frame: FrameId, element: Option<&str>) -> Result<()> {
        if let Some(document) = self.frame_mut(frame)?.document.as_mut() {
            document.focused_element = element.map(str::to_string);
        }
        if element.is_some() {
            self.focused_frame = Some(frame);
        }
        Ok(())
    }

    pub fn set_has_recent_user_interaction(&mut self, frame: FrameId, value: bool) -> Result<()> {
        if let Some(document) = self.frame_mut(frame)?.document.as_mut() {
            document.has_recent_user_interaction = value;
        }
        Ok(())
    }

    pub fn set_focused_frame(&mut self, frame: Option<FrameId>) {
        self.focused_frame = frame;
    }

    pub fn set_in_swipe_animation(&mut self, value: bool) {
        self.in_swipe_animation = value;
    }

    /// The document in `frame` changed its title.
    pub fn set_title(&mut self, frame: FrameId, title: &str) -> Result<()> {
        if let Some(document) = self.frame_mut(frame)?.document.as_mut() {
            document.title = title.to_string();
        }
        self.history(frame)?.set_current_item_title(title);
        Ok(())
    }

    /// Pause or resume loading in every frame. Resuming replays the last
    /// traversal that arrived while paused.
    pub fn set_defers_loading(&mut self, defer: bool) {
        for frame in self.frames.traverse(self.frames.main()) {
            History::new(self, frame).set_defers_loading(defer);
        }
    }

    // -- Frame tree -----------------------------------------------------------

    /// Create an empty subframe named `name` under `parent`.
    pub fn add_child_frame(&mut self, parent: FrameId, name: &str) -> Result<FrameId> {
        if !self.frames.contains(parent) {
            return Err(HistoryError::UnknownFrame(parent));
        }
        let frame = Frame::new(self.ids.next_frame_id(), name, self.ids.next_document_id());
        let id = frame.id();
        self.frames
            .append_child(parent, frame)
            .ok_or(HistoryError::UnknownFrame(parent))?;
        log::debug!("{parent}: added subframe {id} ({name})");
        Ok(id)
    }

    /// Remove `frame` and its descendants, cancelling their loads.
    pub fn remove_subframe(&mut self, frame: FrameId) -> Result<()> {
        if !self.frames.contains(frame) || self.frames.is_main_frame(frame) {
            return Err(HistoryError::UnknownFrame(frame));
        }
        self.stop_loading(frame);
        if self.focused_frame.is_some_and(|f| self.frames.traverse(frame).contains(&f)) {
            self.focused_frame = None;
        }
        let removed = self.frames.detach_subtree(frame);
        log::debug!("removed {} frames rooted at {frame}", removed.len());
        self.collect_garbage();
        self.check_load_complete();
        Ok(())
    }

    pub(crate) fn frame_mut(&mut self, frame: FrameId) -> Result<&mut Frame> {
        self.frames
            .get_mut(frame)
            .ok_or(HistoryError::UnknownFrame(frame))
    }

    // -- Back/forward list and item lifetime -----------------------------------

    /// Push `root` as the newest entry. Entries that fall off the list lose
    /// their cached page and, once unreferenced, their items.
    pub(crate) fn add_back_forward_item(&mut self, root: ItemId) {
        let removed = self.back_forward.add_item(root);
        for &item in &removed {
            self.cache.remove(item);
        }
        if !removed.is_empty() {
            self.collect_garbage();
        }
    }

    /// Release every item not reachable from the back/forward list, a
    /// controller slot, a requested item or the cache. Returns the number
    /// released.
    pub fn collect_garbage(&mut self) -> usize {
        let mut roots: Vec<ItemId> = self.back_forward.all_items().to_vec();
        for frame in self.frames.frames() {
            roots.extend(frame.history.referenced_items());
            roots.extend(frame.loader.requested_history_item);
        }
        roots.extend(self.cache.referenced_items());
        let live = self.items.reachable_from(roots);
        let released = self.items.retain(&live);
        if released > 0 {
            log::debug!("released {released} history items");
        }
        released
    }

    /// Mark frames whose loads have settled, children before parents, as
    /// load-complete.
    pub(crate) fn check_load_complete(&mut self) {
        let main = self.frames.main();
        for frame in self.frames.traverse_post_order(main) {
            let children_complete = self
                .frames
                .children(frame)
                .into_iter()
                .all(|child| {
                    self.frames
                        .get(child)
                        .is_some_and(|c| c.history.frame_load_complete())
                });
            let Some(live) = self.frames.get_mut(frame) else {
                continue;
            };
            let settled = live.loader.is_complete && live.loader.provisional_document_loader.is_none();
            if settled && children_complete && !live.history.frame_load_complete() {
                log::debug!("{frame}: load complete");
                live.history.update_for_frame_load_completed();
            }
        }
    }
}
