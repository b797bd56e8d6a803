//! Per-frame history controller.
//!
//! Each frame owns a [`HistoryController`] holding four item slots:
//!
//! - `current`: the item of the committed document.
//! - `previous`: the item that was current before the last commit. Only
//!   meaningful until the frame finishes loading.
//! - `provisional`: the item a traversal is about to commit.
//! - `policy`: the item awaiting a policy decision.
//!
//! Operations that need the rest of the page (the item arena, the frame
//! tree, the back/forward list, the client) go through a [`History`]
//! handle, which pairs a mutable borrow of the [`Page`] with the frame it
//! acts on. Recursion into subframes reborrows the page for each child.

mod commit;
mod items;
mod state;
mod traversal;

use bfcache_types::{FrameId, FrameLoadType, ItemId};

use crate::frame::{ABOUT_BLANK, Frame};
use crate::item::ItemArena;
use crate::page::Page;

pub use items::HistoryUpdateType;
pub use traversal::{TraversalDecision, TraversalStep, plan_traversal};

/// Observable lifecycle of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    NoPendingNavigation,
    PolicyPending,
    ProvisionalSet,
    Committed,
    LoadComplete,
}

/// A traversal parked while loading is deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredNavigation {
    pub item: ItemId,
    pub load_type: FrameLoadType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryController {
    current_item: Option<ItemId>,
    previous_item: Option<ItemId>,
    provisional_item: Option<ItemId>,
    policy_item: Option<ItemId>,
    policy_generation: u64,
    deferred: Option<DeferredNavigation>,
    frame_load_complete: bool,
    defers_loading: bool,
}

impl Default for HistoryController {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryController {
    pub fn new() -> Self {
        Self {
            current_item: None,
            previous_item: None,
            provisional_item: None,
            policy_item: None,
            policy_generation: 0,
            deferred: None,
            frame_load_complete: true,
            defers_loading: false,
        }
    }

    pub fn current_item(&self) -> Option<ItemId> {
        self.current_item
    }

    pub fn previous_item(&self) -> Option<ItemId> {
        self.previous_item
    }

    pub fn provisional_item(&self) -> Option<ItemId> {
        self.provisional_item
    }

    pub fn policy_item(&self) -> Option<ItemId> {
        self.policy_item
    }

    pub fn deferred_navigation(&self) -> Option<DeferredNavigation> {
        self.deferred
    }

    pub fn frame_load_complete(&self) -> bool {
        self.frame_load_complete
    }

    pub fn defers_loading(&self) -> bool {
        self.defers_loading
    }

    pub fn state(&self) -> ControllerState {
        if self.policy_item.is_some() {
            ControllerState::PolicyPending
        } else if self.provisional_item.is_some() {
            ControllerState::ProvisionalSet
        } else if !self.frame_load_complete {
            ControllerState::Committed
        } else if self.current_item.is_some() {
            ControllerState::LoadComplete
        } else {
            ControllerState::NoPendingNavigation
        }
    }

    /// Commit `item`. The old current item becomes the previous item and
    /// the frame is considered loading until told otherwise.
    pub fn set_current_item(&mut self, item: ItemId) {
        self.frame_load_complete = false;
        self.previous_item = self.current_item;
        self.current_item = Some(item);
    }

    pub fn set_provisional_item(&mut self, item: Option<ItemId>) {
        self.provisional_item = item;
    }

    pub fn clear_policy_item(&mut self) {
        self.policy_item = None;
    }

    pub fn update_for_frame_load_completed(&mut self) {
        self.frame_load_complete = true;
    }

    pub fn clear_previous_item(&mut self) {
        self.previous_item = None;
    }

    /// Swap in `item` without touching the back/forward list. A pending
    /// provisional item is replaced instead of the current one.
    pub fn replace_current_item(&mut self, item: ItemId) {
        self.previous_item = None;
        if self.provisional_item.is_some() {
            self.provisional_item = Some(item);
        } else {
            self.current_item = Some(item);
        }
    }

    /// True while the frame shows the initial `about:blank` item that the
    /// next load should overwrite instead of pushing a new entry.
    pub fn current_item_should_be_replaced(&self, items: &ItemArena) -> bool {
        if self.previous_item.is_some() {
            return false;
        }
        self.current_item
            .and_then(|id| items.get(id))
            .is_some_and(|item| item.url.eq_ignore_ascii_case(ABOUT_BLANK))
    }

    /// Every item this controller keeps alive.
    pub fn referenced_items(&self) -> impl Iterator<Item = ItemId> + '_ {
        [
            self.current_item,
            self.previous_item,
            self.provisional_item,
            self.policy_item,
            self.deferred.map(|d| d.item),
        ]
        .into_iter()
        .flatten()
    }

    /// Start a policy check for `item`, superseding any earlier one.
    fn begin_policy_check(&mut self, item: ItemId) -> u64 {
        self.policy_item = Some(item);
        self.policy_generation += 1;
        self.policy_generation
    }

    fn policy_check_is_current(&self, item: ItemId, generation: u64) -> bool {
        self.policy_item == Some(item) && self.policy_generation == generation
    }
}

/// A frame's history controller together with the page it lives in.
pub struct History<'a> {
    page: &'a mut Page,
    frame: FrameId,
}

impl<'a> History<'a> {
    pub(crate) fn new(page: &'a mut Page, frame: FrameId) -> Self {
        Self { page, frame }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame
    }

    pub fn controller(&self) -> Option<&HistoryController> {
        self.page.frames.get(self.frame).map(|f| &f.history)
    }

    fn controller_mut(&mut self) -> Option<&mut HistoryController> {
        self.page.frames.get_mut(self.frame).map(|f| &mut f.history)
    }

    fn live_frame(&self) -> Option<&Frame> {
        self.page.frames.get(self.frame)
    }

    fn live_frame_mut(&mut self) -> Option<&mut Frame> {
        self.page.frames.get_mut(self.frame)
    }

    /// The same page, acting on another frame.
    fn at(&mut self, frame: FrameId) -> History<'_> {
        History {
            page: &mut *self.page,
            frame,
        }
    }

    fn is_main_frame(&self) -> bool {
        self.page.frames.is_main_frame(self.frame)
    }

    pub fn current_item(&self) -> Option<ItemId> {
        self.controller().and_then(|c| c.current_item)
    }

    pub fn previous_item(&self) -> Option<ItemId> {
        self.controller().and_then(|c| c.previous_item)
    }

    pub fn provisional_item(&self) -> Option<ItemId> {
        self.controller().and_then(|c| c.provisional_item)
    }

    fn load_type(&self) -> FrameLoadType {
        self.live_frame()
            .map_or(FrameLoadType::Standard, |f| f.loader.load_type)
    }

    pub fn set_current_item(&mut self, item: ItemId) {
        if let Some(controller) = self.controller_mut() {
            controller.set_current_item(item);
        }
    }

    pub fn set_provisional_item(&mut self, item: Option<ItemId>) {
        if let Some(controller) = self.controller_mut() {
            controller.set_provisional_item(item);
        }
    }

    pub fn clear_policy_item(&mut self) {
        if let Some(controller) = self.controller_mut() {
            controller.clear_policy_item();
        }
    }

    pub fn update_for_frame_load_completed(&mut self) {
        if let Some(controller) = self.controller_mut() {
            controller.update_for_frame_load_completed();
        }
    }

    /// Forget the previous item here and in every descendant frame.
    pub fn clear_previous_item(&mut self) {
        if let Some(controller) = self.controller_mut() {
            controller.clear_previous_item();
        }
        for child in self.page.frames.children(self.frame) {
            self.at(child).clear_previous_item();
        }
    }

    pub fn replace_current_item(&mut self, item: Option<ItemId>) {
        let Some(item) = item else { return };
        if let Some(controller) = self.controller_mut() {
            controller.replace_current_item(item);
        }
    }

    pub fn current_item_should_be_replaced(&self) -> bool {
        self.controller()
            .is_some_and(|c| c.current_item_should_be_replaced(&self.page.items))
    }

    /// Title of the committed document changed.
    pub fn set_current_item_title(&mut self, title: &str) {
        if let Some(item) = self.current_item().and_then(|id| self.page.items.get_mut(id)) {
            item.title = title.to_string();
        }
    }

    /// Whether global history and visited links may record this frame.
    fn can_record_history(&self) -> bool {
        let config = &self.page.config;
        !config.uses_ephemeral_session
            || config.allow_privacy_sensitive_operations_in_ephemeral_session
    }
}
