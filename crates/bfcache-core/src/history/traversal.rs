//! Back/forward traversal.
//!
//! A traversal walks the frame tree and the target item tree in parallel.
//! Frames whose current item is a clone of the target keep their document
//! and only receive a provisional item; the first frame on each branch
//! that differs is loaded, together with everything below it.

use bfcache_types::{FrameId, FrameLoadType, ItemId};

use super::{DeferredNavigation, History};
use crate::client::{PolicyContinuation, PolicyTicket, ProcessSwapDisposition, ShouldGoToHistoryItem};
use crate::page::Page;

/// What a traversal does with one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalDecision {
    /// The frame already shows the target's document; children are walked.
    Clone,
    /// The frame is loaded from the target item; children are not walked.
    Reload,
    /// Navigation API only: the frame navigates within its document and
    /// children are still walked.
    SameDocument,
}

/// One frame visited by a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalStep {
    pub frame: FrameId,
    pub target: ItemId,
    pub source: Option<ItemId>,
    pub decision: TraversalDecision,
}

impl TraversalStep {
    pub fn navigates(&self) -> bool {
        self.decision != TraversalDecision::Clone
    }
}

/// Walk `frame` against `target`, starting from the frame's current item
/// `source`. Steps are in preorder.
pub fn plan_traversal(
    page: &Page,
    frame: FrameId,
    target: ItemId,
    source: Option<ItemId>,
    for_navigation_api: bool,
) -> Vec<TraversalStep> {
    let mut steps = Vec::new();
    walk(page, frame, target, source, for_navigation_api, &mut steps);
    steps
}

fn walk(
    page: &Page,
    frame: FrameId,
    target: ItemId,
    source: Option<ItemId>,
    for_navigation_api: bool,
    steps: &mut Vec<TraversalStep>,
) {
    let items = &page.items;
    if items.items_are_clones(target, source) {
        steps.push(TraversalStep {
            frame,
            target,
            source,
            decision: TraversalDecision::Clone,
        });
    } else if for_navigation_api {
        if items.get(target).and_then(|t| t.frame_id).is_none() {
            return;
        }
        let same_document =
            source.is_some_and(|from| items.should_do_same_document_navigation_to(from, target));
        steps.push(TraversalStep {
            frame,
            target,
            source,
            decision: if same_document {
                TraversalDecision::SameDocument
            } else {
                TraversalDecision::Reload
            },
        });
        if !same_document {
            return;
        }
    } else {
        steps.push(TraversalStep {
            frame,
            target,
            source,
            decision: TraversalDecision::Reload,
        });
        return;
    }

    let Some(source) = source else { return };
    let children = items.get(target).map(|t| t.children().to_vec()).unwrap_or_default();
    for child in children {
        let Some(frame_id) = items.get(child).and_then(|c| c.frame_id) else {
            continue;
        };
        let Some(from_child) = items.child_item_with_frame_id(source, frame_id) else {
            continue;
        };
        match page.frames.descendant_by_frame_id(frame, frame_id) {
            Some(child_frame) => {
                walk(page, child_frame, child, Some(from_child), for_navigation_api, steps)
            }
            None if for_navigation_api => return,
            None => continue,
        }
    }
}

impl History<'_> {
    /// Traverse to `target`, a root item of the back/forward list.
    pub fn go_to_item(
        &mut self,
        target: ItemId,
        load_type: FrameLoadType,
        continuing_load: bool,
        disposition: ProcessSwapDisposition,
    ) {
        log::info!("{}: go to {target} ({load_type:?})", self.frame);
        let continuation = PolicyContinuation::GoToItem {
            load_type,
            continuing_load,
            in_swipe_animation: self.page.in_swipe_animation,
        };
        self.go_to_item_shared(target, continuation, disposition);
    }

    /// Traverse on behalf of `navigation.traverseTo()` and friends. Aborts
    /// reported by the client stop the remaining frame loads and reject
    /// the `finished` promise identified by `tracker`.
    pub fn go_to_item_for_navigation_api(
        &mut self,
        target: ItemId,
        load_type: FrameLoadType,
        triggering_frame: FrameId,
        tracker: Option<u64>,
    ) {
        log::info!("{}: navigation API traversal to {target}", self.frame);
        let continuation = PolicyContinuation::NavigationApi {
            load_type,
            triggering_frame,
            tracker,
            in_swipe_animation: self.page.in_swipe_animation,
        };
        self.go_to_item_shared(target, continuation, ProcessSwapDisposition::None);
    }

    fn go_to_item_shared(
        &mut self,
        target: ItemId,
        continuation: PolicyContinuation,
        disposition: ProcessSwapDisposition,
    ) {
        let frame = self.frame;
        if !self.page.items.contains(target) {
            log::warn!("{frame}: traversal target {target} no longer exists");
            return;
        }
        let current = self.current_item();
        let Some(controller) = self.controller_mut() else {
            return;
        };
        let generation = controller.begin_policy_check(target);
        let ticket = PolicyTicket {
            frame,
            target,
            generation,
            continuation,
        };

        let page = &mut *self.page;
        let same_document = current
            .is_some_and(|cur| page.items.should_do_same_document_navigation_to(target, cur));
        let Some(item) = page.items.get(target) else {
            return;
        };

        if same_document
            || !page.client.supports_async_should_go_to_history_item()
            || disposition == ProcessSwapDisposition::Coop
        {
            let decision = page
                .client
                .should_go_to_history_item(item, same_document, disposition);
            self.finish_policy_check(ticket, decision);
        } else {
            log::debug!("{frame}: waiting on async policy for {target}");
            page.client.should_go_to_history_item_async(item, ticket);
        }
    }

    /// Resume a traversal once its policy decision is known.
    pub(crate) fn finish_policy_check(
        &mut self,
        ticket: PolicyTicket,
        decision: ShouldGoToHistoryItem,
    ) {
        let frame = self.frame;
        let target = ticket.target;
        let Some(controller) = self.controller_mut() else {
            return;
        };
        if !controller.policy_check_is_current(target, ticket.generation) {
            log::debug!("{frame}: dropping stale policy decision for {target}");
            return;
        }
        controller.clear_policy_item();

        match ticket.continuation {
            PolicyContinuation::GoToItem {
                load_type,
                continuing_load,
                in_swipe_animation,
            } => {
                if decision != ShouldGoToHistoryItem::Yes {
                    log::debug!("{frame}: traversal to {target} refused");
                    return;
                }
                if controller.defers_loading {
                    controller.deferred = Some(DeferredNavigation {
                        item: target,
                        load_type,
                    });
                    return;
                }
                self.page.in_swipe_animation = in_swipe_animation;
                let current = self.move_back_forward_cursor(target);
                self.recursive_set_provisional_item(target, current, false);
                self.recursive_go_to_item(target, current, load_type, continuing_load);
            }
            PolicyContinuation::NavigationApi {
                load_type,
                triggering_frame,
                tracker,
                in_swipe_animation,
            } => {
                if decision == ShouldGoToHistoryItem::No {
                    return;
                }
                let page = &*self.page;
                let frames_to_navigate: Vec<TraversalStep> = page
                    .items
                    .get(target)
                    .and_then(|t| t.frame_id)
                    .and_then(|fid| page.back_forward.current_item_for_frame(&page.items, fid))
                    .map(|from| plan_traversal(page, frame, target, Some(from), true))
                    .unwrap_or_default()
                    .into_iter()
                    .filter(TraversalStep::navigates)
                    .collect();

                self.page.in_swipe_animation = in_swipe_animation;
                let current = self.move_back_forward_cursor(target);
                self.recursive_set_provisional_item(target, current, true);

                for step in frames_to_navigate {
                    self.page
                        .load_item(step.frame, step.target, step.source, load_type, false);
                    if self.page.client.navigation_was_aborted(step.frame) {
                        log::info!("{}: navigation aborted by script", step.frame);
                        self.page
                            .client
                            .reject_finished_promise(triggering_frame, tracker);
                        break;
                    }
                }
            }
        }
    }

    /// Point the back/forward list at `target` before anything commits.
    /// Returns this frame's item in the entry being left.
    fn move_back_forward_cursor(&mut self, target: ItemId) -> Option<ItemId> {
        let page = &mut *self.page;
        let current = page
            .back_forward
            .current_item_for_frame(&page.items, self.frame);
        page.back_forward.set_current_item(&page.items, target);
        current
    }

    /// Give every frame that keeps its document the item it will commit.
    pub(crate) fn recursive_set_provisional_item(
        &mut self,
        item: ItemId,
        from: Option<ItemId>,
        for_navigation_api: bool,
    ) {
        let items = &self.page.items;
        if !items.items_are_clones(item, from) {
            let same_document = for_navigation_api
                && from.is_some_and(|from| items.should_do_same_document_navigation_to(from, item));
            if !same_document {
                return;
            }
        } else if let Some(controller) = self.controller_mut() {
            controller.set_provisional_item(Some(item));
        }

        let Some(from) = from else { return };
        for (child_item, from_child, child_frame) in self.matched_children(item, from) {
            self.at(child_frame)
                .recursive_set_provisional_item(child_item, Some(from_child), false);
        }
    }

    /// Load the first non-clone frame on every branch.
    pub(crate) fn recursive_go_to_item(
        &mut self,
        item: ItemId,
        from: Option<ItemId>,
        load_type: FrameLoadType,
        continuing_load: bool,
    ) {
        let steps = plan_traversal(self.page, self.frame, item, from, false);
        for step in steps.into_iter().filter(TraversalStep::navigates) {
            self.page
                .load_item(step.frame, step.target, step.source, load_type, continuing_load);
        }
    }

    /// Children of `item` paired with their counterpart under `from` and
    /// the live frame they belong to.
    fn matched_children(&self, item: ItemId, from: ItemId) -> Vec<(ItemId, ItemId, FrameId)> {
        let items = &self.page.items;
        let children = items.get(item).map(|i| i.children().to_vec()).unwrap_or_default();
        children
            .into_iter()
            .filter_map(|child| {
                let frame_id = items.get(child)?.frame_id?;
                let from_child = items.child_item_with_frame_id(from, frame_id)?;
                let frame = self.page.frames.descendant_by_frame_id(self.frame, frame_id)?;
                Some((child, from_child, frame))
            })
            .collect()
    }

    /// Defer traversals while the page is paused; resuming replays the
    /// last one that arrived.
    pub fn set_defers_loading(&mut self, defer: bool) {
        let Some(controller) = self.controller_mut() else {
            return;
        };
        controller.defers_loading = defer;
        if defer {
            return;
        }
        if let Some(deferred) = controller.deferred.take() {
            log::debug!("{}: replaying deferred traversal to {}", self.frame, deferred.item);
            self.go_to_item(
                deferred.item,
                deferred.load_type,
                false,
                ProcessSwapDisposition::None,
            );
        }
    }

    /// Whether traversing to `target` must stop the loads in flight: only
    /// when it leaves the current document.
    pub fn should_stop_loading_for_history_item(&self, target: ItemId) -> bool {
        let items = &self.page.items;
        let Some(current) = self.current_item().and_then(|id| items.get(id)) else {
            return false;
        };
        items
            .get(target)
            .is_none_or(|t| t.document_sequence_number != current.document_sequence_number)
    }
}

impl Page {
    /// Deliver an asynchronous policy decision. Stale tickets are ignored.
    pub fn complete_policy_check(&mut self, ticket: PolicyTicket, decision: ShouldGoToHistoryItem) {
        let frame = ticket.frame;
        if !self.frames.contains(frame) {
            log::debug!("policy decision for detached {frame} ignored");
            return;
        }
        History::new(self, frame).finish_policy_check(ticket, decision);
    }
}
