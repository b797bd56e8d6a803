//! History updates applied when a load commits.
//!
//! The loader calls exactly one `update_for_*` per commit, chosen by the
//! load type, after [`History::update_for_commit`] has promoted any
//! provisional item.

use bfcache_types::FrameLoadType;

use super::History;
use super::items::HistoryUpdateType;
use crate::frame::DocumentLoader;
use crate::item::ScrollPosition;

impl History<'_> {
    fn document_loader(&self) -> Option<&DocumentLoader> {
        self.live_frame()?.loader.document_loader.as_ref()
    }

    fn document_loader_mut(&mut self) -> Option<&mut DocumentLoader> {
        self.live_frame_mut()?.loader.document_loader.as_mut()
    }

    pub(super) fn add_visited_link(&mut self, url: &str) {
        if !url.is_empty() {
            self.page.visited_links.insert(url.to_string());
        }
    }

    /// Promote the provisional item for traversals, and tell frames that
    /// kept their document to commit theirs as well.
    pub fn update_for_commit(&mut self) {
        let frame = self.frame;
        let load_type = self.load_type();
        let provisional = self.provisional_item();
        let committing_error_page = self
            .document_loader()
            .is_some_and(|l| l.unreachable_url.is_some());

        let commits_provisional = load_type.is_back_forward()
            || (load_type == FrameLoadType::Replace && provisional.is_some())
            || (matches!(load_type, FrameLoadType::Reload | FrameLoadType::ReloadFromOrigin)
                && provisional.is_some()
                && committing_error_page);
        if !commits_provisional {
            return;
        }

        debug_assert!(provisional.is_some(), "{frame}: commit without a provisional item");
        match provisional {
            Some(item) => {
                if let Some(controller) = self.controller_mut() {
                    controller.set_current_item(item);
                    controller.set_provisional_item(None);
                }
            }
            None => log::warn!("{frame}: committed a {load_type:?} load without a provisional item"),
        }

        let main = self.page.frames.main();
        let main_complete = self
            .page
            .frames
            .get(main)
            .is_some_and(|f| f.history.frame_load_complete());
        if main_complete {
            self.at(main).recursive_update_for_commit();
        }
    }

    /// Commit provisional items in frames that did not reload. The frame
    /// that navigated has no provisional item left, which prunes it and
    /// its subtree.
    pub(crate) fn recursive_update_for_commit(&mut self) {
        let Some(controller) = self.controller() else {
            return;
        };
        let Some(provisional) = controller.provisional_item() else {
            return;
        };
        let current = controller.current_item();
        let load_complete = controller.frame_load_complete();

        if let Some(current) = current.filter(|&c| {
            self.page.items.items_are_clones(c, Some(provisional))
        }) {
            debug_assert!(load_complete);
            self.save_document_state();
            self.save_scroll_position_and_view_state_to_item(Some(current));
            if let Some(frame) = self.live_frame_mut() {
                frame.view.was_scrolled_by_user = false;
                frame.history.set_current_item(provisional);
                frame.history.set_provisional_item(None);
            }
            self.restore_document_state();
            self.restore_scroll_position_and_view_state();
        }

        for child in self.page.frames.children(self.frame) {
            self.at(child).recursive_update_for_commit();
        }
    }

    pub fn update_for_back_forward_navigation(&mut self) {
        log::debug!("{}: history update for back/forward navigation", self.frame);
        let loading_previous = self
            .controller()
            .filter(|c| !c.frame_load_complete())
            .map(|c| c.previous_item());
        if let Some(previous) = loading_previous {
            self.save_scroll_position_and_view_state_to_item(previous);
        }
        self.update_current_item();
    }

    pub fn update_for_reload(&mut self) {
        log::debug!("{}: history update for reload", self.frame);
        if let Some(current) = self.current_item() {
            self.page.cache.remove(current);
            if self.load_type().saves_scroll_on_reload() {
                self.save_scroll_position_and_view_state_to_item(Some(current));
            }
            // The tree is rebuilt as subframes load again.
            self.page.items.clear_children(current);
        }
        self.update_current_item();
    }

    pub fn update_for_standard_load(&mut self, update_type: HistoryUpdateType) {
        log::debug!("{}: history update for standard load", self.frame);
        let can_record = self.can_record_history();
        let Some(loader) = self.document_loader().cloned() else {
            log::warn!("{}: standard load committed without a document loader", self.frame);
            return;
        };
        let history_url = loader.url_for_history().to_string();

        if !loader.is_client_redirect {
            if !history_url.is_empty() {
                if update_type != HistoryUpdateType::UpdateAllExceptBackForwardList {
                    self.update_back_forward_list_clipped_at_target(true);
                }
                if can_record {
                    self.page.client.update_global_history(&history_url);
                    if let Some(loader) = self.document_loader_mut() {
                        loader.did_create_global_history_entry = true;
                    }
                    if loader.unreachable_url.is_none() {
                        self.page.client.update_global_history_redirect_links(self.frame);
                    }
                }
            }
        } else {
            self.update_current_item();
        }

        if !history_url.is_empty() && can_record {
            self.add_visited_link(&history_url);
            let created_entry = self
                .document_loader()
                .is_some_and(|l| l.did_create_global_history_entry);
            let has_document_url = self
                .live_frame()
                .and_then(|f| f.document_url())
                .is_some_and(|url| !url.is_empty());
            if !created_entry && loader.unreachable_url.is_none() && has_document_url {
                self.page.client.update_global_history_redirect_links(self.frame);
            }
        }
    }

    /// A load that must not add an entry. Client redirects rewrite the
    /// current item; subframe loads attach a new child to the parent's
    /// current item.
    pub fn update_for_redirect_with_locked_back_forward_list(&mut self) {
        log::debug!("{}: history update for locked redirect", self.frame);
        let can_record = self.can_record_history();
        let loader = self.document_loader().cloned();
        let history_url = loader
            .as_ref()
            .map(|l| l.url_for_history().to_string())
            .unwrap_or_default();

        match &loader {
            Some(loader) if loader.is_client_redirect => {
                if self.current_item().is_none() && self.is_main_frame() && !history_url.is_empty() {
                    self.update_back_forward_list_clipped_at_target(true);
                    if can_record {
                        self.page.client.update_global_history(&history_url);
                        if let Some(loader) = self.document_loader_mut() {
                            loader.did_create_global_history_entry = true;
                        }
                        if loader.unreachable_url.is_none() {
                            self.page.client.update_global_history_redirect_links(self.frame);
                        }
                    }
                }
                self.update_current_item();
            }
            _ => {
                let parent_item = self
                    .page
                    .frames
                    .parent(self.frame)
                    .and_then(|parent| self.page.frames.get(parent))
                    .and_then(|parent| parent.history.current_item());
                if let Some(parent_item) = parent_item {
                    let item = self.create_item();
                    let page = &mut *self.page;
                    page.back_forward.set_child_item(&mut page.items, parent_item, item);
                }
            }
        }

        if !history_url.is_empty() && can_record {
            self.add_visited_link(&history_url);
            let created_entry = self
                .document_loader()
                .is_some_and(|l| l.did_create_global_history_entry);
            let reachable = loader.as_ref().is_some_and(|l| l.unreachable_url.is_none());
            if !created_entry && reachable {
                self.page.client.update_global_history_redirect_links(self.frame);
            }
        }
    }

    /// The current document is about to be replaced by a client redirect;
    /// its saved state must not be restored into the next page.
    pub fn update_for_client_redirect(&mut self) {
        log::debug!("{}: history update for client redirect", self.frame);
        if let Some(item) = self.current_item().and_then(|id| self.page.items.get_mut(id)) {
            item.document_state.clear();
            item.scroll_position = ScrollPosition::ORIGIN;
        }

        let can_record = self.can_record_history();
        let history_url = self
            .document_loader()
            .map(|l| l.url_for_history().to_string())
            .unwrap_or_default();
        if !history_url.is_empty() && can_record {
            self.add_visited_link(&history_url);
        }
    }

    /// Fragment navigation, pushState and popstate within one document.
    pub fn update_for_same_document_navigation(&mut self) {
        let Some(document_url) = self
            .live_frame()
            .and_then(|f| f.document_url())
            .filter(|url| !url.is_empty())
            .map(str::to_string)
        else {
            return;
        };

        self.clear_policy_item();
        let can_record = self.can_record_history();
        if can_record {
            self.add_visited_link(&document_url);
        }

        let main = self.page.frames.main();
        self.at(main).recursive_update_for_same_document_navigation();

        if let Some(item) = self.current_item().and_then(|id| self.page.items.get_mut(id)) {
            item.url = document_url.clone();
            if can_record {
                self.page.client.update_global_history(&document_url);
            }
        }
    }

    fn recursive_update_for_same_document_navigation(&mut self) {
        let Some(controller) = self.controller() else {
            return;
        };
        let Some(provisional) = controller.provisional_item() else {
            return;
        };
        if let Some(current) = controller.current_item() {
            if !self
                .page
                .items
                .should_do_same_document_navigation_to(current, provisional)
            {
                return;
            }
        }
        if let Some(controller) = self.controller_mut() {
            controller.set_current_item(provisional);
            controller.set_provisional_item(None);
        }

        for child in self.page.frames.children(self.frame) {
            self.at(child).recursive_update_for_same_document_navigation();
        }
    }
}
