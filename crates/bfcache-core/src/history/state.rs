//! Form state and scroll position persistence.

use bfcache_types::{FrameLoadType, ItemId};

use super::History;

impl History<'_> {
    /// Save the document's form state into the item it was loaded from:
    /// the previous item while a new load is underway, the current item
    /// otherwise.
    pub fn save_document_state(&mut self) {
        let Some(frame) = self.live_frame() else {
            return;
        };
        if frame.loader.creating_initial_empty_document {
            return;
        }
        let history = &frame.history;
        let target = if history.frame_load_complete() {
            history.current_item()
        } else {
            history.previous_item()
        };
        let Some(target) = target else { return };
        let Some(document) = frame.document.as_ref() else {
            return;
        };
        if !document.has_living_render_tree {
            return;
        }
        let form_state = document.form_state.clone();
        let document_url = document.url.clone();

        if let Some(item) = self.page.items.get_mut(target) {
            if item.is_current_document(&document_url) {
                log::trace!("{}: saving form state to {target}", self.frame);
                item.document_state = form_state;
            }
        }
    }

    /// Save form state and scroll position of this frame and every
    /// descendant into their current items.
    pub fn save_document_and_scroll_state(&mut self) {
        for frame in self.page.frames.traverse(self.frame) {
            let mut history = self.at(frame);
            history.save_document_state();
            let current = history.current_item();
            history.save_scroll_position_and_view_state_to_item(current);
        }
    }

    /// Hand the current item's saved form state to the new document.
    pub fn restore_document_state(&mut self) {
        match self.load_type() {
            FrameLoadType::Reload
            | FrameLoadType::ReloadFromOrigin
            | FrameLoadType::ReloadExpiredOnly
            | FrameLoadType::Same
            | FrameLoadType::Replace => return,
            FrameLoadType::Back
            | FrameLoadType::Forward
            | FrameLoadType::IndexedBackForward
            | FrameLoadType::RedirectWithLockedBackForwardList
            | FrameLoadType::Standard => {}
        }

        let Some(current) = self.current_item() else {
            return;
        };
        let Some(frame) = self.live_frame() else {
            return;
        };
        if frame.loader.requested_history_item != Some(current) {
            return;
        }
        if frame
            .loader
            .document_loader
            .as_ref()
            .is_some_and(|l| l.is_client_redirect)
        {
            return;
        }
        let Some(state) = self.page.items.get(current).map(|i| i.document_state.clone()) else {
            return;
        };
        if let Some(document) = self.live_frame_mut().and_then(|f| f.document.as_mut()) {
            log::trace!("restoring form state from {current}");
            document.pending_form_state = state;
        }
    }

    /// Record the frame's scroll offset, and for the main frame the page
    /// scale, into `item`.
    pub fn save_scroll_position_and_view_state_to_item(&mut self, item: Option<ItemId>) {
        let Some(item) = item else { return };
        let Some(frame) = self.live_frame() else {
            return;
        };
        let in_cache = frame.document.as_ref().is_none_or(|d| d.in_back_forward_cache());
        let position = if in_cache {
            frame.view.cached_scroll_position
        } else {
            frame.view.scroll_position
        };
        let scale = self
            .is_main_frame()
            .then(|| self.page.page_scale_factor / self.page.view_scale_factor);

        let page = &mut *self.page;
        let Some(entry) = page.items.get_mut(item) else {
            return;
        };
        entry.scroll_position = position;
        if let Some(scale) = scale {
            entry.page_scale_factor = scale;
        }
        page.client.save_view_state_to_item(entry);
    }

    /// Scroll the view back to where the current item was left, unless the
    /// user has scrolled since the load began.
    pub fn restore_scroll_position_and_view_state(&mut self) {
        let Some(current) = self.current_item() else {
            return;
        };
        let committed = self
            .live_frame()
            .is_some_and(|f| f.loader.committed_first_real_document_load);
        if !committed {
            return;
        }

        self.page.client.restore_view_state(self.frame);

        let Some(frame) = self.live_frame() else {
            return;
        };
        if frame.view.was_scrolled_by_user {
            return;
        }
        let Some(item) = self.page.items.get(current) else {
            return;
        };
        let desired = if item.should_restore_scroll_position {
            item.scroll_position
        } else {
            frame.view.scroll_position
        };
        let item_scale = item.page_scale_factor;
        let is_main = self.is_main_frame();

        if is_main && item_scale != 0.0 {
            self.page.page_scale_factor = item_scale * self.page.view_scale_factor;
        }
        if let Some(frame) = self.live_frame_mut() {
            frame.view.scroll_position = desired.clamped();
        }
        if is_main && desired == desired.clamped() {
            self.page.client.did_restore_scroll_position(self.frame);
        }
    }

    /// Drop the cached page stored under the current item, if it is still
    /// this frame's document.
    pub fn invalidate_current_item_cached_page(&mut self) {
        let Some(current) = self.current_item() else {
            return;
        };
        let Some(mut cached) = self.page.cache.take(current) else {
            return;
        };
        let live_document = self
            .live_frame()
            .and_then(|f| f.document.as_ref())
            .map(|d| d.id);
        if cached.document_id().is_some() && cached.document_id() == live_document {
            if let Some(document) = self.live_frame_mut().and_then(|f| f.document.as_mut()) {
                document.back_forward_cache_state = Default::default();
            }
            if let Err(err) = cached.clear() {
                log::error!("{}: invalidating cached page: {err}", self.frame);
            }
        } else {
            log::debug!("{}: dropped stale cached page for {current}", self.frame);
        }
    }
}
