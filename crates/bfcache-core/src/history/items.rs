//! Item creation, item trees and the DOM history API.

use bfcache_types::{FrameId, ItemId};

use super::History;
use crate::client::NavigationNavigationType;
use crate::frame::{ABOUT_BLANK, DocumentLoader};
use crate::item::same_origin;

/// Whether a standard load adds a back/forward entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryUpdateType {
    UpdateAll,
    /// Used when a back/forward load commits before any real document:
    /// the item tree is built but no entry is pushed.
    UpdateAllExceptBackForwardList,
}

impl History<'_> {
    /// Fill `item` from a committed load.
    fn initialize_item(&mut self, item: ItemId, loader: &DocumentLoader) {
        let (mut url, mut original_url) = match &loader.unreachable_url {
            Some(unreachable) => (unreachable.clone(), unreachable.clone()),
            None => (loader.url.clone(), loader.original_url.clone()),
        };
        if url.is_empty() {
            url = ABOUT_BLANK.to_string();
        }
        if original_url.is_empty() {
            original_url = ABOUT_BLANK.to_string();
        }
        let target = self.live_frame().map(|f| f.name.clone()).unwrap_or_default();
        let frame_id = self.frame;

        let Some(item) = self.page.items.get_mut(item) else {
            return;
        };
        item.url = url;
        item.target = target;
        item.frame_id = Some(frame_id);
        item.title = loader.title.clone();
        item.original_url = original_url;
        if loader.unreachable_url.is_some() || loader.http_status >= 400 {
            item.last_visit_was_failure = true;
        }
        item.form_data = loader.form_data.clone();
    }

    /// New item for this frame's committed document. It becomes the
    /// current item.
    pub fn create_item(&mut self) -> ItemId {
        let page = &mut *self.page;
        let item = page.items.create(&page.ids);
        let loader = self
            .live_frame()
            .and_then(|f| f.loader.document_loader.clone())
            .unwrap_or_else(|| DocumentLoader::new(ABOUT_BLANK));
        self.initialize_item(item, &loader);
        self.set_current_item(item);
        item
    }

    /// Snapshot this frame and its descendants as an item tree.
    ///
    /// Frames other than `target_frame` become clones of their previous
    /// item. With `clip_at_target`, the target's children are left out;
    /// they attach themselves as they load.
    pub fn create_item_tree(&mut self, target_frame: FrameId, clip_at_target: bool) -> ItemId {
        let item = self.create_item();
        let (load_complete, previous) = self
            .controller()
            .map_or((true, None), |c| (c.frame_load_complete(), c.previous_item()));
        if !load_complete {
            self.save_scroll_position_and_view_state_to_item(previous);
        }

        let is_target = self.frame == target_frame;
        if !clip_at_target || !is_target {
            self.save_document_state();

            let sequence = previous
                .and_then(|p| self.page.items.get(p))
                .map(|p| (p.item_sequence_number, p.document_sequence_number));
            if let (Some((item_seq, doc_seq)), Some(new)) = (sequence, self.page.items.get_mut(item)) {
                if !is_target {
                    new.item_sequence_number = item_seq;
                }
                new.document_sequence_number = doc_seq;
            }

            for child in self.page.frames.children(self.frame) {
                let child_item = self.at(child).create_item_tree(target_frame, clip_at_target);
                self.page.items.add_child(item, child_item);
            }
        }

        if is_target {
            if let Some(new) = self.page.items.get_mut(item) {
                new.is_target_item = true;
            }
        }
        item
    }

    /// Push a new entry built from the whole frame tree, with this frame
    /// as the navigation target.
    pub fn update_back_forward_list_clipped_at_target(&mut self, clip: bool) {
        let has_history_url = self
            .live_frame()
            .and_then(|f| f.loader.document_loader.as_ref())
            .is_some_and(|l| !l.url_for_history().is_empty());
        if !has_history_url {
            return;
        }
        let target = self.frame;
        let main = self.page.frames.main();
        let root = self.at(main).create_item_tree(target, clip);
        log::debug!("{target}: adding back/forward entry {root}");
        self.page.add_back_forward_item(root);
    }

    pub fn update_back_forward_list_for_fragment_scroll(&mut self) {
        self.update_back_forward_list_clipped_at_target(false);
    }

    /// Bring the current item in line with the committed document. A URL
    /// change (redirect, cookies) re-initializes the item.
    pub fn update_current_item(&mut self) {
        let Some(current) = self.current_item() else {
            return;
        };
        let Some(loader) = self
            .live_frame()
            .and_then(|f| f.loader.document_loader.clone())
            .filter(|l| l.unreachable_url.is_none())
        else {
            return;
        };
        let Some(item) = self.page.items.get_mut(current) else {
            return;
        };

        if item.url != loader.url {
            let is_target = item.is_target_item;
            let navigation_key = item.navigation_key;
            let keep_key = same_origin(&item.url, &loader.url);
            self.page.items.reset(current, &self.page.ids);
            self.initialize_item(current, &loader);
            if let Some(item) = self.page.items.get_mut(current) {
                if keep_key {
                    item.navigation_key = navigation_key;
                }
                item.is_target_item = is_target;
            }
        } else {
            item.form_data = loader.form_data.clone();
        }
    }

    /// `history.pushState()`: a new entry for the current document.
    pub fn push_state(&mut self, state: Option<serde_json::Value>, url: &str) {
        let Some(current) = self.current_item() else {
            return;
        };
        let url = self.adopt_same_document_url(url);
        let should_restore_scroll = self
            .page
            .items
            .get(current)
            .is_none_or(|item| item.should_restore_scroll_position);

        let main = self.page.frames.main();
        let frame = self.frame;
        let top = self.at(main).create_item_tree(frame, false);

        let user_initiated = self
            .live_frame()
            .and_then(|f| f.document.as_ref())
            .is_some_and(|d| d.has_recent_user_interaction);
        if !user_initiated {
            if let Some(top) = self.page.items.get_mut(top) {
                top.was_created_by_js_without_user_interaction = true;
            }
        }

        let Some(current) = self.current_item() else {
            return;
        };
        if let Some(item) = self.page.items.get_mut(current) {
            item.state_object = state;
            item.url = url.clone();
            item.should_restore_scroll_position = should_restore_scroll;
        }
        log::debug!("{frame}: pushState added {top}, current item {current} now {url}");
        self.page.add_back_forward_item(top);

        if !self.can_record_history() {
            return;
        }
        self.add_visited_link(&url);
        self.page.client.update_global_history(&url);
        self.notify_navigation_api(current, NavigationNavigationType::Push);
    }

    /// `history.replaceState()`: rewrite the current entry in place.
    pub fn replace_state(&mut self, state: Option<serde_json::Value>, url: &str) {
        let Some(current) = self.current_item() else {
            return;
        };
        let url = self.adopt_same_document_url(url);
        let Some(item) = self.page.items.get_mut(current) else {
            return;
        };
        if !url.is_empty() {
            item.url = url.clone();
        }
        item.state_object = state;
        item.form_data = None;
        log::debug!("{}: replaceState set {current} to {}", self.frame, item.url);

        if !self.can_record_history() {
            return;
        }
        self.add_visited_link(&url);
        self.page.client.update_global_history(&url);
        if self.page.config.navigation_api_enabled {
            if let Some(item) = self.page.items.get_mut(current) {
                item.navigation_api_state_object = None;
            }
        }
        self.notify_navigation_api(current, NavigationNavigationType::Replace);
    }

    /// Point the document and its loader at `url` ahead of a state-object
    /// navigation. An empty `url` keeps the document's URL. Returns the
    /// URL the entry should record.
    fn adopt_same_document_url(&mut self, url: &str) -> String {
        if url.is_empty() {
            return self
                .live_frame()
                .and_then(|f| f.document_url())
                .unwrap_or_default()
                .to_string();
        }
        if let Some(frame) = self.live_frame_mut() {
            if let Some(document) = frame.document.as_mut() {
                document.url = url.to_string();
            }
            if let Some(loader) = frame.loader.document_loader.as_mut() {
                loader.url = url.to_string();
            }
        }
        url.to_string()
    }

    fn notify_navigation_api(&mut self, item: ItemId, kind: NavigationNavigationType) {
        let has_document = self.live_frame().is_some_and(|f| f.document.is_some());
        if !has_document || !self.page.config.navigation_api_enabled {
            return;
        }
        let page = &mut *self.page;
        if let Some(item) = page.items.get(item) {
            page.client.update_for_navigation(self.frame, item, kind);
        }
    }
}
