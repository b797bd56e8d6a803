//! Frame loading as seen by session history.
//!
//! Network work belongs to the embedder: [`HistoryClient::start_load`]
//! hands a request out, and the embedder reports back through
//! [`Page::did_commit_load`], [`Page::did_finish_load`] and
//! [`Page::did_fail_load`]. Everything between those calls (choosing the
//! load type, committing history, freezing and thawing cached pages) is
//! driven from here.
//!
//! [`HistoryClient::start_load`]: crate::client::HistoryClient::start_load

use bfcache_types::{FrameId, FrameLoadType, HistoryError, ItemId, Result};
use serde_json::Value;

use crate::cache::CachedPage;
use crate::client::{LoadRequest, LoadResponse, ProcessSwapDisposition};
use crate::frame::{ABOUT_BLANK, Document, DocumentLoader, FrameView};
use crate::history::{History, HistoryUpdateType};
use crate::item::{FormData, equal_ignoring_fragment, has_fragment};
use crate::page::Page;

/// A navigation requested by the user or by script.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationRequest {
    pub url: String,
    pub form_data: Option<FormData>,
    /// Script-initiated navigation replacing the page that issued it.
    pub client_redirect: bool,
    /// Do not add a back/forward entry.
    pub lock_back_forward_list: bool,
}

impl NavigationRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_form_data(mut self, form_data: FormData) -> Self {
        self.form_data = Some(form_data);
        self
    }

    pub fn client_redirect(mut self) -> Self {
        self.client_redirect = true;
        self
    }

    pub fn lock_back_forward_list(mut self) -> Self {
        self.lock_back_forward_list = true;
        self
    }
}

impl Page {
    // -- Starting loads -------------------------------------------------------

    /// Navigate `frame` to a new URL.
    pub fn navigate(&mut self, frame: FrameId, request: NavigationRequest) -> Result<()> {
        let live = self.frames.get(frame).ok_or(HistoryError::UnknownFrame(frame))?;
        url::Url::parse(&request.url)?;
        let document_url = live.document_url().unwrap_or_default().to_string();

        if request.form_data.is_none()
            && has_fragment(&request.url)
            && equal_ignoring_fragment(&request.url, &document_url)
        {
            log::debug!("{frame}: fragment navigation to {}", request.url);
            self.stop_loading(frame);
            self.load_in_same_document(frame, &request.url, None, true);
            return Ok(());
        }

        let history = History::new(self, frame);
        let has_current_item = history.current_item().is_some();
        let load_type = if request.lock_back_forward_list {
            FrameLoadType::RedirectWithLockedBackForwardList
        } else if history.current_item_should_be_replaced() {
            FrameLoadType::Replace
        } else if has_current_item && request.form_data.is_none() && request.url == document_url {
            FrameLoadType::Same
        } else {
            FrameLoadType::Standard
        };
        log::info!("{frame}: navigating to {} ({load_type:?})", request.url);

        self.stop_loading(frame);
        let mut loader = DocumentLoader::new(request.url);
        loader.is_client_redirect = request.client_redirect;
        loader.form_data = request.form_data;
        self.start_provisional_load(frame, loader, load_type, None);
        Ok(())
    }

    /// Navigate `frame` to `url` with a standard load.
    pub fn load_url(&mut self, frame: FrameId, url: &str) -> Result<()> {
        self.navigate(frame, NavigationRequest::new(url))
    }

    /// Create a subframe named `name` under `parent` and load it.
    ///
    /// While `parent` is still loading from a back/forward traversal, the
    /// child loads the item recorded for it in the parent's history item
    /// instead of `url`.
    pub fn load_url_into_child_frame(
        &mut self,
        parent: FrameId,
        name: &str,
        url: &str,
    ) -> Result<FrameId> {
        let child = self.add_child_frame(parent, name)?;
        let parent_frame = self.frames.get(parent).ok_or(HistoryError::UnknownFrame(parent))?;
        let parent_load_type = parent_frame.loader.load_type;
        let restoring = parent_load_type.is_back_forward() && !parent_frame.loader.is_complete;
        let child_item = parent_frame
            .history
            .current_item()
            .filter(|_| restoring)
            .and_then(|item| self.items.child_item_with_target(item, name));

        match child_item {
            Some(item) => {
                log::debug!("{child}: restoring {item} from parent {parent}");
                if let Some(entry) = self.items.get_mut(item) {
                    entry.frame_id = Some(child);
                }
                self.frame_mut(child)?.loader.requested_history_item = Some(item);
                self.load_different_document_item(child, item, None, parent_load_type, false);
            }
            None => {
                self.navigate(child, NavigationRequest::new(url).lock_back_forward_list())?;
            }
        }
        Ok(child)
    }

    /// Reload `frame`'s current entry.
    pub fn reload(&mut self, frame: FrameId, from_origin: bool) -> Result<()> {
        let live = self.frames.get(frame).ok_or(HistoryError::UnknownFrame(frame))?;
        let current = live.history.current_item().and_then(|id| self.items.get(id));
        let url = current
            .map(|item| item.url.clone())
            .or_else(|| live.document_url().map(str::to_string))
            .unwrap_or_else(|| ABOUT_BLANK.to_string());
        let form_data = current.and_then(|item| item.form_data.clone());
        let load_type = if from_origin {
            FrameLoadType::ReloadFromOrigin
        } else {
            FrameLoadType::Reload
        };
        log::info!("{frame}: reloading {url} ({load_type:?})");

        self.stop_loading(frame);
        let mut loader = DocumentLoader::new(url);
        loader.form_data = form_data;
        self.start_provisional_load(frame, loader, load_type, None);
        Ok(())
    }

    fn start_provisional_load(
        &mut self,
        frame: FrameId,
        loader: DocumentLoader,
        load_type: FrameLoadType,
        history_item: Option<ItemId>,
    ) {
        let request = LoadRequest {
            frame,
            url: loader.url.clone(),
            load_type,
            history_item,
            form_data: loader.form_data.clone(),
        };
        let Some(live) = self.frames.get_mut(frame) else {
            return;
        };
        live.loader.provisional_document_loader = Some(loader);
        live.loader.provisional_load_type = load_type;
        live.loader.is_complete = false;
        log::debug!("{frame}: provisional load of {}", request.url);
        self.client.start_load(request);
    }

    // -- History items --------------------------------------------------------

    /// Load `item` into `frame` on behalf of a traversal. `from` is the
    /// frame's item in the entry being left.
    pub(crate) fn load_item(
        &mut self,
        frame: FrameId,
        item: ItemId,
        from: Option<ItemId>,
        load_type: FrameLoadType,
        continuing_load: bool,
    ) {
        let Some(live) = self.frames.get_mut(frame) else {
            log::warn!("{frame}: asked to load {item} into a missing frame");
            return;
        };
        live.loader.requested_history_item = Some(item);
        let current = live.history.current_item();

        let same_document =
            current.is_some_and(|cur| self.items.should_do_same_document_navigation_to(item, cur));
        if same_document {
            self.load_same_document_item(frame, item);
        } else {
            self.load_different_document_item(frame, item, from, load_type, continuing_load);
        }
    }

    fn load_same_document_item(&mut self, frame: FrameId, item: ItemId) {
        let Some((url, state)) = self
            .items
            .get(item)
            .map(|entry| (entry.url.clone(), entry.state_object.clone()))
        else {
            return;
        };
        log::debug!("{frame}: same-document traversal to {item}");

        let mut history = History::new(self, frame);
        let current = history.current_item();
        history.save_scroll_position_and_view_state_to_item(current);
        if let Some(live) = self.frames.get_mut(frame) {
            live.view.was_scrolled_by_user = false;
        }
        History::new(self, frame).set_current_item(item);
        self.load_in_same_document(frame, &url, state, false);
        History::new(self, frame).restore_scroll_position_and_view_state();
    }

    fn load_different_document_item(
        &mut self,
        frame: FrameId,
        item: ItemId,
        from: Option<ItemId>,
        load_type: FrameLoadType,
        continuing_load: bool,
    ) {
        let Some((url, form_data)) = self
            .items
            .get(item)
            .map(|entry| (entry.url.clone(), entry.form_data.clone()))
        else {
            log::warn!("{frame}: history item {item} is gone");
            return;
        };
        log::debug!(
            "{frame}: loading {item} from {from:?} ({load_type:?}, continuing: {continuing_load})"
        );

        if self.frames.is_main_frame(frame) && load_type.is_back_forward() {
            if let Some(cached) = self.cache.take(item) {
                log::info!("{frame}: restoring {item} from the page cache");
                self.stop_loading(frame);
                History::new(self, frame).set_provisional_item(Some(item));
                let loader = cached
                    .document_loader()
                    .cloned()
                    .unwrap_or_else(|| DocumentLoader::new(url));
                if let Some(live) = self.frames.get_mut(frame) {
                    live.loader.provisional_document_loader = Some(loader);
                    live.loader.provisional_load_type = load_type;
                }
                self.commit_provisional_load(frame, Some(cached));
                if let Some(live) = self.frames.get_mut(frame) {
                    live.loader.is_complete = true;
                }
                self.finish_load(frame);
                return;
            }
        }

        History::new(self, frame).set_provisional_item(Some(item));
        let mut loader = DocumentLoader::new(url);
        loader.form_data = form_data;
        self.start_provisional_load(frame, loader, load_type, Some(item));
    }

    /// Move `frame` to `url` without loading a new document.
    fn load_in_same_document(
        &mut self,
        frame: FrameId,
        url: &str,
        state: Option<Value>,
        is_new_navigation: bool,
    ) {
        let Some(live) = self.frames.get_mut(frame) else {
            return;
        };
        let same_as_current = live.document_url() == Some(url);
        if let Some(document) = live.document.as_mut() {
            document.url = url.to_string();
        }
        if let Some(loader) = live.loader.document_loader.as_mut() {
            loader.url = url.to_string();
        }

        let mut history = History::new(self, frame);
        if is_new_navigation && !same_as_current && state.is_none() {
            let current = history.current_item();
            history.save_scroll_position_and_view_state_to_item(current);
            history.update_back_forward_list_for_fragment_scroll();
        }
        history.update_for_same_document_navigation();

        if !is_new_navigation {
            self.client.dispatch_popstate(frame, state.as_ref());
        }
        self.check_load_complete();
    }

    // -- Commit ---------------------------------------------------------------

    /// The provisional load in `frame` received its response.
    pub fn did_commit_load(&mut self, frame: FrameId, response: LoadResponse) -> Result<()> {
        let live = self.frame_mut(frame)?;
        let Some(loader) = live.loader.provisional_document_loader.as_mut() else {
            return Err(HistoryError::NoProvisionalLoad(frame));
        };
        loader.url = response.url;
        loader.title = response.title;
        loader.http_status = response.http_status;
        loader.unreachable_url = response.unreachable_url;
        self.commit_provisional_load(frame, None);
        Ok(())
    }

    fn commit_provisional_load(&mut self, frame: FrameId, cached: Option<CachedPage>) {
        let is_main = self.frames.is_main_frame(frame);
        let Some(live) = self.frames.get_mut(frame) else {
            return;
        };
        let Some(loader) = live.loader.provisional_document_loader.take() else {
            return;
        };
        let load_type = live.loader.provisional_load_type;
        let client_redirect = loader.is_client_redirect;
        log::debug!("{frame}: committing {} ({load_type:?})", loader.url);

        let mut history = History::new(self, frame);
        if is_main && cached.is_none() {
            history.invalidate_current_item_cached_page();
        }
        history.save_document_and_scroll_state();
        if client_redirect {
            history.update_for_client_redirect();
        }

        let mut page_was_cached = false;
        if is_main {
            match self.add_if_cacheable(load_type) {
                Ok(item) => {
                    log::info!("{frame}: page for {item} entered the page cache");
                    page_was_cached = true;
                }
                Err(err) => log::debug!("{frame}: {err}"),
            }
        }
        if !page_was_cached {
            self.detach_children(frame);
        }

        if let Some(live) = self.frames.get_mut(frame) {
            live.loader.document_loader = Some(loader.clone());
            live.loader.load_type = load_type;
            live.loader.is_complete = false;
        }

        self.transition_to_committed(frame, load_type);

        match cached {
            Some(mut cached) => {
                if let Err(err) = cached.restore(self) {
                    log::error!("{frame}: restoring cached page failed: {err}");
                }
            }
            None => {
                let document_id = self.ids.next_document_id();
                let mut document = Document::new(document_id, loader.url.clone());
                document.title = loader.title.clone();
                if let Some(live) = self.frames.get_mut(frame) {
                    live.document = Some(document);
                    live.view = FrameView::default();
                }
                History::new(self, frame).restore_document_state();
            }
        }

        if let Some(live) = self.frames.get_mut(frame) {
            live.loader.committed_first_real_document_load = true;
            live.loader.creating_initial_empty_document = false;
        }
    }

    /// Record the commit in history according to the load type.
    fn transition_to_committed(&mut self, frame: FrameId, load_type: FrameLoadType) {
        let mut history = History::new(self, frame);
        history.update_for_commit();

        match load_type {
            FrameLoadType::Back | FrameLoadType::Forward | FrameLoadType::IndexedBackForward => {
                history.update_for_back_forward_navigation();
                if history.current_item().is_none() {
                    history.update_for_standard_load(HistoryUpdateType::UpdateAllExceptBackForwardList);
                }
            }
            FrameLoadType::Reload
            | FrameLoadType::ReloadFromOrigin
            | FrameLoadType::ReloadExpiredOnly
            | FrameLoadType::Same
            | FrameLoadType::Replace => history.update_for_reload(),
            FrameLoadType::Standard => history.update_for_standard_load(HistoryUpdateType::UpdateAll),
            FrameLoadType::RedirectWithLockedBackForwardList => {
                history.update_for_redirect_with_locked_back_forward_list()
            }
        }
    }

    /// Drop `frame`'s subframes; the new document starts without them.
    fn detach_children(&mut self, frame: FrameId) {
        for child in self.frames.children(frame) {
            self.stop_loading(child);
            let removed = self.frames.detach_subtree(child);
            log::trace!("{frame}: detached {} frames", removed.len());
        }
        if self
            .focused_frame
            .is_some_and(|focused| !self.frames.contains(focused))
        {
            self.focused_frame = None;
        }
    }

    // -- Completion -----------------------------------------------------------

    /// The committed document in `frame` finished loading.
    pub fn did_finish_load(&mut self, frame: FrameId) -> Result<()> {
        let live = self.frame_mut(frame)?;
        live.loader.is_complete = true;
        self.finish_load(frame);
        Ok(())
    }

    fn finish_load(&mut self, frame: FrameId) {
        let load_type = self
            .frames
            .get(frame)
            .map_or(FrameLoadType::Standard, |f| f.loader.load_type);
        if load_type.is_back_forward() || load_type.is_reload() {
            History::new(self, frame).restore_scroll_position_and_view_state();
        }
        log::debug!("{frame}: finished loading");
        self.check_load_complete();
        self.collect_garbage();
    }

    /// The provisional load in `frame` failed before committing.
    pub fn did_fail_load(&mut self, frame: FrameId) -> Result<()> {
        let is_main = self.frames.is_main_frame(frame);
        let live = self.frame_mut(frame)?;
        let Some(loader) = live.loader.provisional_document_loader.take() else {
            return Err(HistoryError::NoProvisionalLoad(frame));
        };
        let load_type = live.loader.provisional_load_type;
        live.loader.is_complete = true;
        live.history.set_provisional_item(None);
        live.loader.requested_history_item = None;
        log::warn!("{frame}: load of {} failed", loader.url);

        if is_main {
            for id in self.frames.traverse(frame) {
                if let Some(other) = self.frames.get_mut(id) {
                    other.history.set_provisional_item(None);
                }
            }
            if load_type.is_back_forward() {
                if let Some(current) = self.frames.main_frame().history.current_item() {
                    self.back_forward.set_current_item(&self.items, current);
                }
            }
        }
        self.check_load_complete();
        self.collect_garbage();
        Ok(())
    }

    /// Cancel provisional loads in `frame` and its descendants.
    pub fn stop_loading(&mut self, frame: FrameId) {
        for id in self.frames.traverse(frame) {
            let Some(live) = self.frames.get_mut(id) else {
                continue;
            };
            if live.loader.provisional_document_loader.take().is_some() {
                live.loader.is_complete = true;
                live.history.set_provisional_item(None);
                log::debug!("{id}: provisional load cancelled");
                self.client.cancel_load(id);
            }
        }
    }

    pub fn stop_all_loaders(&mut self) {
        self.stop_loading(self.frames.main());
        self.check_load_complete();
    }

    // -- Traversal ------------------------------------------------------------

    /// Traverse to `item`, a back/forward list entry.
    pub fn go_to_item(&mut self, item: ItemId, load_type: FrameLoadType) -> Result<()> {
        if !self.items.contains(item) {
            return Err(HistoryError::UnknownItem(item));
        }
        if self.main_history().should_stop_loading_for_history_item(item) {
            self.stop_all_loaders();
        }
        self.main_history()
            .go_to_item(item, load_type, false, ProcessSwapDisposition::None);
        Ok(())
    }

    /// Returns false when there is nothing to go back to.
    pub fn go_back(&mut self) -> Result<bool> {
        match self.back_forward.back_item() {
            Some(item) => self.go_to_item(item, FrameLoadType::Back).map(|()| true),
            None => Ok(false),
        }
    }

    /// Returns false when there is nothing to go forward to.
    pub fn go_forward(&mut self) -> Result<bool> {
        match self.back_forward.forward_item() {
            Some(item) => self.go_to_item(item, FrameLoadType::Forward).map(|()| true),
            None => Ok(false),
        }
    }

    /// `history.go(delta)`. Zero reloads the main frame.
    pub fn go_to_index(&mut self, delta: i32) -> Result<bool> {
        if delta == 0 {
            self.reload(self.frames.main(), false)?;
            return Ok(true);
        }
        match self.back_forward.item_at_index(delta) {
            Some(item) => self
                .go_to_item(item, FrameLoadType::IndexedBackForward)
                .map(|()| true),
            None => Ok(false),
        }
    }

    /// Traverse on behalf of the Navigation API, triggered from `frame`.
    pub fn traverse_for_navigation_api(
        &mut self,
        frame: FrameId,
        item: ItemId,
        tracker: Option<u64>,
    ) -> Result<()> {
        if !self.frames.contains(frame) {
            return Err(HistoryError::UnknownFrame(frame));
        }
        if !self.items.contains(item) {
            return Err(HistoryError::UnknownItem(item));
        }
        self.main_history().go_to_item_for_navigation_api(
            item,
            FrameLoadType::IndexedBackForward,
            frame,
            tracker,
        );
        Ok(())
    }

    // -- Same-document navigation ---------------------------------------------

    /// Scroll `frame` to `#fragment`, adding a back/forward entry.
    pub fn navigate_to_fragment(&mut self, frame: FrameId, fragment: &str) -> Result<()> {
        let live = self.frames.get(frame).ok_or(HistoryError::UnknownFrame(frame))?;
        let mut url = url::Url::parse(live.document_url().unwrap_or(ABOUT_BLANK))?;
        url.set_fragment(Some(fragment.trim_start_matches('#')));
        self.load_in_same_document(frame, url.as_str(), None, true);
        Ok(())
    }

    /// `history.pushState(state, "", url)` from `frame`'s document.
    pub fn push_state(&mut self, frame: FrameId, state: Option<Value>, url: &str) -> Result<()> {
        let url = self.resolve_state_url(frame, url)?;
        self.history(frame)?.push_state(state, &url);
        self.check_load_complete();
        Ok(())
    }

    /// `history.replaceState(state, "", url)` from `frame`'s document.
    pub fn replace_state(&mut self, frame: FrameId, state: Option<Value>, url: &str) -> Result<()> {
        let url = self.resolve_state_url(frame, url)?;
        self.history(frame)?.replace_state(state, &url);
        Ok(())
    }

    /// Resolve a possibly relative state URL against the document URL.
    fn resolve_state_url(&self, frame: FrameId, url: &str) -> Result<String> {
        let live = self.frames.get(frame).ok_or(HistoryError::UnknownFrame(frame))?;
        if url.is_empty() {
            return Ok(String::new());
        }
        let base = url::Url::parse(live.document_url().unwrap_or(ABOUT_BLANK))?;
        Ok(base.join(url)?.to_string())
    }
}
