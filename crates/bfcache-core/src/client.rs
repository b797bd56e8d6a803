//! Embedder-facing client trait.
//!
//! The history machinery never performs I/O or runs script itself. Loads,
//! policy decisions, DOM events and Navigation API bookkeeping are handed
//! to a [`HistoryClient`]; every method has a no-op default so embedders
//! only implement what they observe.

use bfcache_types::{DocumentId, FrameId, FrameLoadType, ItemId};

use crate::item::{FormData, HistoryItem};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Answer to "may this history traversal proceed?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShouldGoToHistoryItem {
    Yes,
    No,
}

/// Whether the traversal is part of a cross-origin-opener-policy process swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessSwapDisposition {
    #[default]
    None,
    Coop,
}

/// What to do once a policy decision arrives.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PolicyContinuation {
    GoToItem {
        load_type: FrameLoadType,
        continuing_load: bool,
        in_swipe_animation: bool,
    },
    NavigationApi {
        load_type: FrameLoadType,
        triggering_frame: FrameId,
        tracker: Option<u64>,
        in_swipe_animation: bool,
    },
}

/// Handle for an outstanding asynchronous policy check.
///
/// The client hands it back through [`crate::Page::complete_policy_check`].
/// A ticket whose traversal has since been superseded is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyTicket {
    pub(crate) frame: FrameId,
    pub(crate) target: ItemId,
    pub(crate) generation: u64,
    pub(crate) continuation: PolicyContinuation,
}

impl PolicyTicket {
    pub fn frame(&self) -> FrameId {
        self.frame
    }

    pub fn target(&self) -> ItemId {
        self.target
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_navigation_api(&self) -> bool {
        matches!(self.continuation, PolicyContinuation::NavigationApi { .. })
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// A network load the embedder should start.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub frame: FrameId,
    pub url: String,
    pub load_type: FrameLoadType,
    /// History item being loaded, for back/forward traversals.
    pub history_item: Option<ItemId>,
    pub form_data: Option<FormData>,
}

/// The embedder's report that a provisional load received its response.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadResponse {
    /// Final URL after redirects.
    pub url: String,
    pub title: String,
    pub http_status: u16,
    pub unreachable_url: Option<String>,
}

impl LoadResponse {
    pub fn ok(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            http_status: 200,
            unreachable_url: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Navigation API
// ---------------------------------------------------------------------------

/// How a navigation changed the current entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationNavigationType {
    Push,
    Replace,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Hooks the history machinery calls into.
pub trait HistoryClient {
    /// Synchronous policy check for a history traversal.
    fn should_go_to_history_item(
        &mut self,
        _item: &HistoryItem,
        _is_same_document: bool,
        _disposition: ProcessSwapDisposition,
    ) -> ShouldGoToHistoryItem {
        ShouldGoToHistoryItem::Yes
    }

    fn supports_async_should_go_to_history_item(&self) -> bool {
        false
    }

    /// Asynchronous policy check. Only called when
    /// [`HistoryClient::supports_async_should_go_to_history_item`] is true.
    fn should_go_to_history_item_async(&mut self, _item: &HistoryItem, _ticket: PolicyTicket) {}

    fn start_load(&mut self, _request: LoadRequest) {}

    fn cancel_load(&mut self, _frame: FrameId) {}

    fn save_view_state_to_item(&mut self, _item: &mut HistoryItem) {}

    fn restore_view_state(&mut self, _frame: FrameId) {}

    fn did_restore_scroll_position(&mut self, _frame: FrameId) {}

    fn update_global_history(&mut self, _url: &str) {}

    fn update_global_history_redirect_links(&mut self, _frame: FrameId) {}

    fn dispatch_pageshow(&mut self, _frame: FrameId, _document: DocumentId, _persisted: bool) {}

    fn dispatch_popstate(&mut self, _frame: FrameId, _state: Option<&serde_json::Value>) {}

    /// Registrable domains of subresources loaded by the current page.
    fn loaded_subresource_domains(&self) -> Vec<String> {
        Vec::new()
    }

    fn did_load_from_registrable_domain(&mut self, _domain: &str) {}

    fn update_for_navigation(
        &mut self,
        _frame: FrameId,
        _item: &HistoryItem,
        _kind: NavigationNavigationType,
    ) {
    }

    fn update_for_reactivation(&mut self, _frame: FrameId, _entries: &[ItemId], _current: ItemId) {}

    /// Whether script aborted the navigation just started in `frame`.
    fn navigation_was_aborted(&mut self, _frame: FrameId) -> bool {
        false
    }

    fn reject_finished_promise(&mut self, _frame: FrameId, _tracker: Option<u64>) {}

    fn update_focus_appearance(&mut self, _frame: FrameId, _element: &str) {}

    fn device_or_page_scale_factor_changed(&mut self) {}

    fn caption_preferences_changed(&mut self) {}

    fn update_contents_size(&mut self, _frame: FrameId) {}
}

/// Client that accepts every traversal and ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopClient;

impl HistoryClient for NoopClient {}
