//! Frame tree and the per-frame document, view and loader state.
//!
//! The tree is an arena keyed by [`FrameId`]. Parent and child links are
//! ids, so whole subtrees can be detached into a cached page and later
//! reattached without touching anything else in the page.

use std::collections::HashMap;

use bfcache_types::{DocumentId, FrameId, FrameLoadType, ItemId};

use crate::history::HistoryController;
use crate::item::{FormData, ScrollPosition};

/// URL of the initial empty document.
pub const ABOUT_BLANK: &str = "about:blank";

/// Where a document stands relative to the back/forward cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackForwardCacheState {
    #[default]
    NotInBackForwardCache,
    AboutToEnterBackForwardCache,
    InBackForwardCache,
}

/// The live document of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub url: String,
    pub title: String,
    /// Current form control state, as saved into history items.
    pub form_state: Vec<String>,
    /// Form state restored from history, applied to form controls as they
    /// are created.
    pub pending_form_state: Vec<String>,
    pub has_living_render_tree: bool,
    pub back_forward_cache_state: BackForwardCacheState,
    /// Documents with unload handlers or open connections cannot be frozen.
    pub can_suspend: bool,
    pub focused_element: Option<String>,
    pub has_recent_user_interaction: bool,
    pub hidden: bool,
}

impl Document {
    pub fn new(id: DocumentId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            title: String::new(),
            form_state: Vec::new(),
            pending_form_state: Vec::new(),
            has_living_render_tree: true,
            back_forward_cache_state: BackForwardCacheState::NotInBackForwardCache,
            can_suspend: true,
            focused_element: None,
            has_recent_user_interaction: false,
            hidden: false,
        }
    }

    pub fn in_back_forward_cache(&self) -> bool {
        self.back_forward_cache_state != BackForwardCacheState::NotInBackForwardCache
    }
}

/// Scroll state of a frame's viewport.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameView {
    pub scroll_position: ScrollPosition,
    /// Snapshot taken when the document entered the page cache.
    pub cached_scroll_position: ScrollPosition,
    pub was_scrolled_by_user: bool,
}

/// What the loader knows about one load: the request as issued and the
/// response once it arrives.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentLoader {
    pub url: String,
    pub original_url: String,
    /// Set when an error page stands in for a URL that failed to load.
    pub unreachable_url: Option<String>,
    pub title: String,
    pub http_status: u16,
    pub is_client_redirect: bool,
    pub form_data: Option<FormData>,
    pub did_create_global_history_entry: bool,
}

impl DocumentLoader {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            original_url: url.clone(),
            url,
            http_status: 200,
            ..Self::default()
        }
    }

    /// URL recorded in history for this load.
    pub fn url_for_history(&self) -> &str {
        match &self.unreachable_url {
            Some(url) => url,
            None => &self.original_url,
        }
    }
}

/// Loader state of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLoaderState {
    /// Type of the last committed load.
    pub load_type: FrameLoadType,
    pub provisional_load_type: FrameLoadType,
    pub document_loader: Option<DocumentLoader>,
    pub provisional_document_loader: Option<DocumentLoader>,
    /// Item this frame was asked to load by a history traversal.
    pub requested_history_item: Option<ItemId>,
    pub committed_first_real_document_load: bool,
    pub creating_initial_empty_document: bool,
    pub is_complete: bool,
}

impl Default for FrameLoaderState {
    fn default() -> Self {
        Self {
            load_type: FrameLoadType::Standard,
            provisional_load_type: FrameLoadType::Standard,
            document_loader: None,
            provisional_document_loader: None,
            requested_history_item: None,
            committed_first_real_document_load: false,
            creating_initial_empty_document: false,
            is_complete: true,
        }
    }
}

/// One frame of a page.
#[derive(Debug)]
pub struct Frame {
    id: FrameId,
    parent: Option<FrameId>,
    children: Vec<FrameId>,
    /// Unique name within the page; history items record it as their target.
    pub name: String,
    pub history: HistoryController,
    pub loader: FrameLoaderState,
    pub document: Option<Document>,
    pub view: FrameView,
}

impl Frame {
    /// A frame holding its initial empty document.
    pub fn new(id: FrameId, name: impl Into<String>, document: DocumentId) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            name: name.into(),
            history: HistoryController::new(),
            loader: FrameLoaderState {
                document_loader: Some(DocumentLoader::new(ABOUT_BLANK)),
                ..FrameLoaderState::default()
            },
            document: Some(Document::new(document, ABOUT_BLANK)),
            view: FrameView::default(),
        }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn parent(&self) -> Option<FrameId> {
        self.parent
    }

    pub fn children(&self) -> &[FrameId] {
        &self.children
    }

    pub fn is_main_frame(&self) -> bool {
        self.parent.is_none()
    }

    pub fn document_url(&self) -> Option<&str> {
        self.document.as_ref().map(|d| d.url.as_str())
    }
}

/// Arena of frames rooted at the main frame.
#[derive(Debug)]
pub struct FrameTree {
    frames: HashMap<FrameId, Frame>,
    main: FrameId,
}

impl FrameTree {
    pub fn new(main: Frame) -> Self {
        let id = main.id;
        let mut frames = HashMap::new();
        frames.insert(id, main);
        Self { frames, main: id }
    }

    pub fn main(&self) -> FrameId {
        self.main
    }

    /// The main frame is never detached, so this cannot miss.
    pub fn main_frame(&self) -> &Frame {
        &self.frames[&self.main]
    }

    pub fn get(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(&id)
    }

    pub fn get_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.frames.get_mut(&id)
    }

    pub fn contains(&self, id: FrameId) -> bool {
        self.frames.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn subframe_count(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    pub fn parent(&self, id: FrameId) -> Option<FrameId> {
        self.get(id)?.parent
    }

    pub fn children(&self, id: FrameId) -> Vec<FrameId> {
        self.get(id).map(|f| f.children.clone()).unwrap_or_default()
    }

    pub fn is_main_frame(&self, id: FrameId) -> bool {
        id == self.main
    }

    /// Append `frame` as the last child of `parent`.
    pub fn append_child(&mut self, parent: FrameId, mut frame: Frame) -> Option<FrameId> {
        let id = frame.id;
        self.frames.get_mut(&parent)?.children.push(id);
        frame.parent = Some(parent);
        self.frames.insert(id, frame);
        Some(id)
    }

    /// Remove `id` and its descendants, returned with the root first.
    /// Child links of the removed frames are kept.
    pub fn detach_subtree(&mut self, id: FrameId) -> Vec<Frame> {
        if id == self.main {
            return Vec::new();
        }
        if let Some(parent) = self.parent(id).and_then(|p| self.frames.get_mut(&p)) {
            parent.children.retain(|&c| c != id);
        }
        self.traverse(id)
            .into_iter()
            .filter_map(|fid| self.frames.remove(&fid))
            .collect()
    }

    /// Preorder ids of the subtree rooted at `root`.
    pub fn traverse(&self, root: FrameId) -> Vec<FrameId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(frame) = self.get(id) else { continue };
            out.push(id);
            stack.extend(frame.children.iter().rev().copied());
        }
        out
    }

    /// Postorder ids of the subtree rooted at `root`: children before parents.
    pub fn traverse_post_order(&self, root: FrameId) -> Vec<FrameId> {
        let mut out = self.traverse_reverse_children(root);
        out.reverse();
        out
    }

    fn traverse_reverse_children(&self, root: FrameId) -> Vec<FrameId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(frame) = self.get(id) else { continue };
            out.push(id);
            stack.extend(frame.children.iter().copied());
        }
        out
    }

    /// `frame_id` if it names a strict descendant of `ancestor`.
    pub fn descendant_by_frame_id(&self, ancestor: FrameId, frame_id: FrameId) -> Option<FrameId> {
        let mut cursor = self.parent(frame_id)?;
        loop {
            if cursor == ancestor {
                return Some(frame_id);
            }
            cursor = self.parent(cursor)?;
        }
    }

    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.values()
    }
}
