//! Frozen snapshot of one frame and its subframes.

use bfcache_types::{DocumentId, FrameId, ItemId};

use crate::frame::{BackForwardCacheState, Document, DocumentLoader, Frame, FrameTree, FrameView};

/// A frame taken out of the live tree.
///
/// The main frame itself stays in the page; only its document, loader and
/// view are moved here. Subframes are detached whole, history controller
/// included, and reattached by [`CachedFrame::open`].
#[derive(Debug)]
pub struct CachedFrame {
    frame_id: FrameId,
    url: String,
    document: Option<Document>,
    document_loader: Option<DocumentLoader>,
    view: FrameView,
    /// The detached frame record, for subframes.
    detached: Option<Frame>,
    children: Vec<CachedFrame>,
}

impl CachedFrame {
    /// Freeze `id` and its descendants. Subframes leave the tree.
    pub(crate) fn capture(tree: &mut FrameTree, id: FrameId) -> Option<Self> {
        let children = tree
            .children(id)
            .into_iter()
            .filter_map(|child| Self::capture(tree, child))
            .collect();

        let is_subframe = !tree.is_main_frame(id);
        let mut detached = if !is_subframe {
            None
        } else {
            Some(tree.detach_subtree(id).into_iter().next()?)
        };
        let frame = match detached.as_mut() {
            Some(frame) => frame,
            None => tree.get_mut(id)?,
        };

        let mut document = frame.document.take();
        if let Some(document) = document.as_mut() {
            document.back_forward_cache_state = BackForwardCacheState::InBackForwardCache;
        }
        frame.view.cached_scroll_position = frame.view.scroll_position;
        let view = frame.view.clone();
        let document_loader = if is_subframe {
            frame.loader.document_loader.take()
        } else {
            frame.loader.document_loader.clone()
        };

        Some(Self {
            frame_id: id,
            url: document.as_ref().map(|d| d.url.clone()).unwrap_or_default(),
            document,
            document_loader,
            view,
            detached,
            children,
        })
    }

    /// Put the snapshot back into `tree`, the main frame in place and
    /// subframes under `parent`.
    pub(crate) fn open(&mut self, tree: &mut FrameTree, parent: Option<FrameId>) {
        let mut document = self.document.take();
        if let Some(document) = document.as_mut() {
            document.back_forward_cache_state = BackForwardCacheState::NotInBackForwardCache;
        }
        let loader = self.document_loader.take();
        let view = std::mem::take(&mut self.view);

        let restored = match (self.detached.take(), parent) {
            (Some(mut frame), Some(parent)) => {
                frame.document = document;
                frame.loader.document_loader = loader;
                frame.view = view;
                tree.append_child(parent, frame).is_some()
            }
            (None, _) => match tree.get_mut(self.frame_id) {
                Some(frame) => {
                    frame.document = document;
                    frame.loader.document_loader = loader;
                    frame.view = view;
                    true
                }
                None => false,
            },
            (Some(_), None) => false,
        };
        if !restored {
            log::warn!("{}: cached frame has nowhere to go", self.frame_id);
            return;
        }

        for child in &mut self.children {
            child.open(tree, Some(self.frame_id));
        }
    }

    /// Destroy whatever the snapshot still holds.
    pub(crate) fn clear(&mut self) {
        for child in &mut self.children {
            child.clear();
        }
        self.children.clear();
        self.document = None;
        self.document_loader = None;
        self.detached = None;
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn document_id(&self) -> Option<DocumentId> {
        self.document.as_ref().map(|d| d.id)
    }

    pub fn document_loader(&self) -> Option<&DocumentLoader> {
        self.document_loader.as_ref()
    }

    pub fn focused_element(&self) -> Option<&str> {
        self.document.as_ref()?.focused_element.as_deref()
    }

    pub fn children(&self) -> &[CachedFrame] {
        &self.children
    }

    /// Number of subframes held, at any depth.
    pub fn descendant_count(&self) -> usize {
        self.children.iter().map(|c| 1 + c.descendant_count()).sum()
    }

    /// History items kept alive by detached subframes.
    pub(crate) fn referenced_items(&self, out: &mut Vec<ItemId>) {
        if let Some(frame) = &self.detached {
            out.extend(frame.history.referenced_items());
            out.extend(frame.loader.requested_history_item);
        }
        for child in &self.children {
            child.referenced_items(out);
        }
    }
}
