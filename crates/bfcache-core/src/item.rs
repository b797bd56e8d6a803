//! History items and the arena that owns them.
//!
//! A back/forward entry is a tree of [`HistoryItem`]s mirroring the frame
//! tree at the time the entry was created. Items are shared between the
//! back/forward list, per-frame history controllers and the page cache, so
//! they live in an [`ItemArena`] keyed by [`ItemId`] and every holder keeps
//! ids rather than references. Unreachable items are swept by
//! [`crate::Page::collect_garbage`].

use std::collections::{HashMap, HashSet};

use bfcache_types::{FrameId, IdGenerator, ItemId};
use serde::Serialize;

/// Scroll offset of a frame view, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScrollPosition {
    pub x: i32,
    pub y: i32,
}

impl ScrollPosition {
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Clamp to the scrollable range, which never goes below the origin.
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.max(0),
            y: self.y.max(0),
        }
    }
}

/// Body and content type of a POST submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormData {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// One node of a back/forward entry.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryItem {
    id: ItemId,
    /// Identifies this logical history entry. Clones of an item in later
    /// entries share it.
    pub item_sequence_number: u64,
    /// Identifies the document the item was captured from. Same-document
    /// navigations keep it.
    pub document_sequence_number: u64,
    /// Navigation API key, preserved across same-origin URL changes.
    pub navigation_key: u64,
    pub frame_id: Option<FrameId>,
    pub url: String,
    pub original_url: String,
    pub title: String,
    /// Unique name of the frame the item was created for.
    pub target: String,
    pub scroll_position: ScrollPosition,
    pub page_scale_factor: f32,
    /// Serialized form control state.
    pub document_state: Vec<String>,
    pub state_object: Option<serde_json::Value>,
    pub navigation_api_state_object: Option<serde_json::Value>,
    pub form_data: Option<FormData>,
    pub should_restore_scroll_position: bool,
    pub is_target_item: bool,
    pub was_created_by_js_without_user_interaction: bool,
    pub last_visit_was_failure: bool,
    children: Vec<ItemId>,
}

impl HistoryItem {
    fn new(id: ItemId, ids: &IdGenerator) -> Self {
        Self {
            id,
            item_sequence_number: ids.next_sequence_number(),
            document_sequence_number: ids.next_sequence_number(),
            navigation_key: ids.next_sequence_number(),
            frame_id: None,
            url: String::new(),
            original_url: String::new(),
            title: String::new(),
            target: String::new(),
            scroll_position: ScrollPosition::ORIGIN,
            page_scale_factor: 0.0,
            document_state: Vec::new(),
            state_object: None,
            navigation_api_state_object: None,
            form_data: None,
            should_restore_scroll_position: true,
            is_target_item: false,
            was_created_by_js_without_user_interaction: false,
            last_visit_was_failure: false,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn children(&self) -> &[ItemId] {
        &self.children
    }

    pub fn has_state_object(&self) -> bool {
        self.state_object.is_some()
    }

    /// Whether `document_url` is the document this item was captured from.
    /// Fragments are ignored.
    pub fn is_current_document(&self, document_url: &str) -> bool {
        equal_ignoring_fragment(&self.url, document_url)
    }

    /// Forget everything that described the old URL. Fresh sequence numbers
    /// are assigned and children are dropped.
    fn reset(&mut self, ids: &IdGenerator) {
        self.url.clear();
        self.original_url.clear();
        self.target.clear();
        self.title.clear();
        self.last_visit_was_failure = false;
        self.is_target_item = false;
        self.item_sequence_number = ids.next_sequence_number();
        self.state_object = None;
        self.document_sequence_number = ids.next_sequence_number();
        self.form_data = None;
        self.children.clear();
    }
}

/// Owner of every live [`HistoryItem`].
#[derive(Debug, Default)]
pub struct ItemArena {
    items: HashMap<ItemId, HistoryItem>,
}

impl ItemArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a blank item with fresh sequence numbers.
    pub fn create(&mut self, ids: &IdGenerator) -> ItemId {
        let id = ids.next_item_id();
        self.items.insert(id, HistoryItem::new(id, ids));
        id
    }

    pub fn get(&self, id: ItemId) -> Option<&HistoryItem> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut HistoryItem> {
        self.items.get_mut(&id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn reset(&mut self, id: ItemId, ids: &IdGenerator) {
        if let Some(item) = self.items.get_mut(&id) {
            item.reset(ids);
        }
    }

    pub fn add_child(&mut self, parent: ItemId, child: ItemId) {
        if let Some(item) = self.items.get_mut(&parent) {
            item.children.push(child);
        }
    }

    /// Attach `child` under `parent`, replacing an existing child that
    /// belongs to the same frame.
    pub fn set_child_item(&mut self, parent: ItemId, child: ItemId) {
        let frame_id = self.get(child).and_then(|c| c.frame_id);
        let existing = frame_id.and_then(|fid| self.child_item_with_frame_id(parent, fid));
        let Some(item) = self.items.get_mut(&parent) else {
            return;
        };
        match existing.and_then(|old| item.children.iter().position(|&c| c == old)) {
            Some(index) => item.children[index] = child,
            None => item.children.push(child),
        }
    }

    pub fn clear_children(&mut self, parent: ItemId) {
        if let Some(item) = self.items.get_mut(&parent) {
            item.children.clear();
        }
    }

    pub fn child_item_with_frame_id(&self, parent: ItemId, frame_id: FrameId) -> Option<ItemId> {
        self.get(parent)?
            .children
            .iter()
            .copied()
            .find(|&c| self.get(c).is_some_and(|item| item.frame_id == Some(frame_id)))
    }

    pub fn child_item_with_target(&self, parent: ItemId, target: &str) -> Option<ItemId> {
        self.get(parent)?
            .children
            .iter()
            .copied()
            .find(|&c| self.get(c).is_some_and(|item| item.target == target))
    }

    /// First item in the tree rooted at `root` (preorder) created for `frame_id`.
    pub fn find_in_tree(&self, root: ItemId, frame_id: FrameId) -> Option<ItemId> {
        self.subtree(root)
            .into_iter()
            .find(|&id| self.get(id).is_some_and(|item| item.frame_id == Some(frame_id)))
    }

    /// Preorder ids of the tree rooted at `root`.
    pub fn subtree(&self, root: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(item) = self.get(id) else { continue };
            out.push(id);
            stack.extend(item.children.iter().rev().copied());
        }
        out
    }

    /// Two distinct items that stand for the same logical history entry.
    pub fn items_are_clones(&self, item1: ItemId, item2: Option<ItemId>) -> bool {
        match (self.get(item1), item2.and_then(|id| self.get(id))) {
            (Some(a), b) => items_are_clones(a, b),
            (None, _) => false,
        }
    }

    /// Whether moving from `other` to `item` can happen without loading a
    /// new document.
    pub fn should_do_same_document_navigation_to(&self, item: ItemId, other: ItemId) -> bool {
        if item == other {
            return false;
        }
        let (Some(a), Some(b)) = (self.get(item), self.get(other)) else {
            return false;
        };
        if a.has_state_object() || b.has_state_object() {
            return a.document_sequence_number == b.document_sequence_number;
        }
        if (has_fragment(&a.url) || has_fragment(&b.url)) && equal_ignoring_fragment(&a.url, &b.url)
        {
            return a.document_sequence_number == b.document_sequence_number;
        }
        self.has_same_document_tree(item, other)
    }

    /// Same document sequence numbers at every level, children matched by
    /// frame id.
    pub fn has_same_document_tree(&self, item: ItemId, other: ItemId) -> bool {
        let (Some(a), Some(b)) = (self.get(item), self.get(other)) else {
            return false;
        };
        if a.document_sequence_number != b.document_sequence_number
            || a.children.len() != b.children.len()
        {
            return false;
        }
        a.children.iter().all(|&child| {
            let matched = self
                .get(child)
                .and_then(|c| c.frame_id)
                .and_then(|fid| self.child_item_with_frame_id(other, fid));
            matched.is_some_and(|m| self.has_same_document_tree(child, m))
        })
    }

    /// Drop every item not in `live`. Returns the number removed.
    pub fn retain(&mut self, live: &HashSet<ItemId>) -> usize {
        let before = self.items.len();
        self.items.retain(|id, _| live.contains(id));
        before - self.items.len()
    }

    /// Mark `roots` and everything reachable through children.
    pub fn reachable_from(&self, roots: impl IntoIterator<Item = ItemId>) -> HashSet<ItemId> {
        let mut seen = HashSet::new();
        let mut stack: Vec<ItemId> = roots.into_iter().collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(item) = self.get(id) {
                stack.extend(item.children.iter().copied());
            }
        }
        seen
    }
}

/// Distinct items with equal item sequence numbers.
pub fn items_are_clones(item1: &HistoryItem, item2: Option<&HistoryItem>) -> bool {
    item2.is_some_and(|item2| {
        item1.id != item2.id && item1.item_sequence_number == item2.item_sequence_number
    })
}

pub(crate) fn has_fragment(url: &str) -> bool {
    url.contains('#')
}

pub(crate) fn equal_ignoring_fragment(a: &str, b: &str) -> bool {
    match (url::Url::parse(a), url::Url::parse(b)) {
        (Ok(mut a), Ok(mut b)) => {
            a.set_fragment(None);
            b.set_fragment(None);
            a == b
        }
        _ => strip_fragment(a) == strip_fragment(b),
    }
}

pub(crate) fn same_origin(a: &str, b: &str) -> bool {
    match (url::Url::parse(a), url::Url::parse(b)) {
        (Ok(a), Ok(b)) => a.origin() == b.origin() && a.origin().is_tuple(),
        _ => false,
    }
}

fn strip_fragment(url: &str) -> &str {
    url.split('#').next().unwrap_or(url)
}
