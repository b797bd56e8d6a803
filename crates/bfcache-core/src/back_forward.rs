//! The page's back/forward list.
//!
//! Entries are root items of item trees. Adding an entry drops every
//! forward entry and, once the list is full, the oldest entry.

use bfcache_types::{FrameId, ItemId};

use crate::item::ItemArena;

#[derive(Debug)]
pub struct BackForwardList {
    entries: Vec<ItemId>,
    current: Option<usize>,
    capacity: usize,
}

impl BackForwardList {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            current: None,
            capacity: capacity.max(1),
        }
    }

    /// Push a new entry after the current one. Returns the entries that
    /// fell off the list.
    pub fn add_item(&mut self, root: ItemId) -> Vec<ItemId> {
        let keep = self.current.map_or(0, |index| index + 1);
        let mut removed = self.entries.split_off(keep.min(self.entries.len()));
        self.entries.push(root);
        while self.entries.len() > self.capacity {
            removed.push(self.entries.remove(0));
        }
        self.current = Some(self.entries.len() - 1);
        if !removed.is_empty() {
            log::debug!("back/forward list dropped {} entries", removed.len());
        }
        removed
    }

    /// Make the entry containing `item` current. Returns false when no
    /// entry contains it.
    pub fn set_current_item(&mut self, items: &ItemArena, item: ItemId) -> bool {
        let index = self
            .entries
            .iter()
            .position(|&root| root == item)
            .or_else(|| {
                self.entries
                    .iter()
                    .position(|&root| items.subtree(root).contains(&item))
            });
        match index {
            Some(index) => {
                self.current = Some(index);
                true
            }
            None => {
                log::warn!("{item} is not in the back/forward list");
                false
            }
        }
    }

    /// Root item of the current entry.
    pub fn current_item(&self) -> Option<ItemId> {
        self.entries.get(self.current?).copied()
    }

    /// The current entry's item for `frame`.
    pub fn current_item_for_frame(&self, items: &ItemArena, frame: FrameId) -> Option<ItemId> {
        items.find_in_tree(self.current_item()?, frame)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn back_item(&self) -> Option<ItemId> {
        self.item_at_index(-1)
    }

    pub fn forward_item(&self) -> Option<ItemId> {
        self.item_at_index(1)
    }

    /// Entry `delta` steps away from the current one.
    pub fn item_at_index(&self, delta: i32) -> Option<ItemId> {
        let current = self.current? as i64;
        let index = usize::try_from(current + i64::from(delta)).ok()?;
        self.entries.get(index).copied()
    }

    pub fn back_count(&self) -> usize {
        self.current.unwrap_or(0)
    }

    pub fn forward_count(&self) -> usize {
        match self.current {
            Some(index) => self.entries.len() - index - 1,
            None => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Every entry, oldest first.
    pub fn all_items(&self) -> &[ItemId] {
        &self.entries
    }

    pub fn contains(&self, root: ItemId) -> bool {
        self.entries.contains(&root)
    }

    /// Attach `child` under `parent` within an existing entry.
    pub fn set_child_item(&self, items: &mut ItemArena, parent: ItemId, child: ItemId) {
        items.set_child_item(parent, child);
    }

    pub fn clear(&mut self) -> Vec<ItemId> {
        self.current = None;
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bfcache_types::IdGenerator;

    fn roots(n: usize) -> (ItemArena, IdGenerator, Vec<ItemId>) {
        let ids = IdGenerator::new();
        let mut arena = ItemArena::new();
        let items = (0..n).map(|_| arena.create(&ids)).collect();
        (arena, ids, items)
    }

    #[test]
    fn add_item_truncates_forward_entries() {
        let (arena, _, items) = roots(4);
        let mut list = BackForwardList::new(10);
        list.add_item(items[0]);
        list.add_item(items[1]);
        list.add_item(items[2]);
        assert!(list.set_current_item(&arena, items[0]));
        let removed = list.add_item(items[3]);
        assert_eq!(removed, vec![items[1], items[2]]);
        assert_eq!(list.all_items(), &[items[0], items[3]]);
        assert_eq!(list.current_item(), Some(items[3]));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let (_, _, items) = roots(3);
        let mut list = BackForwardList::new(2);
        list.add_item(items[0]);
        list.add_item(items[1]);
        let removed = list.add_item(items[2]);
        assert_eq!(removed, vec![items[0]]);
        assert_eq!(list.all_items(), &[items[1], items[2]]);
        assert_eq!(list.current_index(), Some(1));
    }

    #[test]
    fn back_and_forward_lookup() {
        let (arena, _, items) = roots(3);
        let mut list = BackForwardList::new(10);
        for &item in &items {
            list.add_item(item);
        }
        assert_eq!(list.back_item(), Some(items[1]));
        assert_eq!(list.forward_item(), None);
        assert_eq!(list.item_at_index(-2), Some(items[0]));
        assert_eq!(list.item_at_index(-3), None);
        list.set_current_item(&arena, items[1]);
        assert_eq!(list.forward_item(), Some(items[2]));
        assert_eq!(list.back_count(), 1);
        assert_eq!(list.forward_count(), 1);
    }

    #[test]
    fn current_item_for_subframe() {
        let (mut arena, ids, items) = roots(1);
        let child = arena.create(&ids);
        arena.get_mut(child).unwrap().frame_id = Some(FrameId(7));
        arena.get_mut(items[0]).unwrap().frame_id = Some(FrameId(1));
        arena.add_child(items[0], child);
        let mut list = BackForwardList::new(10);
        list.add_item(items[0]);
        assert_eq!(list.current_item_for_frame(&arena, FrameId(7)), Some(child));
        assert_eq!(list.current_item_for_frame(&arena, FrameId(1)), Some(items[0]));
        assert_eq!(list.current_item_for_frame(&arena, FrameId(8)), None);
    }

    #[test]
    fn set_current_item_accepts_child_items() {
        let (mut arena, ids, items) = roots(2);
        let child = arena.create(&ids);
        arena.add_child(items[0], child);
        let mut list = BackForwardList::new(10);
        list.add_item(items[0]);
        list.add_item(items[1]);
        assert!(list.set_current_item(&arena, child));
        assert_eq!(list.current_item(), Some(items[0]));
        assert!(!list.set_current_item(&arena, ItemId(999)));
    }

    #[test]
    fn empty_list() {
        let list = BackForwardList::new(0);
        assert_eq!(list.capacity(), 1);
        assert!(list.current_item().is_none());
        assert!(list.back_item().is_none());
        assert_eq!(list.forward_count(), 0);
    }
}
