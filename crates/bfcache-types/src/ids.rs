//! Identifiers and the injected id generator.
//!
//! Every history item, frame and document is addressed by a small `Copy`
//! id. Ids and sequence numbers come from an [`IdGenerator`] owned by the
//! page rather than from process-wide statics, so tests can reproduce the
//! exact numbering of a session.

use std::cell::Cell;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one history item (one node of an item tree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

/// Identity of one frame in a page's frame tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameId(pub u64);

/// Identity of one document instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// Monotonic source of ids and sequence numbers.
///
/// Item ids, frame ids, document ids and sequence numbers use independent
/// counters. Item and document sequence numbers share one counter so that a
/// fresh document sequence number never collides with an item sequence
/// number handed out earlier.
#[derive(Debug)]
pub struct IdGenerator {
    next_item: Cell<u64>,
    next_frame: Cell<u64>,
    next_document: Cell<u64>,
    next_sequence: Cell<u64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create a generator whose counters all start at `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next_item: Cell::new(first),
            next_frame: Cell::new(first),
            next_document: Cell::new(first),
            next_sequence: Cell::new(first),
        }
    }

    pub fn next_item_id(&self) -> ItemId {
        ItemId(bump(&self.next_item))
    }

    pub fn next_frame_id(&self) -> FrameId {
        FrameId(bump(&self.next_frame))
    }

    pub fn next_document_id(&self) -> DocumentId {
        DocumentId(bump(&self.next_document))
    }

    /// Next item or document sequence number.
    pub fn next_sequence_number(&self) -> u64 {
        bump(&self.next_sequence)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn bump(counter: &Cell<u64>) -> u64 {
    let value = counter.get();
    counter.set(value + 1);
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_independent() {
        let ids = IdGenerator::new();
        assert_eq!(ids.next_item_id(), ItemId(1));
        assert_eq!(ids.next_item_id(), ItemId(2));
        assert_eq!(ids.next_frame_id(), FrameId(1));
        assert_eq!(ids.next_document_id(), DocumentId(1));
        assert_eq!(ids.next_sequence_number(), 1);
        assert_eq!(ids.next_sequence_number(), 2);
        assert_eq!(ids.next_item_id(), ItemId(3));
    }

    #[test]
    fn starting_at_offsets_every_counter() {
        let ids = IdGenerator::starting_at(100);
        assert_eq!(ids.next_item_id(), ItemId(100));
        assert_eq!(ids.next_frame_id(), FrameId(100));
        assert_eq!(ids.next_document_id(), DocumentId(100));
        assert_eq!(ids.next_sequence_number(), 100);
    }

    #[test]
    fn display_formats() {
        assert_eq!(ItemId(4).to_string(), "item#4");
        assert_eq!(FrameId(2).to_string(), "frame#2");
        assert_eq!(DocumentId(9).to_string(), "doc#9");
    }

    #[test]
    fn ids_serde_roundtrip() {
        let json = serde_json::to_string(&ItemId(42)).unwrap();
        assert_eq!(json, "42");
        let back: ItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ItemId(42));
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn item_ids_strictly_increase(start in 0u64..1_000_000, n in 1usize..64) {
                let ids = IdGenerator::starting_at(start);
                let mut last = None;
                for _ in 0..n {
                    let id = ids.next_item_id();
                    if let Some(prev) = last {
                        prop_assert!(id > prev);
                    }
                    last = Some(id);
                }
            }
        }
    }
}
