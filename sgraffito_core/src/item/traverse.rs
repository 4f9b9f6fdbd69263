// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use super::id::{INVALID, ItemId};
use super::store::DrawingStore;

/// An iterator over the direct children of an item, in paint order.
///
/// Created by [`DrawingStore::children`].
#[derive(Debug)]
pub struct Children<'a> {
    store: &'a DrawingStore,
    current: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(store: &'a DrawingStore, first: u32) -> Self {
        Self {
            store,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = ItemId;

    fn next(&mut self) -> Option<ItemId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.store.next_sibling[idx as usize];
        Some(ItemId {
            idx,
            generation: self.store.generation[idx as usize],
        })
    }
}

/// Iterates raw child slots in reverse paint order (topmost first).
///
/// Used by the pick traversal, which scans topmost children first.
#[derive(Debug)]
pub(crate) struct ChildrenRev<'a> {
    store: &'a DrawingStore,
    current: u32,
}

impl<'a> ChildrenRev<'a> {
    pub(crate) fn new(store: &'a DrawingStore, parent: u32) -> Self {
        // Walk to the last (topmost) child once; then follow prev links.
        let mut last = store.first_child[parent as usize];
        if last != INVALID {
            while store.next_sibling[last as usize] != INVALID {
                last = store.next_sibling[last as usize];
            }
        }
        Self {
            store,
            current: last,
        }
    }
}

impl Iterator for ChildrenRev<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.store.prev_sibling[idx as usize];
        Some(idx)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use crate::item::ItemKind;

    use super::*;

    #[test]
    fn reverse_iteration_is_topmost_first() {
        let mut store = DrawingStore::new();
        let parent = store.create_item(ItemKind::group());
        let a = store.create_item(ItemKind::group());
        let b = store.create_item(ItemKind::group());
        let c = store.create_item(ItemKind::group());
        store.add_child(parent, a);
        store.add_child(parent, b);
        store.add_child(parent, c);

        let fwd: Vec<_> = store.children(parent).map(ItemId::index).collect();
        let rev: Vec<_> = ChildrenRev::new(&store, parent.index()).collect();
        assert_eq!(fwd, vec![a.index(), b.index(), c.index()]);
        assert_eq!(rev, vec![c.index(), b.index(), a.index()]);
    }

    #[test]
    fn empty_group_yields_nothing() {
        let mut store = DrawingStore::new();
        let parent = store.create_item(ItemKind::group());
        assert!(store.children(parent).next().is_none());
        assert!(ChildrenRev::new(&store, parent.index()).next().is_none());
    }
}
