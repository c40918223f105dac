//! Drag-and-drop placement expressed as folder/leaf moves
//!
//! A drop either lands *into* a folder or *at a gap* next to a sibling. Both
//! reduce to a target parent plus an order key derived from the neighbours at
//! the insertion point.

use super::folder::{FolderId, TreeItem, TreeLeaf};
use super::store::TreeSnapshot;
use crate::error::ArborResult;
use crate::order::{self, OrderKey, ORDER_STEP};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Where a dragged item was released
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DropTarget<I> {
    /// Onto a folder: becomes its first child when the folder is expanded,
    /// otherwise its last child.
    IntoFolder { folder: FolderId },
    /// Between siblings: before `target` when `position < 0`, after it otherwise.
    Gap { target: TreeItem<I>, position: i32 },
}

impl<L: TreeLeaf> TreeSnapshot<L> {
    /// Apply a drop of `item` onto `target`.
    ///
    /// Missing items or targets leave the tree unchanged. Dropping a folder
    /// into itself or one of its descendants is rejected with `CycleDetected`.
    pub fn drop_item(&self, item: &TreeItem<L::Id>, target: &DropTarget<L::Id>) -> ArborResult<Self> {
        let Some((parent, index)) = self.drop_slot(item, target) else {
            return Ok(self.clone());
        };
        let (base, key) = self.gap_key(parent.as_ref(), item, index);
        base.move_item(item, parent.as_ref(), key)
    }

    /// Target parent and insertion index (among siblings other than `item`).
    fn drop_slot(
        &self,
        item: &TreeItem<L::Id>,
        target: &DropTarget<L::Id>,
    ) -> Option<(Option<FolderId>, usize)> {
        if !self.contains(item) {
            return None;
        }
        match target {
            DropTarget::IntoFolder { folder } => {
                let expanded = self.folder(folder)?.expanded;
                let index = if expanded {
                    0
                } else {
                    self.siblings_excluding(Some(folder), item).len()
                };
                Some((Some(folder.clone()), index))
            }
            DropTarget::Gap { target, position } => {
                if target == item {
                    return None;
                }
                let parent = self.parent_of(target)?;
                let siblings = self.siblings_excluding(parent.as_ref(), item);
                let at = siblings.iter().position(|(i, _)| i == target)?;
                let index = if *position < 0 { at } else { at + 1 };
                Some((parent, index))
            }
        }
    }

    fn siblings_excluding(
        &self,
        parent: Option<&FolderId>,
        item: &TreeItem<L::Id>,
    ) -> Vec<(TreeItem<L::Id>, OrderKey)> {
        self.children_with_keys(parent)
            .into_iter()
            .filter(|(i, _)| i != item)
            .collect()
    }

    /// Key for inserting at `index` under `parent`.
    ///
    /// When the gap has no representable midpoint the sibling set is
    /// renumbered first; the returned snapshot carries those new keys.
    fn gap_key(&self, parent: Option<&FolderId>, item: &TreeItem<L::Id>, index: usize) -> (Self, OrderKey) {
        let siblings = self.siblings_excluding(parent, item);
        let keys: Vec<OrderKey> = siblings.iter().map(|(_, k)| *k).collect();
        if let Some(key) = order::insertion_key(&keys, index) {
            return (self.clone(), key);
        }

        warn!(item = %item, index, "order keys exhausted at drop point, renumbering siblings");
        let ordered: Vec<TreeItem<L::Id>> = siblings.into_iter().map(|(i, _)| i).collect();
        let renumbered = self.reorder_siblings(parent, &ordered);
        let keys = order::renumber(ordered.len());
        let key = order::insertion_key(&keys, index)
            .unwrap_or_else(|| OrderKey::new((index as f64 + 0.5) * ORDER_STEP));
        (renumbered, key)
    }
}
