//! TreeSnapshot: an immutable ordered tree of folders and leaves
//!
//! Every transition takes `&self` and returns a new snapshot. Transitions
//! that reference a missing id return an unchanged copy.

use super::folder::{DeletePolicy, Folder, FolderId, TreeItem, TreeLeaf};
use crate::error::{ArborError, ArborResult};
use crate::order::{self, OrderKey, ORDER_STEP};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Folders and leaves of one tree.
///
/// Folders and leaves under the same parent form a single sibling set that
/// shares one key space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "", rename_all = "camelCase")]
pub struct TreeSnapshot<L: TreeLeaf> {
    #[serde(default)]
    folders: HashMap<FolderId, Folder>,
    #[serde(default)]
    leaves: HashMap<L::Id, L>,
}

impl<L: TreeLeaf> Default for TreeSnapshot<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: TreeLeaf> TreeSnapshot<L> {
    /// Create an empty tree
    pub fn new() -> Self {
        Self {
            folders: HashMap::new(),
            leaves: HashMap::new(),
        }
    }

    // === Reads ===

    pub fn folder(&self, id: &FolderId) -> Option<&Folder> {
        self.folders.get(id)
    }

    pub fn leaf(&self, id: &L::Id) -> Option<&L> {
        self.leaves.get(id)
    }

    pub fn folders(&self) -> impl Iterator<Item = &Folder> {
        self.folders.values()
    }

    pub fn leaves(&self) -> impl Iterator<Item = &L> {
        self.leaves.values()
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Check whether the referenced folder or leaf exists
    pub fn contains(&self, item: &TreeItem<L::Id>) -> bool {
        match item {
            TreeItem::Folder(id) => self.folders.contains_key(id),
            TreeItem::Leaf(id) => self.leaves.contains_key(id),
        }
    }

    /// Parent of an item: `None` if the item is missing, `Some(None)` at root level
    pub fn parent_of(&self, item: &TreeItem<L::Id>) -> Option<Option<FolderId>> {
        match item {
            TreeItem::Folder(id) => self.folders.get(id).map(|f| f.parent_id.clone()),
            TreeItem::Leaf(id) => self.leaves.get(id).map(|l| l.folder_id().cloned()),
        }
    }

    pub fn order_of(&self, item: &TreeItem<L::Id>) -> Option<OrderKey> {
        match item {
            TreeItem::Folder(id) => self.folders.get(id).map(|f| f.order),
            TreeItem::Leaf(id) => self.leaves.get(id).map(|l| l.order()),
        }
    }

    /// Sibling set under `parent` with keys, ascending
    ///
    /// Equal keys (only possible in hand-built snapshots) are tie-broken by
    /// item so the listing stays deterministic.
    pub fn children_with_keys(&self, parent: Option<&FolderId>) -> Vec<(TreeItem<L::Id>, OrderKey)> {
        let folders = self
            .folders
            .values()
            .filter(|f| f.parent_id.as_ref() == parent)
            .map(|f| (TreeItem::Folder(f.id.clone()), f.order));
        let leaves = self
            .leaves
            .values()
            .filter(|l| l.folder_id() == parent)
            .map(|l| (TreeItem::Leaf(l.id().clone()), l.order()));

        let mut children: Vec<_> = folders.chain(leaves).collect();
        children.sort_by(|(a, ka), (b, kb)| ka.cmp(kb).then_with(|| a.cmp(b)));
        children
    }

    /// Sibling set under `parent`, in display order
    pub fn children(&self, parent: Option<&FolderId>) -> Vec<TreeItem<L::Id>> {
        self.children_with_keys(parent)
            .into_iter()
            .map(|(item, _)| item)
            .collect()
    }

    /// Leaves directly inside `folder` (root level for `None`), in display order
    pub fn leaves_in(&self, folder: Option<&FolderId>) -> Vec<&L> {
        self.children(folder)
            .into_iter()
            .filter_map(|item| match item {
                TreeItem::Leaf(id) => self.leaves.get(&id),
                TreeItem::Folder(_) => None,
            })
            .collect()
    }

    /// Ancestors of a folder, nearest first
    pub fn ancestors(&self, id: &FolderId) -> Vec<FolderId> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.folders.get(id).and_then(|f| f.parent_id.clone());
        while let Some(parent) = current {
            if !seen.insert(parent.clone()) {
                break;
            }
            current = self.folders.get(&parent).and_then(|f| f.parent_id.clone());
            chain.push(parent);
        }
        chain
    }

    /// All folders nested anywhere below `id` (not including `id`)
    pub fn descendant_folders(&self, id: &FolderId) -> Vec<FolderId> {
        let mut out = Vec::new();
        let mut stack = vec![id.clone()];
        let mut seen: HashSet<FolderId> = HashSet::from([id.clone()]);
        while let Some(current) = stack.pop() {
            for folder in self.folders.values() {
                if folder.parent_id.as_ref() == Some(&current) && seen.insert(folder.id.clone()) {
                    out.push(folder.id.clone());
                    stack.push(folder.id.clone());
                }
            }
        }
        out.sort();
        out
    }

    /// True if `candidate` is `ancestor` or sits somewhere below it.
    ///
    /// Walks the parent chain of `candidate`; O(depth).
    pub fn is_within(&self, candidate: &FolderId, ancestor: &FolderId) -> bool {
        if candidate == ancestor {
            return true;
        }
        self.ancestors(candidate).iter().any(|a| a == ancestor)
    }

    // === Folder transitions ===

    /// Create a folder appended after the last sibling under `parent`.
    ///
    /// A parent that does not exist degrades to root level.
    pub fn create_folder(&self, name: impl Into<String>, parent: Option<&FolderId>) -> (Self, FolderId) {
        let id = FolderId::new();
        (self.create_folder_with_id(id.clone(), name, parent), id)
    }

    /// Like [`create_folder`](Self::create_folder) with a caller-chosen id.
    /// An id that is already taken leaves the tree unchanged.
    pub fn create_folder_with_id(
        &self,
        id: FolderId,
        name: impl Into<String>,
        parent: Option<&FolderId>,
    ) -> Self {
        if self.folders.contains_key(&id) {
            return self.clone();
        }
        let parent = parent.filter(|p| self.folders.contains_key(*p)).cloned();

        let mut next = self.clone();
        let mut folder = Folder::with_id(id.clone(), name);
        folder.order = next.next_append_key(parent.as_ref());
        folder.parent_id = parent;
        debug!(folder = %id, "created folder");
        next.folders.insert(id, folder);
        next
    }

    pub fn rename_folder(&self, id: &FolderId, name: impl Into<String>) -> Self {
        let mut next = self.clone();
        if let Some(folder) = next.folders.get_mut(id) {
            folder.name = name.into();
        }
        next
    }

    pub fn set_folder_expanded(&self, id: &FolderId, expanded: bool) -> Self {
        let mut next = self.clone();
        if let Some(folder) = next.folders.get_mut(id) {
            folder.expanded = expanded;
        }
        next
    }

    pub fn toggle_folder(&self, id: &FolderId) -> Self {
        match self.folders.get(id) {
            Some(folder) => self.set_folder_expanded(id, !folder.expanded),
            None => self.clone(),
        }
    }

    /// Delete a folder.
    ///
    /// With [`DeletePolicy::Flatten`] the folder's direct children (folders
    /// and leaves) move to the deleted folder's parent, appended after the
    /// existing siblings in their previous relative order. With
    /// [`DeletePolicy::Cascade`] every nested folder and leaf is removed.
    pub fn delete_folder(&self, id: &FolderId, policy: DeletePolicy) -> Self {
        let Some(folder) = self.folders.get(id) else {
            return self.clone();
        };
        let parent = folder.parent_id.clone();
        let mut next = self.clone();

        match policy {
            DeletePolicy::Flatten => {
                let children = self.children(Some(id));
                next.folders.remove(id);
                for child in &children {
                    let key = next.next_append_key(parent.as_ref());
                    next.place(child, parent.clone(), key);
                }
                debug!(folder = %id, moved = children.len(), "deleted folder, contents flattened");
            }
            DeletePolicy::Cascade => {
                let mut doomed: HashSet<FolderId> = self.descendant_folders(id).into_iter().collect();
                doomed.insert(id.clone());
                next.folders.retain(|fid, _| !doomed.contains(fid));
                next.leaves
                    .retain(|_, leaf| leaf.folder_id().map_or(true, |f| !doomed.contains(f)));
                debug!(folder = %id, folders = doomed.len(), "deleted folder subtree");
            }
        }
        next
    }

    /// Remove every leaf directly inside the folder; sub-folders are kept.
    pub fn clear_folder(&self, id: &FolderId) -> Self {
        if !self.folders.contains_key(id) {
            return self.clone();
        }
        let mut next = self.clone();
        next.leaves.retain(|_, leaf| leaf.folder_id() != Some(id));
        next
    }

    /// Move a folder under `target` (root level for `None`) at `order`.
    ///
    /// Rejects with [`ArborError::CycleDetected`] when `target` is the folder
    /// itself or any of its descendants. The check walks the target's
    /// ancestor chain before anything is changed.
    pub fn move_folder(
        &self,
        id: &FolderId,
        target: Option<&FolderId>,
        order: OrderKey,
    ) -> ArborResult<Self> {
        if !self.folders.contains_key(id) {
            return Ok(self.clone());
        }
        if let Some(target) = target {
            if target == id {
                return Err(ArborError::cycle(id, target));
            }
            if !self.folders.contains_key(target) {
                return Ok(self.clone());
            }
            if self.is_within(target, id) {
                return Err(ArborError::cycle(id, target));
            }
        }

        let item = TreeItem::Folder(id.clone());
        let mut next = self.clone();
        next.place(&item, target.cloned(), order);
        next.repair_collisions(target, &item);
        Ok(next)
    }

    /// Assign fresh keys under `parent` following `ordered`.
    ///
    /// Items that are not children of `parent` are ignored; children missing
    /// from `ordered` keep their relative order after the listed ones.
    pub fn reorder_siblings(&self, parent: Option<&FolderId>, ordered: &[TreeItem<L::Id>]) -> Self {
        let current = self.children(parent);
        let mut sequence: Vec<TreeItem<L::Id>> = Vec::with_capacity(current.len());
        for item in ordered {
            if current.contains(item) && !sequence.contains(item) {
                sequence.push(item.clone());
            }
        }
        for item in current {
            if !sequence.contains(&item) {
                sequence.push(item);
            }
        }

        let mut next = self.clone();
        for (item, key) in sequence.iter().zip(order::renumber(sequence.len())) {
            next.set_key(item, key);
        }
        next
    }

    // === Leaf transitions ===

    /// Insert a leaf after the last sibling in its folder.
    ///
    /// The leaf's own order key is replaced. A folder that does not exist
    /// degrades to root level; an id that is already present leaves the tree
    /// unchanged.
    pub fn insert_leaf(&self, mut leaf: L) -> Self {
        if self.leaves.contains_key(leaf.id()) {
            return self.clone();
        }
        let folder = leaf
            .folder_id()
            .filter(|f| self.folders.contains_key(*f))
            .cloned();

        let mut next = self.clone();
        let key = next.next_append_key(folder.as_ref());
        leaf.set_folder_id(folder);
        leaf.set_order(key);
        next.leaves.insert(leaf.id().clone(), leaf);
        next
    }

    pub fn remove_leaf(&self, id: &L::Id) -> Self {
        let mut next = self.clone();
        next.leaves.remove(id);
        next
    }

    /// Apply `edit` to a leaf's payload.
    ///
    /// Placement (folder and order key) is restored afterwards; use
    /// [`move_leaf`](Self::move_leaf) to relocate.
    pub fn update_leaf(&self, id: &L::Id, edit: impl FnOnce(&mut L)) -> Self {
        let mut next = self.clone();
        if let Some(leaf) = next.leaves.get_mut(id) {
            let folder = leaf.folder_id().cloned();
            let key = leaf.order();
            edit(leaf);
            leaf.set_folder_id(folder);
            leaf.set_order(key);
        }
        next
    }

    /// Move a leaf into `target` (root level for `None`) at `order`.
    ///
    /// Leaves cannot be ancestors, so no cycle check is needed.
    pub fn move_leaf(&self, id: &L::Id, target: Option<&FolderId>, order: OrderKey) -> Self {
        if !self.leaves.contains_key(id) {
            return self.clone();
        }
        if let Some(target) = target {
            if !self.folders.contains_key(target) {
                return self.clone();
            }
        }

        let item = TreeItem::Leaf(id.clone());
        let mut next = self.clone();
        next.place(&item, target.cloned(), order);
        next.repair_collisions(target, &item);
        next
    }

    /// Move either kind of item; folders get the cycle check.
    pub fn move_item(
        &self,
        item: &TreeItem<L::Id>,
        target: Option<&FolderId>,
        order: OrderKey,
    ) -> ArborResult<Self> {
        match item {
            TreeItem::Folder(id) => self.move_folder(id, target, order),
            TreeItem::Leaf(id) => Ok(self.move_leaf(id, target, order)),
        }
    }

    pub(crate) fn leaf_mut(&mut self, id: &L::Id) -> Option<&mut L> {
        self.leaves.get_mut(id)
    }

    // === Internal helpers (operate on a private copy) ===

    fn set_key(&mut self, item: &TreeItem<L::Id>, key: OrderKey) {
        match item {
            TreeItem::Folder(id) => {
                if let Some(folder) = self.folders.get_mut(id) {
                    folder.order = key;
                }
            }
            TreeItem::Leaf(id) => {
                if let Some(leaf) = self.leaves.get_mut(id) {
                    leaf.set_order(key);
                }
            }
        }
    }

    fn place(&mut self, item: &TreeItem<L::Id>, parent: Option<FolderId>, key: OrderKey) {
        match item {
            TreeItem::Folder(id) => {
                if let Some(folder) = self.folders.get_mut(id) {
                    folder.parent_id = parent;
                    folder.order = key;
                }
            }
            TreeItem::Leaf(id) => {
                if let Some(leaf) = self.leaves.get_mut(id) {
                    leaf.set_folder_id(parent);
                    leaf.set_order(key);
                }
            }
        }
    }

    /// Key after the last sibling under `parent`, renumbering the set if the
    /// last key has no representable successor.
    fn next_append_key(&mut self, parent: Option<&FolderId>) -> OrderKey {
        let keys: Vec<OrderKey> = self
            .children_with_keys(parent)
            .into_iter()
            .map(|(_, k)| k)
            .collect();
        match order::append(&keys) {
            Some(key) => key,
            None => {
                warn!(parent = ?parent, "order keys exhausted on append, renumbering siblings");
                let count = self.renumber_set(parent, None);
                OrderKey::new((count + 1) as f64 * ORDER_STEP)
            }
        }
    }

    /// Renumber the sibling set under `parent`, keeping the current order.
    /// Among equal keys, `first` (if given) sorts ahead of the others.
    fn renumber_set(&mut self, parent: Option<&FolderId>, first: Option<&TreeItem<L::Id>>) -> usize {
        let mut siblings = self.children_with_keys(parent);
        siblings.sort_by(|(a, ka), (b, kb)| {
            ka.cmp(kb)
                .then_with(|| (Some(b) == first).cmp(&(Some(a) == first)))
                .then_with(|| a.cmp(b))
        });
        let count = siblings.len();
        for ((item, _), key) in siblings.iter().zip(order::renumber(count)) {
            self.set_key(item, key);
        }
        count
    }

    /// Restore pairwise-distinct keys after `moved` landed under `parent`.
    fn repair_collisions(&mut self, parent: Option<&FolderId>, moved: &TreeItem<L::Id>) {
        let keys: Vec<OrderKey> = self
            .children_with_keys(parent)
            .into_iter()
            .map(|(_, k)| k)
            .collect();
        if !order::is_strictly_ascending(&keys) {
            warn!(item = %moved, "order key collision, renumbering siblings");
            self.renumber_set(parent, Some(moved));
        }
    }
}
