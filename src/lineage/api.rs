//! Derivation tracking over a page tree.

use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

use crate::error::{ArborError, ArborResult};
use crate::tree::TreeLeaf;
use crate::workspace::{Page, PageId, PageTree};

use super::types::DerivationContext;

/// Lineage operations scoped to one page tree.
///
/// Transitions return a new tree; the borrowed one is never touched.
pub struct LineageTracker<'a> {
    pages: &'a PageTree,
}

impl<'a> LineageTracker<'a> {
    pub fn new(pages: &'a PageTree) -> Self {
        Self { pages }
    }

    // === Transitions ===

    /// Record that `new` was derived from `source`.
    ///
    /// Both sides are updated in the returned tree: `new` points back at
    /// `source`, and `source` lists `new` once. If `new` previously named a
    /// different source, it is removed from that page's list. A missing
    /// `new` page leaves the tree unchanged; a missing `source` is recorded
    /// as a dangling reference. Deriving a page from itself or from one of
    /// its own derivatives is rejected.
    pub fn record_derivation(
        &self,
        source: &PageId,
        new: &PageId,
        context: &DerivationContext,
    ) -> ArborResult<PageTree> {
        let Some(page) = self.pages.leaf(new) else {
            return Ok(self.pages.clone());
        };
        if source == new || self.lineage_of(source).contains(new) {
            return Err(ArborError::cycle(new, source));
        }

        let previous = page.lineage.source_page_id.clone();
        let mut next = self.pages.clone();

        if let Some(prev) = previous.filter(|p| p != source) {
            if let Some(old_source) = next.leaf_mut(&prev) {
                old_source.lineage.generated_page_ids.retain(|g| g != new);
            }
        }
        if let Some(page) = next.leaf_mut(new) {
            page.lineage.source = context.source;
            page.lineage.source_page_id = Some(source.clone());
            page.lineage.source_context = context.context.clone();
            page.lineage.generated_at = Some(Utc::now());
        }
        match next.leaf_mut(source) {
            Some(source_page) => {
                if !source_page.lineage.generated_page_ids.contains(new) {
                    source_page.lineage.generated_page_ids.push(new.clone());
                }
            }
            None => warn!(page = %new, source = %source, "source page missing; lineage recorded as dangling"),
        }
        debug!(page = %new, source = %source, "recorded derivation");
        Ok(next)
    }

    /// Insert `page` and record it as derived from `source` in one step
    pub fn derive_page(&self, source: &PageId, page: Page, context: &DerivationContext) -> ArborResult<PageTree> {
        let id = page.id().clone();
        if self.pages.leaf(&id).is_some() {
            return Err(ArborError::precondition(format!("page {} already exists", id)));
        }
        let inserted = self.pages.insert_leaf(page);
        LineageTracker::new(&inserted).record_derivation(source, &id, context)
    }

    /// Delete a page without touching its lineage neighbours.
    ///
    /// Pages derived from it keep a dangling `source_page_id`; its source
    /// keeps the stale id in `generated_page_ids`.
    pub fn remove_page(&self, id: &PageId) -> PageTree {
        self.pages.remove_leaf(id)
    }

    /// Drop lineage references to pages that no longer exist.
    ///
    /// Returns the cleaned tree and the number of references removed.
    pub fn sweep_dangling(&self) -> (PageTree, usize) {
        let live: HashSet<PageId> = self.pages.leaves().map(|p| p.id.clone()).collect();
        let ids: Vec<PageId> = live.iter().cloned().collect();
        let mut next = self.pages.clone();
        let mut removed = 0;
        for id in ids {
            let Some(page) = next.leaf_mut(&id) else {
                continue;
            };
            let before = page.lineage.generated_page_ids.len();
            page.lineage.generated_page_ids.retain(|g| live.contains(g));
            removed += before - page.lineage.generated_page_ids.len();
            if page.lineage.source_page_id.as_ref().is_some_and(|s| !live.contains(s)) {
                page.lineage.source_page_id = None;
                removed += 1;
            }
        }
        if removed > 0 {
            warn!(removed, "swept dangling lineage references");
        }
        (next, removed)
    }

    // === Reads ===

    /// Live source chain of a page, nearest source first.
    ///
    /// Stops at a lineage root, a dangling source, or a repeated page.
    pub fn lineage_of(&self, id: &PageId) -> Vec<PageId> {
        let mut chain = Vec::new();
        let mut seen: HashSet<&PageId> = HashSet::from([id]);
        let mut current = self.pages.leaf(id);
        while let Some(page) = current {
            let Some(source) = page.lineage.source_page_id.as_ref() else {
                break;
            };
            if !seen.insert(source) {
                break;
            }
            current = self.pages.leaf(source);
            if current.is_some() {
                chain.push(source.clone());
            }
        }
        chain
    }

    /// The source id when it names a page that no longer exists
    pub fn dangling_source(&self, id: &PageId) -> Option<&'a PageId> {
        let source = self.pages.leaf(id)?.lineage.source_page_id.as_ref()?;
        match self.pages.leaf(source) {
            Some(_) => None,
            None => Some(source),
        }
    }

    /// Every live page transitively derived from `id`, breadth-first
    pub fn descendants(&self, id: &PageId) -> Vec<PageId> {
        let mut out = Vec::new();
        let mut seen: HashSet<&PageId> = HashSet::from([id]);
        let mut queue: VecDeque<&PageId> = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            let Some(page) = self.pages.leaf(current) else {
                continue;
            };
            for child in &page.lineage.generated_page_ids {
                if self.pages.leaf(child).is_some() && seen.insert(child) {
                    out.push(child.clone());
                    queue.push_back(child);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::LineageSource;

    fn pid(s: &str) -> PageId {
        PageId::from(s)
    }

    fn tree(ids: &[&str]) -> PageTree {
        ids.iter()
            .fold(PageTree::new(), |t, id| t.insert_leaf(Page::regular(id.to_uppercase(), "").with_id(*id)))
    }

    fn generated(t: &PageTree, id: &str) -> Vec<PageId> {
        t.leaf(&pid(id)).unwrap().lineage.generated_page_ids.clone()
    }

    #[test]
    fn derivation_is_symmetric() {
        let t = tree(&["a", "b"]);
        let ctx = DerivationContext::new(LineageSource::ObjectNode).with_context("Tortuga");
        let t = LineageTracker::new(&t).record_derivation(&pid("a"), &pid("b"), &ctx).unwrap();

        let b = t.leaf(&pid("b")).unwrap();
        assert_eq!(b.lineage.source_page_id, Some(pid("a")));
        assert_eq!(b.lineage.source, LineageSource::ObjectNode);
        assert_eq!(b.lineage.source_context.as_deref(), Some("Tortuga"));
        assert!(b.lineage.generated_at.is_some());
        assert_eq!(generated(&t, "a"), vec![pid("b")]);
    }

    #[test]
    fn recording_twice_does_not_duplicate() {
        let t = tree(&["a", "b"]);
        let ctx = DerivationContext::default();
        let t = LineageTracker::new(&t).record_derivation(&pid("a"), &pid("b"), &ctx).unwrap();
        let t = LineageTracker::new(&t).record_derivation(&pid("a"), &pid("b"), &ctx).unwrap();
        assert_eq!(generated(&t, "a"), vec![pid("b")]);
    }

    #[test]
    fn rederiving_moves_between_sources() {
        let t = tree(&["a", "b", "c"]);
        let ctx = DerivationContext::default();
        let t = LineageTracker::new(&t).record_derivation(&pid("a"), &pid("c"), &ctx).unwrap();
        let t = LineageTracker::new(&t).record_derivation(&pid("b"), &pid("c"), &ctx).unwrap();
        assert!(generated(&t, "a").is_empty());
        assert_eq!(generated(&t, "b"), vec![pid("c")]);
    }

    #[test]
    fn missing_new_page_is_noop_and_missing_source_dangles() {
        let t = tree(&["a"]);
        let ctx = DerivationContext::default();
        let same = LineageTracker::new(&t).record_derivation(&pid("a"), &pid("ghost"), &ctx).unwrap();
        assert_eq!(same, t);

        let dangling = LineageTracker::new(&t).record_derivation(&pid("gone"), &pid("a"), &ctx).unwrap();
        let tracker = LineageTracker::new(&dangling);
        assert_eq!(tracker.dangling_source(&pid("a")), Some(&pid("gone")));
        assert!(tracker.lineage_of(&pid("a")).is_empty());
    }

    #[test]
    fn lineage_cycles_are_rejected() {
        let t = tree(&["a", "b"]);
        let ctx = DerivationContext::default();
        let t = LineageTracker::new(&t).record_derivation(&pid("a"), &pid("b"), &ctx).unwrap();
        let tracker = LineageTracker::new(&t);
        assert!(matches!(
            tracker.record_derivation(&pid("b"), &pid("a"), &ctx),
            Err(ArborError::CycleDetected { .. })
        ));
        assert!(tracker.record_derivation(&pid("a"), &pid("a"), &ctx).is_err());
    }

    #[test]
    fn remove_page_does_not_cascade() {
        let t = tree(&["a"]);
        let ctx = DerivationContext::default();
        let t = LineageTracker::new(&t)
            .derive_page(&pid("a"), Page::regular("B", "").with_id("b"), &ctx)
            .unwrap();
        let t = LineageTracker::new(&t)
            .derive_page(&pid("b"), Page::regular("C", "").with_id("c"), &ctx)
            .unwrap();

        let after = LineageTracker::new(&t).remove_page(&pid("b"));
        assert!(after.leaf(&pid("c")).is_some());
        assert_eq!(generated(&after, "a"), vec![pid("b")]);

        let tracker = LineageTracker::new(&after);
        assert_eq!(tracker.dangling_source(&pid("c")), Some(&pid("b")));
        assert!(tracker.descendants(&pid("a")).is_empty());

        let (swept, removed) = tracker.sweep_dangling();
        assert_eq!(removed, 2);
        assert!(generated(&swept, "a").is_empty());
        assert!(swept.leaf(&pid("c")).unwrap().lineage.is_root());
    }

    #[test]
    fn chains_and_descendants() {
        let t = tree(&["a", "b", "c", "d"]);
        let ctx = DerivationContext::default();
        let t = LineageTracker::new(&t).record_derivation(&pid("a"), &pid("b"), &ctx).unwrap();
        let t = LineageTracker::new(&t).record_derivation(&pid("b"), &pid("c"), &ctx).unwrap();
        let t = LineageTracker::new(&t).record_derivation(&pid("a"), &pid("d"), &ctx).unwrap();

        let tracker = LineageTracker::new(&t);
        assert_eq!(tracker.lineage_of(&pid("c")), vec![pid("b"), pid("a")]);
        assert_eq!(tracker.descendants(&pid("a")), vec![pid("b"), pid("d"), pid("c")]);
    }

    #[test]
    fn derive_existing_page_is_precondition() {
        let t = tree(&["a", "b"]);
        let err = LineageTracker::new(&t)
            .derive_page(&pid("a"), Page::regular("B", "").with_id("b"), &DerivationContext::default())
            .unwrap_err();
        assert!(matches!(err, ArborError::Precondition(_)));
    }
}
