#![forbid(unsafe_code)]

//! Keeps materialized item views aligned with an [`ObservableList`].
//!
//! The list reports every structural change with the affected index range
//! and its length afterwards. [`ListBinding`] queues those changes and
//! applies them on [`ListBinding::sync`], patching the view tree when its own
//! bookkeeping agrees with the change and rebuilding from the current
//! contents when it does not.
//!
//! # Invariants
//!
//! 1. After every successful `sync`, `views().len() == source().len()` and
//!    the view at index *i* carries `source()[i]` in its `Item` field.
//! 2. Materialized views are children of the container, in index order
//!    relative to one another.
//! 3. `SortIndex` values handed out by the counter never repeat for the
//!    lifetime of the binding.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Change disagrees with view count or bound items | full rebuild |
//! | Last queued change leaves bound items unequal to the source | full rebuild |
//! | Malformed change (`start > end`) | full rebuild |
//! | Container destroyed | binding detaches; changes are dropped |
//! | Template destroyed | `sync` returns the tree error |

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use mbind_core::{ObjectRef, Value};
use mbind_runtime::{ListChange, ObservableList, Subscription, ViewId, ViewTree};

use crate::error::ListError;
use crate::list::fields;

/// Computes a view's `SortIndex` from its item.
pub type SortKey<T> = Rc<dyn Fn(&T) -> i64>;

/// How a change was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Incremental,
    Rebuilt,
    Cleared,
}

/// Counters for applied changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub incremental: usize,
    pub rebuilds: usize,
    pub clears: usize,
}

/// Binding between one [`ObservableList`] and the item views under a
/// container.
pub struct ListBinding<T> {
    source: ObservableList<T>,
    container: ViewId,
    template: ViewId,
    pending: Rc<RefCell<VecDeque<ListChange<T>>>>,
    subscription: Option<Subscription>,
    views: Vec<ViewId>,
    items: Vec<T>,
    sort_key: Option<SortKey<T>>,
    next_sort_index: i64,
    stats: ReconcileStats,
}

impl<T: Clone + PartialEq + 'static> ListBinding<T> {
    /// Subscribe to `source` and materialize its current contents.
    pub fn attach(
        tree: &mut ViewTree,
        source: ObservableList<T>,
        container: ViewId,
        template: ViewId,
        sort_key: Option<SortKey<T>>,
    ) -> Result<Self, ListError> {
        if !tree.contains(container) {
            return Err(ListError::UnknownList(container));
        }
        let pending = Rc::new(RefCell::new(VecDeque::new()));
        let queue = Rc::clone(&pending);
        let subscription = source.subscribe(move |change: &ListChange<T>| {
            queue.borrow_mut().push_back(change.clone());
        });
        let mut binding = Self {
            source,
            container,
            template,
            pending,
            subscription: Some(subscription),
            views: Vec::new(),
            items: Vec::new(),
            sort_key,
            next_sort_index: 0,
            stats: ReconcileStats::default(),
        };
        binding.rebuild(tree)?;
        Ok(binding)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn source(&self) -> &ObservableList<T> {
        &self.source
    }

    #[must_use]
    pub fn container(&self) -> ViewId {
        self.container
    }

    #[must_use]
    pub fn template(&self) -> ViewId {
        self.template
    }

    /// Materialized views in collection order.
    #[must_use]
    pub fn views(&self) -> &[ViewId] {
        &self.views
    }

    /// Items bound to [`views`](Self::views), index for index.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    #[must_use]
    pub fn view_at(&self, index: usize) -> Option<ViewId> {
        self.views.get(index).copied()
    }

    #[must_use]
    pub fn item_at(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    #[must_use]
    pub fn index_of_view(&self, view: ViewId) -> Option<usize> {
        self.views.iter().position(|&v| v == view)
    }

    #[must_use]
    pub fn index_of_item(&self, item: &T) -> Option<usize> {
        self.items.iter().position(|i| i == item)
    }

    #[must_use]
    pub fn stats(&self) -> ReconcileStats {
        self.stats
    }

    /// Changes received but not applied yet.
    #[must_use]
    pub fn pending_changes(&self) -> usize {
        self.pending.borrow().len()
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn set_sort_key(&mut self, sort_key: Option<SortKey<T>>) {
        self.sort_key = sort_key;
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Apply every queued change. Returns how many were applied.
    pub fn sync(&mut self, tree: &mut ViewTree) -> Result<usize, ListError> {
        if !self.is_attached() {
            return Ok(0);
        }
        if !tree.contains(self.container) {
            tracing::debug!(list = ?self.container, "list container destroyed; binding detached");
            self.release();
            return Ok(0);
        }
        let mut applied = 0;
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(change) = next else {
                break;
            };
            self.on_collection_changed(tree, &change)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Apply one change, patching when the bookkeeping agrees with it.
    ///
    /// [`sync`](Self::sync) calls this for every queued change; calling it
    /// directly with a change that is also queued applies it twice.
    pub fn on_collection_changed(
        &mut self,
        tree: &mut ViewTree,
        change: &ListChange<T>,
    ) -> Result<Reconciled, ListError> {
        let m = self.views.len();
        let outcome = match change {
            ListChange::Added { start, items, len, .. } => {
                let fits = len.checked_sub(items.len()) == Some(m) && *start <= m;
                if fits {
                    for (k, item) in items.iter().enumerate() {
                        self.insert_view(tree, start + k, item)?;
                    }
                    Reconciled::Incremental
                } else {
                    self.rebuild(tree)?;
                    Reconciled::Rebuilt
                }
            }
            ListChange::Removed {
                start,
                end,
                items,
                len,
            } => {
                let fits = m == *len + items.len()
                    && *start <= *end
                    && *end < m
                    && self.items[*start..=*end] == items[..];
                if fits {
                    for index in (*start..=*end).rev() {
                        self.remove_view(tree, index);
                    }
                    Reconciled::Incremental
                } else {
                    self.rebuild(tree)?;
                    Reconciled::Rebuilt
                }
            }
            ListChange::Replaced { index, item, len } => {
                if *index < m && m == *len {
                    self.items[*index] = item.clone();
                    self.bind_item(tree, self.views[*index], item, None)?;
                    Reconciled::Incremental
                } else {
                    self.rebuild(tree)?;
                    Reconciled::Rebuilt
                }
            }
            ListChange::Cleared => {
                self.destroy_all(tree);
                Reconciled::Cleared
            }
        };
        // Count checks miss an untracked reset of the same length; compare
        // contents once the queue has drained.
        let outcome = if outcome == Reconciled::Incremental
            && self.pending.borrow().is_empty()
            && !self.source.with(|current| current == self.items.as_slice())
        {
            self.rebuild(tree)?;
            Reconciled::Rebuilt
        } else {
            outcome
        };

        let (start, end) = match change {
            ListChange::Added { start, end, .. } | ListChange::Removed { start, end, .. } => {
                (*start, *end)
            }
            ListChange::Replaced { index, .. } => (*index, *index),
            ListChange::Cleared => (0, m.saturating_sub(1)),
        };
        tracing::debug!(
            list = ?self.container,
            action = change.action(),
            start,
            end,
            rebuild = outcome == Reconciled::Rebuilt,
            "list_reconcile"
        );
        match outcome {
            Reconciled::Incremental => self.stats.incremental += 1,
            Reconciled::Rebuilt => {}
            Reconciled::Cleared => self.stats.clears += 1,
        }
        Ok(outcome)
    }

    /// Destroy every materialized view in reverse index order and recreate
    /// them from the current contents.
    ///
    /// Queued changes are discarded; the new views already reflect them.
    pub fn rebuild(&mut self, tree: &mut ViewTree) -> Result<(), ListError> {
        self.destroy_all(tree);
        self.pending.borrow_mut().clear();
        for (index, item) in self.source.to_vec().iter().enumerate() {
            self.insert_view(tree, index, item)?;
        }
        self.stats.rebuilds += 1;
        Ok(())
    }

    /// Destroy the materialized views and stop listening to the source.
    pub fn detach(&mut self, tree: &mut ViewTree) {
        self.destroy_all(tree);
        self.release();
    }

    fn release(&mut self) {
        self.subscription = None;
        self.pending.borrow_mut().clear();
        self.views.clear();
        self.items.clear();
    }

    fn destroy_all(&mut self, tree: &mut ViewTree) {
        while let Some(view) = self.views.pop() {
            tree.destroy(view);
        }
        self.items.clear();
    }

    fn remove_view(&mut self, tree: &mut ViewTree, index: usize) {
        let view = self.views.remove(index);
        self.items.remove(index);
        tree.destroy(view);
    }

    fn insert_view(&mut self, tree: &mut ViewTree, index: usize, item: &T) -> Result<(), ListError> {
        let at = self.child_slot(tree, index);
        let view = tree.instantiate(self.template, self.container, at)?;
        let sort_index = self.sort_index_for(item);
        self.views.insert(index, view);
        self.items.insert(index, item.clone());
        self.bind_item(tree, view, item, Some(sort_index))
    }

    fn sort_index_for(&mut self, item: &T) -> i64 {
        if let Some(key) = &self.sort_key {
            return key(item);
        }
        let next = self.next_sort_index;
        self.next_sort_index += 1;
        next
    }

    fn bind_item(
        &self,
        tree: &mut ViewTree,
        view: ViewId,
        item: &T,
        sort_index: Option<i64>,
    ) -> Result<(), ListError> {
        tree.set_field(view, fields::ITEM, Value::Object(ObjectRef::new(item.clone())))?;
        let sort_index = sort_index.or_else(|| self.sort_key.as_ref().map(|key| key(item)));
        let declares_sort_index = tree
            .node(view)
            .is_some_and(|n| n.view_type().field_index(fields::SORT_INDEX.name()).is_some());
        if let Some(sort_index) = sort_index
            && declares_sort_index
        {
            tree.set(view, fields::SORT_INDEX, sort_index)?;
        }
        Ok(())
    }

    /// Raw child position for the view that will sit at `index`.
    fn child_slot(&self, tree: &ViewTree, index: usize) -> usize {
        if let Some(p) = self
            .views
            .get(index)
            .and_then(|&next| tree.child_position(self.container, next))
        {
            return p;
        }
        index
            .checked_sub(1)
            .and_then(|i| self.views.get(i))
            .and_then(|&prev| tree.child_position(self.container, prev))
            .map_or_else(
                || tree.node(self.container).map_or(0, |n| n.children().len()),
                |p| p + 1,
            )
    }
}

impl<T> std::fmt::Debug for ListBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListBinding")
            .field("container", &self.container)
            .field("template", &self.template)
            .field("views", &self.views.len())
            .field("pending", &self.pending.borrow().len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
