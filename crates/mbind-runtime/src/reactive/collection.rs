#![forbid(unsafe_code)]

//! Observable ordered collections.
//!
//! [`ObservableList<T>`] raises one [`ListChange`] per tracked mutation. Each
//! change carries the affected inclusive index range and the collection
//! length after the mutation, which lets consumers check that their own
//! bookkeeping still lines up before applying the change incrementally.
//!
//! # Invariants
//!
//! 1. Events are raised after the mutation is applied and with no borrow
//!    held; observers may read the list.
//! 2. Out-of-range mutations are rejected and raise nothing.
//! 3. [`ObservableList::reset_untracked`] changes the contents without an
//!    event. Observers only learn about it through a later length mismatch.

use core::fmt;
use core::ops::Range;
use std::cell::RefCell;
use std::rc::Rc;

use crate::reactive::observers::{ObserverList, Subscription};

/// A structural change to an [`ObservableList`].
#[derive(Debug, Clone, PartialEq)]
pub enum ListChange<T> {
    /// `items` now occupy `start..=end`.
    Added {
        start: usize,
        end: usize,
        items: Vec<T>,
        len: usize,
    },
    /// The elements previously at `start..=end` were removed.
    Removed {
        start: usize,
        end: usize,
        items: Vec<T>,
        len: usize,
    },
    /// The element at `index` was replaced by `item`.
    Replaced { index: usize, item: T, len: usize },
    /// Every element was removed.
    Cleared,
}

impl<T> ListChange<T> {
    /// Short action name for diagnostics.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Added { .. } => "add",
            Self::Removed { .. } => "remove",
            Self::Replaced { .. } => "replace",
            Self::Cleared => "clear",
        }
    }

    /// Collection length after the change.
    #[must_use]
    pub fn len_after(&self) -> usize {
        match self {
            Self::Added { len, .. } | Self::Removed { len, .. } | Self::Replaced { len, .. } => {
                *len
            }
            Self::Cleared => 0,
        }
    }
}

struct Inner<T> {
    items: RefCell<Vec<T>>,
    observers: ObserverList<ListChange<T>>,
}

/// A shared list that reports its structural changes.
pub struct ObservableList<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for ObservableList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Default for ObservableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> ObservableList<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    #[must_use]
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            inner: Rc::new(Inner {
                items: RefCell::new(items),
                observers: ObserverList::new(),
            }),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// Snapshot of the current contents.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.items.borrow().clone()
    }

    /// Iterate over a snapshot; mutations during iteration are not observed.
    pub fn iter(&self) -> std::vec::IntoIter<T> {
        self.to_vec().into_iter()
    }

    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.inner.items.borrow())
    }

    /// Index of the first element matching `pred`.
    pub fn position(&self, pred: impl FnMut(&T) -> bool) -> Option<usize> {
        self.inner.items.borrow().iter().position(pred)
    }

    pub fn push(&self, item: T) {
        let at = self.len();
        self.insert_range(at, vec![item]);
    }

    /// Insert at `index`. Returns `false` when `index > len`.
    pub fn insert(&self, index: usize, item: T) -> bool {
        self.insert_range(index, vec![item])
    }

    /// Append every item as a single change.
    pub fn extend(&self, items: impl IntoIterator<Item = T>) {
        let at = self.len();
        self.insert_range(at, items.into_iter().collect());
    }

    /// Insert `items` starting at `index` as a single change.
    ///
    /// Returns `false` when `index > len`. Inserting nothing is a no-op.
    pub fn insert_range(&self, index: usize, items: Vec<T>) -> bool {
        let change = {
            let mut list = self.inner.items.borrow_mut();
            if index > list.len() {
                return false;
            }
            if items.is_empty() {
                return true;
            }
            let end = index + items.len() - 1;
            list.splice(index..index, items.iter().cloned());
            ListChange::Added {
                start: index,
                end,
                items,
                len: list.len(),
            }
        };
        self.inner.observers.notify(&change);
        true
    }

    pub fn remove(&self, index: usize) -> Option<T> {
        let end = index.checked_add(1)?;
        self.remove_range(index..end)
            .and_then(|mut removed| removed.pop())
    }

    /// Remove `range` as a single change. `None` if empty or out of bounds.
    pub fn remove_range(&self, range: Range<usize>) -> Option<Vec<T>> {
        let change = {
            let mut list = self.inner.items.borrow_mut();
            if range.start >= range.end || range.end > list.len() {
                return None;
            }
            let start = range.start;
            let end = range.end - 1;
            let items: Vec<T> = list.drain(range).collect();
            ListChange::Removed {
                start,
                end,
                items,
                len: list.len(),
            }
        };
        let removed = match &change {
            ListChange::Removed { items, .. } => items.clone(),
            _ => Vec::new(),
        };
        self.inner.observers.notify(&change);
        Some(removed)
    }

    /// Replace the element at `index`, returning the old one.
    pub fn set(&self, index: usize, item: T) -> Option<T> {
        let (old, change) = {
            let mut list = self.inner.items.borrow_mut();
            let slot = list.get_mut(index)?;
            let old = std::mem::replace(slot, item.clone());
            let len = list.len();
            (old, ListChange::Replaced { index, item, len })
        };
        self.inner.observers.notify(&change);
        Some(old)
    }

    /// Remove every element. Clearing an empty list raises nothing.
    pub fn clear(&self) {
        {
            let mut list = self.inner.items.borrow_mut();
            if list.is_empty() {
                return;
            }
            list.clear();
        }
        self.inner.observers.notify(&ListChange::Cleared);
    }

    /// Replace the contents without raising an event.
    pub fn reset_untracked(&self, items: Vec<T>) {
        *self.inner.items.borrow_mut() = items;
    }

    pub fn subscribe(&self, observer: impl Fn(&ListChange<T>) + 'static) -> Subscription {
        self.inner.observers.subscribe(observer)
    }

    /// Whether both handles share storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + 'static> FromIterator<T> for ObservableList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.items.borrow().iter()).finish()
    }
}
