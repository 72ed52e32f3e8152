#![forbid(unsafe_code)]

//! Item selection for [`ListView`].
//!
//! Selection is a list of item views, oldest first. The selected item is the
//! item bound to the newest selected view. Events go out in the order the
//! state changes: in single-select mode every `Deselected` precedes the
//! `Selected` that caused it.

use mbind_runtime::{Subscription, ViewId, ViewTree};

use super::{ListView, fields};
use crate::error::ListError;

/// A selection change on a list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent<T> {
    Selected { item: T, view: ViewId },
    Deselected { item: T, view: ViewId },
}

impl<T> SelectionEvent<T> {
    #[must_use]
    pub fn item(&self) -> &T {
        match self {
            Self::Selected { item, .. } | Self::Deselected { item, .. } => item,
        }
    }

    #[must_use]
    pub fn view(&self) -> ViewId {
        match self {
            Self::Selected { view, .. } | Self::Deselected { view, .. } => *view,
        }
    }

    #[must_use]
    pub fn is_selected(&self) -> bool {
        matches!(self, Self::Selected { .. })
    }
}

impl<T: Clone + PartialEq + 'static> ListView<T> {
    /// Observe selection changes.
    pub fn subscribe(&self, observer: impl Fn(&SelectionEvent<T>) + 'static) -> Subscription {
        self.events.subscribe(observer)
    }

    /// Select an item view, as a click would.
    ///
    /// Re-selecting a selected view deselects it when `CanDeselect` is set.
    /// Unless `CanMultiSelect` is set, the previous selection is cleared
    /// first. Returns whether the selection changed.
    pub fn select_view(&mut self, tree: &mut ViewTree, view: ViewId) -> Result<bool, ListError> {
        let Some(index) = self.binding.as_ref().and_then(|b| b.index_of_view(view)) else {
            tracing::warn!(list = ?self.view, view = ?view, "selection of a view outside the list ignored");
            return Ok(false);
        };
        if !self.flag(tree, fields::CAN_SELECT, true) {
            tracing::debug!(list = ?self.view, "selection disabled");
            return Ok(false);
        }
        if self.is_view_selected(view) {
            if self.flag(tree, fields::CAN_DESELECT, false) {
                return self.deselect_view(tree, view);
            }
            return Ok(false);
        }
        if !self.flag(tree, fields::CAN_MULTI_SELECT, false) {
            self.deselect_all(tree)?;
        }

        tree.set_selected(view, true)?;
        self.selected.push(view);
        if let Some(item) = self.item_at(index) {
            self.events.notify(&SelectionEvent::Selected { item, view });
        }
        Ok(true)
    }

    /// Select the view at `index`. A missing index is logged and ignored.
    pub fn select_index(&mut self, tree: &mut ViewTree, index: usize) -> Result<bool, ListError> {
        match self.binding.as_ref().and_then(|b| b.view_at(index)) {
            Some(view) => self.select_view(tree, view),
            None => {
                tracing::warn!(list = ?self.view, index, len = self.len(), "selection of a missing index ignored");
                Ok(false)
            }
        }
    }

    /// Select the first view bound to `item`.
    pub fn select_item(&mut self, tree: &mut ViewTree, item: &T) -> Result<bool, ListError> {
        match self.binding.as_ref().and_then(|b| b.index_of_item(item)) {
            Some(index) => self.select_index(tree, index),
            None => {
                tracing::warn!(list = ?self.view, "selection of an item not in the list ignored");
                Ok(false)
            }
        }
    }

    pub fn deselect_view(&mut self, tree: &mut ViewTree, view: ViewId) -> Result<bool, ListError> {
        let Some(pos) = self.selected.iter().position(|&v| v == view) else {
            return Ok(false);
        };
        self.selected.remove(pos);
        self.announce_deselect(tree, view)?;
        Ok(true)
    }

    /// Deselect everything, oldest selection first.
    pub fn deselect_all(&mut self, tree: &mut ViewTree) -> Result<(), ListError> {
        for view in std::mem::take(&mut self.selected) {
            self.announce_deselect(tree, view)?;
        }
        Ok(())
    }

    /// Item bound to the most recently selected view.
    #[must_use]
    pub fn selected_item(&self) -> Option<&T> {
        let binding = self.binding.as_ref()?;
        let index = binding.index_of_view(*self.selected.last()?)?;
        binding.item_at(index)
    }

    /// Selected items, oldest selection first.
    #[must_use]
    pub fn selected_items(&self) -> Vec<T> {
        self.selected
            .iter()
            .filter_map(|&v| {
                let binding = self.binding.as_ref()?;
                binding.item_at(binding.index_of_view(v)?).cloned()
            })
            .collect()
    }

    #[must_use]
    pub fn selected_views(&self) -> &[ViewId] {
        &self.selected
    }

    #[must_use]
    pub fn is_item_selected(&self, item: &T) -> bool {
        self.selected_items().iter().any(|i| i == item)
    }

    #[must_use]
    pub fn is_view_selected(&self, view: ViewId) -> bool {
        self.selected.contains(&view)
    }

    /// Fix up the selection after reconciliation.
    ///
    /// Views that are still materialized stay selected. After a rebuild, a
    /// selected item still present in the collection moves to its new view;
    /// otherwise it leaves the selection.
    pub(super) fn reselect(
        &mut self,
        tree: &mut ViewTree,
        previous: Vec<(ViewId, Option<T>)>,
        rebuilt: bool,
    ) -> Result<(), ListError> {
        let Some(binding) = self.binding.as_ref() else {
            self.selected.clear();
            return Ok(());
        };
        let mut kept = Vec::with_capacity(previous.len());
        let mut moved = Vec::new();
        for (view, item) in previous {
            if binding.index_of_view(view).is_some() {
                kept.push(view);
                continue;
            }
            let replacement = item.filter(|_| rebuilt).and_then(|item| {
                binding
                    .views()
                    .iter()
                    .zip(binding.items())
                    .find(|(v, i)| **i == item && !kept.contains(*v))
                    .map(|(&v, _)| v)
            });
            match replacement {
                Some(v) => {
                    kept.push(v);
                    moved.push(v);
                }
                None => {
                    tracing::debug!(list = ?self.view, view = ?view, "selected view left the list");
                }
            }
        }
        self.selected = kept;
        for view in moved {
            tree.set_selected(view, true)?;
        }
        Ok(())
    }

    fn announce_deselect(&self, tree: &mut ViewTree, view: ViewId) -> Result<(), ListError> {
        if tree.contains(view) {
            tree.set_selected(view, false)?;
        }
        let index = self.binding.as_ref().and_then(|b| b.index_of_view(view));
        if let Some(item) = index.and_then(|i| self.item_at(i)) {
            self.events.notify(&SelectionEvent::Deselected { item, view });
        }
        Ok(())
    }

    fn item_at(&self, index: usize) -> Option<T> {
        self.binding.as_ref().and_then(|b| b.item_at(index).cloned())
    }

    fn flag(&self, tree: &ViewTree, key: mbind_runtime::FieldKey<bool>, default: bool) -> bool {
        tree.get(self.view, key).unwrap_or(default)
    }
}
