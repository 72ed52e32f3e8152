#![forbid(unsafe_code)]

//! List view: a container whose item views follow an [`ObservableList`].
//!
//! A [`ListView`] owns a template child (any view type declaring an `Item`
//! field, usually [`LIST_ITEM_TYPE`]). Assigning a collection with
//! [`ListView::set_items`] materializes one clone of the template per
//! element; [`ListView::sync`] applies the collection's changes since the
//! last call and then fixes up the selection.
//!
//! ```text
//!  ObservableList ──ListChange──► ListBinding ──instantiate/destroy──► ViewTree
//!                                      │
//!                                      └──► selection fix-up ──► SelectionEvent
//! ```

mod reconcile;
mod selection;

use std::cmp::Reverse;

use mbind_core::{ConverterRegistry, EnumConverter, ValueKind};
use mbind_runtime::{
    FieldSpec, ObservableList, ObserverList, RegistryBuilder, ViewId, ViewTree, ViewTypeBuilder,
};

use crate::error::ListError;

pub use reconcile::{ListBinding, ReconcileStats, Reconciled, SortKey};
pub use selection::SelectionEvent;

pub const LIST_TYPE: &str = "List";
pub const LIST_ITEM_TYPE: &str = "ListItem";
pub const SORT_DIRECTION_CONVERTER: &str = "sort-direction";

/// Field names used by list views and item views.
pub mod fields {
    use mbind_runtime::FieldKey;

    pub const CAN_SELECT: FieldKey<bool> = FieldKey::new("CanSelect");
    pub const CAN_DESELECT: FieldKey<bool> = FieldKey::new("CanDeselect");
    pub const CAN_MULTI_SELECT: FieldKey<bool> = FieldKey::new("CanMultiSelect");
    pub const SORT_DIRECTION: FieldKey<String> = FieldKey::new("SortDirection");

    /// Object field holding the bound element.
    pub const ITEM: &str = "Item";
    pub const SORT_INDEX: FieldKey<i64> = FieldKey::new("SortIndex");
    pub const IS_SELECTED: FieldKey<bool> = FieldKey::new("IsSelected");
    pub const TEXT: FieldKey<String> = FieldKey::new("Text");
}

/// Order of [`ListView::ordered_views`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
    /// Collection order.
    #[default]
    Unsorted,
    Ascending,
    Descending,
}

impl SortDirection {
    pub const NAMES: [&'static str; 3] = ["Unsorted", "Ascending", "Descending"];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unsorted => "Unsorted",
            Self::Ascending => "Ascending",
            Self::Descending => "Descending",
        }
    }

    /// Parse a markup name, ignoring ASCII case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        [Self::Unsorted, Self::Ascending, Self::Descending]
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

/// Register the `List` and `ListItem` view types.
pub fn register_list_types(builder: &mut RegistryBuilder) -> &mut RegistryBuilder {
    builder
        .register(
            ViewTypeBuilder::new(LIST_TYPE)
                .field(FieldSpec::new(fields::CAN_SELECT.name(), ValueKind::Bool).default_value(true))
                .field(FieldSpec::new(fields::CAN_DESELECT.name(), ValueKind::Bool))
                .field(FieldSpec::new(fields::CAN_MULTI_SELECT.name(), ValueKind::Bool))
                .field(
                    FieldSpec::new(fields::SORT_DIRECTION.name(), ValueKind::Text)
                        .default_value(SortDirection::Unsorted.as_str())
                        .converter(SORT_DIRECTION_CONVERTER)
                        .affects_layout(),
                ),
        )
        .register(
            ViewTypeBuilder::new(LIST_ITEM_TYPE)
                .field(FieldSpec::new(fields::ITEM, ValueKind::Object))
                .field(FieldSpec::new(fields::SORT_INDEX.name(), ValueKind::Int).affects_layout())
                .field(FieldSpec::new(fields::IS_SELECTED.name(), ValueKind::Bool))
                .field(FieldSpec::new(fields::TEXT.name(), ValueKind::Text)),
        )
}

/// Register the converters list markup needs.
pub fn register_list_converters(converters: &mut ConverterRegistry) {
    converters.register(
        SORT_DIRECTION_CONVERTER,
        EnumConverter::new(SortDirection::NAMES),
    );
}

// ---------------------------------------------------------------------------
// ListView
// ---------------------------------------------------------------------------

/// Controller for one list view in a [`ViewTree`].
pub struct ListView<T> {
    view: ViewId,
    template: ViewId,
    binding: Option<ListBinding<T>>,
    /// Selected item views, oldest first.
    selected: Vec<ViewId>,
    events: ObserverList<SelectionEvent<T>>,
    sort_key: Option<SortKey<T>>,
}

impl<T: Clone + PartialEq + 'static> ListView<T> {
    /// Wrap an existing list view. `template` must be a child of `view`
    /// whose type declares an `Item` field; it is turned into a template if
    /// it is not one already.
    pub fn new(tree: &mut ViewTree, view: ViewId, template: ViewId) -> Result<Self, ListError> {
        if !tree.contains(view) {
            return Err(ListError::UnknownList(view));
        }
        if tree.parent(template) != Some(view) {
            return Err(ListError::TemplateNotChild {
                list: view,
                template,
            });
        }
        let node = tree
            .node(template)
            .ok_or(ListError::TemplateNotChild {
                list: view,
                template,
            })?;
        if node.view_type().field_index(fields::ITEM).is_none() {
            return Err(ListError::TemplateWithoutItem(node.type_name().to_owned()));
        }
        if !node.is_template() {
            tree.mark_template(template)?;
        }
        Ok(Self {
            view,
            template,
            binding: None,
            selected: Vec::new(),
            events: ObserverList::new(),
            sort_key: None,
        })
    }

    #[must_use]
    pub fn view(&self) -> ViewId {
        self.view
    }

    #[must_use]
    pub fn template(&self) -> ViewId {
        self.template
    }

    #[must_use]
    pub fn binding(&self) -> Option<&ListBinding<T>> {
        self.binding.as_ref()
    }

    /// The assigned collection.
    #[must_use]
    pub fn items(&self) -> Option<&ObservableList<T>> {
        self.binding.as_ref().map(ListBinding::source)
    }

    /// Number of materialized item views.
    #[must_use]
    pub fn len(&self) -> usize {
        self.binding.as_ref().map_or(0, ListBinding::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialized item views in collection order.
    #[must_use]
    pub fn item_views(&self) -> &[ViewId] {
        self.binding.as_ref().map_or(&[] as &[ViewId], ListBinding::views)
    }

    /// Assign a collection, replacing the previous one.
    ///
    /// Views of the previous collection are destroyed and the selection is
    /// cleared without events.
    pub fn set_items(&mut self, tree: &mut ViewTree, source: ObservableList<T>) -> Result<(), ListError> {
        if !tree.contains(self.view) {
            return Err(ListError::UnknownList(self.view));
        }
        self.clear_items(tree);
        let binding = ListBinding::attach(tree, source, self.view, self.template, self.sort_key.clone())?;
        tracing::debug!(list = ?self.view, items = binding.len(), "list collection assigned");
        self.binding = Some(binding);
        Ok(())
    }

    /// Drop the collection and its item views.
    pub fn clear_items(&mut self, tree: &mut ViewTree) {
        if let Some(mut old) = self.binding.take() {
            old.detach(tree);
        }
        self.selected.clear();
    }

    /// Apply pending collection changes, then drop or remap selected views
    /// that are no longer materialized. Returns how many changes were applied.
    pub fn sync(&mut self, tree: &mut ViewTree) -> Result<usize, ListError> {
        let Some(binding) = self.binding.as_mut() else {
            return Ok(0);
        };
        if binding.pending_changes() == 0 && tree.contains(self.view) {
            return Ok(0);
        }
        let previous: Vec<(ViewId, Option<T>)> = self
            .selected
            .iter()
            .map(|&v| (v, binding.index_of_view(v).map(|i| binding.items()[i].clone())))
            .collect();
        let rebuilds = binding.stats().rebuilds;
        let result = binding.sync(tree);

        if !binding.is_attached() {
            self.binding = None;
            self.selected.clear();
            return result;
        }
        let rebuilt = binding.stats().rebuilds != rebuilds;
        self.reselect(tree, previous, rebuilt)?;
        result
    }

    /// Compute `SortIndex` from items instead of the insertion counter.
    /// Applies to views materialized or rebound afterwards.
    pub fn set_sort_key(&mut self, key: impl Fn(&T) -> i64 + 'static) {
        let key: SortKey<T> = std::rc::Rc::new(key);
        if let Some(binding) = self.binding.as_mut() {
            binding.set_sort_key(Some(std::rc::Rc::clone(&key)));
        }
        self.sort_key = Some(key);
    }

    #[must_use]
    pub fn sort_direction(&self, tree: &ViewTree) -> SortDirection {
        tree.get(self.view, fields::SORT_DIRECTION)
            .and_then(|s| SortDirection::parse(&s))
            .unwrap_or_default()
    }

    /// Item views in layout order: by `SortIndex` per the list's
    /// `SortDirection`, ties kept in collection order.
    #[must_use]
    pub fn ordered_views(&self, tree: &ViewTree) -> Vec<ViewId> {
        let mut views = self.item_views().to_vec();
        let sort_index = |v: &ViewId| tree.get(*v, fields::SORT_INDEX).unwrap_or(0);
        match self.sort_direction(tree) {
            SortDirection::Unsorted => {}
            SortDirection::Ascending => views.sort_by_key(sort_index),
            SortDirection::Descending => views.sort_by_key(|v| Reverse(sort_index(v))),
        }
        views
    }
}

impl<T> std::fmt::Debug for ListView<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListView")
            .field("view", &self.view)
            .field("template", &self.template)
            .field("binding", &self.binding)
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}
