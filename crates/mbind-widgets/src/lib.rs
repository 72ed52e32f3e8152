#![forbid(unsafe_code)]

//! List view for markbind.
//!
//! [`ListView`] materializes one template clone per element of an
//! [`ObservableList`](mbind_runtime::ObservableList), patches the views
//! incrementally as the collection changes and falls back to a rebuild when
//! a change does not line up. Selection, `SortIndex` assignment and
//! `SortDirection` ordering live here too.
//!
//! # Example
//!
//! ```
//! use mbind_runtime::{ObservableList, RegistryBuilder, UiContext, ViewTree};
//! use mbind_widgets::{ListView, LIST_ITEM_TYPE, LIST_TYPE, register_list_types};
//!
//! let mut builder = RegistryBuilder::new();
//! register_list_types(&mut builder);
//! let mut tree = ViewTree::new(UiContext::new(builder.build()));
//!
//! let none = std::iter::empty::<(&str, &str)>;
//! let list = tree.create_view(LIST_TYPE, None, None, none()).unwrap().view;
//! let row = tree.create_view(LIST_ITEM_TYPE, Some(list), None, none()).unwrap().view;
//!
//! let fruit = ObservableList::from_vec(vec!["apple", "pear"]);
//! let mut view = ListView::new(&mut tree, list, row).unwrap();
//! view.set_items(&mut tree, fruit.clone()).unwrap();
//!
//! fruit.push("plum");
//! view.sync(&mut tree).unwrap();
//! assert_eq!(view.len(), 3);
//!
//! view.select_item(&mut tree, &"pear").unwrap();
//! assert_eq!(view.selected_item(), Some(&"pear"));
//! ```

pub mod error;
pub mod list;

pub use error::ListError;
pub use list::{
    LIST_ITEM_TYPE, LIST_TYPE, ListBinding, ListView, ReconcileStats, Reconciled,
    SORT_DIRECTION_CONVERTER, SelectionEvent, SortDirection, SortKey, fields,
    register_list_converters, register_list_types,
};
