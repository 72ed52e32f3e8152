#![forbid(unsafe_code)]

//! markbind: field binding, dependency propagation and list reconciliation
//! for markup-described view trees.
//!
//! This crate re-exports the workspace crates:
//!
//! | module | crate |
//! |--------|-------|
//! | [`values`] | `mbind-core`: values, lengths, colors, markup conversion |
//! | [`runtime`] | `mbind-runtime`: observables, registry, view tree, scheduler, animation |
//! | [`widgets`] | `mbind-widgets`: list view (feature `widgets`) |
//!
//! Most programs only need the [`prelude`].
//!
//! ```
//! use mbind::prelude::*;
//!
//! let mut types = RegistryBuilder::new();
//! types.register(
//!     ViewTypeBuilder::new("Panel")
//!         .field(FieldSpec::new("Width", ValueKind::Length).map_to("Body.Width"))
//!         .component("Body", "Region"),
//! );
//! types.register(ViewTypeBuilder::new("Region").field(FieldSpec::new("Width", ValueKind::Length)));
//!
//! let mut tree = ViewTree::new(UiContext::new(types.build()));
//! let panel = tree.create_view("Panel", None, None, [("Width", "50%")]).unwrap().view;
//! let body = tree.find_child_by_name(panel, "Body", TraversalMode::SkipTemplates).unwrap();
//! assert_eq!(tree.get_field(body, "Width"), Some(Value::Length(Length::Percent(50.0))));
//! ```

pub use mbind_core as values;
pub use mbind_runtime as runtime;
#[cfg(feature = "widgets")]
pub use mbind_widgets as widgets;

pub mod prelude {
    pub use mbind_core::{ConverterRegistry, Length, ObjectRef, Rgba, Value, ValueKind};
    pub use mbind_runtime::{
        AnimationDriver, Binding, BindingScope, FieldKey, FieldSpec, HandlerError, ListChange,
        Observable, ObservableList, RegistryBuilder, RuntimeConfig, Subscription, TraversalMode,
        TreeError, TwoWayBinding, UiContext, ViewId, ViewTree, ViewTypeBuilder, WriteMode,
    };
    #[cfg(feature = "widgets")]
    pub use mbind_widgets::{
        ListError, ListView, SelectionEvent, SortDirection, register_list_converters,
        register_list_types,
    };
}
