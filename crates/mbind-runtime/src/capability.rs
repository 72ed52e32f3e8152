#![forbid(unsafe_code)]

//! Capability traits attached to view types.
//!
//! A view is a plain tree node; behavior comes from the capabilities its
//! type registers. Closures implement the hook traits directly.

use mbind_core::Value;

use crate::error::TreeError;
use crate::id::ViewId;
use crate::tree::ViewTree;

/// Called once per tick for each view whose layout-affecting fields changed.
pub trait Layoutable {
    fn layout_changed(&self, tree: &mut ViewTree, view: ViewId);
}

impl<F: Fn(&mut ViewTree, ViewId)> Layoutable for F {
    fn layout_changed(&self, tree: &mut ViewTree, view: ViewId) {
        self(tree, view);
    }
}

/// Called when a list selects or deselects an item view.
///
/// The `IsSelected` field is updated before the hook runs.
pub trait Selectable {
    fn selection_changed(&self, tree: &mut ViewTree, view: ViewId, selected: bool);
}

impl<F: Fn(&mut ViewTree, ViewId, bool)> Selectable for F {
    fn selection_changed(&self, tree: &mut ViewTree, view: ViewId, selected: bool) {
        self(tree, view, selected);
    }
}

/// A target the animation driver can write to.
pub trait Animatable {
    fn is_alive(&self, view: ViewId) -> bool;

    fn current_value(&self, view: ViewId, field: &str) -> Option<Value>;

    /// Write an intermediate value. Propagates mappings, queues no handlers.
    fn write_animated(&mut self, view: ViewId, field: &str, value: Value)
    -> Result<bool, TreeError>;
}
