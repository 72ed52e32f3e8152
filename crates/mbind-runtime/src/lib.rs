#![forbid(unsafe_code)]

//! Runtime for markbind views.
//!
//! - [`reactive`]: observables, observable lists, bindings.
//! - [`registry`]: static view-type descriptors (fields, `MapTo`, change
//!   handlers, components) validated into a [`TypeRegistry`].
//! - [`tree`]: the arena-owned [`ViewTree`] with lifecycle, traversal,
//!   templates, field propagation and the per-tick flush.
//! - [`scheduler`]: the per-view [`ChangeHandlerQueue`].
//! - [`animation`]: the [`AnimationDriver`].
//!
//! Everything is single-threaded and tick-driven. Services are passed in a
//! [`UiContext`]; nothing is global.

pub mod animation;
pub mod capability;
pub mod config;
pub mod context;
pub mod error;
pub mod id;
pub mod reactive;
pub mod registry;
pub mod scheduler;
pub mod tree;

pub use animation::{AnimationDriver, AnimationEvent, AnimationId, Easing, FieldAnimation};
pub use capability::{Animatable, Layoutable, Selectable};
pub use config::RuntimeConfig;
pub use context::UiContext;
pub use error::{FieldInitError, HandlerError, InitReport, RegistryError, TreeError};
pub use id::ViewId;
pub use reactive::{
    Binding, BindingScope, ListChange, Observable, ObservableList, ObserverList, Subscription,
    TwoWayBinding,
};
pub use registry::{
    FieldDescriptor, FieldKey, FieldPath, FieldSpec, HandlerFn, RegistryBuilder, TypeRegistry,
    ViewType, ViewTypeBuilder,
};
pub use scheduler::{ChangeHandlerQueue, QueueState};
pub use tree::{
    FlushReport, LifecycleState, TickReport, TraversalMode, ViewFlags, ViewNode, ViewTree,
    WriteMode,
};
