#![forbid(unsafe_code)]

//! Reactive primitives.
//!
//! - [`Observable`]: shared, version-tracked value with an "explicitly set"
//!   flag and synchronous change notification.
//! - [`ObservableList`]: ordered collection raising [`ListChange`] events.
//! - [`ObserverList`] and [`Subscription`]: the explicit observer channel the
//!   other primitives are built on; dropping a subscription unsubscribes.
//! - [`Binding`], [`TwoWayBinding`], [`BindingScope`]: glue between code-side
//!   state and view fields.
//!
//! # Architecture
//!
//! Everything is single-threaded: `Rc<RefCell<..>>` storage, observers held
//! as `Weak` callbacks and pruned lazily during notification.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per value-changing write.
//! 2. Observers are notified in registration order.
//! 3. Writing an equal value notifies nobody.
//! 4. Dropping a [`Subscription`] removes the callback before the next
//!    notification.

pub mod binding;
pub mod collection;
pub mod observable;
pub mod observers;

pub use binding::{
    Binding, BindingScope, TwoWayBinding, bind_field, bind_mapped, bind_observable,
};
pub use collection::{ListChange, ObservableList};
pub use observable::{Change, Observable};
pub use observers::{ObserverList, Subscription};
