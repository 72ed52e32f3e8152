#![forbid(unsafe_code)]

//! Bindings between code-side observables and view fields.
//!
//! A [`Binding<T>`] reads an observable source through an optional transform.
//! A [`TwoWayBinding`] keeps two observables in sync; [`TwoWayBinding::field`]
//! does the same between a typed model observable and a view field that
//! stores a dynamically typed [`Value`].
//!
//! ```ignore
//! let count = Observable::new(0_i64);
//! let field = tree.field(view, "Count").unwrap();
//! let _link = TwoWayBinding::field(&count, &field);
//! count.set(4); // the view field now holds Value::Int(4)
//! ```
//!
//! # Invariants
//!
//! 1. `Binding::get()` always evaluates against the current source value.
//! 2. Two-way bindings never loop: a re-entrancy guard stops the echo.
//! 3. Dropping a `TwoWayBinding` disconnects both directions.
//! 4. A [`BindingScope`] owns subscriptions until dropped or cleared.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Field holds a value of another kind | untyped write to the view field | model keeps its value |

use core::fmt;
use core::marker::PhantomData;
use std::cell::Cell;
use std::rc::Rc;

use mbind_core::{FieldValue, Value};

use crate::reactive::observable::Observable;
use crate::reactive::observers::Subscription;

// ---------------------------------------------------------------------------
// Binding<T>
// ---------------------------------------------------------------------------

/// A read-only view of an observable, optionally transformed.
pub struct Binding<T> {
    eval: Rc<dyn Fn() -> T>,
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            eval: Rc::clone(&self.eval),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding").field("value", &self.get()).finish()
    }
}

impl<T: 'static> Binding<T> {
    pub fn new(f: impl Fn() -> T + 'static) -> Self {
        Self { eval: Rc::new(f) }
    }

    #[must_use]
    pub fn get(&self) -> T {
        (self.eval)()
    }

    /// Chain another transform.
    pub fn then<U: 'static>(self, f: impl Fn(T) -> U + 'static) -> Binding<U> {
        Binding {
            eval: Rc::new(move || f((self.eval)())),
        }
    }
}

/// Identity binding.
pub fn bind_observable<T: Clone + PartialEq + 'static>(source: &Observable<T>) -> Binding<T> {
    let src = source.clone();
    Binding::new(move || src.get())
}

/// Binding through `map`.
pub fn bind_mapped<S: Clone + PartialEq + 'static, T: 'static>(
    source: &Observable<S>,
    map: impl Fn(&S) -> T + 'static,
) -> Binding<T> {
    let src = source.clone();
    Binding::new(move || src.with(|v| map(v)))
}

/// Typed read of a view field. Yields `None` while the field holds a value
/// of another kind.
pub fn bind_field<T: FieldValue + 'static>(field: &Observable<Value>) -> Binding<Option<T>> {
    bind_mapped(field, T::from_value)
}

/// Create a direct [`Binding`] to an observable.
#[macro_export]
macro_rules! bind {
    ($obs:expr) => {
        $crate::reactive::binding::bind_observable(&$obs)
    };
}

/// Create a mapped [`Binding`].
#[macro_export]
macro_rules! bind_map {
    ($obs:expr, $f:expr) => {
        $crate::reactive::binding::bind_mapped(&$obs, $f)
    };
}

// ---------------------------------------------------------------------------
// TwoWayBinding
// ---------------------------------------------------------------------------

/// Bidirectional sync between two observables.
///
/// On creation the second side takes the first side's value.
pub struct TwoWayBinding<T> {
    _forward: Subscription,
    _backward: Subscription,
    _marker: PhantomData<T>,
}

impl<T: Clone + PartialEq + 'static> TwoWayBinding<T> {
    pub fn new(a: &Observable<T>, b: &Observable<T>) -> Self {
        Self::link(a, b, |v: &T| Some(v.clone()), |v: &T| Some(v.clone()))
    }
}

impl<T: FieldValue + Clone + PartialEq + 'static> TwoWayBinding<T> {
    /// Link a typed model observable to a view field.
    ///
    /// The field takes the model's value, so the field becomes explicitly set.
    pub fn field(model: &Observable<T>, field: &Observable<Value>) -> Self {
        Self::link(
            model,
            field,
            |v: &T| Some(v.clone().into_value()),
            T::from_value,
        )
    }
}

impl<T: Clone + PartialEq + 'static> TwoWayBinding<T> {
    fn link<U: Clone + PartialEq + 'static>(
        a: &Observable<T>,
        b: &Observable<U>,
        to_b: impl Fn(&T) -> Option<U> + 'static,
        to_a: impl Fn(&U) -> Option<T> + 'static,
    ) -> Self {
        if let Some(initial) = a.with(|v| to_b(v)) {
            b.set(initial);
        }

        let syncing = Rc::new(Cell::new(false));

        let target = b.clone();
        let guard = Rc::clone(&syncing);
        let forward = a.subscribe(move |v| {
            if guard.replace(true) {
                return;
            }
            if let Some(converted) = to_b(v) {
                target.set(converted);
            }
            guard.set(false);
        });

        let source = a.clone();
        let guard = syncing;
        let backward = b.subscribe(move |v| {
            if guard.replace(true) {
                return;
            }
            if let Some(converted) = to_a(v) {
                source.set(converted);
            }
            guard.set(false);
        });

        Self {
            _forward: forward,
            _backward: backward,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for TwoWayBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwoWayBinding").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// BindingScope
// ---------------------------------------------------------------------------

/// Owns the subscriptions of one logical scope, typically a view.
///
/// Dropping or clearing the scope disconnects everything it holds.
pub struct BindingScope {
    subscriptions: Vec<Subscription>,
    links: Vec<Box<dyn core::any::Any>>,
}

impl BindingScope {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn hold(&mut self, sub: Subscription) {
        self.subscriptions.push(sub);
    }

    /// Keep a two-way binding alive for the scope's lifetime.
    pub fn hold_link<T: 'static>(&mut self, link: TwoWayBinding<T>) {
        self.links.push(Box::new(link));
    }

    pub fn subscribe<T: Clone + PartialEq + 'static>(
        &mut self,
        source: &Observable<T>,
        callback: impl Fn(&T) + 'static,
    ) -> &mut Self {
        self.subscriptions.push(source.subscribe(callback));
        self
    }

    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.subscriptions.len() + self.links.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.binding_count() == 0
    }

    /// Release everything now; the scope stays usable.
    pub fn clear(&mut self) {
        self.links.clear();
        self.subscriptions.clear();
    }
}

impl Default for BindingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingScope")
            .field("binding_count", &self.binding_count())
            .finish()
    }
}
