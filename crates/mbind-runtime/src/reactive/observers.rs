#![forbid(unsafe_code)]

//! Explicit observer lists with RAII unsubscription.
//!
//! [`ObserverList<E>`] is the notification channel shared by every reactive
//! primitive in this crate: observable fields, observable lists, animation
//! lifecycle events and list selection events.
//!
//! # Invariants
//!
//! 1. Observers are notified in registration order.
//! 2. Dropping the [`Subscription`] returned by `subscribe` removes the
//!    observer before the next notification.
//! 3. Observers may subscribe or drop subscriptions from inside a
//!    notification; the current notification uses the snapshot taken when it
//!    started.

use core::any::Any;
use core::fmt;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Callback<E> = dyn Fn(&E);

/// RAII guard keeping one observer alive.
///
/// Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    _guard: Box<dyn Any>,
}

impl Subscription {
    pub(crate) fn new<G: Any>(guard: G) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Ordered list of weakly held observers.
pub struct ObserverList<E> {
    slots: RefCell<Vec<Weak<Callback<E>>>>,
}

impl<E: 'static> ObserverList<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: RefCell::new(Vec::new()),
        }
    }

    /// Register an observer. It stays registered while the returned
    /// [`Subscription`] is alive.
    pub fn subscribe(&self, observer: impl Fn(&E) + 'static) -> Subscription {
        let strong: Rc<Callback<E>> = Rc::new(observer);
        self.slots.borrow_mut().push(Rc::downgrade(&strong));
        Subscription::new(strong)
    }

    /// Deliver `event` to every live observer.
    pub fn notify(&self, event: &E) {
        let live: Vec<Rc<Callback<E>>> = {
            let mut slots = self.slots.borrow_mut();
            slots.retain(|w| w.strong_count() > 0);
            slots.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in live {
            observer(event);
        }
    }

    /// Number of live observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: 'static> Default for ObserverList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> fmt::Debug for ObserverList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("observers", &self.len())
            .finish()
    }
}
