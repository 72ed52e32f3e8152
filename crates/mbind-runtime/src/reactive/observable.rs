#![forbid(unsafe_code)]

//! Observable field values.
//!
//! An [`Observable<T>`] is a shared, version-tracked cell. Cloning it shares
//! the same storage, so the view tree and code-side handles always see the
//! same value.
//!
//! # Invariants
//!
//! 1. `is_set()` becomes true only through [`Observable::set`] or
//!    [`Observable::set_direct`]; construction and [`Observable::set_default`]
//!    never set it. Layout uses the flag to decide whether to auto-size.
//! 2. The version increments exactly once per write that changes the value.
//! 3. Writing a value equal to the current one notifies nobody.
//! 4. Subscribers run synchronously, in registration order, after the new
//!    value is stored and with no borrow held (they may read or write the
//!    observable again).
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Write after release | owning view destroyed | warning logged, write ignored |

use core::fmt;
use std::cell::RefCell;
use std::rc::Rc;

use crate::id::ViewId;
use crate::reactive::observers::{ObserverList, Subscription};

/// Old and new value of a change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Change<T> {
    pub old: T,
    pub new: T,
}

struct Slot<T> {
    value: T,
    is_set: bool,
    version: u64,
    owner: Option<ViewId>,
    released: bool,
}

/// A shared observable value.
pub struct Observable<T> {
    slot: Rc<RefCell<Slot<T>>>,
    observers: Rc<ObserverList<Change<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
            observers: Rc::clone(&self.observers),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create an unowned observable holding a default (not explicitly set) value.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::with_owner(value, None)
    }

    /// Create an observable owned by a view. The owner is a lookup key only.
    #[must_use]
    pub fn with_owner(value: T, owner: Option<ViewId>) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot {
                value,
                is_set: false,
                version: 0,
                owner,
                released: false,
            })),
            observers: Rc::new(ObserverList::new()),
        }
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.slot.borrow().value.clone()
    }

    /// Borrow the current value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.slot.borrow().value)
    }

    /// Whether the value was explicitly assigned.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.slot.borrow().is_set
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.slot.borrow().version
    }

    #[must_use]
    pub fn owner(&self) -> Option<ViewId> {
        self.slot.borrow().owner
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.slot.borrow().released
    }

    /// Assign a value, mark it set and notify subscribers if it changed.
    ///
    /// Returns whether the stored value changed.
    pub fn set(&self, value: T) -> bool {
        match self.store(value, true) {
            Some(change) => {
                self.observers.notify(&change);
                true
            }
            None => false,
        }
    }

    /// Assign and mark set without notifying anyone.
    ///
    /// Used for internally computed values that must not start a cascade.
    pub fn set_direct(&self, value: T) -> bool {
        self.store(value, true).is_some()
    }

    /// Replace the default value. Neither notifies nor marks the value set.
    pub fn set_default(&self, value: T) {
        let mut slot = self.slot.borrow_mut();
        if slot.released || slot.value == value {
            return;
        }
        slot.value = value;
        slot.version += 1;
    }

    /// Forget an explicit assignment; the current value becomes a default.
    pub fn unset(&self) {
        self.slot.borrow_mut().is_set = false;
    }

    /// Subscribe to new values.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.observers.subscribe(move |change: &Change<T>| callback(&change.new))
    }

    /// Subscribe to `(old, new)` pairs.
    pub fn subscribe_change(&self, callback: impl Fn(&T, &T) + 'static) -> Subscription {
        self.observers
            .subscribe(move |change: &Change<T>| callback(&change.old, &change.new))
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.observers.len()
    }

    /// Detach from the owning view. Later writes are ignored.
    pub fn release(&self) {
        self.slot.borrow_mut().released = true;
    }

    /// Whether both handles share storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }

    fn store(&self, value: T, mark_set: bool) -> Option<Change<T>> {
        let mut slot = self.slot.borrow_mut();
        if slot.released {
            let owner = slot.owner;
            drop(slot);
            tracing::warn!(view = ?owner, "write to a released field ignored");
            return None;
        }
        if mark_set {
            slot.is_set = true;
        }
        if slot.value == value {
            return None;
        }
        let old = std::mem::replace(&mut slot.value, value);
        slot.version += 1;
        Some(Change {
            old,
            new: slot.value.clone(),
        })
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.borrow();
        f.debug_struct("Observable")
            .field("value", &slot.value)
            .field("is_set", &slot.is_set)
            .field("version", &slot.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tracing_test::traced_test;

    #[test]
    fn default_value_is_not_set() {
        let obs = Observable::new(5);
        assert_eq!(obs.get(), 5);
        assert!(!obs.is_set());
        obs.set_default(6);
        assert!(!obs.is_set());
        assert_eq!(obs.get(), 6);
    }

    #[test]
    fn set_marks_even_when_equal() {
        let obs = Observable::new(5);
        assert!(!obs.set(5));
        assert!(obs.is_set());
        assert_eq!(obs.version(), 0);
    }

    #[test]
    fn repeated_sets_notify_once() {
        let obs = Observable::new(0);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = obs.subscribe(move |_| h.set(h.get() + 1));

        for _ in 0..4 {
            obs.set(9);
        }
        assert_eq!(hits.get(), 1);
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn change_carries_old_and_new() {
        let obs = Observable::new(String::from("a"));
        let seen = Rc::new(RefCell::new(None));
        let s = Rc::clone(&seen);
        let _sub = obs.subscribe_change(move |old, new| {
            *s.borrow_mut() = Some((old.clone(), new.clone()));
        });
        obs.set("b".into());
        assert_eq!(*seen.borrow(), Some(("a".into(), "b".into())));
    }

    #[test]
    fn set_direct_is_silent() {
        let obs = Observable::new(1);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = obs.subscribe(move |_| h.set(h.get() + 1));
        assert!(obs.set_direct(2));
        assert_eq!(hits.get(), 0);
        assert!(obs.is_set());
        assert_eq!(obs.get(), 2);
    }

    #[test]
    fn subscriber_may_write_back() {
        let obs = Observable::new(0);
        let inner = obs.clone();
        let _sub = obs.subscribe(move |v| {
            if *v < 3 {
                inner.set(v + 1);
            }
        });
        obs.set(1);
        assert_eq!(obs.get(), 3);
    }

    #[test]
    fn clones_share_storage() {
        let a = Observable::new(1);
        let b = a.clone();
        b.set(2);
        assert_eq!(a.get(), 2);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Observable::new(2)));
    }

    #[traced_test]
    #[test]
    fn released_observable_ignores_writes() {
        let obs = Observable::new(1);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = obs.subscribe(move |_| h.set(h.get() + 1));
        obs.release();
        assert!(!obs.set(2));
        assert_eq!(obs.get(), 1);
        assert_eq!(hits.get(), 0);
        assert!(logs_contain("write to a released field ignored"));
    }

    #[test]
    fn unset_clears_flag() {
        let obs = Observable::new(1);
        obs.set(2);
        obs.unset();
        assert!(!obs.is_set());
        assert_eq!(obs.get(), 2);
    }
}
