//! Reactive cells - the change-propagation primitive under the whole pipeline.
//!
//! Two primitives:
//!
//! - [`Signal`]: a value cell with `get`, `set`, and `subscribe`. Setting a
//!   value equal to the current one is a no-op. Subscribers fire synchronously,
//!   in subscription order, after the value has changed. A subscriber may set
//!   other signals; those notifications are delivered depth-first, before
//!   control returns to the outer setter's remaining subscribers.
//! - [`Derived`]: a read-only cell whose value is a pure function of other
//!   cells. Recomputed lazily on `get` and cached until a dependency changes.
//!   Dependencies are explicit rather than tracked ambiently, which keeps the
//!   graph inspectable and testable in isolation.
//!
//! The model is single-threaded cooperative. Cycle avoidance (a subscriber
//! that transitively re-triggers its own cell) is a caller contract: the
//! equality check breaks value-level echoes, but a cell that keeps producing
//! new values for itself will loop forever.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

// =============================================================================
// Subscription
// =============================================================================

/// Handle for an active subscription. The callback stays registered for as
/// long as the handle lives; dropping (or calling [`Subscription::cancel`])
/// detaches it.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// Detach the callback from its cell.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

// =============================================================================
// Signal
// =============================================================================

struct SignalInner<T> {
    value: T,
    subscribers: Vec<(usize, Rc<dyn Fn(&T)>)>,
    next_id: usize,
}

/// A reactive value cell. Cloning yields another handle to the same cell.
pub struct Signal<T> {
    inner: Rc<RefCell<SignalInner<T>>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

/// Create a new signal holding `value`.
pub fn signal<T: Clone + PartialEq + 'static>(value: T) -> Signal<T> {
    Signal::new(value)
}

impl<T: Clone + PartialEq + 'static> Signal<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SignalInner {
                value,
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Current value (cloned out so no borrow is held across caller code).
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Set a new value and notify subscribers. Equal values are a no-op.
    pub fn set(&self, value: T) {
        let subscribers = {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value.clone();
            // Snapshot the list so callbacks may subscribe/unsubscribe and
            // re-enter `set` on other cells without aliasing the borrow.
            inner.subscribers.clone()
        };
        for (_, callback) in subscribers {
            callback(&value);
        }
    }

    /// Register a callback invoked after every actual change.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push((id, Rc::new(callback)));
            id
        };
        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .borrow_mut()
                    .subscribers
                    .retain(|(sub_id, _)| *sub_id != id);
            }
        })
    }

    /// Number of live subscriptions (mainly for tests and debugging).
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }
}

// =============================================================================
// Derived
// =============================================================================

/// Anything a derived cell can depend on.
pub trait Observe {
    /// Register a plain invalidation callback.
    fn observe(&self, callback: Box<dyn Fn()>) -> Subscription;
}

impl<T: Clone + PartialEq + 'static> Observe for Signal<T> {
    fn observe(&self, callback: Box<dyn Fn()>) -> Subscription {
        self.subscribe(move |_| callback())
    }
}

struct DerivedInner<T> {
    value: Option<T>,
    dirty: bool,
    compute: Rc<dyn Fn() -> T>,
    // Held so the upstream subscriptions stay alive as long as the cell does.
    _deps: Vec<Subscription>,
}

/// A read-only cell computed from other cells. Cached until an upstream
/// dependency changes, recomputed on the next `get`.
pub struct Derived<T> {
    inner: Rc<RefCell<DerivedInner<T>>>,
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

/// Create a derived cell over the given dependencies.
pub fn derived<T: Clone + 'static>(
    deps: &[&dyn Observe],
    compute: impl Fn() -> T + 'static,
) -> Derived<T> {
    let inner = Rc::new(RefCell::new(DerivedInner {
        value: None,
        dirty: true,
        compute: Rc::new(compute),
        _deps: Vec::new(),
    }));

    let subscriptions: Vec<Subscription> = deps
        .iter()
        .map(|dep| {
            let weak: Weak<RefCell<DerivedInner<T>>> = Rc::downgrade(&inner);
            dep.observe(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().dirty = true;
                }
            }))
        })
        .collect();
    inner.borrow_mut()._deps = subscriptions;

    Derived { inner }
}

impl<T: Clone + 'static> Derived<T> {
    /// Current value, recomputing if a dependency changed since the last read.
    pub fn get(&self) -> T {
        {
            let inner = self.inner.borrow();
            if !inner.dirty {
                if let Some(value) = &inner.value {
                    return value.clone();
                }
            }
        }
        // Compute outside the borrow: an upstream write during the compute
        // re-enters this cell to mark it dirty.
        let compute = Rc::clone(&self.inner.borrow().compute);
        let value = compute();
        let mut inner = self.inner.borrow_mut();
        inner.value = Some(value.clone());
        inner.dirty = false;
        value
    }
}
