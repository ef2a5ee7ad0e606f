//! Signal/slot event channel
//!
//! A [`Signal`] is a multi-subscriber publish primitive for a single
//! reactor thread. Handlers run synchronously, in connect order, and may
//! fail: a handler returning an error aborts the emit and the error
//! propagates to the caller (ultimately out of the reactor loop).
//!
//! # Reentrancy guarantees
//!
//! These hold even when handlers call back into the same signal:
//!
//! - a handler connected during an emit is not invoked for that emit;
//! - disconnecting a subscription - from inside its own handler, or from
//!   inside a sibling handler running in the same emit - takes effect
//!   starting with that emit (no double-invoke, no use-after-disconnect);
//! - dispatch order equals connect order.
//!
//! Disconnect tombstones the slot rather than mutating the list while an
//! emit may be walking it; tombstones are compacted at the start of the
//! next emit.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

type Handler<T> = Box<dyn FnMut(&T) -> anyhow::Result<()>>;

struct Slot<T> {
    dead: Rc<Cell<bool>>,
    handler: Rc<RefCell<Handler<T>>>,
}

/// Handle for a single handler connected to a [`Signal`].
///
/// Dropping the handle does *not* disconnect the handler; call
/// [`Subscription::disconnect`] explicitly. This keeps "fire and forget"
/// subscriptions (log sinks, model wiring) alive without storing handles.
#[derive(Clone)]
pub struct Subscription {
    dead: Rc<Cell<bool>>,
}

impl Subscription {
    /// Detach the handler. Safe to call at any time, including from the
    /// handler itself while it is running.
    pub fn disconnect(&self) {
        self.dead.set(true);
    }

    /// Whether the handler is still attached.
    pub fn is_connected(&self) -> bool {
        !self.dead.get()
    }
}

/// Multi-subscriber event channel for one payload type.
///
/// Cloning a `Signal` yields another handle to the same subscriber list,
/// which is how a publisher keeps an emitting handle while handing out
/// connect access through `on_*` methods.
pub struct Signal<T> {
    slots: Rc<RefCell<Vec<Slot<T>>>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Signal {
            slots: Rc::clone(&self.slots),
        }
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Signal {
            slots: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Connect a handler. It will be invoked for every emit *after* this
    /// call; an emit currently in progress does not see it.
    pub fn connect<F>(&self, handler: F) -> Subscription
    where
        F: FnMut(&T) -> anyhow::Result<()> + 'static,
    {
        let dead = Rc::new(Cell::new(false));
        self.slots.borrow_mut().push(Slot {
            dead: Rc::clone(&dead),
            handler: Rc::new(RefCell::new(Box::new(handler))),
        });
        Subscription { dead }
    }

    /// Number of live (non-tombstoned) slots.
    pub fn slot_count(&self) -> usize {
        self.slots.borrow().iter().filter(|s| !s.dead.get()).count()
    }

    /// Invoke every connected handler with `value`, in connect order.
    ///
    /// Stops at the first handler error and returns it. The slot list
    /// borrow is released before any handler runs, so handlers are free
    /// to connect or disconnect.
    pub fn emit(&self, value: &T) -> anyhow::Result<()> {
        let snapshot: Vec<Slot<T>> = {
            let mut slots = self.slots.borrow_mut();
            slots.retain(|s| !s.dead.get());
            slots
                .iter()
                .map(|s| Slot {
                    dead: Rc::clone(&s.dead),
                    handler: Rc::clone(&s.handler),
                })
                .collect()
        };

        for slot in &snapshot {
            // Tombstoned by an earlier handler in this same emit.
            if slot.dead.get() {
                continue;
            }
            (slot.handler.borrow_mut())(value)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_in_connect_order() {
        let sig = Signal::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = Rc::clone(&seen);
            sig.connect(move |v: &u32| {
                seen.borrow_mut().push(format!("{tag}{v}"));
                Ok(())
            });
        }

        sig.emit(&1).unwrap();
        sig.emit(&2).unwrap();
        assert_eq!(
            *seen.borrow(),
            vec!["a1", "b1", "c1", "a2", "b2", "c2"]
        );
    }

    #[test]
    fn handler_connected_during_emit_waits_for_next_emit() {
        let sig: Signal<()> = Signal::new();
        let count = Rc::new(Cell::new(0_u32));

        {
            let sig2 = sig.clone();
            let count = Rc::clone(&count);
            sig.connect(move |_| {
                let count = Rc::clone(&count);
                sig2.connect(move |_| {
                    count.set(count.get() + 1);
                    Ok(())
                });
                Ok(())
            });
        }

        sig.emit(&()).unwrap();
        assert_eq!(count.get(), 0);

        sig.emit(&()).unwrap();
        // Only the handler connected during the first emit fires; the one
        // connected during the second is again deferred.
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn self_disconnect_fires_exactly_once() {
        let sig: Signal<()> = Signal::new();
        let count = Rc::new(Cell::new(0_u32));

        let sub_box: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let sub = {
            let count = Rc::clone(&count);
            let sub_box = Rc::clone(&sub_box);
            sig.connect(move |_| {
                count.set(count.get() + 1);
                sub_box.borrow().as_ref().unwrap().disconnect();
                Ok(())
            })
        };
        *sub_box.borrow_mut() = Some(sub);

        sig.emit(&()).unwrap();
        sig.emit(&()).unwrap();
        assert_eq!(count.get(), 1);
        assert_eq!(sig.slot_count(), 0);
    }

    #[test]
    fn sibling_disconnect_during_emit_suppresses_later_handler() {
        let sig: Signal<()> = Signal::new();
        let late_fired = Rc::new(Cell::new(false));

        let late_sub_box: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        {
            let late_sub_box = Rc::clone(&late_sub_box);
            sig.connect(move |_| {
                late_sub_box.borrow().as_ref().unwrap().disconnect();
                Ok(())
            });
        }
        let late_sub = {
            let late_fired = Rc::clone(&late_fired);
            sig.connect(move |_| {
                late_fired.set(true);
                Ok(())
            })
        };
        *late_sub_box.borrow_mut() = Some(late_sub);

        sig.emit(&()).unwrap();
        assert!(!late_fired.get());
    }

    #[test]
    fn handler_error_short_circuits() {
        let sig: Signal<()> = Signal::new();
        let reached = Rc::new(Cell::new(false));

        sig.connect(|_| anyhow::bail!("boom"));
        {
            let reached = Rc::clone(&reached);
            sig.connect(move |_| {
                reached.set(true);
                Ok(())
            });
        }

        let err = sig.emit(&()).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(!reached.get());
    }
}
