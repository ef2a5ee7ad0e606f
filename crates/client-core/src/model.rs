//! Live model of SIP state, reconciled from the event stream.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use ringwatch_infra_common::{Signal, Subscription};
use serde::Serialize;
use tracing::debug;

use crate::call::Call;
use crate::ctrl::Ctrl;
use crate::events::{CallEvent, Event, RegisterEvent, RegisterKind};

/// Registration status of the configured account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Registration {
    Unknown,
    Ok,
    Fail,
}

/// Event-sourced view of registration and call state.
///
/// The model subscribes to a [`Ctrl`]'s event signal and folds every
/// event into current state: registration is a plain overwrite, call
/// events are matched against the known calls by id and either mutate an
/// existing [`Call`] in place or create a new one.
///
/// Calls are never removed, Closed ones included, so the collection
/// doubles as the call history of this connection.
pub struct Model {
    registration: Cell<Registration>,
    calls: RefCell<Vec<Rc<Call>>>,
    on_call: Signal<Rc<Call>>,
    _events: Subscription,
}

impl Model {
    /// Attach a new model to `ctrl`'s event stream.
    pub fn attach(ctrl: &Ctrl) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<Model>| {
            let model = Weak::clone(weak);
            let events = ctrl.on_event(move |event| {
                if let Some(model) = model.upgrade() {
                    model.handle_event(event)?;
                }
                Ok(())
            });

            Model {
                registration: Cell::new(Registration::Unknown),
                calls: RefCell::new(Vec::new()),
                on_call: Signal::new(),
                _events: events,
            }
        })
    }

    /// Subscribe to calls newly observed on the channel. The handler
    /// shares ownership of the [`Call`] with the model.
    pub fn on_call<F>(&self, handler: F) -> Subscription
    where
        F: FnMut(&Rc<Call>) -> anyhow::Result<()> + 'static,
    {
        self.on_call.connect(handler)
    }

    pub fn registration(&self) -> Registration {
        self.registration.get()
    }

    /// Snapshot of all calls, in the order they were first observed.
    pub fn calls(&self) -> Vec<Rc<Call>> {
        self.calls.borrow().clone()
    }

    fn handle_event(&self, event: &Event) -> anyhow::Result<()> {
        match event {
            Event::Register(ev) => {
                self.handle_register_event(ev);
                Ok(())
            }
            Event::Call(ev) => self.handle_call_event(ev),
        }
    }

    fn handle_register_event(&self, ev: &RegisterEvent) {
        let registration = match ev.kind {
            RegisterKind::Ok => Registration::Ok,
            RegisterKind::Fail => Registration::Fail,
            RegisterKind::Unregistering => Registration::Unknown,
        };
        debug!(?registration, account_aor = %ev.account_aor, "registration");
        self.registration.set(registration);
    }

    fn handle_call_event(&self, ev: &CallEvent) -> anyhow::Result<()> {
        // The borrow must not outlive the lookup: Call::apply notifies
        // state-change subscribers, which may read the model back.
        let known = self.calls.borrow().iter().find(|c| *c.id() == ev.id).cloned();

        match known {
            Some(call) => {
                call.apply(ev)?;
            }
            None => {
                let call = Rc::new(Call::from_event(ev));
                self.calls.borrow_mut().push(Rc::clone(&call));
                self.on_call.emit(&call)?;
            }
        }
        Ok(())
    }
}
