//! Call entities tracked by the model.

use std::cell::Cell;
use std::fmt;

use chrono::{DateTime, Utc};
use ringwatch_infra_common::{Signal, Subscription};
use serde::Serialize;

use crate::events::{CallDirection, CallEvent, CallKind};

/// Opaque call identity assigned by the user agent.
///
/// Compared lexicographically; the empty string is the null identity
/// (see [`is_null`](CallId::is_null)).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for CallId {
    fn from(value: String) -> Self {
        CallId(value)
    }
}

impl From<&str> for CallId {
    fn from(value: &str) -> Self {
        CallId(value.to_owned())
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a call. Event kinds map onto these 1:1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallState {
    Established,
    Incoming,
    Ringing,
    Closed,
}

impl From<CallKind> for CallState {
    fn from(kind: CallKind) -> Self {
        match kind {
            CallKind::Established => CallState::Established,
            CallKind::Incoming => CallState::Incoming,
            CallKind::Ringing => CallState::Ringing,
            CallKind::Closed => CallState::Closed,
        }
    }
}

/// One call leg, owned by the [`Model`](crate::Model) and shared
/// read-only with observers.
///
/// Identity, direction, account and peer are captured from the first
/// event and never re-derived; only the state mutates afterwards.
pub struct Call {
    id: CallId,
    state: Cell<CallState>,
    direction: CallDirection,
    account_aor: String,
    peer_uri: String,
    started_at: DateTime<Utc>,
    on_state_change: Signal<CallState>,
}

impl Call {
    pub(crate) fn from_event(ev: &CallEvent) -> Self {
        Call {
            id: ev.id.clone(),
            state: Cell::new(ev.kind.into()),
            direction: ev.direction,
            account_aor: ev.account_aor.clone(),
            peer_uri: ev.peer_uri.clone(),
            started_at: Utc::now(),
            on_state_change: Signal::new(),
        }
    }

    /// Apply `ev` if its id matches ours. Returns whether it did.
    ///
    /// Subscribers are notified only on an actual state transition, so
    /// a repeated event of the current state is a no-op.
    pub(crate) fn apply(&self, ev: &CallEvent) -> anyhow::Result<bool> {
        if self.id != ev.id {
            return Ok(false);
        }

        let state = CallState::from(ev.kind);
        if self.state.get() != state {
            self.state.set(state);
            self.on_state_change.emit(&state)?;
        }
        Ok(true)
    }

    pub fn id(&self) -> &CallId {
        &self.id
    }

    pub fn state(&self) -> CallState {
        self.state.get()
    }

    pub fn direction(&self) -> CallDirection {
        self.direction
    }

    pub fn account_aor(&self) -> &str {
        &self.account_aor
    }

    pub fn peer_uri(&self) -> &str {
        &self.peer_uri
    }

    /// When this call was first observed on the channel.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn on_state_change<F>(&self, handler: F) -> Subscription
    where
        F: FnMut(&CallState) -> anyhow::Result<()> + 'static,
    {
        self.on_state_change.connect(handler)
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("id", &self.id)
            .field("state", &self.state.get())
            .field("direction", &self.direction)
            .field("account_aor", &self.account_aor)
            .field("peer_uri", &self.peer_uri)
            .field("started_at", &self.started_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_event(kind: CallKind, id: &str) -> CallEvent {
        CallEvent {
            kind,
            account_aor: "sip:100@example.com".into(),
            direction: CallDirection::Incoming,
            peer_uri: "sip:200@example.com".into(),
            id: id.into(),
            param: String::new(),
        }
    }

    #[test]
    fn id_compares_lexicographically() {
        assert!(CallId::from("").is_null());
        assert!(!CallId::from("x").is_null());
        assert_eq!(CallId::from("x"), CallId::from("x"));
        assert!(CallId::from("a") < CallId::from("b"));
    }

    #[test]
    fn apply_ignores_other_ids() {
        let call = Call::from_event(&call_event(CallKind::Incoming, "a"));
        assert!(!call.apply(&call_event(CallKind::Established, "b")).unwrap());
        assert_eq!(call.state(), CallState::Incoming);
    }

    #[test]
    fn apply_notifies_only_on_transition() {
        let call = Call::from_event(&call_event(CallKind::Incoming, "a"));
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let log = std::rc::Rc::clone(&seen);
        let _sub = call.on_state_change(move |state| {
            log.borrow_mut().push(*state);
            Ok(())
        });

        assert!(call.apply(&call_event(CallKind::Incoming, "a")).unwrap());
        assert!(call.apply(&call_event(CallKind::Established, "a")).unwrap());
        assert!(call.apply(&call_event(CallKind::Established, "a")).unwrap());
        assert_eq!(*seen.borrow(), vec![CallState::Established]);
    }
}
