//! The closed set of messages the control channel can deliver.
//!
//! The wire carries two message kinds on one stream: events (registration
//! and call progress, pushed by the user agent) and command responses
//! (answers to commands we sent). Both are flat JSON objects; the typed
//! shapes here are what the rest of the stack consumes.
//!
//! Serde derives exist so embedders can log or export these as structured
//! records; the wire codec itself is hand-written in
//! [`protocol`](crate::protocol).

use serde::Serialize;

use crate::call::CallId;

/// A domain event pushed by the user agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum Event {
    Register(RegisterEvent),
    Call(CallEvent),
}

/// Registration progress for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterEvent {
    pub kind: RegisterKind,
    /// The account's address of record, e.g. `sip:100@example.com`.
    pub account_aor: String,
    /// Free-form detail, e.g. the SIP status line on failure.
    pub param: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RegisterKind {
    Ok,
    Fail,
    Unregistering,
}

/// Call progress for one call leg, keyed by [`CallId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallEvent {
    pub kind: CallKind,
    pub account_aor: String,
    pub direction: CallDirection,
    pub peer_uri: String,
    pub id: CallId,
    pub param: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallKind {
    Established,
    Incoming,
    Ringing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallDirection {
    Incoming,
    Outgoing,
}

/// The answer to a previously sent [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResponse {
    pub ok: bool,
    pub data: String,
    /// Echo of the command's token, when one was sent.
    pub token: Option<String>,
}

/// An outbound command for the user agent, e.g. `dial` or `reginfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    pub command: String,
    pub params: Option<String>,
    /// Correlation token echoed back in [`CommandResponse::token`].
    pub token: Option<String>,
}

impl Command {
    pub fn new(command: impl Into<String>) -> Self {
        Command {
            command: command.into(),
            params: None,
            token: None,
        }
    }

    pub fn with_params(mut self, params: impl Into<String>) -> Self {
        self.params = Some(params.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}
