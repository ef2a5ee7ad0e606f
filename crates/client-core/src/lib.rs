//! Client core for the baresip `ctrl_tcp` control channel
//!
//! This crate is the top half of the ringwatch pipeline: it consumes the
//! buffered byte stream maintained by `ringwatch-ctrl-io`, decodes it with
//! `ringwatch-ctrl-proto`, and turns the result into typed domain events
//! and a live model of SIP state.
//!
//! ```text
//! recvbuf -> FrameReader -> JSON -> classify -> Event/CommandResponse
//!                                      |
//!                                      v
//!                                    Model (registration + calls)
//! ```
//!
//! - [`Ctrl`] - the protocol dispatcher. Hooks the receive buffer's
//!   on-fill signal, drains every complete frame, and publishes
//!   [`Event`]s and [`CommandResponse`]s on two independent signals.
//!   Also encodes outbound [`Command`]s into the send buffer.
//! - [`Model`] - subscribes to the dispatcher and maintains the current
//!   [`Registration`] status plus an insertion-ordered collection of
//!   [`Call`] entities with per-call state-change notification.
//!
//! Everything runs synchronously on the reactor thread; a protocol error
//! anywhere in the chain unwinds out of `Reactor::wait` and tears the
//! connection down.

pub mod call;
pub mod ctrl;
pub mod error;
pub mod events;
pub mod model;
pub mod protocol;

pub use call::{Call, CallId, CallState};
pub use ctrl::Ctrl;
pub use error::ClientError;
pub use events::{
    CallDirection, CallEvent, CallKind, Command, CommandResponse, Event, RegisterEvent,
    RegisterKind,
};
pub use model::{Model, Registration};
pub use protocol::Message;
