//! The protocol dispatcher: frames in, typed messages out.

use std::rc::Rc;

use anyhow::Context;
use ringwatch_ctrl_io::{EventBuffer, StreamCursor};
use ringwatch_ctrl_proto::json::parse_object;
use ringwatch_ctrl_proto::{netstring, FrameReader};
use ringwatch_infra_common::{Signal, Subscription};
use tracing::trace;
use uuid::Uuid;

use crate::events::{Command, CommandResponse, Event};
use crate::protocol::{classify, encode_command, Message};

/// Dispatcher for one control-channel connection.
///
/// `Ctrl` owns a resumable [`FrameReader`] over the connection's receive
/// buffer and reacts to its on-fill signal: every complete frame is
/// decoded, classified, and published on [`on_event`](Ctrl::on_event) or
/// [`on_response`](Ctrl::on_response). A single fill may complete several
/// frames, so the handler loops until the frame reader is starved -
/// otherwise already-buffered frames would sit undelivered until the next
/// read.
///
/// The send direction encodes [`Command`]s into the connection's send
/// buffer; the connection flushes them as the socket allows.
pub struct Ctrl {
    sendbuf: Rc<EventBuffer>,
    on_event: Signal<Event>,
    on_response: Signal<CommandResponse>,
    _recv: Subscription,
}

impl Ctrl {
    pub fn new(recvbuf: Rc<EventBuffer>, sendbuf: Rc<EventBuffer>) -> Self {
        let on_event = Signal::new();
        let on_response = Signal::new();

        let cursor = StreamCursor::new(Rc::clone(&recvbuf));
        let mut frames = FrameReader::new();
        let events = on_event.clone();
        let responses = on_response.clone();
        let recv = recvbuf.on_fill(move |_| {
            while let Some(payload) = frames
                .parse(&cursor)
                .context("malformed control-channel frame")?
            {
                trace!(len = payload.len(), "frame");
                let obj = parse_object(&payload)
                    .with_context(|| format!("malformed frame payload {payload:?}"))?;
                match classify(&obj)? {
                    Some(Message::Event(event)) => events.emit(&event)?,
                    Some(Message::Response(response)) => responses.emit(&response)?,
                    None => {}
                }
            }
            Ok(())
        });

        Ctrl {
            sendbuf,
            on_event,
            on_response,
            _recv: recv,
        }
    }

    /// Subscribe to domain events.
    pub fn on_event<F>(&self, handler: F) -> Subscription
    where
        F: FnMut(&Event) -> anyhow::Result<()> + 'static,
    {
        self.on_event.connect(handler)
    }

    /// Subscribe to command responses.
    pub fn on_response<F>(&self, handler: F) -> Subscription
    where
        F: FnMut(&CommandResponse) -> anyhow::Result<()> + 'static,
    {
        self.on_response.connect(handler)
    }

    /// Queue `command` for the user agent and return its correlation
    /// token. A token is generated when the command carries none; match
    /// it against [`CommandResponse::token`].
    pub fn send_command(&self, command: Command) -> anyhow::Result<String> {
        let command = match command.token {
            Some(_) => command,
            None => command.with_token(Uuid::new_v4().to_string()),
        };
        // Checked above.
        let token = command.token.clone().unwrap_or_default();

        let frame = netstring::encode(&encode_command(&command));
        self.sendbuf
            .append(frame.as_bytes())
            .with_context(|| format!("queueing command {:?}", command.command))?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn buffers() -> (Rc<EventBuffer>, Rc<EventBuffer>) {
        (
            Rc::new(EventBuffer::with_capacity(4096)),
            Rc::new(EventBuffer::with_capacity(4096)),
        )
    }

    fn feed(buf: &Rc<EventBuffer>, payload: &str) -> anyhow::Result<()> {
        buf.append(netstring::encode(payload).as_bytes())
    }

    #[test]
    fn publishes_events_and_responses_separately() {
        let (recvbuf, sendbuf) = buffers();
        let ctrl = Ctrl::new(Rc::clone(&recvbuf), sendbuf);

        let events = Rc::new(RefCell::new(Vec::new()));
        let responses = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&events);
        let _ev = ctrl.on_event(move |event| {
            seen.borrow_mut().push(event.clone());
            Ok(())
        });
        let seen = Rc::clone(&responses);
        let _resp = ctrl.on_response(move |response| {
            seen.borrow_mut().push(response.clone());
            Ok(())
        });

        feed(
            &recvbuf,
            r#"{"event":true,"class":"register","type":"REGISTER_OK","accountaor":"sip:a@b"}"#,
        )
        .unwrap();
        feed(&recvbuf, r#"{"response":true,"ok":true,"data":"pong"}"#).unwrap();

        assert_eq!(events.borrow().len(), 1);
        assert_eq!(responses.borrow().len(), 1);
        assert_eq!(responses.borrow()[0].data, "pong");
    }

    #[test]
    fn drains_every_frame_of_one_fill() {
        let (recvbuf, sendbuf) = buffers();
        let ctrl = Ctrl::new(Rc::clone(&recvbuf), sendbuf);

        let count = Rc::new(RefCell::new(0));
        let seen = Rc::clone(&count);
        let _ev = ctrl.on_event(move |_| {
            *seen.borrow_mut() += 1;
            Ok(())
        });

        // Three frames committed as a single fill.
        let frame = netstring::encode(
            r#"{"event":true,"class":"register","type":"UNREGISTERING","accountaor":"sip:a@b"}"#,
        );
        recvbuf
            .append(frame.repeat(3).as_bytes())
            .unwrap();

        assert_eq!(*count.borrow(), 3);
        assert!(recvbuf.is_empty());
    }

    #[test]
    fn unknown_events_leave_no_trace() {
        let (recvbuf, sendbuf) = buffers();
        let ctrl = Ctrl::new(Rc::clone(&recvbuf), sendbuf);

        let count = Rc::new(RefCell::new(0));
        let seen = Rc::clone(&count);
        let _ev = ctrl.on_event(move |_| {
            *seen.borrow_mut() += 1;
            Ok(())
        });

        feed(&recvbuf, r#"{"event":true,"class":"vu_report","type":"VU_REPORT"}"#).unwrap();
        assert_eq!(*count.borrow(), 0);
        assert!(recvbuf.is_empty());
    }

    #[test]
    fn malformed_frames_are_fatal() {
        let (recvbuf, sendbuf) = buffers();
        let _ctrl = Ctrl::new(Rc::clone(&recvbuf), sendbuf);

        let err = recvbuf.append(b"junk,").unwrap_err();
        assert!(err.to_string().contains("malformed control-channel frame"));
    }

    #[test]
    fn send_command_frames_into_the_send_buffer() {
        let (recvbuf, sendbuf) = buffers();
        let ctrl = Ctrl::new(recvbuf, Rc::clone(&sendbuf));

        let token = ctrl
            .send_command(Command::new("dial").with_params("sip:100@example.com"))
            .unwrap();
        assert!(!token.is_empty());

        let wire = sendbuf.with_readable(|bytes| String::from_utf8(bytes.to_vec()).unwrap());
        let payload = format!(
            r#"{{"command": "dial", "params": "sip:100@example.com", "token": "{token}"}}"#
        );
        assert_eq!(wire, format!("{}:{payload},", payload.len()));
    }
}
