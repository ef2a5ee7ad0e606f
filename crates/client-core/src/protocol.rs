//! Classification of decoded JSON objects into typed messages.
//!
//! Every frame on the channel is one JSON object. Two boolean
//! discriminators select the message kind: `"event": true` routes through
//! event parsing keyed by `"class"`, `"response": true` routes to command
//! response parsing. An unrecognized class or type is dropped silently so
//! that new server-side event kinds (`CALL_RTCP`, `VU_REPORT`, ...) do
//! not break older clients. A *recognized* message with a missing or
//! mistyped required field is fatal: at that point we can no longer trust
//! our position in the stream.

use ringwatch_ctrl_proto::json::{make_object, to_string};
use ringwatch_ctrl_proto::{Object, Value};
use tracing::debug;

use crate::error::ClientError;
use crate::events::{
    CallDirection, CallEvent, CallKind, Command, CommandResponse, Event, RegisterEvent,
    RegisterKind,
};

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Event(Event),
    Response(CommandResponse),
}

/// Classify one decoded JSON object.
///
/// `Ok(None)` means the object carried no message we recognize and was
/// dropped. `Err` means the object was recognized but malformed.
pub fn classify(obj: &Object) -> Result<Option<Message>, ClientError> {
    if flag(obj, "event") {
        return Ok(parse_event(obj)?.map(Message::Event));
    }

    if flag(obj, "response") {
        return Ok(Some(Message::Response(parse_response(obj)?)));
    }

    debug!("dropping object without event/response discriminator");
    Ok(None)
}

/// Render an outbound command as the JSON object the user agent expects.
pub fn encode_command(cmd: &Command) -> String {
    let mut members = vec![("command", Value::from(cmd.command.as_str()))];
    if let Some(params) = &cmd.params {
        members.push(("params", Value::from(params.as_str())));
    }
    if let Some(token) = &cmd.token {
        members.push(("token", Value::from(token.as_str())));
    }
    to_string(&Value::Object(make_object(members)))
}

fn parse_event(obj: &Object) -> Result<Option<Event>, ClientError> {
    let class = required_str(obj, "class")?;
    match class {
        "register" => Ok(parse_register_event(obj)?.map(Event::Register)),
        "call" => Ok(parse_call_event(obj)?.map(Event::Call)),
        other => {
            debug!(class = other, "dropping event of unknown class");
            Ok(None)
        }
    }
}

fn parse_register_event(obj: &Object) -> Result<Option<RegisterEvent>, ClientError> {
    let type_str = required_str(obj, "type")?;
    let kind = match type_str {
        "REGISTER_OK" => RegisterKind::Ok,
        "REGISTER_FAIL" => RegisterKind::Fail,
        "UNREGISTERING" => RegisterKind::Unregistering,
        other => {
            debug!(kind = other, "dropping register event of unknown type");
            return Ok(None);
        }
    };

    Ok(Some(RegisterEvent {
        kind,
        account_aor: required_str(obj, "accountaor")?.to_owned(),
        param: optional_str(obj, "param").to_owned(),
    }))
}

fn parse_call_event(obj: &Object) -> Result<Option<CallEvent>, ClientError> {
    let type_str = required_str(obj, "type")?;
    let kind = match type_str {
        "CALL_ESTABLISHED" => CallKind::Established,
        "CALL_INCOMING" => CallKind::Incoming,
        "CALL_RINGING" => CallKind::Ringing,
        "CALL_CLOSED" => CallKind::Closed,
        other => {
            debug!(kind = other, "dropping call event of unknown type");
            return Ok(None);
        }
    };

    let direction = match required_str(obj, "direction")? {
        "incoming" => CallDirection::Incoming,
        "outgoing" => CallDirection::Outgoing,
        other => {
            return Err(ClientError::protocol(format!(
                "unknown call direction {other:?}"
            )))
        }
    };

    Ok(Some(CallEvent {
        kind,
        account_aor: required_str(obj, "accountaor")?.to_owned(),
        direction,
        peer_uri: required_str(obj, "peeruri")?.to_owned(),
        id: required_str(obj, "id")?.into(),
        param: optional_str(obj, "param").to_owned(),
    }))
}

fn parse_response(obj: &Object) -> Result<CommandResponse, ClientError> {
    let ok = match obj.get("ok") {
        Some(Value::Bool(b)) => *b,
        _ => return Err(ClientError::protocol("response is missing \"ok\"")),
    };

    Ok(CommandResponse {
        ok,
        data: required_str(obj, "data")?.to_owned(),
        token: obj.get("token").and_then(Value::as_str).map(str::to_owned),
    })
}

/// A boolean discriminator: present and `true`.
fn flag(obj: &Object, name: &str) -> bool {
    matches!(obj.get(name), Some(Value::Bool(true)))
}

fn required_str<'a>(obj: &'a Object, name: &str) -> Result<&'a str, ClientError> {
    obj.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::protocol(format!("message is missing {name:?}")))
}

fn optional_str<'a>(obj: &'a Object, name: &str) -> &'a str {
    obj.get(name).and_then(Value::as_str).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringwatch_ctrl_proto::json::parse_object;

    fn classify_str(input: &str) -> Result<Option<Message>, ClientError> {
        classify(&parse_object(input).unwrap())
    }

    #[test]
    fn register_fail_event_parses() {
        let msg = classify_str(
            r#"{"event":true,"type":"REGISTER_FAIL","class":"register",
                "accountaor":"sip:9999-1@asterisk.example.com",
                "param":"401 Unauthorized"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            Some(Message::Event(Event::Register(RegisterEvent {
                kind: RegisterKind::Fail,
                account_aor: "sip:9999-1@asterisk.example.com".into(),
                param: "401 Unauthorized".into(),
            })))
        );
    }

    #[test]
    fn call_incoming_event_parses() {
        let msg = classify_str(
            r#"{"event":true,"class":"call","type":"CALL_INCOMING",
                "accountaor":"sip:100@example.com","direction":"incoming",
                "peeruri":"sip:200@example.com","id":"1234"}"#,
        )
        .unwrap();
        let Some(Message::Event(Event::Call(ev))) = msg else {
            panic!("expected call event, got {msg:?}");
        };
        assert_eq!(ev.kind, CallKind::Incoming);
        assert_eq!(ev.direction, CallDirection::Incoming);
        assert_eq!(ev.id.as_str(), "1234");
        assert_eq!(ev.param, "");
    }

    #[test]
    fn unknown_class_and_type_are_dropped() {
        // Classes and types we do not model yield nothing, not an error.
        assert_eq!(
            classify_str(r#"{"event":true,"class":"VU_REPORT","type":"x"}"#).unwrap(),
            None
        );
        assert_eq!(
            classify_str(
                r#"{"event":true,"class":"call","type":"CALL_RTCP",
                    "accountaor":"sip:100@example.com","direction":"incoming",
                    "peeruri":"sip:200@example.com","id":"1234"}"#
            )
            .unwrap(),
            None
        );
        assert_eq!(
            classify_str(r#"{"event":true,"class":"register","type":"MODULE"}"#).unwrap(),
            None
        );
        // No discriminator at all.
        assert_eq!(classify_str(r#"{"foo":"bar"}"#).unwrap(), None);
        assert_eq!(classify_str(r#"{"event":false}"#).unwrap(), None);
    }

    #[test]
    fn missing_required_fields_are_fatal() {
        let err = classify_str(r#"{"event":true,"type":"REGISTER_OK","class":"register"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("accountaor"));

        let err = classify_str(r#"{"event":true,"class":"register"}"#).unwrap_err();
        assert!(err.to_string().contains("type"));

        let err = classify_str(
            r#"{"event":true,"class":"call","type":"CALL_RINGING",
                "accountaor":"a","direction":"sideways","peeruri":"p","id":"1"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("sideways"));
    }

    #[test]
    fn responses_parse_with_optional_token() {
        let msg = classify_str(r#"{"response":true,"ok":true,"data":"calls: 0"}"#).unwrap();
        assert_eq!(
            msg,
            Some(Message::Response(CommandResponse {
                ok: true,
                data: "calls: 0".into(),
                token: None,
            }))
        );

        let msg =
            classify_str(r#"{"response":true,"ok":false,"data":"no","token":"tok-7"}"#).unwrap();
        assert_eq!(
            msg,
            Some(Message::Response(CommandResponse {
                ok: false,
                data: "no".into(),
                token: Some("tok-7".into()),
            }))
        );

        let err = classify_str(r#"{"response":true,"data":"x"}"#).unwrap_err();
        assert!(err.to_string().contains("ok"));
    }

    #[test]
    fn commands_encode_in_wire_shape() {
        let cmd = Command::new("dial")
            .with_params("sip:100@example.com")
            .with_token("tok-1");
        assert_eq!(
            encode_command(&cmd),
            r#"{"command": "dial", "params": "sip:100@example.com", "token": "tok-1"}"#
        );
        assert_eq!(
            encode_command(&Command::new("reginfo")),
            r#"{"command": "reginfo"}"#
        );
    }
}
