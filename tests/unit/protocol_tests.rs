//! Unit tests for the child line codec and wire messages.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use partition_runctl::child::codec::{ChildLineCodec, MAX_LINE_BYTES};
use partition_runctl::child::protocol::{
    encode_line, parse_ready, parse_reply, parse_request, WireReply, WireRequest,
};
use partition_runctl::models::command::{Command, CommandKind};
use partition_runctl::models::outcome::ChildReply;
use partition_runctl::AppError;

#[test]
fn codec_splits_batched_lines() {
    let mut codec = ChildLineCodec::new();
    let mut buf = BytesMut::from("{\"seq\":1}\n{\"seq\":2}\n");

    assert_eq!(codec.decode(&mut buf).unwrap(), Some("{\"seq\":1}".to_owned()));
    assert_eq!(codec.decode(&mut buf).unwrap(), Some("{\"seq\":2}".to_owned()));
    assert_eq!(codec.decode(&mut buf).unwrap(), None);
}

#[test]
fn codec_buffers_partial_lines() {
    let mut codec = ChildLineCodec::new();
    let mut buf = BytesMut::from("{\"seq\":");
    assert_eq!(codec.decode(&mut buf).unwrap(), None);

    buf.extend_from_slice(b"7}\n");
    assert_eq!(codec.decode(&mut buf).unwrap(), Some("{\"seq\":7}".to_owned()));
}

#[test]
fn codec_rejects_oversized_lines() {
    let mut codec = ChildLineCodec::new();
    let mut buf = BytesMut::from("x".repeat(MAX_LINE_BYTES + 1).as_str());

    let err = codec.decode(&mut buf).unwrap_err();
    assert!(matches!(err, AppError::Protocol(_)));
    assert!(err.to_string().contains("line too long"));
}

#[test]
fn codec_cap_is_configurable_and_recovers_after_overflow() {
    let mut codec = ChildLineCodec::with_max_line_bytes(12);
    assert_eq!(codec.max_line_bytes(), 12);
    let mut buf = BytesMut::from("0123456789abcdef\n{\"seq\":1}\n");

    let err = codec.decode(&mut buf).unwrap_err();
    assert!(err.to_string().contains("exceeded 12 bytes"), "got: {err}");
    assert_eq!(codec.decode(&mut buf).unwrap(), Some("{\"seq\":1}".to_owned()));
}

#[test]
fn codec_skips_blank_lines() {
    let mut codec = ChildLineCodec::new();
    let mut buf = BytesMut::from("\n  \r\n{\"seq\":4}\n\n");

    assert_eq!(codec.decode(&mut buf).unwrap(), Some("{\"seq\":4}".to_owned()));
    assert_eq!(codec.decode(&mut buf).unwrap(), None);
    assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
}

#[test]
fn request_carries_run_number_and_payload() {
    let request = WireRequest::new(3, &Command::start(101), Some(serde_json::json!({"a": 1})));
    let line = encode_line(&request).unwrap();

    assert!(!line.contains('\n'));
    let value: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value["seq"], 3);
    assert_eq!(value["command"], "start");
    assert_eq!(value["run_number"], 101);
    assert_eq!(value["payload"]["a"], 1);

    let back = parse_request(&line).unwrap();
    assert_eq!(back.command, CommandKind::Start);
    assert_eq!(back.run_number, Some(101));
}

#[test]
fn replies_map_to_child_replies() {
    let acked = parse_reply(r#"{"seq":1,"status":"acked","detail":"ok"}"#).unwrap();
    assert_eq!(acked.into_child_reply(), ChildReply::Acked("ok".into()));

    let denied = encode_line(&WireReply::denied(2, "busy")).unwrap();
    let denied = parse_reply(&denied).unwrap();
    assert_eq!(denied.seq, 2);
    assert_eq!(denied.into_child_reply(), ChildReply::Denied("busy".into()));
}

#[test]
fn malformed_reply_is_protocol_error() {
    let err = parse_reply(r#"{"seq":1,"status":"maybe"}"#).unwrap_err();
    assert!(matches!(err, AppError::Protocol(_)));
}

#[test]
fn ready_line_must_be_ready() {
    let ready = parse_ready(r#"{"ready":true,"name":"ru-00","pid":4242}"#).unwrap();
    assert_eq!(ready.name, "ru-00");
    assert_eq!(ready.pid, Some(4242));

    let err = parse_ready(r#"{"ready":false,"name":"ru-00"}"#).unwrap_err();
    assert!(err.to_string().contains("not ready"));
}

#[test]
fn unknown_command_survives_the_wire() {
    let line = encode_line(&WireRequest::new(
        1,
        &Command::new(CommandKind::Other("calibrate".into())),
        None,
    ))
    .unwrap();
    let back = parse_request(&line).unwrap();
    assert_eq!(back.command, CommandKind::Other("calibrate".into()));
}
