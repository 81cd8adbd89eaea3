use serde_json::json;

use shared::domain::{DeviceColor, VibratePattern};
use shared::protocol::{DeviceCommand, DeviceEvent};

use crate::codec::{decode, encode};

#[test]
fn decodes_known_actions() {
    assert_eq!(decode(r#"{"action":"wake"}"#), DeviceEvent::Wake);
    assert_eq!(decode(r#"{"action":"next"}"#), DeviceEvent::Next);
    assert_eq!(decode(r#"{"action":"prev"}"#), DeviceEvent::Prev);
    assert_eq!(decode(r#"{"action":"confirm"}"#), DeviceEvent::Confirm);
}

#[test]
fn unknown_action_is_preserved_for_logging() {
    assert_eq!(
        decode(r#"{"action":"tilt"}"#),
        DeviceEvent::Unknown("tilt".to_string())
    );
}

#[test]
fn non_json_frame_decodes_to_unknown() {
    let frame = "definitely not json";
    assert_eq!(decode(frame), DeviceEvent::Unknown(frame.to_string()));
}

#[test]
fn frame_without_action_field_decodes_to_unknown() {
    let frame = r#"{"battery": 87}"#;
    assert_eq!(decode(frame), DeviceEvent::Unknown(frame.to_string()));
}

#[test]
fn encodes_color_command() {
    let frame = encode(&DeviceCommand::Color {
        value: DeviceColor::Green,
    })
    .expect("encode");
    let value: serde_json::Value = serde_json::from_str(&frame).expect("json");
    assert_eq!(value, json!({"cmd": "color", "value": "green"}));
}

#[test]
fn encodes_display_command() {
    let frame = encode(&DeviceCommand::Display {
        icon: "leaf".to_string(),
    })
    .expect("encode");
    let value: serde_json::Value = serde_json::from_str(&frame).expect("json");
    assert_eq!(value, json!({"cmd": "display", "icon": "leaf"}));
}

#[test]
fn encodes_vibrate_command() {
    let frame = encode(&DeviceCommand::Vibrate {
        pattern: VibratePattern::Short,
    })
    .expect("encode");
    let value: serde_json::Value = serde_json::from_str(&frame).expect("json");
    assert_eq!(value, json!({"cmd": "vibrate", "pattern": "short"}));
}
