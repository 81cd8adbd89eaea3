//! Wire codec for device frames. Decoding never fails: a corrupt frame
//! must not tear down the session, so malformed input becomes
//! [`DeviceEvent::Unknown`] and is only logged.

use serde::Deserialize;
use tracing::warn;

use shared::protocol::{DeviceCommand, DeviceEvent};

#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(default)]
    action: Option<String>,
}

pub fn encode(command: &DeviceCommand) -> serde_json::Result<String> {
    serde_json::to_string(command)
}

pub fn decode(frame: &str) -> DeviceEvent {
    match serde_json::from_str::<InboundFrame>(frame) {
        Ok(InboundFrame {
            action: Some(action),
        }) => match action.as_str() {
            "wake" => DeviceEvent::Wake,
            "next" => DeviceEvent::Next,
            "prev" => DeviceEvent::Prev,
            "confirm" => DeviceEvent::Confirm,
            _ => DeviceEvent::Unknown(action),
        },
        Ok(InboundFrame { action: None }) => {
            warn!(frame, "device frame missing action field");
            DeviceEvent::Unknown(frame.to_string())
        }
        Err(err) => {
            warn!(error = %err, "undecodable device frame");
            DeviceEvent::Unknown(frame.to_string())
        }
    }
}
