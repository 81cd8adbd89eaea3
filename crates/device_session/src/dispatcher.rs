//! Maps application-level facts onto device commands. Commands are fire
//! and forget: with no open connection they are dropped with a warning,
//! never queued or replayed.

use std::sync::Arc;

use shared::domain::{DeviceColor, Task, VibratePattern};
use shared::protocol::DeviceCommand;

use crate::supervisor::DeviceSession;

/// Lower-cases the input and accepts a canonical color name or a known
/// legacy hex value. Anything unresolvable falls back to blue.
pub fn normalize_color(raw: &str) -> DeviceColor {
    DeviceColor::parse(raw).unwrap_or(DeviceColor::Blue)
}

fn task_color(task: &Task) -> DeviceColor {
    if task.color.trim().is_empty() {
        task.category.color()
    } else {
        normalize_color(&task.color)
    }
}

/// Color first, then icon, so the device never shows a fresh icon on a
/// stale accent color.
pub fn display_commands(task: &Task) -> [DeviceCommand; 2] {
    [
        DeviceCommand::Color {
            value: task_color(task),
        },
        DeviceCommand::Display {
            icon: task.category.icon().to_string(),
        },
    ]
}

pub struct CommandDispatcher {
    session: Arc<DeviceSession>,
}

impl CommandDispatcher {
    pub fn new(session: Arc<DeviceSession>) -> Self {
        Self { session }
    }

    pub async fn push_task(&self, task: &Task) {
        for command in display_commands(task) {
            self.session.send(&command).await;
        }
    }

    pub async fn vibrate(&self, pattern: VibratePattern) {
        self.session.send(&DeviceCommand::Vibrate { pattern }).await;
    }
}
