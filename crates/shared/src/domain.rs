use serde::{Deserialize, Serialize};

/// Display colors supported by the companion device LED ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceColor {
    Blue,
    Green,
    Yellow,
}

impl DeviceColor {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceColor::Blue => "blue",
            DeviceColor::Green => "green",
            DeviceColor::Yellow => "yellow",
        }
    }

    /// Accepts a canonical color name or one of the legacy hex values that
    /// older task payloads carried for the category accent colors.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "blue" | "#00d2ff" => Some(DeviceColor::Blue),
            "green" | "#4caf50" => Some(DeviceColor::Green),
            "yellow" | "#ffc107" => Some(DeviceColor::Yellow),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    Body,
    Care,
    Focus,
    /// Catch-all for category strings this build does not know about.
    #[serde(other)]
    Unspecified,
}

impl TaskCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskCategory::Body => "body",
            TaskCategory::Care => "care",
            TaskCategory::Focus => "focus",
            TaskCategory::Unspecified => "unspecified",
        }
    }

    pub fn color(self) -> DeviceColor {
        match self {
            TaskCategory::Body => DeviceColor::Blue,
            TaskCategory::Care | TaskCategory::Unspecified => DeviceColor::Green,
            TaskCategory::Focus => DeviceColor::Yellow,
        }
    }

    /// Icon name shown on the device display. Unrecognized categories get
    /// the generic spark glyph.
    pub fn icon(self) -> &'static str {
        match self {
            TaskCategory::Body => "run",
            TaskCategory::Care => "leaf",
            TaskCategory::Focus => "target",
            TaskCategory::Unspecified => "spark",
        }
    }
}

/// One recommended micro-task. Owned by the recommendation layer; the
/// device session only ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub desc: String,
    #[serde(rename = "type")]
    pub category: TaskCategory,
    /// Canonical color name, or a legacy hex value from older upstreams.
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VibratePattern {
    Short,
    Long,
}
