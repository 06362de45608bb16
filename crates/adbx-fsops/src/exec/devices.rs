//! Parsing of `adb devices -l` output.

use serde::{Deserialize, Serialize};

/// Connection state reported for a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    /// Online and authorized.
    Device,
    /// Known but not responding.
    Offline,
    /// Waiting for the user to accept the host key.
    Unauthorized,
    /// Recovery, sideload, bootloader, and other states.
    Other(String),
}

impl DeviceState {
    fn parse(raw: &str) -> Self {
        match raw {
            "device" => Self::Device,
            "offline" => Self::Offline,
            "unauthorized" => Self::Unauthorized,
            other => Self::Other(other.to_string()),
        }
    }

    /// Label as printed by the tool.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Device => "device",
            Self::Offline => "offline",
            Self::Unauthorized => "unauthorized",
            Self::Other(other) => other,
        }
    }
}

/// One attached device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Serial used with `-s`.
    pub id: String,
    /// Connection state.
    pub state: DeviceState,
    /// `model:` attribute, when reported.
    pub model: Option<String>,
    /// `product:` attribute, when reported.
    pub product: Option<String>,
}

impl DeviceInfo {
    /// Whether commands can target the device.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.state == DeviceState::Device
    }
}

/// Parse the listing printed by `adb devices -l`.
#[must_use]
pub fn parse_devices(stdout: &str) -> Vec<DeviceInfo> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let id = fields.next()?.to_string();
            let state = DeviceState::parse(fields.next()?);
            let mut info = DeviceInfo {
                id,
                state,
                model: None,
                product: None,
            };
            for attribute in fields {
                match attribute.split_once(':') {
                    Some(("model", value)) => info.model = Some(value.to_string()),
                    Some(("product", value)) => info.product = Some(value.to_string()),
                    _ => {}
                }
            }
            Some(info)
        })
        .collect()
}
