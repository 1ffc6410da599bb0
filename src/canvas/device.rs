use std::{cmp::Ordering, fmt, hash::Hash};

use serde::{Deserialize, Serialize};

use crate::protocol::serial::Serial;

/// What a device can display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capability {
    pub has_matrix: bool,
    pub has_multizone: bool,
    pub has_extended_multizone: bool,
    pub product: String,
}

impl Capability {
    pub fn matrix(product: impl Into<String>) -> Self {
        Self {
            has_matrix: true,
            product: product.into(),
            ..Self::default()
        }
    }

    pub fn strip(product: impl Into<String>, extended: bool) -> Self {
        Self {
            has_multizone: true,
            has_extended_multizone: extended,
            product: product.into(),
            ..Self::default()
        }
    }

    pub fn bulb(product: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            ..Self::default()
        }
    }
}

/// A physical device; identity is the serial alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub serial: Serial,
    pub cap: Capability,
}

impl Device {
    pub fn new(serial: Serial, cap: Capability) -> Self {
        Self { serial, cap }
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.serial == other.serial
    }
}

impl Eq for Device {}

impl Hash for Device {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.serial.hash(state);
    }
}

impl PartialOrd for Device {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Device {
    fn cmp(&self, other: &Self) -> Ordering {
        self.serial.cmp(&other.serial)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cap.product.is_empty() {
            write!(f, "{}", self.serial)
        } else {
            write!(f, "{} ({})", self.serial, self.cap.product)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_serial_only() {
        let serial: Serial = "d073d5000005".parse().unwrap();
        let a = Device::new(serial, Capability::matrix("Tile"));
        let b = Device::new(serial, Capability::strip("Z", true));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "d073d5000005 (Tile)");
    }
}
