use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::foundation::error::{CanvasError, CanvasResult};

/// Six byte device address, written as 12 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Serial(pub [u8; 6]);

impl Serial {
    /// The header's 8 byte target field for this serial.
    pub fn target(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..6].copy_from_slice(&self.0);
        out
    }

    pub fn from_target(target: &[u8]) -> CanvasResult<Self> {
        let bytes: [u8; 6] = target
            .get(..6)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| CanvasError::protocol("target must hold at least 6 bytes"))?;
        Ok(Self(bytes))
    }
}

impl FromStr for Serial {
    type Err = CanvasError;

    fn from_str(s: &str) -> CanvasResult<Self> {
        let s = s.trim();
        let decoded = hex::decode(s)
            .map_err(|err| CanvasError::protocol(format!("invalid serial \"{s}\": {err}")))?;
        let bytes: [u8; 6] = decoded.try_into().map_err(|d: Vec<u8>| {
            CanvasError::protocol(format!("serial \"{s}\" must be 6 bytes, got {}", d.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for Serial {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Serial {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays() {
        let serial: Serial = "D073D5001337".parse().unwrap();
        assert_eq!(serial.to_string(), "d073d5001337");
        assert_eq!(serial.target(), [0xd0, 0x73, 0xd5, 0x00, 0x13, 0x37, 0, 0]);
        assert_eq!(Serial::from_target(&serial.target()).unwrap(), serial);
    }

    #[test]
    fn rejects_bad_serials() {
        assert!("d073".parse::<Serial>().is_err());
        assert!("d073d500133700".parse::<Serial>().is_err());
        assert!("zz73d5001337".parse::<Serial>().is_err());
        assert!(Serial::from_target(&[1, 2]).is_err());
    }

    #[test]
    fn header_target_is_the_serial_padded() {
        let serial: Serial = " d073d5000009 ".parse().unwrap();
        let msg = crate::protocol::packets::SetLightPower::new(serial, u16::MAX, 1.0);
        assert_eq!(&msg.as_bytes()[8..16], &[0xd0, 0x73, 0xd5, 0, 0, 9, 0, 0]);
    }

    #[test]
    fn serde_uses_hex_string() {
        let serial: Serial = serde_json::from_str("\"d073d5000001\"").unwrap();
        assert_eq!(serde_json::to_string(&serial).unwrap(), "\"d073d5000001\"");
    }
}
