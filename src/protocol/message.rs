use super::{
    header::{Frame, read_u16},
    packets::{
        SET_COLOR_TYPE, SET_COLOR_ZONES_TYPE, SET_EXTENDED_COLOR_ZONES_TYPE,
        SET_LIGHT_POWER_TYPE, SetColor, SetColorZones, SetExtendedColorZones, SetLightPower,
    },
    serial::Serial,
    set64::{SET64_TYPE, Set64},
};
use crate::foundation::error::{CanvasError, CanvasResult};

/// Any packet the canvas can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Set64(Set64),
    SetColor(SetColor),
    SetLightPower(SetLightPower),
    SetColorZones(SetColorZones),
    SetExtendedColorZones(SetExtendedColorZones),
}

impl Message {
    /// Parse a packet, dispatching on its message type.
    pub fn from_bytes(bytes: &[u8]) -> CanvasResult<Self> {
        if bytes.len() < 36 {
            return Err(CanvasError::protocol(format!(
                "packet shorter than a header: {} bytes",
                bytes.len()
            )));
        }
        match read_u16(bytes, 32) {
            SET64_TYPE => Set64::from_bytes(bytes).map(Self::Set64),
            SET_COLOR_TYPE => SetColor::from_bytes(bytes).map(Self::SetColor),
            SET_LIGHT_POWER_TYPE => SetLightPower::from_bytes(bytes).map(Self::SetLightPower),
            SET_COLOR_ZONES_TYPE => SetColorZones::from_bytes(bytes).map(Self::SetColorZones),
            SET_EXTENDED_COLOR_ZONES_TYPE => {
                SetExtendedColorZones::from_bytes(bytes).map(Self::SetExtendedColorZones)
            }
            other => Err(CanvasError::protocol(format!(
                "unsupported message type {other}"
            ))),
        }
    }

    fn frame(&self) -> &dyn Frame {
        match self {
            Self::Set64(m) => m,
            Self::SetColor(m) => m,
            Self::SetLightPower(m) => m,
            Self::SetColorZones(m) => m,
            Self::SetExtendedColorZones(m) => m,
        }
    }

    fn frame_mut(&mut self) -> &mut dyn Frame {
        match self {
            Self::Set64(m) => m,
            Self::SetColor(m) => m,
            Self::SetLightPower(m) => m,
            Self::SetColorZones(m) => m,
            Self::SetExtendedColorZones(m) => m,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.frame().buf()
    }

    pub fn pkt_type(&self) -> u16 {
        self.frame().pkt_type()
    }

    pub fn target(&self) -> CanvasResult<Serial> {
        self.frame().target()
    }

    pub fn ack_required(&self) -> bool {
        self.frame().ack_required()
    }

    pub fn set_ack_required(&mut self, on: bool) {
        self.frame_mut().set_ack_required(on);
    }

    /// Stamp the per-client fields the transport owns.
    pub fn stamp(&mut self, source: u32, sequence: u8) {
        let frame = self.frame_mut();
        frame.set_source(source);
        frame.set_sequence(sequence);
    }
}

impl From<Set64> for Message {
    fn from(m: Set64) -> Self {
        Self::Set64(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::color::Color;

    #[test]
    fn dispatches_on_type() {
        let serial: Serial = "d073d5000003".parse().unwrap();
        let msgs = [
            Message::Set64(Set64::for_tile(serial, 1, 8, 0.0, false, &[Color::WHITE])),
            Message::SetColor(SetColor::new(serial, Color::WHITE, 1.0)),
            Message::SetLightPower(SetLightPower::new(serial, 0, 0.0)),
            Message::SetColorZones(SetColorZones::new(serial, 0, 1, Color::WHITE, 0.0)),
            Message::SetExtendedColorZones(SetExtendedColorZones::new(
                serial,
                0,
                &[Color::WHITE],
                0.0,
            )),
        ];
        for msg in msgs {
            let parsed = Message::from_bytes(msg.as_bytes()).unwrap();
            assert_eq!(parsed, msg);
            assert_eq!(parsed.target().unwrap(), serial);
        }
    }

    #[test]
    fn stamp_and_flags() {
        let serial: Serial = "d073d5000003".parse().unwrap();
        let mut msg = Message::SetLightPower(SetLightPower::new(serial, 0, 0.0));
        msg.stamp(7, 3);
        msg.set_ack_required(true);
        assert!(msg.ack_required());
        assert_eq!(&msg.as_bytes()[4..8], &7u32.to_le_bytes());
        assert_eq!(msg.as_bytes()[23], 3);
    }

    #[test]
    fn rejects_unknown() {
        assert!(Message::from_bytes(&[0u8; 10]).is_err());
        assert!(Message::from_bytes(&[0u8; 36]).is_err());
    }
}
