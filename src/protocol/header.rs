//! Field accessors for the 36 byte frame header shared by every packet.

use super::serial::Serial;
use crate::foundation::error::CanvasResult;

/// Header length in bytes; payloads start here.
pub const HEADER_SIZE: usize = 36;
/// Protocol number carried by every packet.
pub const PROTOCOL: u16 = 1024;

const PROTOCOL_MASK: u16 = 0x0fff;
const ADDRESSABLE_BIT: u8 = 0b1_0000;
const TAGGED_BIT: u8 = 0b10_0000;
const RES_REQUIRED_BIT: u8 = 0b01;
const ACK_REQUIRED_BIT: u8 = 0b10;

/// Canonical header for a targeted packet of `pkt_type`, `size` bytes long.
pub(crate) fn template(pkt_type: u16, size: u16) -> [u8; HEADER_SIZE] {
    let mut out = [0u8; HEADER_SIZE];
    out[0..2].copy_from_slice(&size.to_le_bytes());
    out[2..4].copy_from_slice(&PROTOCOL.to_le_bytes());
    out[3] |= ADDRESSABLE_BIT;
    out[32..34].copy_from_slice(&pkt_type.to_le_bytes());
    out
}

pub(crate) fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

pub(crate) fn write_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

pub(crate) fn write_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Transition durations travel as milliseconds.
pub(crate) fn secs_to_ms(secs: f64) -> u32 {
    if secs.is_nan() || secs <= 0.0 {
        return 0;
    }
    (secs * 1000.0).round().min(f64::from(u32::MAX)) as u32
}

fn set_bit(byte: &mut u8, mask: u8, on: bool) {
    if on {
        *byte |= mask;
    } else {
        *byte &= !mask;
    }
}

/// Typed view over a packet buffer's header.
///
/// Implementors only expose their buffer; every accessor reads or writes the bytes in place.
pub trait Frame {
    fn buf(&self) -> &[u8];
    fn buf_mut(&mut self) -> &mut [u8];

    fn size(&self) -> u16 {
        read_u16(self.buf(), 0)
    }

    fn protocol(&self) -> u16 {
        read_u16(self.buf(), 2) & PROTOCOL_MASK
    }

    fn set_protocol(&mut self, protocol: u16) {
        let buf = self.buf_mut();
        let current = read_u16(buf, 2);
        write_u16(buf, 2, (current & !PROTOCOL_MASK) | (protocol & PROTOCOL_MASK));
    }

    fn addressable(&self) -> bool {
        self.buf()[3] & ADDRESSABLE_BIT != 0
    }

    fn set_addressable(&mut self, on: bool) {
        set_bit(&mut self.buf_mut()[3], ADDRESSABLE_BIT, on);
    }

    fn tagged(&self) -> bool {
        self.buf()[3] & TAGGED_BIT != 0
    }

    fn set_tagged(&mut self, on: bool) {
        set_bit(&mut self.buf_mut()[3], TAGGED_BIT, on);
    }

    fn source(&self) -> u32 {
        read_u32(self.buf(), 4)
    }

    fn set_source(&mut self, source: u32) {
        write_u32(self.buf_mut(), 4, source);
    }

    fn target(&self) -> CanvasResult<Serial> {
        Serial::from_target(&self.buf()[8..16])
    }

    fn set_target(&mut self, serial: Serial) {
        self.buf_mut()[8..16].copy_from_slice(&serial.target());
    }

    fn res_required(&self) -> bool {
        self.buf()[22] & RES_REQUIRED_BIT != 0
    }

    fn set_res_required(&mut self, on: bool) {
        set_bit(&mut self.buf_mut()[22], RES_REQUIRED_BIT, on);
    }

    fn ack_required(&self) -> bool {
        self.buf()[22] & ACK_REQUIRED_BIT != 0
    }

    fn set_ack_required(&mut self, on: bool) {
        set_bit(&mut self.buf_mut()[22], ACK_REQUIRED_BIT, on);
    }

    fn sequence(&self) -> u8 {
        self.buf()[23]
    }

    fn set_sequence(&mut self, sequence: u8) {
        self.buf_mut()[23] = sequence;
    }

    fn pkt_type(&self) -> u16 {
        read_u16(self.buf(), 32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Raw([u8; HEADER_SIZE]);

    impl Frame for Raw {
        fn buf(&self) -> &[u8] {
            &self.0
        }
        fn buf_mut(&mut self) -> &mut [u8] {
            &mut self.0
        }
    }

    #[test]
    fn template_layout() {
        let raw = Raw(template(715, 558));
        assert_eq!(&raw.0[0..4], &[0x2e, 0x02, 0x00, 0x14]);
        assert_eq!(raw.size(), 558);
        assert_eq!(raw.protocol(), 1024);
        assert!(raw.addressable());
        assert!(!raw.tagged());
        assert_eq!(raw.pkt_type(), 715);
    }

    #[test]
    fn flag_bits_are_independent() {
        let mut raw = Raw(template(715, 558));
        raw.set_tagged(true);
        raw.set_ack_required(true);
        assert_eq!(raw.0[3], 0x34);
        assert_eq!(raw.0[22], 0b10);
        assert!(!raw.res_required());

        raw.set_res_required(true);
        raw.set_ack_required(false);
        assert_eq!(raw.0[22], 0b01);

        raw.set_protocol(0x0fff);
        assert!(raw.addressable() && raw.tagged());
        assert_eq!(raw.protocol(), 0x0fff);
    }

    #[test]
    fn source_target_sequence() {
        let mut raw = Raw(template(715, 558));
        raw.set_source(0xdead_beef);
        raw.set_sequence(9);
        let serial: Serial = "d073d5000042".parse().unwrap();
        raw.set_target(serial);
        assert_eq!(raw.source(), 0xdead_beef);
        assert_eq!(raw.sequence(), 9);
        assert_eq!(raw.target().unwrap(), serial);
        assert_eq!(&raw.0[14..16], &[0, 0]);
    }

    #[test]
    fn durations_are_milliseconds() {
        assert_eq!(secs_to_ms(1.5), 1500);
        assert_eq!(secs_to_ms(-1.0), 0);
    }
}
