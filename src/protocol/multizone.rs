//! Messages for linear strips.

use super::{
    message::Message,
    packets::{EXTENDED_ZONES, SetColorZones, SetExtendedColorZones},
    serial::Serial,
};
use crate::canvas::{color::Color, device::Capability};

/// Turns a flat per-zone color list into strip messages.
///
/// Extended devices get one bulk packet per 82 zones; everything else gets one zone-range packet
/// per run of identical colors. The branch is taken on capability alone.
#[derive(Debug, Clone)]
pub struct MultizoneMessages<'a> {
    serial: Serial,
    extended: bool,
    colors: &'a [Color],
    duration: f64,
    zone_index: usize,
}

impl<'a> MultizoneMessages<'a> {
    pub fn new(serial: Serial, cap: &Capability, colors: &'a [Color], duration: f64) -> Self {
        Self {
            serial,
            extended: cap.has_extended_multizone,
            colors,
            duration,
            zone_index: 0,
        }
    }

    pub fn zone_index(mut self, zone_index: usize) -> Self {
        self.zone_index = zone_index;
        self
    }

    pub fn msgs(&self) -> Vec<Message> {
        if self.colors.is_empty() {
            return Vec::new();
        }
        if self.extended {
            self.extended_msgs()
        } else {
            self.legacy_msgs()
        }
    }

    /// `(start, end, color)` with inclusive zone indices.
    pub fn runs(&self) -> Vec<(usize, usize, Color)> {
        let mut runs: Vec<(usize, usize, Color)> = Vec::new();
        for (i, color) in self.colors.iter().enumerate() {
            let zone = i + self.zone_index;
            match runs.last_mut() {
                Some((_, end, current)) if current == color => *end = zone,
                _ => runs.push((zone, zone, *color)),
            }
        }
        runs
    }

    fn legacy_msgs(&self) -> Vec<Message> {
        self.runs()
            .into_iter()
            .map(|(start, end, color)| {
                let mut msg = Message::SetColorZones(SetColorZones::new(
                    self.serial,
                    clamp_zone(start),
                    clamp_zone(end),
                    color,
                    self.duration,
                ));
                msg.set_ack_required(true);
                msg
            })
            .collect()
    }

    fn extended_msgs(&self) -> Vec<Message> {
        self.colors
            .chunks(EXTENDED_ZONES)
            .enumerate()
            .map(|(i, chunk)| {
                let index = self.zone_index + i * EXTENDED_ZONES;
                let mut msg = Message::SetExtendedColorZones(SetExtendedColorZones::new(
                    self.serial,
                    u16::try_from(index).unwrap_or(u16::MAX),
                    chunk,
                    self.duration,
                ));
                msg.set_ack_required(true);
                msg
            })
            .collect()
    }
}

fn clamp_zone(zone: usize) -> u8 {
    u8::try_from(zone).unwrap_or(u8::MAX)
}
