use std::sync::Arc;

use super::{background::Background, settings::AnimationSettings};
use crate::{
    canvas::{
        color::Color,
        device::Device,
        part::{MsgOptions, Part},
        store::Canvas,
    },
    layout::coords::DeviceCoords,
    protocol::{message::Message, serial::Serial},
};

/// A device taking part in an animation run.
///
/// Remembers the colors last computed for it (canvas order, one list per part) so the next
/// animation of a playlist can start from what is on the device.
#[derive(Debug, Clone)]
pub struct AnimationDevice {
    coords: DeviceCoords,
    colors: Vec<Vec<Color>>,
    background_canvas: Option<Canvas>,
    randomize: bool,
    reinstate: Vec<Message>,
}

impl AnimationDevice {
    /// `coords` are the device's parts where the device reports them, carrying the colors read
    /// off the device as their original colors.
    pub fn new(coords: DeviceCoords, reinstate_duration: f64) -> Self {
        let colors = coords
            .parts()
            .iter()
            .map(|p| p.original_colors().map(<[Color]>::to_vec).unwrap_or_default())
            .collect();
        let opts = MsgOptions {
            acks: true,
            duration: reinstate_duration,
            randomize: false,
            power_on: false,
        };
        let reinstate = coords
            .parts()
            .iter()
            .filter_map(|p| p.original_colors().map(|c| p.msgs(c, &opts)))
            .flatten()
            .collect();
        Self {
            coords,
            colors,
            background_canvas: None,
            randomize: false,
            reinstate,
        }
    }

    pub fn serial(&self) -> Serial {
        self.coords.serial()
    }

    pub fn device(&self) -> &Arc<Device> {
        self.coords.device()
    }

    /// Parts at their reported positions.
    pub fn coords(&self) -> &DeviceCoords {
        &self.coords
    }

    pub fn colors(&self) -> &[Vec<Color>] {
        &self.colors
    }

    /// Packets restoring the colors the device had when it was found.
    pub fn reinstate_msgs(&self) -> &[Message] {
        &self.reinstate
    }

    pub(crate) fn set_animation(
        &mut self,
        settings: &AnimationSettings,
        background: &Background,
        placed: &[Part],
    ) {
        self.randomize = settings.random_orientations;
        self.background_canvas = background.background_canvas(&self.colors, placed);
    }

    /// Resolve `canvas` over the placed parts and remember the result.
    pub(crate) fn messages_for(
        &mut self,
        canvas: &Canvas,
        placed: &[Part],
        settings: &AnimationSettings,
        background: &Background,
    ) -> Vec<Message> {
        let opts = MsgOptions {
            acks: settings.retries,
            duration: settings.duration,
            randomize: self.randomize,
            power_on: false,
        };
        let bg = self.background_canvas.as_ref();
        let frames = canvas.messages_for(placed, &opts, |_, point| background.fallback(bg, point));
        let mut msgs = Vec::new();
        self.colors = frames
            .into_iter()
            .map(|frame| {
                msgs.extend(frame.msgs);
                frame.colors
            })
            .collect();
        msgs
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        canvas::{device::Capability, point::Point},
        layout::coords::ChainItem,
        protocol::{header::Frame as _, set64::Set64},
    };

    fn tile_device(colors: Option<Vec<Vec<Color>>>) -> AnimationDevice {
        let device = Arc::new(Device::new(
            Serial([0xd0, 0x73, 0xd5, 0, 0, 7]),
            Capability::matrix("Tile"),
        ));
        let chain = [ChainItem::new(0.0, 0.0, 8, 8), ChainItem::new(1.0, 0.0, 8, 8)];
        let coords = DeviceCoords::from_chain(
            device,
            &chain,
            colors.as_deref(),
            &mut StdRng::seed_from_u64(1),
        );
        AnimationDevice::new(coords, 1.0)
    }

    fn set64(msg: &Message) -> &Set64 {
        match msg {
            Message::Set64(m) => m,
            other => panic!("expected Set64, got {other:?}"),
        }
    }

    #[test]
    fn reinstate_restores_read_colors() {
        let red = Color::new(0.0, 1.0, 1.0, 3500);
        let green = Color::new(120.0, 1.0, 1.0, 3500);
        let d = tile_device(Some(vec![vec![red; 64], vec![green; 64]]));
        assert_eq!(d.reinstate_msgs().len(), 2);
        let second = set64(&d.reinstate_msgs()[1]);
        assert_eq!(second.tile_index(), 1);
        assert_eq!(second.duration(), 1.0);
        assert!(d.reinstate_msgs().iter().all(Message::ack_required));
        assert!(second.colors().iter().all(|c| (c.hue - 120.0).abs() < 0.01));
        assert_eq!(d.colors()[0], vec![red; 64]);
    }

    #[test]
    fn no_read_colors_means_nothing_to_reinstate() {
        let d = tile_device(None);
        assert!(d.reinstate_msgs().is_empty());
        assert!(d.colors().iter().all(Vec::is_empty));
    }

    #[test]
    fn undrawn_points_use_the_background() {
        let blue = Color::new(250.0, 1.0, 1.0, 3500);
        let mut d = tile_device(Some(vec![vec![blue; 64], vec![blue; 64]]));
        let placed = d.coords().parts().to_vec();
        let settings = AnimationSettings::default();
        let background = Background::Maintain(None);
        d.set_animation(&settings, &background, &placed);

        let mut canvas = Canvas::new();
        let drawn = placed[0].points()[0];
        canvas.set(drawn, Color::WHITE);
        let msgs = d.messages_for(&canvas, &placed, &settings, &background);
        assert_eq!(msgs.len(), 2);
        assert_eq!(d.colors()[0][0], Color::WHITE);
        assert_eq!(d.colors()[0][1], blue);
        assert!(d.colors()[1].iter().all(|c| *c == blue));
        assert!(!placed[1].points().contains(&Point::new(drawn.col, drawn.row)));
    }

    #[test]
    fn frame_carries_settings() {
        let mut d = tile_device(None);
        let placed = d.coords().parts().to_vec();
        let settings = AnimationSettings {
            retries: true,
            duration: 0.5,
            ..AnimationSettings::default()
        };
        let msgs = d.messages_for(&Canvas::new(), &placed, &settings, &Background::Clear);
        let first = set64(&msgs[0]);
        assert!(first.ack_required());
        assert_eq!(first.duration(), 0.5);
        assert!(first.colors().iter().all(|c| c.brightness == 0.0));
    }
}
