use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    animation::settings::{SettingsOverrides, secs},
    foundation::error::{CanvasError, CanvasResult},
};

/// Whether sends are throttled.
///
/// Written as `false`, `true` (two packets in flight per device) or an in-flight limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoisyNetwork {
    Enabled(bool),
    Limit(usize),
}

impl Default for NoisyNetwork {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

impl NoisyNetwork {
    pub const DEFAULT_LIMIT: usize = 2;

    /// In-flight limit per device, or `None` for the fast path.
    pub fn inflight_limit(&self) -> Option<usize> {
        match *self {
            Self::Enabled(false) | Self::Limit(0) => None,
            Self::Enabled(true) => Some(Self::DEFAULT_LIMIT),
            Self::Limit(n) => Some(n),
        }
    }
}

/// Options for a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunOptions {
    /// Animate every device on one shared canvas rather than one animation per device.
    pub combined: bool,
    /// Put back each device's original colors when the run ends.
    pub reinstate_on_end: bool,
    pub reinstate_duration: f64,
    /// Seconds between discovery rounds.
    pub rediscover_every: f64,
    pub noisy_network: NoisyNetwork,
    /// Seconds a throttled send waits for a free slot.
    pub message_timeout: f64,
    /// Seed for orientation picks and animation randomness.
    pub seed: Option<u64>,
    pub animation_options: SettingsOverrides,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            combined: true,
            reinstate_on_end: false,
            reinstate_duration: 1.0,
            rediscover_every: 20.0,
            noisy_network: NoisyNetwork::default(),
            message_timeout: 1.0,
            seed: None,
            animation_options: SettingsOverrides::default(),
        }
    }
}

impl RunOptions {
    pub fn from_json(json: &str) -> CanvasResult<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> CanvasResult<()> {
        for (name, value) in [
            ("rediscover_every", self.rediscover_every),
            ("message_timeout", self.message_timeout),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(CanvasError::configuration(format!(
                    "{name} must be a positive number of seconds, got {value}"
                )));
            }
        }
        if !self.reinstate_duration.is_finite() || self.reinstate_duration < 0.0 {
            return Err(CanvasError::configuration(format!(
                "reinstate_duration must not be negative, got {}",
                self.reinstate_duration
            )));
        }
        Ok(())
    }

    pub fn rediscover_every(&self) -> Duration {
        secs(self.rediscover_every)
    }

    pub fn message_timeout(&self) -> Duration {
        secs(self.message_timeout)
    }
}
