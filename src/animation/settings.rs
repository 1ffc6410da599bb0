use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    foundation::error::{CanvasError, CanvasResult},
    layout::rearrange::LayoutFlags,
};

/// Knobs every animation carries. Animations pick their own defaults; a run can then override
/// the ones listed in [`SettingsOverrides`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationSettings {
    /// Seconds between ticks.
    pub every: f64,
    /// Transition duration sent with each frame, in seconds.
    pub duration: f64,
    /// Ask devices to acknowledge frames.
    pub retries: bool,
    /// Stop ticking after this many seconds.
    pub num_seconds: Option<f64>,
    pub message_timeout: f64,
    pub skip_background: bool,
    pub random_orientations: bool,
    pub skip_next_transition: bool,
    #[serde(flatten)]
    pub layout: LayoutFlags,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            every: 0.075,
            duration: 0.0,
            retries: false,
            num_seconds: None,
            message_timeout: 0.3,
            skip_background: false,
            random_orientations: false,
            skip_next_transition: false,
            layout: LayoutFlags::default(),
        }
    }
}

impl AnimationSettings {
    pub fn validate(&self) -> CanvasResult<()> {
        if !self.every.is_finite() || self.every <= 0.0 {
            return Err(CanvasError::configuration(format!(
                "every must be a positive number of seconds, got {}",
                self.every
            )));
        }
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(CanvasError::configuration(format!(
                "duration must not be negative, got {}",
                self.duration
            )));
        }
        if let Some(n) = self.num_seconds
            && !(n.is_finite() && n >= 0.0)
        {
            return Err(CanvasError::configuration(format!(
                "num_seconds must not be negative, got {n}"
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        secs(self.every)
    }

    pub fn max_time(&self) -> Option<Duration> {
        self.num_seconds.map(secs)
    }

    pub fn message_timeout(&self) -> Duration {
        secs(self.message_timeout)
    }
}

pub(crate) fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Run-level overrides for the overridable settings. Unset fields keep the animation's value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsOverrides {
    pub every: Option<f64>,
    pub retries: Option<bool>,
    pub duration: Option<f64>,
    pub num_seconds: Option<f64>,
    pub message_timeout: Option<f64>,
    pub skip_background: Option<bool>,
    pub random_orientations: Option<bool>,
    pub skip_next_transition: Option<bool>,
}

impl SettingsOverrides {
    pub fn apply(&self, settings: &mut AnimationSettings) {
        macro_rules! take {
            ($($field:ident),+) => {
                $(if let Some(v) = self.$field {
                    settings.$field = v;
                })+
            };
        }
        take!(
            every,
            retries,
            duration,
            message_timeout,
            skip_background,
            random_orientations,
            skip_next_transition
        );
        if self.num_seconds.is_some() {
            settings.num_seconds = self.num_seconds;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
