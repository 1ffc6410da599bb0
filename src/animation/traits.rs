use tokio::sync::mpsc;

use super::{
    event::{AnimationEvent, Step, UserEvent},
    settings::AnimationSettings,
};
use crate::foundation::error::{CanvasError, CanvasResult};

/// Stream of events an animation produces itself, merged with its ticks.
pub type UserEvents = mpsc::Receiver<anyhow::Result<UserEvent>>;

/// An animation: reacts to lifecycle events and returns canvases on ticks.
///
/// The runtime owns a `State` per run and only ever hands it back to the animation.
pub trait Animation: Send + 'static {
    type State: Default + Send + 'static;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn settings(&self) -> AnimationSettings {
        AnimationSettings::default()
    }

    fn process_event(
        &mut self,
        _event: AnimationEvent<'_>,
        _state: &mut Self::State,
    ) -> CanvasResult<Step> {
        Err(CanvasError::configuration(
            "Animation does not implement process_event",
        ))
    }

    /// Taken once when the animation starts.
    fn user_events(&mut self) -> Option<UserEvents> {
        None
    }
}

/// Object-safe form of [`Animation`] with its state attached.
pub trait DynAnimation: Send {
    fn name(&self) -> &str;
    fn settings(&self) -> AnimationSettings;
    fn process_event(&mut self, event: AnimationEvent<'_>) -> CanvasResult<Step>;
    fn user_events(&mut self) -> Option<UserEvents>;
}

struct WithState<A: Animation> {
    animation: A,
    state: A::State,
}

impl<A: Animation> DynAnimation for WithState<A> {
    fn name(&self) -> &str {
        self.animation.name()
    }

    fn settings(&self) -> AnimationSettings {
        self.animation.settings()
    }

    fn process_event(&mut self, event: AnimationEvent<'_>) -> CanvasResult<Step> {
        self.animation.process_event(event, &mut self.state)
    }

    fn user_events(&mut self) -> Option<UserEvents> {
        self.animation.user_events()
    }
}

/// Box an animation with fresh state.
pub fn boxed<A: Animation>(animation: A) -> Box<dyn DynAnimation> {
    Box::new(WithState {
        animation,
        state: A::State::default(),
    })
}
