//! Where each device's parts sit on the canvas.

pub mod coords;
pub mod rearrange;
