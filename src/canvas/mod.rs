//! Colors, points, parts and the canvas they are painted on.

pub mod blur;
pub mod color;
pub mod device;
pub mod kdtree;
pub mod orientation;
pub mod part;
pub mod point;
pub mod store;
