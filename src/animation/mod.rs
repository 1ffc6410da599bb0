pub mod background;
pub mod demo;
pub mod device;
pub mod event;
pub mod runtime;
pub mod settings;
pub mod sink;
pub mod ticker;
pub mod traits;
