//! Wire packets, packed by hand for frame-rate throughput.

pub mod cache;
pub mod header;
pub mod message;
pub mod multizone;
pub mod packets;
pub mod serial;
pub mod set64;
