//! TUN device creation.
//!
//! The gateway uses a single layer 3 TUN interface without the packet
//! information header; every frame read or written is a bare IP packet.

mod device;

pub use device::{TunDevice, tun_request};

/// Path to the TUN clone device.
pub const TUN_DEVICE_PATH: &str = "/dev/net/tun";
