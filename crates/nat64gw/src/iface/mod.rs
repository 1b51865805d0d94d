//! Interface configuration through ioctls on datagram sockets.

mod configurator;
mod ioctl;

pub use configurator::{InterfaceConfigurator, InterfaceFlags, InterfaceHandle};
pub use ioctl::{
    AddrKind, AddrRequest, ControlSocket, FlagsRequest, In6IfReq, InterfaceControl, MtuRequest,
    sockaddr_to_v4, sockaddr_v4,
};
pub(crate) use ioctl::{SIOCADDRT, SIOCDELRT};
