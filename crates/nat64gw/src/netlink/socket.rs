//! Low-level async netlink socket operations.

use std::future::Future;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::BytesMut;
use netlink_sys::{Socket, SocketAddr, protocols};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;

use crate::error::{Error, Result};

/// Receive buffer size; route ACKs are far smaller.
const RECV_BUF_SIZE: usize = 32768;

/// A datagram channel to the kernel routing subsystem.
///
/// [`NetlinkSocket`] is the kernel implementation; tests substitute an
/// in-memory one.
pub trait RouteTransport {
    /// Local port ID stamped into outgoing headers.
    fn pid(&self) -> u32;

    /// Allocate a sequence number unique to this transport.
    fn next_seq(&self) -> u32;

    /// Send one complete message.
    fn send(&self, msg: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Receive one datagram.
    fn recv_msg(&self) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Async `NETLINK_ROUTE` socket.
pub struct NetlinkSocket {
    /// The underlying async file descriptor.
    fd: AsyncFd<Socket>,
    /// Sequence number counter.
    seq: AtomicU32,
    /// Local port ID (assigned by kernel).
    pid: u32,
}

impl NetlinkSocket {
    /// Open a routing socket bound to a kernel-assigned port ID.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Result<Self> {
        let mut socket =
            Socket::new(protocols::NETLINK_ROUTE).map_err(Error::SocketSetupFailed)?;
        socket
            .set_non_blocking(true)
            .map_err(Error::SocketSetupFailed)?;

        // Bind to get a port ID
        let mut addr = SocketAddr::new(0, 0);
        socket.bind(&addr).map_err(Error::SocketSetupFailed)?;
        socket
            .get_address(&mut addr)
            .map_err(Error::SocketSetupFailed)?;
        let pid = addr.port_number();

        // Extended ACK only improves kernel error text; ignore if unsupported.
        socket.set_ext_ack(true).ok();

        let fd = AsyncFd::new(socket).map_err(Error::SocketSetupFailed)?;
        tracing::debug!(pid, "netlink route socket bound");

        Ok(Self {
            fd,
            seq: AtomicU32::new(1),
            pid,
        })
    }

    /// Send a message.
    pub async fn send(&self, msg: &[u8]) -> Result<()> {
        loop {
            let mut guard = self.fd.ready(Interest::WRITABLE).await?;

            match guard.try_io(|inner| inner.get_ref().send(msg, 0)) {
                Ok(result) => {
                    result?;
                    return Ok(());
                }
                Err(_would_block) => continue,
            }
        }
    }

    /// Receive a message, allocating a buffer.
    pub async fn recv_msg(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(RECV_BUF_SIZE);

        loop {
            let mut guard = self.fd.ready(Interest::READABLE).await?;

            match guard.try_io(|inner| inner.get_ref().recv(&mut buf, 0)) {
                Ok(result) => {
                    result?;
                    return Ok(buf.to_vec());
                }
                Err(_would_block) => continue,
            }
        }
    }
}

impl RouteTransport for NetlinkSocket {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    fn send(&self, msg: &[u8]) -> impl Future<Output = Result<()>> + Send {
        NetlinkSocket::send(self, msg)
    }

    fn recv_msg(&self) -> impl Future<Output = Result<Vec<u8>>> + Send {
        NetlinkSocket::recv_msg(self)
    }
}

impl AsRawFd for NetlinkSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.get_ref().as_raw_fd()
    }
}
