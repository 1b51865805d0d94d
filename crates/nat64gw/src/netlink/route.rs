//! IPv6 route installation over rtnetlink.
//!
//! Each activation installs two routes through the TUN interface:
//!
//! - the host's own address as a /128 at the baseline metric, and
//! - the NAT64 prefix at baseline + 1,
//!
//! so the source address always wins over the translation prefix.
//!
//! ```ignore
//! use nat64gw::netlink::{GatewayRoutes, NetlinkRouteManager};
//!
//! let manager = NetlinkRouteManager::new()?;
//! let routes = manager.install(ifindex, source, &prefix, 1).await?;
//! // ...
//! manager.uninstall(&routes).await?;
//! ```

use std::net::{IpAddr, Ipv6Addr};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::builder::MessageBuilder;
use super::message::{NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NlMsgType, decode_ack};
use super::socket::{NetlinkSocket, RouteTransport};
use crate::error::{Error, Result};
use crate::translate::TranslationPrefix;

/// Default deadline for a kernel reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Route attribute IDs (RTA_*).
pub mod rta {
    pub const DST: u16 = 1;
    pub const OIF: u16 = 4;
    pub const PRIORITY: u16 = 6;
}

/// Route table IDs.
pub mod rt_table {
    pub const MAIN: u8 = 254;
}

/// Route protocols (RTPROT_*): who installed the route.
pub mod rt_proto {
    pub const STATIC: u8 = 4;
}

/// Route scope (RT_SCOPE_*).
pub mod rt_scope {
    pub const UNIVERSE: u8 = 0;
}

/// Route types (RTN_*).
pub mod rtn {
    pub const UNICAST: u8 = 1;
}

/// Route message (struct rtmsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RtMsg {
    /// Address family.
    pub rtm_family: u8,
    /// Destination prefix length.
    pub rtm_dst_len: u8,
    /// Source prefix length.
    pub rtm_src_len: u8,
    /// TOS filter.
    pub rtm_tos: u8,
    /// Routing table ID.
    pub rtm_table: u8,
    /// Routing protocol (RTPROT_*).
    pub rtm_protocol: u8,
    /// Route scope (RT_SCOPE_*).
    pub rtm_scope: u8,
    /// Route type (RTN_*).
    pub rtm_type: u8,
    /// Route flags.
    pub rtm_flags: u32,
}

impl RtMsg {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: Self::SIZE,
                actual: data.len(),
            })
    }
}

/// An IPv6 unicast route through one output interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Route {
    destination: Ipv6Addr,
    prefix_len: u8,
    oif: u32,
    metric: u32,
    protocol: u8,
    table: u8,
}

impl Ipv6Route {
    /// Create a route to `destination/prefix_len` in the main table.
    pub fn new(destination: Ipv6Addr, prefix_len: u8) -> Self {
        Self {
            destination,
            prefix_len,
            oif: 0,
            metric: 0,
            protocol: rt_proto::STATIC,
            table: rt_table::MAIN,
        }
    }

    /// Set the output interface index.
    pub fn oif(mut self, ifindex: u32) -> Self {
        self.oif = ifindex;
        self
    }

    /// Set the route metric (RTA_PRIORITY). Lower wins.
    pub fn metric(mut self, metric: u32) -> Self {
        self.metric = metric;
        self
    }

    /// Set the protocol tag (RTPROT_*).
    pub fn protocol(mut self, protocol: u8) -> Self {
        self.protocol = protocol;
        self
    }

    /// Route destination.
    pub fn destination(&self) -> Ipv6Addr {
        self.destination
    }

    /// Destination prefix length.
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Route metric (RTA_PRIORITY).
    pub fn priority(&self) -> u32 {
        self.metric
    }

    /// Build the request message for `msg_type`.
    ///
    /// RTA_DST carries exactly `prefix_len / 8` bytes, so only byte-aligned
    /// prefix lengths are accepted.
    pub fn build(&self, msg_type: u16, flags: u16) -> Result<MessageBuilder> {
        if self.prefix_len > 128 {
            return Err(Error::InvalidPrefix(format!(
                "{}/{}",
                self.destination, self.prefix_len
            )));
        }
        if self.prefix_len % 8 != 0 {
            return Err(Error::UnalignedPrefix(self.prefix_len));
        }

        let rtmsg = RtMsg {
            rtm_family: libc::AF_INET6 as u8,
            rtm_dst_len: self.prefix_len,
            rtm_table: self.table,
            rtm_protocol: self.protocol,
            rtm_scope: rt_scope::UNIVERSE,
            rtm_type: rtn::UNICAST,
            ..Default::default()
        };

        let mut builder = MessageBuilder::new(msg_type, flags);
        builder.append(&rtmsg);
        builder.append_attr_u32(rta::OIF, self.oif);
        let dst_bytes = usize::from(self.prefix_len / 8);
        builder.append_attr(rta::DST, &self.destination.octets()[..dst_bytes]);
        builder.append_attr_u32(rta::PRIORITY, self.metric);
        Ok(builder)
    }
}

/// The pair of routes that steer gateway traffic into the TUN interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayRoutes {
    /// Host address, /128, baseline metric.
    pub source: Ipv6Route,
    /// NAT64 prefix, baseline + 1.
    pub prefix: Ipv6Route,
}

impl GatewayRoutes {
    /// Build both routes for interface `ifindex`.
    ///
    /// A baseline of 0 is rejected: the kernel turns priority 0 into its
    /// default of 1024, which would rank the source route below the prefix.
    pub fn new(
        ifindex: u32,
        source: Ipv6Addr,
        prefix: &TranslationPrefix,
        metric_base: u32,
    ) -> Result<Self> {
        if metric_base == 0 {
            return Err(Error::InvalidConfig(
                "metric baseline must be at least 1".to_string(),
            ));
        }
        let prefix_metric = metric_base.checked_add(1).ok_or_else(|| {
            Error::InvalidConfig(format!("metric baseline {} leaves no room", metric_base))
        })?;
        Ok(Self {
            source: Ipv6Route::new(source, 128).oif(ifindex).metric(metric_base),
            prefix: Ipv6Route::new(prefix.addr(), prefix.prefix_len())
                .oif(ifindex)
                .metric(prefix_metric),
        })
    }

    /// Set the protocol tag on both routes.
    pub fn protocol(mut self, protocol: u8) -> Self {
        self.source = self.source.protocol(protocol);
        self.prefix = self.prefix.protocol(protocol);
        self
    }
}

/// Installs and removes IPv6 routes with hand-built rtnetlink requests.
///
/// Requests are serialized: one request owns the socket from send until its
/// reply arrives, so concurrent callers never consume each other's replies.
pub struct NetlinkRouteManager<T: RouteTransport = NetlinkSocket> {
    transport: T,
    timeout: Duration,
    /// Held across send and the reply wait.
    exchange: Mutex<()>,
}

impl NetlinkRouteManager<NetlinkSocket> {
    /// Open a dedicated routing socket.
    pub fn new() -> Result<Self> {
        Ok(Self::with_transport(NetlinkSocket::new()?))
    }
}

impl<T: RouteTransport> NetlinkRouteManager<T> {
    /// Use an existing transport.
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            timeout: DEFAULT_REPLY_TIMEOUT,
            exchange: Mutex::new(()),
        }
    }

    /// Set the reply deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Add one route (RTM_NEWROUTE). A duplicate fails with EEXIST.
    pub async fn add_route(&self, route: &Ipv6Route) -> Result<()> {
        tracing::debug!(
            destination = %route.destination,
            prefix_len = route.prefix_len,
            oif = route.oif,
            metric = route.metric,
            "adding IPv6 route"
        );
        let builder = route.build(
            NlMsgType::RTM_NEWROUTE,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL,
        )?;
        match self.request_ack(builder).await {
            Ok(()) => {
                tracing::debug!(destination = %route.destination, "IPv6 route added");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(destination = %route.destination, error = %e, "IPv6 route add failed");
                Err(Error::RouteInstallFailed {
                    destination: IpAddr::V6(route.destination),
                    prefix_len: route.prefix_len,
                    source: Box::new(e),
                })
            }
        }
    }

    /// Remove one route (RTM_DELROUTE). An absent route fails with ESRCH.
    pub async fn remove_route(&self, route: &Ipv6Route) -> Result<()> {
        tracing::debug!(
            destination = %route.destination,
            prefix_len = route.prefix_len,
            oif = route.oif,
            "removing IPv6 route"
        );
        let builder = route.build(NlMsgType::RTM_DELROUTE, NLM_F_REQUEST | NLM_F_ACK)?;
        match self.request_ack(builder).await {
            Ok(()) => {
                tracing::debug!(destination = %route.destination, "IPv6 route removed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(destination = %route.destination, error = %e, "IPv6 route removal failed");
                Err(Error::RouteRemoveFailed {
                    destination: IpAddr::V6(route.destination),
                    prefix_len: route.prefix_len,
                    source: Box::new(e),
                })
            }
        }
    }

    /// Install `source`/128 at `metric_base`, then the NAT64 prefix at
    /// `metric_base + 1`, both through `ifindex`.
    ///
    /// If the prefix route fails the source route stays installed; cleanup
    /// is the caller's decision.
    pub async fn install(
        &self,
        ifindex: u32,
        source: Ipv6Addr,
        prefix: &TranslationPrefix,
        metric_base: u32,
    ) -> Result<GatewayRoutes> {
        let routes = GatewayRoutes::new(ifindex, source, prefix, metric_base)?;
        self.install_routes(&routes).await?;
        Ok(routes)
    }

    /// Install a prepared route pair, source route first.
    pub async fn install_routes(&self, routes: &GatewayRoutes) -> Result<()> {
        self.add_route(&routes.source).await?;
        self.add_route(&routes.prefix).await
    }

    /// Remove the prefix route, then the source route.
    ///
    /// Both removals are attempted; the first failure is returned.
    pub async fn uninstall(&self, routes: &GatewayRoutes) -> Result<()> {
        let prefix = self.remove_route(&routes.prefix).await;
        let source = self.remove_route(&routes.source).await;
        prefix.and(source)
    }

    /// Send a request and wait, up to the deadline, for the reply carrying
    /// its sequence number.
    async fn request_ack(&self, mut builder: MessageBuilder) -> Result<()> {
        let _exchange = self.exchange.lock().await;

        let seq = self.transport.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.transport.pid());

        let msg = builder.finish();
        self.transport.send(&msg).await?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let data = tokio::time::timeout_at(deadline, self.transport.recv_msg())
                .await
                .map_err(|_| Error::Timeout(self.timeout))??;
            if decode_ack(&data, seq)? {
                return Ok(());
            }
            tracing::trace!(seq, "skipping stale reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::attr::AttrIter;
    use crate::netlink::message::{NLMSG_HDRLEN, NlMsgError, NlMsgHdr};
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tokio::sync::mpsc;

    enum Reply {
        /// Error envelope with this status for the last request.
        Status(i32),
        /// Error envelope for an unrelated sequence number.
        Stale,
        /// Bytes that are not a valid message.
        Garbage,
        /// Never answer.
        Silent,
    }

    #[derive(Default)]
    struct FakeTransport {
        seq: AtomicU32,
        sent: Mutex<Vec<Vec<u8>>>,
        replies: Mutex<VecDeque<Reply>>,
    }

    impl FakeTransport {
        fn replying(replies: impl IntoIterator<Item = Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }

        fn envelope(seq: u32, status: i32) -> Vec<u8> {
            let mut hdr = NlMsgHdr::new(NlMsgType::ERROR, 0);
            hdr.nlmsg_seq = seq;
            hdr.nlmsg_len = (NLMSG_HDRLEN + std::mem::size_of::<NlMsgError>()) as u32;
            let err = NlMsgError {
                error: status,
                msg: NlMsgHdr::default(),
            };
            let mut buf = hdr.as_bytes().to_vec();
            buf.extend_from_slice(err.as_bytes());
            buf
        }
    }

    impl RouteTransport for FakeTransport {
        fn pid(&self) -> u32 {
            4242
        }

        fn next_seq(&self) -> u32 {
            self.seq.fetch_add(1, Ordering::Relaxed) + 1
        }

        fn send(&self, msg: &[u8]) -> impl Future<Output = Result<()>> + Send {
            self.sent.lock().unwrap().push(msg.to_vec());
            async { Ok(()) }
        }

        fn recv_msg(&self) -> impl Future<Output = Result<Vec<u8>>> + Send {
            let last_seq = self
                .sent
                .lock()
                .unwrap()
                .last()
                .map(|m| NlMsgHdr::from_bytes(m).unwrap().nlmsg_seq)
                .unwrap_or(0);
            let reply = match self.replies.lock().unwrap().pop_front() {
                Some(Reply::Status(status)) => Some(Self::envelope(last_seq, status)),
                Some(Reply::Stale) => Some(Self::envelope(last_seq.wrapping_add(100), -libc::EPERM)),
                Some(Reply::Garbage) => Some(vec![0xff; 7]),
                Some(Reply::Silent) | None => None,
            };
            async move {
                match reply {
                    Some(data) => Ok(data),
                    None => std::future::pending().await,
                }
            }
        }
    }

    struct Parsed {
        header: NlMsgHdr,
        rtmsg: RtMsg,
        attrs: Vec<(u16, Vec<u8>)>,
    }

    fn parse(msg: &[u8]) -> Parsed {
        let header = *NlMsgHdr::from_bytes(msg).unwrap();
        let rtmsg = *RtMsg::from_bytes(&msg[NLMSG_HDRLEN..]).unwrap();
        let attrs = AttrIter::new(&msg[NLMSG_HDRLEN + RtMsg::SIZE..])
            .map(|(kind, data)| (kind, data.to_vec()))
            .collect();
        Parsed {
            header,
            rtmsg,
            attrs,
        }
    }

    fn attr(parsed: &Parsed, kind: u16) -> &[u8] {
        &parsed
            .attrs
            .iter()
            .find(|(k, _)| *k == kind)
            .expect("attribute present")
            .1
    }

    fn gateway_routes() -> GatewayRoutes {
        GatewayRoutes::new(
            7,
            "2001:db8::2".parse().unwrap(),
            &TranslationPrefix::well_known(),
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_prefix_96_declared_length_matches() {
        let route = Ipv6Route::new("64:ff9b::".parse().unwrap(), 96)
            .oif(3)
            .metric(2);
        let msg = route
            .build(NlMsgType::RTM_NEWROUTE, NLM_F_REQUEST | NLM_F_CREATE)
            .unwrap()
            .finish();

        // header + rtmsg + OIF(4+4) + DST(4+12) + PRIORITY(4+4)
        let expected = NLMSG_HDRLEN + RtMsg::SIZE + 8 + 16 + 8;
        assert_eq!(msg.len(), expected);

        let parsed = parse(&msg);
        assert_eq!(parsed.header.nlmsg_len as usize, expected);
        assert_eq!(parsed.header.nlmsg_type, NlMsgType::RTM_NEWROUTE);
        assert_eq!(parsed.rtmsg.rtm_family, libc::AF_INET6 as u8);
        assert_eq!(parsed.rtmsg.rtm_dst_len, 96);
        assert_eq!(parsed.rtmsg.rtm_table, rt_table::MAIN);
        assert_eq!(parsed.rtmsg.rtm_type, rtn::UNICAST);
        assert_eq!(attr(&parsed, rta::OIF), &3u32.to_ne_bytes());
        assert_eq!(attr(&parsed, rta::DST), &[0, 0x64, 0xff, 0x9b, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(attr(&parsed, rta::PRIORITY), &2u32.to_ne_bytes());
    }

    #[test]
    fn test_unaligned_destination_pads() {
        // A /40 carries 5 destination bytes, padded to 8.
        let route = Ipv6Route::new("2001:db8:ff00::".parse().unwrap(), 40).oif(1);
        let msg = route.build(NlMsgType::RTM_NEWROUTE, NLM_F_REQUEST).unwrap().finish();
        assert_eq!(msg.len(), NLMSG_HDRLEN + RtMsg::SIZE + 8 + 12 + 8);
        assert_eq!(
            NlMsgHdr::from_bytes(&msg).unwrap().nlmsg_len as usize,
            msg.len()
        );
        assert_eq!(attr(&parse(&msg), rta::DST), &[0x20, 0x01, 0x0d, 0xb8, 0xff]);
    }

    #[test]
    fn test_rejects_non_byte_aligned_prefix() {
        let route = Ipv6Route::new("2001:db8::".parse().unwrap(), 60);
        assert!(matches!(
            route.build(NlMsgType::RTM_NEWROUTE, NLM_F_REQUEST),
            Err(Error::UnalignedPrefix(60))
        ));
    }

    #[test]
    fn test_gateway_route_priorities() {
        let routes = gateway_routes();
        assert_eq!(routes.source.prefix_len(), 128);
        assert_eq!(routes.prefix.prefix_len(), 96);
        assert!(routes.source.priority() < routes.prefix.priority());

        assert_eq!(routes.source.priority(), 1);
        assert_eq!(routes.prefix.priority(), 2);

        let prefix = TranslationPrefix::well_known();
        assert!(GatewayRoutes::new(1, Ipv6Addr::LOCALHOST, &prefix, u32::MAX).is_err());
        // Priority 0 becomes the kernel default and would invert the pair.
        assert!(matches!(
            GatewayRoutes::new(1, Ipv6Addr::LOCALHOST, &prefix, 0),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_install_rejects_zero_baseline() {
        let manager = NetlinkRouteManager::with_transport(FakeTransport::default());
        let err = manager
            .install(1, "2001:db8::2".parse().unwrap(), &TranslationPrefix::well_known(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(manager.transport().sent().is_empty());
    }

    #[tokio::test]
    async fn test_install_both_routes() {
        let manager = NetlinkRouteManager::with_transport(FakeTransport::replying([
            Reply::Status(0),
            Reply::Status(0),
        ]));
        let routes = manager
            .install(
                7,
                "2001:db8::2".parse().unwrap(),
                &TranslationPrefix::well_known(),
                1,
            )
            .await
            .unwrap();
        assert_eq!(routes, gateway_routes());

        let sent = manager.transport().sent();
        assert_eq!(sent.len(), 2);
        let source = parse(&sent[0]);
        let prefix = parse(&sent[1]);
        assert_eq!(source.header.nlmsg_type, NlMsgType::RTM_NEWROUTE);
        assert_eq!(
            source.header.nlmsg_flags,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL
        );
        assert_eq!(source.header.nlmsg_pid, 4242);
        assert_eq!(source.rtmsg.rtm_dst_len, 128);
        assert_eq!(attr(&source, rta::PRIORITY), &1u32.to_ne_bytes());
        assert_eq!(attr(&source, rta::OIF), &7u32.to_ne_bytes());
        assert_eq!(prefix.rtmsg.rtm_dst_len, 96);
        assert_eq!(attr(&prefix, rta::PRIORITY), &2u32.to_ne_bytes());
        assert_ne!(source.header.nlmsg_seq, prefix.header.nlmsg_seq);
    }

    #[tokio::test]
    async fn test_prefix_failure_leaves_source_route() {
        let manager = NetlinkRouteManager::with_transport(FakeTransport::replying([
            Reply::Status(0),
            Reply::Status(-libc::EEXIST),
        ]));
        let err = manager
            .install_routes(&gateway_routes())
            .await
            .unwrap_err();

        match &err {
            Error::RouteInstallFailed { prefix_len, .. } => assert_eq!(*prefix_len, 96),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_already_exists());

        // Nothing was sent to undo the source route.
        let sent = manager.transport().sent();
        assert_eq!(sent.len(), 2);
        assert!(
            sent.iter()
                .all(|m| parse(m).header.nlmsg_type == NlMsgType::RTM_NEWROUTE)
        );
    }

    #[tokio::test]
    async fn test_uninstall_sends_delete_requests() {
        let manager = NetlinkRouteManager::with_transport(FakeTransport::replying([
            Reply::Status(0),
            Reply::Status(0),
        ]));
        manager.uninstall(&gateway_routes()).await.unwrap();

        let sent = manager.transport().sent();
        assert_eq!(sent.len(), 2);
        let first = parse(&sent[0]);
        let second = parse(&sent[1]);
        assert_eq!(first.header.nlmsg_type, NlMsgType::RTM_DELROUTE);
        assert_eq!(first.rtmsg.rtm_dst_len, 96);
        assert_eq!(second.header.nlmsg_type, NlMsgType::RTM_DELROUTE);
        assert_eq!(second.rtmsg.rtm_dst_len, 128);
    }

    #[tokio::test]
    async fn test_uninstall_attempts_both() {
        let manager = NetlinkRouteManager::with_transport(FakeTransport::replying([
            Reply::Status(-libc::ESRCH),
            Reply::Status(0),
        ]));
        let err = manager.uninstall(&gateway_routes()).await.unwrap_err();
        assert!(matches!(err, Error::RouteRemoveFailed { prefix_len: 96, .. }));
        assert!(err.is_not_found());
        assert_eq!(manager.transport().sent().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_reply_skipped() {
        let manager = NetlinkRouteManager::with_transport(FakeTransport::replying([
            Reply::Stale,
            Reply::Status(0),
        ]));
        let routes = gateway_routes();
        manager.add_route(&routes.source).await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_reply() {
        let manager =
            NetlinkRouteManager::with_transport(FakeTransport::replying([Reply::Garbage]));
        let err = manager.add_route(&gateway_routes().source).await.unwrap_err();
        match err {
            Error::RouteInstallFailed { source, .. } => {
                assert!(matches!(*source, Error::Truncated { .. }))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_timeout() {
        let manager = NetlinkRouteManager::with_transport(FakeTransport::replying([Reply::Silent]))
            .timeout(Duration::from_millis(250));
        let err = manager.add_route(&gateway_routes().source).await.unwrap_err();
        match err {
            Error::RouteInstallFailed { source, .. } => assert!(source.is_timeout()),
            other => panic!("unexpected error: {other}"),
        }
    }

    /// Acknowledges every request in send order, like the kernel. The
    /// first receive yields once before reading.
    struct AckingTransport {
        seq: AtomicU32,
        first_recv: AtomicBool,
        tx: mpsc::UnboundedSender<Vec<u8>>,
        rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    }

    impl AckingTransport {
        fn new() -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            Self {
                seq: AtomicU32::new(0),
                first_recv: AtomicBool::new(true),
                tx,
                rx: tokio::sync::Mutex::new(rx),
            }
        }
    }

    impl RouteTransport for AckingTransport {
        fn pid(&self) -> u32 {
            4242
        }

        fn next_seq(&self) -> u32 {
            self.seq.fetch_add(1, Ordering::Relaxed) + 1
        }

        fn send(&self, msg: &[u8]) -> impl Future<Output = Result<()>> + Send {
            let seq = NlMsgHdr::from_bytes(msg).unwrap().nlmsg_seq;
            self.tx.send(FakeTransport::envelope(seq, 0)).unwrap();
            async { Ok(()) }
        }

        fn recv_msg(&self) -> impl Future<Output = Result<Vec<u8>>> + Send {
            let delay = self.first_recv.swap(false, Ordering::Relaxed);
            async move {
                if delay {
                    tokio::task::yield_now().await;
                }
                self.rx
                    .lock()
                    .await
                    .recv()
                    .await
                    .ok_or_else(|| Error::NetlinkProtocolError("transport closed".to_string()))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_keep_their_replies() {
        let manager = NetlinkRouteManager::with_transport(AckingTransport::new())
            .timeout(Duration::from_millis(100));
        let a = Ipv6Route::new("2001:db8::1".parse().unwrap(), 128).oif(1).metric(1);
        let b = Ipv6Route::new("2001:db8::2".parse().unwrap(), 128).oif(1).metric(1);

        let (ra, rb) = tokio::join!(manager.add_route(&a), manager.add_route(&b));
        ra.unwrap();
        rb.unwrap();
    }
}
