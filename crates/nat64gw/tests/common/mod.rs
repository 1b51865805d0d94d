//! Common test utilities for integration tests.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use nat64gw::tuntap::TUN_DEVICE_PATH;

/// Global counter for unique interface names.
static NAME_COUNTER: AtomicU32 = AtomicU32::new(0);

/// A unique interface name that fits in 15 bytes.
pub fn unique_name(prefix: &str) -> String {
    let id = NAME_COUNTER.fetch_add(1, Ordering::SeqCst);
    let pid = std::process::id() % 10_000;
    format!("{}{}{}", prefix, pid, id)
}

/// Route test output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Check if running as root.
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Check if the TUN clone device exists.
pub fn has_tun() -> bool {
    Path::new(TUN_DEVICE_PATH).exists()
}

/// Skip the test unless running as root with `/dev/net/tun` available.
#[macro_export]
macro_rules! require_root {
    () => {
        if !crate::common::is_root() {
            eprintln!("Skipping test: requires root");
            return Ok(());
        }
        if !crate::common::has_tun() {
            eprintln!("Skipping test: /dev/net/tun not available");
            return Ok(());
        }
        crate::common::init_tracing();
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_name() {
        let a = unique_name("n64t");
        let b = unique_name("n64t");
        assert_ne!(a, b);
        assert!(a.len() <= 15);
    }
}
