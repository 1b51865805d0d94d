//! TUN interface integration tests.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::os::unix::io::AsRawFd;

use nat64gw::{Error, InterfaceHandle, Result};

use crate::common::unique_name;

#[test]
fn test_open_reports_name() -> Result<()> {
    require_root!();

    let name = unique_name("n64t");
    let handle = InterfaceHandle::open(&name)?;
    assert_eq!(handle.name().as_str(), name);
    assert!(handle.device().as_raw_fd() >= 0);

    Ok(())
}

#[test]
fn test_long_name_truncated() -> Result<()> {
    require_root!();

    let name = format!("{}-truncated-name", unique_name("n64t"));
    assert!(name.len() > 15);

    let handle = InterfaceHandle::open(&name)?;
    assert_eq!(handle.name().as_str(), &name[..15]);

    Ok(())
}

#[test]
fn test_configure_interface() -> Result<()> {
    require_root!();

    let handle = InterfaceHandle::open(&unique_name("n64t"))?;
    let iface = handle.configurator();

    iface.set_ipv4(Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::new(255, 255, 255, 252))?;
    iface.set_ipv4_peer(Ipv4Addr::new(192, 0, 2, 2))?;

    iface.set_mtu(1400)?;
    assert_eq!(iface.mtu()?, 1400);

    iface.bring_up()?;
    let flags = iface.flags()?;
    assert!(flags.is_up());

    assert!(iface.index()? > 0);

    let v6: Ipv6Addr = "2001:db8:6464::2".parse().unwrap();
    iface.set_ipv6(v6, 64)?;

    Ok(())
}

#[test]
fn test_missing_interface() -> Result<()> {
    require_root!();

    let handle = InterfaceHandle::open(&unique_name("n64t"))?;
    let (device, _configurator) = handle.into_parts();
    let name = device.name().clone();
    drop(device);

    // The interface vanishes with its descriptor.
    let configurator = nat64gw::InterfaceConfigurator::new(name)?;
    let err = configurator.index().unwrap_err();
    assert!(matches!(err, Error::IndexResolutionFailed { .. }));
    assert!(err.is_not_found());

    Ok(())
}
