//! Route integration tests.

use std::net::{Ipv4Addr, Ipv6Addr};

use nat64gw::route::{LegacyRoute, LegacyRouteManager};
use nat64gw::{InterfaceHandle, NetlinkRouteManager, Result, TranslationPrefix};

use crate::common::unique_name;

#[tokio::test]
async fn test_ipv6_routes_install_and_remove() -> Result<()> {
    require_root!();

    let handle = InterfaceHandle::open(&unique_name("n64r"))?;
    let iface = handle.configurator();
    iface.bring_up()?;

    let source: Ipv6Addr = "2001:db8:6464::2".parse().unwrap();
    iface.set_ipv6(source, 64)?;
    let prefix = TranslationPrefix::parse("2001:db8:ff64::/96")?;

    let manager = NetlinkRouteManager::new()?;
    let routes = manager.install(iface.index()?, source, &prefix, 100).await?;
    assert_eq!(routes.source.priority(), 100);
    assert_eq!(routes.prefix.priority(), 101);

    // A second install collides with the existing source route.
    let err = manager.install_routes(&routes).await.unwrap_err();
    assert!(err.is_already_exists());

    manager.uninstall(&routes).await?;

    let err = manager.uninstall(&routes).await.unwrap_err();
    assert!(err.is_not_found());

    Ok(())
}

#[test]
fn test_legacy_route_add_remove() -> Result<()> {
    require_root!();

    let handle = InterfaceHandle::open(&unique_name("n64r"))?;
    let iface = handle.configurator();
    iface.set_ipv4(Ipv4Addr::new(192, 0, 2, 5), Ipv4Addr::new(255, 255, 255, 252))?;
    iface.set_ipv4_peer(Ipv4Addr::new(192, 0, 2, 6))?;
    iface.bring_up()?;

    let route = LegacyRoute::new(handle.name(), Ipv4Addr::new(192, 0, 2, 6))
        .metric(4000)
        .mtu(1400);
    let manager = LegacyRouteManager::new()?;

    manager.add(&route)?;
    assert!(manager.add(&route).unwrap_err().is_already_exists());

    manager.remove(&route)?;
    assert!(manager.remove(&route).unwrap_err().is_not_found());

    Ok(())
}
