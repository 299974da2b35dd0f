//! Linear IP scan and capacity arithmetic over a pool CIDR.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

/// First free address in `cidr`, in ascending order, skipping the network
/// and broadcast addresses. A /32 yields its single address.
pub fn find_available_ip<V>(cidr: &Ipv4Network, allocations: &BTreeMap<String, V>) -> Option<Ipv4Addr> {
    if cidr.prefix() == 32 {
        let ip = cidr.network();
        return (!allocations.contains_key(&ip.to_string())).then_some(ip);
    }

    let network = u32::from(cidr.network());
    let broadcast = u32::from(cidr.broadcast());
    ((network + 1)..broadcast)
        .map(Ipv4Addr::from)
        .find(|ip| !allocations.contains_key(&ip.to_string()))
}

/// Usable addresses in `cidr`: `2^(32-prefix) - 2`, except a /32 holds one.
pub fn capacity(cidr: &Ipv4Network) -> i64 {
    if cidr.prefix() == 32 {
        return 1;
    }
    (1i64 << (32 - u32::from(cidr.prefix()))) - 2
}
