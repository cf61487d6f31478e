use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Returns `true` if `addr` is usable as the remote end of a peer connection.
///
/// Rejects a zero port, unspecified and multicast addresses, and addresses
/// that can never belong to a remote peer:
///
/// - IPv4 in `0.0.0.0/8` or at or above `224.0.0.0`
/// - IPv6 loopback, link-local (`fe80::/10`), or IPv4-mapped (`::ffff:0:0/96`)
pub fn is_valid_for_peers(addr: &SocketAddr) -> bool {
    if addr.port() == 0 {
        return false;
    }

    match addr.ip() {
        IpAddr::V4(ip) => is_valid_v4(ip),
        IpAddr::V6(ip) => is_valid_v6(ip),
    }
}

fn is_valid_v4(ip: Ipv4Addr) -> bool {
    let first = ip.octets()[0];

    first != 0 && first < 224
}

fn is_valid_v6(ip: Ipv6Addr) -> bool {
    if ip.is_unspecified() || ip.is_loopback() || ip.is_multicast() {
        return false;
    }

    let segments = ip.segments();

    // fe80::/10
    if segments[0] & 0xffc0 == 0xfe80 {
        return false;
    }

    ip.to_ipv4_mapped().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn valid(s: &str) -> bool {
        is_valid_for_peers(&s.parse().unwrap())
    }

    #[test]
    fn ipv4_public_and_private_addresses_are_valid() {
        assert!(valid("93.184.216.34:51413"));
        assert!(valid("192.168.1.10:6881"));
        assert!(valid("127.0.0.1:6881"));
    }

    #[test]
    fn ipv4_martian_addresses_are_rejected() {
        assert!(!valid("0.0.0.0:6881"));
        assert!(!valid("0.1.2.3:6881"));
        assert!(!valid("224.0.0.1:6881"));
        assert!(!valid("239.255.255.250:6881"));
        assert!(!valid("255.255.255.255:6881"));
    }

    #[test]
    fn ipv6_addresses() {
        assert!(valid("[2001:db8::1]:6881"));
        assert!(!valid("[::]:6881"));
        assert!(!valid("[::1]:6881"));
        assert!(!valid("[fe80::1]:6881"));
        assert!(!valid("[febf::1]:6881"));
        assert!(!valid("[ff02::1]:6881"));
        assert!(!valid("[::ffff:93.184.216.34]:6881"));
    }

    #[test]
    fn zero_port_is_rejected() {
        assert!(!valid("93.184.216.34:0"));
        assert!(!valid("[2001:db8::1]:0"));
    }

    proptest! {
        #[test]
        fn zero_port_never_valid(octets in any::<[u8; 4]>()) {
            let addr = SocketAddr::from((octets, 0));
            prop_assert!(!is_valid_for_peers(&addr));
        }

        #[test]
        fn ipv4_validity_only_depends_on_first_octet(octets in any::<[u8; 4]>(), port in 1u16..=u16::MAX) {
            let addr = SocketAddr::from((octets, port));
            prop_assert_eq!(is_valid_for_peers(&addr), octets[0] != 0 && octets[0] < 224);
        }
    }
}
