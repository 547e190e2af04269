use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Minimum IPv4 header length (no options).
const IPV4_HEADER_LEN: usize = 20;
/// Fixed IPv6 header length.
const IPV6_HEADER_LEN: usize = 40;

/// Extract the destination address of a raw IP packet.
///
/// Only the version nibble and the destination field are inspected; the
/// packet is otherwise opaque to the router. Returns `None` for anything
/// too short or that is not IPv4/IPv6.
pub fn destination(packet: &[u8]) -> Option<IpAddr> {
    let version = packet.first().copied()? >> 4;
    match version {
        4 if packet.len() >= IPV4_HEADER_LEN => {
            let d = &packet[16..20];
            Some(IpAddr::V4(Ipv4Addr::new(d[0], d[1], d[2], d[3])))
        }
        6 if packet.len() >= IPV6_HEADER_LEN => {
            let mut d = [0u8; 16];
            d.copy_from_slice(&packet[24..40]);
            Some(IpAddr::V6(Ipv6Addr::from(d)))
        }
        _ => None,
    }
}
