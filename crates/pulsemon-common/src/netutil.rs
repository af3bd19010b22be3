use std::io;
use std::net::{IpAddr, UdpSocket};

/// Discovers the local address used for outbound traffic by "connecting" a
/// UDP socket toward a public resolver and reading the chosen endpoint.
/// No packet is sent.
pub fn local_outbound_ip() -> io::Result<IpAddr> {
    let socket = UdpSocket::bind(("0.0.0.0", 0))?;
    socket.connect(("8.8.8.8", 80))?;
    Ok(socket.local_addr()?.ip())
}
