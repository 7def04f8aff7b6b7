//! RTP/RTCP socket pair and port allocation
//!
//! Sockets are plain non-blocking UDP sockets polled from the engine tick.

use parking_lot::Mutex;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use tracing::{debug, warn};

fn socket_create(ip: &str, port: u16) -> io::Result<UdpSocket> {
    let socket = UdpSocket::bind((ip, port))?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// Treat `WouldBlock` as "nothing pending"
fn recv_nonblocking(socket: &UdpSocket, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
    match socket.recv_from(buf) {
        Ok(received) => Ok(Some(received)),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(e) => Err(e),
    }
}

/// RTP socket on `port` and RTCP socket on `port + 1`
#[derive(Debug)]
pub struct RtpSocketPair {
    rtp: UdpSocket,
    rtcp: Option<UdpSocket>,
    local_addr: SocketAddr,
}

impl RtpSocketPair {
    /// Bind both sockets; a failing RTCP bind leaves RTCP unavailable
    pub fn bind(ip: &str, port: u16) -> io::Result<Self> {
        let rtp = socket_create(ip, port)?;
        let local_addr = rtp.local_addr()?;

        let rtcp = match local_addr.port().checked_add(1) {
            Some(rtcp_port) => match socket_create(ip, rtcp_port) {
                Ok(socket) => Some(socket),
                Err(e) => {
                    debug!("Failed to create RTCP socket {}:{}: {}", ip, rtcp_port, e);
                    None
                }
            },
            None => {
                debug!("No RTCP port above RTP port {}", local_addr.port());
                None
            }
        };

        Ok(Self {
            rtp,
            rtcp,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn has_rtcp(&self) -> bool {
        self.rtcp.is_some()
    }

    pub fn recv_rtp(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        recv_nonblocking(&self.rtp, buf)
    }

    pub fn send_rtp(&self, data: &[u8], to: SocketAddr) -> io::Result<usize> {
        self.rtp.send_to(data, to)
    }

    pub fn recv_rtcp(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        match &self.rtcp {
            Some(socket) => recv_nonblocking(socket, buf),
            None => Ok(None),
        }
    }

    pub fn send_rtcp(&self, data: &[u8], to: SocketAddr) -> io::Result<usize> {
        match &self.rtcp {
            Some(socket) => socket.send_to(data, to),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "RTCP socket unavailable")),
        }
    }
}

/// Even RTP ports handed out from a configured range
#[derive(Debug)]
pub struct PortAllocator {
    port_min: u16,
    port_max: u16,
    port_cur: Mutex<u16>,
}

impl PortAllocator {
    pub fn new(port_min: u16, port_max: u16) -> Self {
        Self {
            port_min,
            port_max,
            port_cur: Mutex::new(port_min),
        }
    }

    /// Candidate after `port`, back to `port_min` past the end of the range
    fn next_port(&self, port: u16) -> u16 {
        port.checked_add(2)
            .filter(|&next| next < self.port_max)
            .unwrap_or(self.port_min)
    }

    /// Scan the range in steps of two, wrapping once, until a pair binds
    pub fn bind_pair(&self, ip: &str) -> Option<RtpSocketPair> {
        let mut port_cur = self.port_cur.lock();
        let first_port_in_search = *port_cur;

        loop {
            let port = *port_cur;
            *port_cur = self.next_port(port);

            match RtpSocketPair::bind(ip, port) {
                Ok(pair) => return Some(pair),
                Err(e) => debug!("Failed to bind RTP socket {}:{}: {}", ip, port, e),
            }

            if *port_cur == first_port_in_search {
                warn!("Failed to find free RTP port in {}-{}", self.port_min, self.port_max);
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_pair_bind_ephemeral() {
        let pair = RtpSocketPair::bind("127.0.0.1", 0).unwrap();
        assert_ne!(pair.local_addr().port(), 0);

        let mut buf = [0u8; 16];
        assert!(pair.recv_rtp(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_allocator_skips_busy_ports() {
        let busy = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = busy.local_addr().unwrap().port();
        if port >= u16::MAX - 8 {
            return;
        }

        let allocator = PortAllocator::new(port, port + 6);
        let pair = allocator.bind_pair("127.0.0.1").unwrap();
        assert_ne!(pair.local_addr().port(), port);
        assert_eq!((pair.local_addr().port() - port) % 2, 0);
    }

    #[test]
    fn test_allocator_wraps_at_top_of_port_space() {
        let allocator = PortAllocator::new(65530, u16::MAX);
        assert_eq!(allocator.next_port(65530), 65532);
        assert_eq!(allocator.next_port(65532), 65534);
        assert_eq!(allocator.next_port(65534), 65530);

        let allocator = PortAllocator::new(40000, 40004);
        assert_eq!(allocator.next_port(40002), 40000);
    }

    #[test]
    fn test_allocator_exhausted() {
        let busy = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = busy.local_addr().unwrap().port();
        if port >= u16::MAX - 2 {
            return;
        }

        // only one candidate, already taken
        let allocator = PortAllocator::new(port, port + 2);
        assert!(allocator.bind_pair("127.0.0.1").is_none());
    }
}
