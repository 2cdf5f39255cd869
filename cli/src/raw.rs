//! AF_PACKET link endpoint bound to one interface.
//!
//! Implements the core's `Link` trait with a Linux raw packet socket
//! filtered to the Link-Chat EtherType, plus the `SIOCGIFHWADDR` ioctl
//! lookup for the interface's hardware address.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use linkchat::wire::ETHERTYPE;
use linkchat::{Error, Link, MacAddr, Result};

/// Largest frame we expect to read off the socket.
const RECV_BUF: usize = 1600;

/// Receive timeout so a blocked read periodically rechecks the closed
/// flag; AF_PACKET sockets cannot be woken by `shutdown`.
const RECV_TIMEOUT_MS: i64 = 250;

/// A raw packet socket speaking Ethernet II frames on one interface.
pub struct RawSocketLink {
    fd: libc::c_int,
    addr: MacAddr,
    closed: AtomicBool,
}

impl RawSocketLink {
    /// Opens a raw socket bound to `iface`, filtered to the Link-Chat
    /// EtherType, and looks up the interface's hardware address.
    ///
    /// Needs `CAP_NET_RAW` (or root).
    pub fn open(iface: &str) -> io::Result<Self> {
        let ifindex = if_index(iface)?;
        let addr = hardware_addr(iface)?;

        let fd = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW,
                ETHERTYPE.to_be() as libc::c_int,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        let timeout = libc::timeval {
            tv_sec: 0,
            tv_usec: (RECV_TIMEOUT_MS * 1000) as libc::suseconds_t,
        };
        let rc = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                (&raw const timeout).cast(),
                size_of::<libc::timeval>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        let mut sll: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        sll.sll_family = libc::AF_PACKET as libc::sa_family_t;
        sll.sll_protocol = ETHERTYPE.to_be();
        sll.sll_ifindex = ifindex;
        let rc = unsafe {
            libc::bind(
                fd,
                (&raw const sll).cast(),
                size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        Ok(Self {
            fd,
            addr: MacAddr(addr),
            closed: AtomicBool::new(false),
        })
    }
}

impl Link for RawSocketLink {
    fn send(&self, frame: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::LinkClosed);
        }
        let n = unsafe { libc::send(self.fd, frame.as_ptr().cast(), frame.len(), 0) };
        if n < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }
        Ok(())
    }

    fn recv(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; RECV_BUF];
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(Error::LinkClosed);
            }
            let n = unsafe { libc::recv(self.fd, buf.as_mut_ptr().cast(), buf.len(), 0) };
            if n >= 0 {
                buf.truncate(n as usize);
                return Ok(buf);
            }
            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::WouldBlock
                | io::ErrorKind::TimedOut
                | io::ErrorKind::Interrupted => continue,
                _ => return Err(Error::Io(err)),
            }
        }
    }

    fn local_addr(&self) -> MacAddr {
        self.addr
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl Drop for RawSocketLink {
    fn drop(&mut self) {
        self.close();
        unsafe { libc::close(self.fd) };
    }
}

/// Resolves an interface name to its kernel index.
fn if_index(iface: &str) -> io::Result<libc::c_int> {
    let name = std::ffi::CString::new(iface)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "interface name contains NUL"))?;
    let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
    if index == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(index as libc::c_int)
}

/// Looks up the 6-byte hardware address of `iface` via SIOCGIFHWADDR.
fn hardware_addr(iface: &str) -> io::Result<[u8; 6]> {
    let mut req: libc::ifreq = unsafe { std::mem::zeroed() };
    if iface.len() >= req.ifr_name.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "interface name too long",
        ));
    }
    for (dst, src) in req.ifr_name.iter_mut().zip(iface.as_bytes()) {
        *dst = *src as libc::c_char;
    }

    // Any datagram socket works as an ioctl handle here.
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    let rc = unsafe { libc::ioctl(fd, libc::SIOCGIFHWADDR, &mut req) };
    let err = io::Error::last_os_error();
    unsafe { libc::close(fd) };
    if rc < 0 {
        return Err(err);
    }

    let hw = unsafe { req.ifr_ifru.ifru_hwaddr };
    let mut mac = [0u8; 6];
    for (dst, src) in mac.iter_mut().zip(hw.sa_data.iter()) {
        *dst = *src as u8;
    }
    Ok(mac)
}
