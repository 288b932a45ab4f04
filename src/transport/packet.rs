use super::interface::Interface;
use super::{ReceiveError, Received, Transport};
use crate::ethernet::{self, Frame};
use crate::hpav::{StationAddress, ETHER_TYPE};
use std::io::{Error, ErrorKind};
use std::mem::size_of;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::time::{Duration, Instant};

/// A raw `AF_PACKET` socket carrying HomePlug AV frames on one interface.
#[derive(Debug)]
pub struct Socket {
    fd: OwnedFd,
    interface: Interface,
}

impl Socket {
    /// Open a socket bound to `interface`, receiving only HomePlug AV frames.
    ///
    /// This requires `CAP_NET_RAW`.
    pub fn open(interface: Interface) -> Result<Self, Error> {
        let protocol = ETHER_TYPE.to_be() as libc::c_int;
        let fd = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                protocol,
            )
        };
        if fd == -1 {
            return Err(Error::last_os_error());
        }
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        let addr = link_layer_address(&interface, None);
        let rv = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if rv == -1 {
            return Err(Error::last_os_error());
        }

        Ok(Self { fd, interface })
    }

    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    fn set_receive_timeout(&self, timeout: Duration) -> Result<(), Error> {
        // A zero timeval would block forever
        let timeout = timeout.max(Duration::from_millis(1));
        let tv = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };
        let rv = unsafe {
            libc::setsockopt(
                self.fd.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                &tv as *const libc::timeval as *const libc::c_void,
                size_of::<libc::timeval>() as libc::socklen_t,
            )
        };
        if rv == -1 {
            return Err(Error::last_os_error());
        }
        Ok(())
    }
}

impl Transport for Socket {
    fn send(&self, destination: StationAddress, payload: &[u8]) -> Result<(), Error> {
        let frame = Frame::new(destination, self.interface.address, ETHER_TYPE, payload).encode();
        let addr = link_layer_address(&self.interface, Some(destination));

        let sent = unsafe {
            libc::sendto(
                self.fd.as_raw_fd(),
                frame.as_ptr() as *const libc::c_void,
                frame.len(),
                0,
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if sent == -1 {
            return Err(Error::last_os_error());
        } else if sent as usize != frame.len() {
            return Err(Error::new(ErrorKind::WriteZero, "short write"));
        }
        Ok(())
    }

    fn receive(&self, timeout: Duration) -> Result<Received, ReceiveError> {
        let deadline = Instant::now() + timeout;
        let mut buffer = vec![0u8; self.interface.mtu + ethernet::HEADER_LEN];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ReceiveError::Timeout);
            }
            self.set_receive_timeout(remaining)?;

            let n = unsafe {
                libc::recv(
                    self.fd.as_raw_fd(),
                    buffer.as_mut_ptr() as *mut libc::c_void,
                    buffer.len(),
                    0,
                )
            };
            if n == -1 {
                let e = Error::last_os_error();
                match e.kind() {
                    ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                        return Err(ReceiveError::Timeout)
                    }
                    ErrorKind::Interrupted => continue,
                    _ => return Err(e.into()),
                }
            }

            let frame = match Frame::decode(&buffer[..n as usize]) {
                Ok(frame) => frame,
                Err(e) => {
                    log::debug!("discarding runt frame: {}", e);
                    continue;
                }
            };

            // Frames queued before bind() may carry any protocol
            if frame.ether_type() != ETHER_TYPE {
                continue;
            }

            return Ok(Received {
                source: frame.header.source,
                payload: frame.payload.to_vec(),
            });
        }
    }
}

fn link_layer_address(
    interface: &Interface,
    destination: Option<StationAddress>,
) -> libc::sockaddr_ll {
    let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as libc::c_ushort;
    addr.sll_protocol = ETHER_TYPE.to_be();
    addr.sll_ifindex = interface.index as libc::c_int;
    if let Some(destination) = destination {
        addr.sll_halen = destination.0.len() as libc::c_uchar;
        addr.sll_addr[..6].copy_from_slice(&destination.0);
    }
    addr
}
