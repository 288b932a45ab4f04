//! Network interface lookup.

use crate::hpav::StationAddress;
use libc::{c_char, c_int, c_short};
use network_interface::{NetworkInterface, NetworkInterfaceConfig};
use serde::Serialize;
use std::ffi::CString;
use std::io::{Error, ErrorKind};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

/// A local network interface.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Interface {
    pub name: String,
    pub index: u32,
    pub address: StationAddress,
    pub mtu: usize,
    pub up: bool,
    pub loopback: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum InterfaceError {
    #[error("no such network interface: {0}")]
    NotFound(String),
    #[error("no network interface is up")]
    NoneUp,
    #[error("failed to query network interfaces: {0}")]
    Io(#[from] Error),
    #[error("failed to enumerate network interfaces: {0}")]
    Enumerate(#[from] network_interface::Error),
}

impl Interface {
    /// Find the interface called `name`, or if no name is given, the first non-loopback
    /// interface which is up.
    pub fn find(name: Option<&str>) -> Result<Self, InterfaceError> {
        match name {
            Some(name) => Self::by_name(name),
            None => Self::list()?
                .into_iter()
                .find(|iface| iface.up && !iface.loopback)
                .ok_or(InterfaceError::NoneUp),
        }
    }

    pub fn by_name(name: &str) -> Result<Self, InterfaceError> {
        let c_name = CString::new(name).map_err(|_| InterfaceError::NotFound(name.into()))?;
        let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
        if index == 0 {
            return Err(InterfaceError::NotFound(name.into()));
        }

        let socket = control_socket()?;
        let mut req = IfReq::new(name)?;

        ioctl(&socket, libc::SIOCGIFHWADDR as libc::c_ulong, &mut req)?;
        let hwaddr = unsafe { req.data.hwaddr };
        let mut address = [0u8; 6];
        for (octet, data) in address.iter_mut().zip(hwaddr.sa_data.iter()) {
            *octet = *data as u8;
        }

        ioctl(&socket, libc::SIOCGIFMTU as libc::c_ulong, &mut req)?;
        let mtu = unsafe { req.data.mtu };

        ioctl(&socket, libc::SIOCGIFFLAGS as libc::c_ulong, &mut req)?;
        let flags = unsafe { req.data.flags } as c_int;

        Ok(Self {
            name: name.to_owned(),
            index,
            address: StationAddress(address),
            mtu: mtu.max(0) as usize,
            up: flags & libc::IFF_UP != 0,
            loopback: flags & libc::IFF_LOOPBACK != 0,
        })
    }

    /// List every interface, in kernel index order.
    pub fn list() -> Result<Vec<Self>, InterfaceError> {
        // One entry per interface, or per address on some platforms
        let mut names: Vec<(u32, String)> = NetworkInterface::show()?
            .into_iter()
            .map(|iface| (iface.index, iface.name))
            .collect();
        names.sort();
        names.dedup();

        let mut interfaces = Vec::with_capacity(names.len());
        for (_, name) in names {
            match Self::by_name(&name) {
                Ok(iface) => interfaces.push(iface),
                // Interfaces can disappear between listing and querying
                Err(e) => log::debug!("skipping interface {}: {}", name, e),
            }
        }
        Ok(interfaces)
    }
}

/// `struct ifreq`, restricted to the members used here.
#[repr(C)]
#[derive(Copy, Clone)]
struct IfReq {
    name: [c_char; libc::IF_NAMESIZE],
    data: IfReqData,
}

#[repr(C)]
#[derive(Copy, Clone)]
union IfReqData {
    hwaddr: libc::sockaddr,
    mtu: c_int,
    flags: c_short,
    _size: [u8; 24],
}

impl IfReq {
    fn new(name: &str) -> Result<Self, Error> {
        if name.len() >= libc::IF_NAMESIZE {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "interface name too long",
            ));
        }

        let mut req = IfReq {
            name: [0; libc::IF_NAMESIZE],
            data: IfReqData { _size: [0; 24] },
        };
        for (c, byte) in req.name.iter_mut().zip(name.bytes()) {
            *c = byte as c_char;
        }
        Ok(req)
    }
}

fn control_socket() -> Result<OwnedFd, Error> {
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM | libc::SOCK_CLOEXEC, 0) };
    if fd == -1 {
        return Err(Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn ioctl(socket: &OwnedFd, request: libc::c_ulong, req: &mut IfReq) -> Result<(), Error> {
    if unsafe { libc::ioctl(socket.as_raw_fd(), request as _, req as *mut IfReq) } == -1 {
        return Err(Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback() {
        let lo = Interface::by_name("lo").unwrap();
        assert!(lo.loopback);
        assert!(lo.index > 0);
        assert!(lo.mtu > 0);

        assert!(Interface::list()
            .unwrap()
            .iter()
            .any(|iface| iface.name == "lo"));
    }

    #[test]
    fn list_once_per_interface() {
        let interfaces = Interface::list().unwrap();
        let indexes: Vec<u32> = interfaces.iter().map(|iface| iface.index).collect();

        let mut expected = indexes.clone();
        expected.sort();
        expected.dedup();
        assert_eq!(indexes, expected);
    }

    #[test]
    fn missing_interface() {
        assert!(matches!(
            Interface::find(Some("nonexistent0")),
            Err(InterfaceError::NotFound(name)) if name == "nonexistent0"
        ));
        assert!(matches!(
            Interface::by_name("this-name-is-far-too-long"),
            Err(InterfaceError::NotFound(_))
        ));
    }

    #[test]
    fn ifreq_name() {
        let req = IfReq::new("eth0").unwrap();
        assert_eq!(&req.name[..5], &[b'e' as c_char, b't' as c_char, b'h' as c_char, b'0' as c_char, 0]);
        assert!(IfReq::new("0123456789abcdef").is_err());
    }
}
