//! Host identity resolution.
//!
//! The registry matches server entries by address, not hostname, so both
//! are resolved once per invocation and passed into the reconciler.

use cs_common::{Error, Result};
use serde::Serialize;
use std::net::UdpSocket;

/// This host's address and name as the registry sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostIdentity {
    pub ipaddr: String,
    pub hostname: String,
}

impl HostIdentity {
    /// Resolve the local identity.
    ///
    /// The address is discovered by routing a UDP socket toward a public
    /// address; no packet is sent, the kernel only picks the outbound
    /// interface. Failure aborts registry operations only, so it maps to
    /// the store category.
    pub fn resolve() -> Result<Self> {
        Ok(HostIdentity {
            ipaddr: local_ipaddr()?,
            hostname: local_hostname()?,
        })
    }
}

fn local_ipaddr() -> Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .map_err(|e| Error::Store(format!("cannot resolve local address: {e}")))?;
    socket
        .connect("8.8.8.8:53")
        .map_err(|e| Error::Store(format!("cannot resolve local address: {e}")))?;
    let addr = socket
        .local_addr()
        .map_err(|e| Error::Store(format!("cannot resolve local address: {e}")))?;
    Ok(addr.ip().to_string())
}

fn local_hostname() -> Result<String> {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return Err(Error::Store(format!(
            "gethostname failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_is_nonempty() {
        assert!(!local_hostname().unwrap().is_empty());
    }

    #[test]
    fn resolve_produces_both_fields() {
        // Address resolution needs a routable interface; loopback-only
        // sandboxes still succeed because connect() does not send.
        let identity = HostIdentity::resolve().unwrap();
        assert!(!identity.ipaddr.is_empty());
        assert!(!identity.hostname.is_empty());
    }
}
