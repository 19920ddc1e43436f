//! TCP connection collection for managed processes.
//!
//! Connections are recovered by joining the socket inodes in
//! `/proc/<pid>/fd/` against the kernel socket tables in `/proc/net/tcp`
//! and `/proc/net/tcp6`. Rows that cannot be parsed are skipped; the scan
//! is best-effort like the rest of the snapshot.

use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;

/// TCP connection state, decoded from the kernel's hex representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TcpState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    Unknown,
}

impl TcpState {
    /// Parse TCP state from /proc/net/tcp hex value.
    pub fn from_hex(hex: u8) -> Self {
        match hex {
            0x01 => TcpState::Established,
            0x02 => TcpState::SynSent,
            0x03 => TcpState::SynRecv,
            0x04 => TcpState::FinWait1,
            0x05 => TcpState::FinWait2,
            0x06 => TcpState::TimeWait,
            0x07 => TcpState::Close,
            0x08 => TcpState::CloseWait,
            0x09 => TcpState::LastAck,
            0x0A => TcpState::Listen,
            0x0B => TcpState::Closing,
            _ => TcpState::Unknown,
        }
    }

    pub fn is_listen(&self) -> bool {
        matches!(self, TcpState::Listen)
    }
}

impl std::fmt::Display for TcpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TcpState::Established => "ESTABLISHED",
            TcpState::SynSent => "SYN_SENT",
            TcpState::SynRecv => "SYN_RECV",
            TcpState::FinWait1 => "FIN_WAIT1",
            TcpState::FinWait2 => "FIN_WAIT2",
            TcpState::TimeWait => "TIME_WAIT",
            TcpState::Close => "CLOSE",
            TcpState::CloseWait => "CLOSE_WAIT",
            TcpState::LastAck => "LAST_ACK",
            TcpState::Listen => "LISTEN",
            TcpState::Closing => "CLOSING",
            TcpState::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// One TCP endpoint pair owned by a managed process.
#[derive(Debug, Clone, Serialize)]
pub struct TcpConnection {
    pub local_addr: String,
    pub local_port: u16,
    /// Empty for listening sockets.
    pub remote_addr: String,
    pub remote_port: u16,
    pub state: TcpState,
}

/// Kernel TCP socket tables, loaded once per snapshot and indexed by inode.
#[derive(Debug, Default)]
pub struct TcpTable {
    by_inode: HashMap<u64, TcpConnection>,
}

impl TcpTable {
    /// Load the socket tables. Missing tables (e.g. no IPv6) are treated
    /// as empty.
    pub fn load_from(tcp_path: &Path, tcp6_path: &Path) -> Self {
        let mut by_inode = HashMap::new();
        for (path, ipv6) in [(tcp_path, false), (tcp6_path, true)] {
            let Ok(text) = fs::read_to_string(path) else {
                continue;
            };
            for line in text.lines().skip(1) {
                if let Some((inode, conn)) = parse_socket_line(line, ipv6) {
                    by_inode.insert(inode, conn);
                }
            }
        }
        TcpTable { by_inode }
    }

    /// Connections belonging to the given socket inodes.
    pub fn for_inodes(&self, inodes: &[u64]) -> Vec<TcpConnection> {
        inodes
            .iter()
            .filter_map(|inode| self.by_inode.get(inode).cloned())
            .collect()
    }
}

/// Socket inodes open in a process, from `/proc/<pid>/fd/` symlinks.
///
/// Returns an empty list when the fd directory is unreadable (permission
/// or the process exited mid-scan).
pub fn socket_inodes(proc_root: &Path, pid: u32) -> Vec<u64> {
    let fd_dir = proc_root.join(pid.to_string()).join("fd");
    let Ok(entries) = fs::read_dir(&fd_dir) else {
        return Vec::new();
    };
    let mut inodes = Vec::new();
    for entry in entries.flatten() {
        let Ok(target) = fs::read_link(entry.path()) else {
            continue;
        };
        let target = target.to_string_lossy();
        if let Some(rest) = target.strip_prefix("socket:[") {
            if let Some(num) = rest.strip_suffix(']') {
                if let Ok(inode) = num.parse() {
                    inodes.push(inode);
                }
            }
        }
    }
    inodes
}

/// Parse one row of a kernel socket table into `(inode, connection)`.
///
/// Row format: `sl local_address rem_address st ... inode ...` where the
/// addresses are `HEXADDR:HEXPORT` in host byte order per 32-bit group.
fn parse_socket_line(line: &str, ipv6: bool) -> Option<(u64, TcpConnection)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 10 {
        return None;
    }

    let (local_addr, local_port) = parse_endpoint(fields[1], ipv6)?;
    let (remote_addr, remote_port) = parse_endpoint(fields[2], ipv6)?;
    let state = TcpState::from_hex(u8::from_str_radix(fields[3], 16).ok()?);
    let inode: u64 = fields[9].parse().ok()?;

    let remote_addr = if state.is_listen() {
        String::new()
    } else {
        remote_addr
    };

    Some((
        inode,
        TcpConnection {
            local_addr,
            local_port,
            remote_addr,
            remote_port,
            state,
        },
    ))
}

fn parse_endpoint(field: &str, ipv6: bool) -> Option<(String, u16)> {
    let (addr_hex, port_hex) = field.split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;
    let addr = if ipv6 {
        if addr_hex.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 16];
        for (i, chunk) in addr_hex.as_bytes().chunks(8).enumerate() {
            let group = u32::from_str_radix(std::str::from_utf8(chunk).ok()?, 16).ok()?;
            bytes[i * 4..i * 4 + 4].copy_from_slice(&group.to_le_bytes());
        }
        Ipv6Addr::from(bytes).to_string()
    } else {
        let raw = u32::from_str_radix(addr_hex, 16).ok()?;
        Ipv4Addr::from(raw.swap_bytes()).to_string()
    };
    Some((addr, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ipv4_listen_row() {
        let line = "   0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 31337 1 0000000000000000 100 0 0 10 0";
        let (inode, conn) = parse_socket_line(line, false).unwrap();
        assert_eq!(inode, 31337);
        assert_eq!(conn.local_addr, "127.0.0.1");
        assert_eq!(conn.local_port, 0x1F90);
        assert_eq!(conn.state, TcpState::Listen);
        assert!(conn.remote_addr.is_empty());
    }

    #[test]
    fn parses_ipv4_established_row() {
        let line = "   1: 0100007F:A001 0200007F:1F90 01 00000000:00000000 00:00000000 00000000  1000        0 42 1 0000000000000000 20 4 30 10 -1";
        let (inode, conn) = parse_socket_line(line, false).unwrap();
        assert_eq!(inode, 42);
        assert_eq!(conn.remote_addr, "127.0.0.2");
        assert_eq!(conn.remote_port, 0x1F90);
        assert_eq!(conn.state, TcpState::Established);
    }

    #[test]
    fn parses_ipv6_mapped_row() {
        let line = "   2: 0000000000000000FFFF00000100007F:0050 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 7 1 0000000000000000 100 0 0 10 0";
        let (inode, conn) = parse_socket_line(line, true).unwrap();
        assert_eq!(inode, 7);
        assert_eq!(conn.local_addr, "::ffff:127.0.0.1");
        assert_eq!(conn.local_port, 80);
    }

    #[test]
    fn malformed_rows_are_skipped() {
        assert!(parse_socket_line("garbage", false).is_none());
        assert!(parse_socket_line("   0: nonsense row with words", true).is_none());
    }

    #[test]
    fn state_decoding() {
        assert_eq!(TcpState::from_hex(0x0A), TcpState::Listen);
        assert_eq!(TcpState::from_hex(0x01), TcpState::Established);
        assert_eq!(TcpState::from_hex(0xEE), TcpState::Unknown);
        assert_eq!(TcpState::Listen.to_string(), "LISTEN");
    }
}
