//! Thin specializations of numbers and strings: IPv4 addresses, Unix
//! timestamps, MAC addresses and enumerated integers.
//!
//! Each is an ordinary [`Number`] or [`Str`] with its own lineage, plus typed
//! accessors on [`Tree`].

use crate::error::{Error, Result};
use crate::node::{NodeId, Tree};
use crate::number::{Endianness, Number};
use crate::string::Str;
use crate::template::Template;
use std::net::Ipv4Addr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 4-byte address in network order.
pub fn ipv4() -> Template {
    Template::number(Number::new(32).endian(Endianness::Big)).with_lineage(&["Ipv4", "Number"])
}

/// 32-bit seconds since the epoch.
pub fn time_t() -> Template {
    Template::number(Number::new(32)).with_lineage(&["TimeT", "Number"])
}

pub fn mac_addr() -> Template {
    Template::string(Str::new().size(6usize)).with_lineage(&["MacAddr", "Str"])
}

/// `width`-bit integer whose values carry labels.
pub fn enumeration<I, S>(width: u32, labels: I) -> Template
where
    I: IntoIterator<Item = (u64, S)>,
    S: Into<String>,
{
    Template::number(Number::new(width).labels(labels)).with_lineage(&["Enum", "Number"])
}

/// Parse `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff` or `aabbccddeeff`.
pub fn parse_mac(text: &str) -> Result<[u8; 6]> {
    let bad = || Error::InvalidValue(format!("\"{}\" is not a MAC address", text));
    let sep = text.chars().nth(2).filter(|c| *c == ':' || *c == '-');
    let hex: String = match sep {
        Some(sep) => {
            let parts: Vec<&str> = text.split(sep).collect();
            if parts.len() != 6 || parts.iter().any(|p| p.len() != 2) {
                return Err(bad());
            }
            parts.concat()
        }
        None => text.to_string(),
    };
    if hex.len() != 12 || !hex.is_ascii() {
        return Err(bad());
    }
    let mut out = [0u8; 6];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| bad())?;
    }
    Ok(out)
}

pub fn format_mac(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

impl Tree {
    pub fn ipv4_addr(&self, id: NodeId) -> Option<Ipv4Addr> {
        self.int(id).map(|x| Ipv4Addr::from(x as u32))
    }

    /// Set from dotted-quad text.
    pub fn set_ipv4(&mut self, id: NodeId, text: &str) -> Result<()> {
        let addr: Ipv4Addr = text
            .parse()
            .map_err(|e| Error::InvalidValue(format!("\"{}\": {}", text, e)))?;
        self.set_value(id, u32::from(addr))
    }

    pub fn timestamp(&self, id: NodeId) -> Option<SystemTime> {
        self.int(id).map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
    }

    pub fn set_timestamp(&mut self, id: NodeId, at: SystemTime) -> Result<()> {
        let secs = at
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::InvalidValue(format!("timestamp before the epoch: {}", e)))?
            .as_secs();
        self.set_value(id, secs)
    }

    /// Colon-separated hex, or `None` if the node holds no bytes.
    pub fn mac(&self, id: NodeId) -> Option<String> {
        self.bytes(id).map(format_mac)
    }

    pub fn set_mac(&mut self, id: NodeId, text: &str) -> Result<()> {
        let bytes = parse_mac(text)?;
        self.set_value(id, &bytes)
    }

    /// Label of an enumerated integer's current value.
    pub fn label(&self, id: NodeId) -> Option<&str> {
        let n = self.number(id)?;
        let value = self.int(id)?;
        n.labels.as_ref()?.get(&value).map(String::as_str)
    }

    /// Set an enumerated integer to the value carrying `label`.
    pub fn set_label(&mut self, id: NodeId, label: &str) -> Result<()> {
        let value = self
            .number(id)
            .and_then(|n| n.labels.as_ref())
            .and_then(|labels| labels.iter().find(|(_, l)| *l == label).map(|(v, _)| *v))
            .ok_or_else(|| {
                Error::InvalidValue(format!("{} has no label \"{}\"", self.describe(id), label))
            })?;
        self.set_value(id, value)
    }
}
