//! Integer fields of any bit width.
//!
//! Three encodings:
//!
//! - **Byte-aligned** (width a multiple of 8, up to 64): packed with the
//!   configured byte order.
//! - **Odd width** (any other width): adjacent odd-width siblings form a
//!   *span*. The first member of the span encodes and decodes all of it as one
//!   MSB-first bit string padded to a byte boundary; the other members occupy
//!   zero bytes of their own. A span's byte order comes from its first member:
//!   big-endian spans are written as packed, anything else is byte-reversed.
//! - **ASCII** numerals in radix 2, 8, 10 or 16, optionally zero-padded.

use crate::bits::{bytes_for_bits, mask_for, pack_span, unpack_span};
use crate::error::{Error, Result};
use crate::node::{NodeId, NodeKind, Tree};
use crate::resolve::Attr;
use crate::value::Scalar;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
    /// Whatever the host uses.
    Native,
}

impl Endianness {
    pub const fn host() -> Endianness {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    /// `Native` replaced by the host order.
    pub const fn resolved(self) -> Endianness {
        match self {
            Endianness::Native => Endianness::host(),
            other => other,
        }
    }
}

/// Configuration and value of an integer field.
#[derive(Clone)]
pub struct Number {
    pub width: u32,
    pub endian: Endianness,
    pub value: Attr,
    /// Render as text instead of binary.
    pub ascii: bool,
    /// Radix for ASCII mode; 0 means "10 on render, auto-detect `0x` on capture".
    pub radix: Attr,
    /// Minimum text width for ASCII mode, left-padded with `0`.
    pub pad: Option<Attr>,
    /// Value labels for enumerated integers.
    pub labels: Option<Rc<BTreeMap<u64, String>>>,
}

impl Number {
    /// A `width`-bit little-endian integer with value 0.
    pub fn new(width: u32) -> Self {
        Number {
            width,
            endian: Endianness::Little,
            value: Attr::Value(Scalar::Int(0)),
            ascii: false,
            radix: Attr::Value(Scalar::Int(0)),
            pad: None,
            labels: None,
        }
    }

    pub fn endian(mut self, endian: Endianness) -> Self {
        self.endian = endian;
        self
    }

    pub fn value(mut self, value: impl Into<Attr>) -> Self {
        self.value = value.into();
        self
    }

    /// ASCII numerals in `radix` (0 = decimal, auto-detect hex on capture).
    pub fn ascii(mut self, radix: u32) -> Self {
        self.ascii = true;
        self.radix = Attr::Value(Scalar::Int(radix as u64));
        self
    }

    pub fn pad(mut self, pad: impl Into<Attr>) -> Self {
        self.pad = Some(pad.into());
        self
    }

    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (u64, S)>,
        S: Into<String>,
    {
        self.labels = Some(Rc::new(
            labels.into_iter().map(|(k, v)| (k, v.into())).collect(),
        ));
        self
    }

    /// Binary and not a multiple of 8 bits: encoded as part of a span.
    pub fn is_odd_width(&self) -> bool {
        !self.ascii && self.width % 8 != 0
    }

    pub fn byte_width(&self) -> usize {
        bytes_for_bits(self.width as usize)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.width == 0 || self.width > 64 {
            return Err(Error::Schema(format!(
                "number width {} out of range 1..=64",
                self.width
            )));
        }
        Ok(())
    }
}

fn ascii_radix(r: u64) -> Result<u32> {
    match r {
        2 | 8 | 10 | 16 => Ok(r as u32),
        other => Err(Error::Schema(format!("unsupported ASCII radix {}", other))),
    }
}

impl Tree {
    pub(crate) fn number(&self, id: NodeId) -> Option<&Number> {
        match &self.node(id).kind {
            NodeKind::Number(n) => Some(n),
            _ => None,
        }
    }

    fn is_odd_member(&self, id: NodeId) -> bool {
        self.number(id).is_some_and(Number::is_odd_width)
    }

    /// Members of the span containing `id`, and whether `id` leads it.
    fn span_of(&self, id: NodeId) -> (Vec<NodeId>, bool) {
        let (Some(parent), Some(place)) = (self.parent(id), self.place(id)) else {
            return (vec![id], true);
        };
        let siblings = self.children(parent);
        let mut start = place;
        while start > 0 && self.is_odd_member(siblings[start - 1]) {
            start -= 1;
        }
        let mut end = place;
        while end + 1 < siblings.len() && self.is_odd_member(siblings[end + 1]) {
            end += 1;
        }
        (siblings[start..=end].to_vec(), start == place)
    }

    /// Total bits of the span led by `id`, or `None` if `id` does not lead one.
    fn span_bits(&self, id: NodeId) -> Option<usize> {
        let (members, first) = self.span_of(id);
        first.then(|| {
            members
                .iter()
                .filter_map(|&m| self.number(m))
                .map(|n| n.width as usize)
                .sum()
        })
    }

    /// A number needs bytes of its own unless it trails in a span.
    pub(crate) fn number_needs_input(&self, id: NodeId) -> bool {
        !self.is_odd_member(id) || self.span_of(id).1
    }

    fn number_value(&self, id: NodeId, n: &Number) -> Result<u64> {
        self.resolve(id, &n.value)?.as_number().ok_or_else(|| {
            Error::InvalidValue(format!("{} resolved to bytes", self.describe(id)))
        })
    }

    pub(crate) fn render_number(&self, id: NodeId, n: &Number) -> Result<Vec<u8>> {
        if n.ascii {
            return self.render_ascii(id, n);
        }
        if n.is_odd_width() {
            return self.render_span(id, n);
        }
        let width = n.byte_width();
        let value = self.number_value(id, n)? & mask_for(n.width);
        let mut out = vec![0u8; width];
        match n.endian.resolved() {
            Endianness::Big => BigEndian::write_uint(&mut out, value, width),
            _ => LittleEndian::write_uint(&mut out, value, width),
        }
        Ok(out)
    }

    fn render_span(&self, id: NodeId, n: &Number) -> Result<Vec<u8>> {
        let (members, first) = self.span_of(id);
        if !first {
            return Ok(Vec::new());
        }
        let mut fields = Vec::with_capacity(members.len());
        for m in members {
            if let Some(mn) = self.number(m) {
                fields.push((self.number_value(m, mn)?, mn.width));
            }
        }
        let mut out = pack_span(&fields);
        if n.endian.resolved() != Endianness::Big {
            out.reverse();
        }
        Ok(out)
    }

    fn render_ascii(&self, id: NodeId, n: &Number) -> Result<Vec<u8>> {
        let radix = match self.resolve(id, &n.radix)?.as_number().unwrap_or(0) {
            0 => 10,
            r => ascii_radix(r)?,
        };
        let pad = match &n.pad {
            Some(p) => self.resolve(id, p)?.as_bound().unwrap_or(0),
            None => 0,
        };
        let value = self.number_value(id, n)?;
        let text = match radix {
            2 => format!("{:b}", value),
            8 => format!("{:o}", value),
            16 => format!("{:x}", value),
            _ => value.to_string(),
        };
        Ok(format!("{:0>width$}", text, width = pad).into_bytes())
    }

    pub(crate) fn capture_number<'a>(&mut self, id: NodeId, buf: &'a [u8]) -> Result<&'a [u8]> {
        let Some(n) = self.number(id).cloned() else {
            return Ok(buf);
        };
        if n.ascii {
            return self.capture_ascii(id, &n, buf);
        }
        if n.is_odd_width() {
            return self.capture_span(id, &n, buf);
        }
        let width = n.byte_width();
        if buf.len() < width {
            return Err(Error::incomplete(format!(
                "{} needs {} bytes, {} left",
                self.describe(id),
                width,
                buf.len()
            )));
        }
        let value = match n.endian.resolved() {
            Endianness::Big => BigEndian::read_uint(&buf[..width], width),
            _ => LittleEndian::read_uint(&buf[..width], width),
        };
        self.set_number(id, value);
        Ok(&buf[width..])
    }

    fn capture_span<'a>(&mut self, id: NodeId, n: &Number, buf: &'a [u8]) -> Result<&'a [u8]> {
        let (members, first) = self.span_of(id);
        if !first {
            return Ok(buf);
        }
        let widths: Vec<u32> = members
            .iter()
            .filter_map(|&m| self.number(m).map(|mn| mn.width))
            .collect();
        let total: usize = widths.iter().map(|&w| w as usize).sum();
        let len = bytes_for_bits(total);
        if buf.len() < len {
            return Err(Error::incomplete(format!(
                "bit span of {} bits needs {} bytes, {} left",
                total,
                len,
                buf.len()
            )));
        }
        let mut chunk = buf[..len].to_vec();
        if n.endian.resolved() != Endianness::Big {
            chunk.reverse();
        }
        let values = unpack_span(&chunk, &widths).ok_or_else(|| {
            Error::incomplete(format!("bit span of {} bits truncated", total))
        })?;
        for (m, value) in members.into_iter().zip(values) {
            self.set_number(m, value);
        }
        Ok(&buf[len..])
    }

    fn capture_ascii<'a>(&mut self, id: NodeId, n: &Number, buf: &'a [u8]) -> Result<&'a [u8]> {
        let mut rest = buf;
        let radix = match self.resolve(id, &n.radix)?.as_number().unwrap_or(0) {
            0 => {
                if let Some(hex) = rest.strip_prefix(b"0x") {
                    rest = hex;
                    16
                } else {
                    10
                }
            }
            r => ascii_radix(r)?,
        };
        let digits = rest
            .iter()
            .take_while(|&&b| (b as char).is_digit(radix))
            .count();
        let value = if digits == 0 {
            0
        } else {
            // digits are ASCII, so this is valid UTF-8
            let text = std::str::from_utf8(&rest[..digits]).unwrap_or("0");
            u64::from_str_radix(text, radix).map_err(|e| {
                Error::InvalidValue(format!("{}: {} ({})", self.describe(id), text, e))
            })?
        };
        self.set_number(id, value);
        Ok(&rest[digits..])
    }

    fn set_number(&mut self, id: NodeId, value: u64) {
        if let NodeKind::Number(n) = &mut self.node_mut(id).kind {
            n.value = Attr::Value(Scalar::Int(value));
        }
    }

    pub(crate) fn number_size(&self, id: NodeId, n: &Number) -> Result<usize> {
        if n.ascii {
            return Ok(self.render_ascii(id, n)?.len());
        }
        if n.is_odd_width() {
            return Ok(self.span_bits(id).map(bytes_for_bits).unwrap_or(0));
        }
        Ok(n.byte_width())
    }
}
