//! Byte strings: bounded, padded, delimited or NUL-terminated.
//!
//! Every bound is an [`Attr`], so a string can be sized by a sibling length
//! field. A bound that resolves to `Nil` (its source is itself still deferred)
//! counts as "no bound".
//!
//! Capture picks the extent by the first rule that applies: exact `size`,
//! NUL terminator (`\0\0` on a 2-byte boundary for UTF-16), `delimiter`, and
//! finally everything that is left. The extent is then cut to `max`, padded
//! to `min`, and, for UTF-16 strings, decoded to UTF-8.

use crate::error::{Error, Result};
use crate::node::{NodeId, NodeKind, Tree};
use crate::resolve::Attr;
use crate::value::Scalar;
use memchr::memmem;

#[derive(Clone)]
pub struct Str {
    pub value: Attr,
    /// Exact length: sets both `min` and `max`, and fixes the capture extent.
    pub size: Option<Attr>,
    pub min: Option<Attr>,
    pub max: Option<Attr>,
    pub padding: u8,
    /// Pad the rendered bytes to a multiple of this.
    pub pad_to: Option<Attr>,
    pub delimiter: Option<Vec<u8>>,
    pub nul_terminated: bool,
    /// Stored as UTF-8, carried on the wire as UTF-16LE.
    pub unicode: bool,
}

impl Default for Str {
    fn default() -> Self {
        Str {
            value: Attr::Value(Scalar::Bytes(Vec::new())),
            size: None,
            min: None,
            max: None,
            padding: 0,
            pad_to: None,
            delimiter: None,
            nul_terminated: false,
            unicode: false,
        }
    }
}

impl Str {
    pub fn new() -> Self {
        Str::default()
    }

    pub fn value(mut self, value: impl Into<Attr>) -> Self {
        self.value = value.into();
        self
    }

    pub fn size(mut self, size: impl Into<Attr>) -> Self {
        self.size = Some(size.into());
        self
    }

    pub fn min(mut self, min: impl Into<Attr>) -> Self {
        self.min = Some(min.into());
        self
    }

    pub fn max(mut self, max: impl Into<Attr>) -> Self {
        self.max = Some(max.into());
        self
    }

    pub fn padding(mut self, padding: u8) -> Self {
        self.padding = padding;
        self
    }

    pub fn pad_to(mut self, multiple: impl Into<Attr>) -> Self {
        self.pad_to = Some(multiple.into());
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<Vec<u8>>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn nul_terminated(mut self) -> Self {
        self.nul_terminated = true;
        self
    }

    pub fn unicode(mut self) -> Self {
        self.unicode = true;
        self
    }
}

/// Resolved bounds for one render or capture.
struct Bounds {
    size: Option<usize>,
    min: usize,
    max: Option<usize>,
}

fn to_utf16le(text: &[u8]) -> Result<Vec<u8>> {
    let s = std::str::from_utf8(text)
        .map_err(|e| Error::InvalidValue(format!("unicode string is not UTF-8: {}", e)))?;
    Ok(s.encode_utf16().flat_map(u16::to_le_bytes).collect())
}

fn from_utf16le(raw: &[u8]) -> Result<Vec<u8>> {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    let s = String::from_utf16(&units)
        .map_err(|e| Error::InvalidValue(format!("bad UTF-16 string: {}", e)))?;
    Ok(s.trim_end_matches('\0').as_bytes().to_vec())
}

/// Offset of the first `\0\0` starting on an even byte.
fn find_wide_nul(buf: &[u8]) -> Option<usize> {
    buf.chunks_exact(2)
        .position(|c| c[0] == 0 && c[1] == 0)
        .map(|i| i * 2)
}

impl Tree {
    fn str_bounds(&self, id: NodeId, s: &Str) -> Result<Bounds> {
        let bound = |a: &Option<Attr>| -> Result<Option<usize>> {
            Ok(match a {
                Some(a) => self.resolve(id, a)?.as_bound(),
                None => None,
            })
        };
        let size = bound(&s.size)?;
        Ok(Bounds {
            size,
            min: size.or(bound(&s.min)?).unwrap_or(0),
            max: size.or(bound(&s.max)?),
        })
    }

    /// A string with a resolved exact size of zero takes no input.
    pub(crate) fn str_needs_input(&self, id: NodeId, s: &Str) -> bool {
        !matches!(
            s.size.as_ref().map(|a| self.resolve(id, a).map(|v| v.as_bound())),
            Some(Ok(Some(0)))
        )
    }

    pub(crate) fn render_str(&self, id: NodeId, s: &Str) -> Result<Vec<u8>> {
        let b = self.str_bounds(id, s)?;
        let mut val = match self.resolve(id, &s.value)? {
            Scalar::Bytes(v) => v,
            Scalar::Nil => Vec::new(),
            other => {
                return Err(Error::InvalidValue(format!(
                    "{} holds {:?}, not bytes",
                    self.describe(id),
                    other
                )))
            }
        };
        if s.unicode {
            val = to_utf16le(&val)?;
            if s.nul_terminated {
                val.extend_from_slice(&[0, 0]);
            }
        } else if s.nul_terminated && val.last() != Some(&0) {
            val.push(0);
        }
        if val.len() < b.min {
            val.resize(b.min, s.padding);
        }
        if let Some(multiple) = &s.pad_to {
            if let Some(m) = self.resolve(id, multiple)?.as_bound().filter(|&m| m > 0) {
                let padded = val.len().div_ceil(m) * m;
                val.resize(padded, s.padding);
            }
        }
        if let Some(max) = b.max {
            val.truncate(max);
        }
        Ok(val)
    }

    pub(crate) fn capture_str<'a>(&mut self, id: NodeId, buf: &'a [u8]) -> Result<&'a [u8]> {
        let Some(s) = (match &self.node(id).kind {
            NodeKind::Str(s) => Some(s.clone()),
            _ => None,
        }) else {
            return Ok(buf);
        };
        let b = self.str_bounds(id, &s)?;
        if b.size == Some(0) {
            self.set_value(id, Vec::<u8>::new())?;
            return Ok(buf);
        }
        if buf.is_empty() {
            return Err(Error::incomplete(format!("{}: no input", self.describe(id))));
        }

        // (extent, terminator length)
        let (mut extent, mut term) = if let Some(n) = b.size {
            if buf.len() < n {
                return Err(Error::incomplete(format!(
                    "{} needs {} bytes, {} left",
                    self.describe(id),
                    n,
                    buf.len()
                )));
            }
            (n, 0)
        } else if s.nul_terminated {
            let found = if s.unicode {
                find_wide_nul(buf).map(|i| (i, 2))
            } else {
                memchr::memchr(0, buf).map(|i| (i, 1))
            };
            found.unwrap_or((buf.len(), 0))
        } else if let Some(d) = s.delimiter.as_deref().filter(|d| !d.is_empty()) {
            memmem::find(buf, d)
                .map(|i| (i, d.len()))
                .unwrap_or((buf.len(), 0))
        } else {
            (buf.len(), 0)
        };

        if let Some(max) = b.max {
            if extent > max {
                extent = max;
                term = 0;
            }
        }
        let mut raw = buf[..extent].to_vec();
        if raw.len() < b.min {
            raw.resize(b.min, s.padding);
        }
        let value = if s.unicode { from_utf16le(&raw)? } else { raw };
        tracing::trace!(node = id.index(), len = extent, "capture str");
        self.set_value(id, value)?;
        Ok(&buf[extent + term..])
    }
}
