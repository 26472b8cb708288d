//! Scalar values carried by leaf nodes and produced by reference resolution.

/// A single resolved value: what a leaf holds, what a deferred reference
/// evaluates to, and what dispatch tables are keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Scalar {
    /// Nothing resolved yet (or nothing to resolve). Numbers treat it as 0,
    /// string bounds treat it as "no bound".
    #[default]
    Nil,
    Bool(bool),
    Int(u64),
    Bytes(Vec<u8>),
}

impl Scalar {
    /// Integer view: `Int` as-is, booleans as 1/0. `Nil` and bytes have none.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Scalar::Int(x) => Some(*x),
            Scalar::Bool(b) => Some(u64::from(*b)),
            _ => None,
        }
    }

    /// Integer view used when a number renders: `Nil` counts as 0.
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Scalar::Nil => Some(0),
            other => other.as_u64(),
        }
    }

    /// Length-bound view: `Nil` (unresolved) means unbounded.
    pub fn as_bound(&self) -> Option<usize> {
        self.as_u64().map(|x| x as usize)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Scalar::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Scalar::Nil => false,
            Scalar::Bool(b) => *b,
            Scalar::Int(x) => *x != 0,
            Scalar::Bytes(b) => !b.is_empty(),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Scalar::Nil)
    }
}

impl From<u64> for Scalar {
    fn from(x: u64) -> Self {
        Scalar::Int(x)
    }
}

impl From<u32> for Scalar {
    fn from(x: u32) -> Self {
        Scalar::Int(x as u64)
    }
}

impl From<u16> for Scalar {
    fn from(x: u16) -> Self {
        Scalar::Int(x as u64)
    }
}

impl From<u8> for Scalar {
    fn from(x: u8) -> Self {
        Scalar::Int(x as u64)
    }
}

impl From<usize> for Scalar {
    fn from(x: usize) -> Self {
        Scalar::Int(x as u64)
    }
}

impl From<i32> for Scalar {
    fn from(x: i32) -> Self {
        Scalar::Int(x as u64)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Bytes(s.as_bytes().to_vec())
    }
}

impl From<&[u8]> for Scalar {
    fn from(b: &[u8]) -> Self {
        Scalar::Bytes(b.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Scalar {
    fn from(b: &[u8; N]) -> Self {
        Scalar::Bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(b: Vec<u8>) -> Self {
        Scalar::Bytes(b)
    }
}
