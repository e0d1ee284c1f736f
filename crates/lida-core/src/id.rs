//! Identity types for states
//!
//! Original states carry the integer index of the source dataset. Composite
//! (lumped) states get dense identifiers once the state stream is exhausted.

use std::fmt;

use crate::{LidaError, LidaResult};

/// Original state identity - index of a state in the source `.states` file
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OriginalId(pub u64);

impl OriginalId {
    #[inline]
    pub fn new(id: u64) -> Self {
        OriginalId(id)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for OriginalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Original({})", self.0)
    }
}

impl fmt::Display for OriginalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for OriginalId {
    fn from(id: u64) -> Self {
        OriginalId(id)
    }
}

/// Composite state identity - dense, ordered by ascending composite energy
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LumpedId(pub u32);

impl LumpedId {
    pub const ZERO: LumpedId = LumpedId(0);

    #[inline]
    pub fn new(id: u32) -> Self {
        LumpedId(id)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Position of this composite state in a dense table
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Identifier for the composite state stored at `index` of a dense table
    pub fn from_index(index: usize) -> LidaResult<Self> {
        u32::try_from(index)
            .map(LumpedId)
            .map_err(|_| LidaError::TooManyCompositeStates(index))
    }
}

impl fmt::Debug for LumpedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lumped({})", self.0)
    }
}

impl fmt::Display for LumpedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lumped_id_index_roundtrip() {
        let id = LumpedId::from_index(42).unwrap();
        assert_eq!(id, LumpedId::new(42));
        assert_eq!(id.index(), 42);
    }

    #[test]
    fn test_lumped_id_out_of_range() {
        let last = u32::MAX as usize;
        assert_eq!(LumpedId::from_index(last).unwrap().get(), u32::MAX);
        if let Some(past) = last.checked_add(1) {
            let err = LumpedId::from_index(past).unwrap_err();
            assert!(matches!(err, LidaError::TooManyCompositeStates(n) if n == past));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(OriginalId::new(7).to_string(), "7");
        assert_eq!(format!("{:?}", LumpedId::new(3)), "Lumped(3)");
    }

    #[test]
    fn test_ordering() {
        assert!(OriginalId::new(1) < OriginalId::new(2));
        assert!(LumpedId::ZERO < LumpedId::new(1));
    }
}
