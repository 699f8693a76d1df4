//! Typed errors crossing the engine boundary (spec §7).
//!
//! Follows the hand-rolled `Display` + `std::error::Error` pattern used by
//! `h3o`'s public error types rather than pulling in a derive crate: the
//! engine has exactly one typed boundary (this one), so a derive buys
//! nothing. Everything inside the engine that doesn't cross this boundary
//! uses `anyhow`, as the teacher crate does throughout.

use std::fmt;

/// A fatal condition detected while building or integrating an inset.
///
/// `NonConvergent` is deliberately absent here: spec §7 calls it non-fatal
/// ("return best state observed"), so it is represented as
/// [`crate::DriverOutcome::NonConvergent`] instead of an error variant.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EngineError {
    /// Odd intersection count on a scanline, a hole outside its outer ring,
    /// or a ring that is not simple.
    InvalidTopology { geo_div_id: String, detail: String },
    /// Neither diagonal's midpoint lies inside a projected graticule cell.
    InvalidGraticule { cell: (usize, usize), detail: String },
    /// `ρ(X, t) ≤ 0` persisted after the retry budget was exhausted.
    NonPositiveDensity { attempts: u32, detail: String },
    /// `Σ target area = 0`; nothing to equalize.
    ZeroTargetSum,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTopology { geo_div_id, detail } => {
                write!(f, "invalid topology in GeoDiv '{geo_div_id}': {detail}")
            }
            Self::InvalidGraticule { cell, detail } => {
                write!(f, "invalid graticule cell ({}, {}): {detail}", cell.0, cell.1)
            }
            Self::NonPositiveDensity { attempts, detail } => {
                write!(f, "non-positive density after {attempts} step halvings: {detail}")
            }
            Self::ZeroTargetSum => write!(f, "sum of target areas is zero"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_identifying_detail() {
        let err = EngineError::InvalidTopology {
            geo_div_id: "AZ".into(),
            detail: "odd intersection count".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("AZ"));
        assert!(msg.contains("odd intersection count"));
    }

    #[test]
    fn zero_target_sum_has_stable_message() {
        assert_eq!(EngineError::ZeroTargetSum.to_string(), "sum of target areas is zero");
    }
}
