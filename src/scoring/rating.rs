//! Score propagation
//!
//! Confirmed association counts roll up into a 0-10 narrative rating via a
//! breakpoint table, then blend with the externally supplied evidence and
//! authority scores into a composite index. Both steps are total: absent
//! inputs degrade to defaults, never to errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Evidence level assumed when the catalog supplied none.
pub const DEFAULT_EVIDENCE: f64 = 3.0;
/// Authority score assumed when the catalog supplied none.
pub const DEFAULT_AUTHORITY: f64 = 4.0;

/// A breakpoint table is rejected when it cannot be monotonic.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("rating breakpoints must be strictly increasing in count and non-decreasing in rating")]
pub struct InvalidScale;

/// Monotonic count-to-rating breakpoints.
///
/// A count maps to the rating of the highest breakpoint it reaches, so more
/// confirmed associations never lower a rating.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<(usize, u8)>", into = "Vec<(usize, u8)>")]
pub struct RatingScale {
    breakpoints: Vec<(usize, u8)>,
}

impl RatingScale {
    /// Validate and build a scale. Breakpoints must be strictly increasing
    /// in count, non-decreasing in rating, and start at count 0.
    pub fn new(breakpoints: Vec<(usize, u8)>) -> Result<Self, InvalidScale> {
        match breakpoints.first() {
            Some((0, _)) => {}
            _ => return Err(InvalidScale),
        }
        let monotonic = breakpoints
            .windows(2)
            .all(|pair| pair[0].0 < pair[1].0 && pair[0].1 <= pair[1].1);
        if !monotonic || breakpoints.iter().any(|(_, rating)| *rating > 10) {
            return Err(InvalidScale);
        }
        Ok(Self { breakpoints })
    }

    /// Rating for a confirmed association count.
    pub fn rating_for(&self, count: usize) -> u8 {
        self.breakpoints
            .iter()
            .take_while(|(threshold, _)| *threshold <= count)
            .last()
            .map(|(_, rating)| *rating)
            .unwrap_or(0)
    }
}

impl Default for RatingScale {
    fn default() -> Self {
        Self {
            breakpoints: vec![(0, 0), (1, 3), (2, 5), (3, 6), (4, 8), (6, 9), (10, 10)],
        }
    }
}

impl TryFrom<Vec<(usize, u8)>> for RatingScale {
    type Error = InvalidScale;

    fn try_from(breakpoints: Vec<(usize, u8)>) -> Result<Self, Self::Error> {
        Self::new(breakpoints)
    }
}

impl From<RatingScale> for Vec<(usize, u8)> {
    fn from(scale: RatingScale) -> Self {
        scale.breakpoints
    }
}

/// Blend rating with evidence and authority into the composite index,
/// rounded to one decimal place.
pub fn composite_index(evidence: Option<f64>, rating: u8, authority: Option<f64>) -> f64 {
    let evidence = evidence.unwrap_or(DEFAULT_EVIDENCE);
    let authority = authority.unwrap_or(DEFAULT_AUTHORITY);
    let raw = evidence * 0.4 + f64::from(rating) * 0.3 + authority * 0.3;
    (raw * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scale_matches_breakpoints() {
        let scale = RatingScale::default();
        let expected = [(0, 0), (1, 3), (2, 5), (3, 6), (4, 8), (5, 8), (6, 9), (9, 9), (10, 10), (25, 10)];
        for (count, rating) in expected {
            assert_eq!(scale.rating_for(count), rating, "count {count}");
        }
    }

    // === Scenario: more associations never lower a rating ===
    #[test]
    fn default_scale_is_monotonic_over_a_range() {
        let scale = RatingScale::default();
        let mut last = 0;
        for count in 0..64 {
            let rating = scale.rating_for(count);
            assert!(rating >= last, "rating dropped at count {count}");
            last = rating;
        }
    }

    #[test]
    fn non_monotonic_scale_is_rejected() {
        assert!(RatingScale::new(vec![(0, 0), (2, 5), (4, 3)]).is_err());
        assert!(RatingScale::new(vec![(0, 0), (3, 5), (3, 6)]).is_err());
        // Must start at zero.
        assert!(RatingScale::new(vec![(1, 3), (2, 5)]).is_err());
    }

    #[test]
    fn composite_uses_defaults_for_missing_inputs() {
        // evidence 3 * 0.4 + rating 5 * 0.3 + authority 4 * 0.3 = 3.9
        assert_eq!(composite_index(None, 5, None), 3.9);
    }

    // === Scenario: perfect inputs hit the scale ceiling exactly ===
    #[test]
    fn composite_is_bounded_at_ten() {
        assert_eq!(composite_index(Some(10.0), 10, Some(10.0)), 10.0);
    }

    #[test]
    fn composite_rounds_to_one_decimal() {
        // 2.5*0.4 + 3*0.3 + 4.1*0.3 = 1.0 + 0.9 + 1.23 = 3.13 -> 3.1
        assert_eq!(composite_index(Some(2.5), 3, Some(4.1)), 3.1);
    }
}
