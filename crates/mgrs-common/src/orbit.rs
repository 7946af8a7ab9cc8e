//! Relative orbit numbers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CommonError;

/// A relative orbit: one of the repeating ground-track paths of a revisit cycle.
///
/// Sentinel-2 has 143 relative orbits, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelativeOrbit(pub u8);

impl RelativeOrbit {
    pub fn new(number: u8) -> Self {
        Self(number)
    }

    pub fn number(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for RelativeOrbit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{:03}", self.0)
    }
}

impl FromStr for RelativeOrbit {
    type Err = CommonError;

    /// Parse an orbit from attribute text such as `"84"`, `"084"` or `"R084"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('R')
            .or_else(|| trimmed.strip_prefix('r'))
            .unwrap_or(trimmed);

        // Some sources write integral attributes as floats ("84.0")
        let digits = digits.strip_suffix(".0").unwrap_or(digits);

        digits
            .parse::<u8>()
            .map(RelativeOrbit)
            .map_err(|_| CommonError::InvalidOrbit(s.to_string()))
    }
}

impl From<u8> for RelativeOrbit {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_orbit() {
        assert_eq!("84".parse::<RelativeOrbit>().unwrap(), RelativeOrbit(84));
        assert_eq!("R022".parse::<RelativeOrbit>().unwrap(), RelativeOrbit(22));
        assert_eq!(" 7.0 ".parse::<RelativeOrbit>().unwrap(), RelativeOrbit(7));
        assert!("abc".parse::<RelativeOrbit>().is_err());
        assert!("300".parse::<RelativeOrbit>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(RelativeOrbit(5).to_string(), "R005");
    }
}
