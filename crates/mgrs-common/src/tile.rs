//! MGRS tile identifiers.
//!
//! Sentinel-2 products are distributed on the 100 km MGRS grid. A tile code
//! such as `33UUU` encodes:
//! - the UTM zone number (`33`)
//! - the latitude band letter (`U`), which also fixes the hemisphere
//! - the 100 km square identifier (`UU`)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crs::ZoneKey;
use crate::error::CommonError;

/// Valid latitude band letters, south to north (I and O are skipped).
const LATITUDE_BANDS: &str = "CDEFGHJKLMNPQRSTUVWX";

/// A validated MGRS tile code, normalized to 5 characters (`01CCV`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TileId(String);

impl TileId {
    /// Parse and normalize a tile code.
    ///
    /// Accepts a one- or two-digit zone (`1CCV` becomes `01CCV`) and an
    /// optional leading `T` as used in some product names (`T33UUU`).
    pub fn parse(code: &str) -> Result<Self, CommonError> {
        let trimmed = code.trim();
        let body = match trimmed.strip_prefix('T') {
            Some(rest) if rest.len() >= 4 && rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
            _ => trimmed,
        };

        let digit_count = body.chars().take_while(|c| c.is_ascii_digit()).count();
        if digit_count == 0 || digit_count > 2 {
            return Err(CommonError::invalid_tile(code, "expected a 1-2 digit zone number"));
        }

        let zone: u32 = body[..digit_count]
            .parse()
            .map_err(|_| CommonError::invalid_tile(code, "zone is not a number"))?;
        if !(1..=60).contains(&zone) {
            return Err(CommonError::invalid_tile(code, "zone must be within 1-60"));
        }

        let letters: Vec<char> = body[digit_count..].chars().collect();
        if letters.len() != 3 {
            return Err(CommonError::invalid_tile(code, "expected band letter and 2-letter square"));
        }

        let band = letters[0].to_ascii_uppercase();
        if !LATITUDE_BANDS.contains(band) {
            return Err(CommonError::invalid_tile(code, format!("invalid latitude band '{}'", band)));
        }

        for &c in &letters[1..] {
            let upper = c.to_ascii_uppercase();
            if !upper.is_ascii_uppercase() || upper == 'I' || upper == 'O' {
                return Err(CommonError::invalid_tile(code, format!("invalid square letter '{}'", c)));
            }
        }

        let square: String = letters[1..].iter().map(|c| c.to_ascii_uppercase()).collect();
        Ok(Self(format!("{:02}{}{}", zone, band, square)))
    }

    /// The normalized 5-character code.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// UTM zone number (1-60).
    pub fn zone_number(&self) -> u8 {
        // Normalized codes always start with two digits
        self.0[..2].parse().unwrap_or(0)
    }

    /// Latitude band letter.
    pub fn band(&self) -> char {
        self.0.as_bytes()[2] as char
    }

    /// 100 km square identifier.
    pub fn square(&self) -> &str {
        &self.0[3..]
    }

    /// Bands N and above lie in the northern hemisphere.
    pub fn is_northern(&self) -> bool {
        self.band() >= 'N'
    }

    /// The projection zone this tile belongs to.
    pub fn zone_key(&self) -> ZoneKey {
        ZoneKey {
            zone: self.zone_number(),
            is_northern: self.is_northern(),
        }
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TileId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TileId {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TileId> for String {
    fn from(value: TileId) -> Self {
        value.0
    }
}

impl AsRef<str> for TileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tile() {
        let tile = TileId::parse("33UUU").unwrap();
        assert_eq!(tile.zone_number(), 33);
        assert_eq!(tile.band(), 'U');
        assert_eq!(tile.square(), "UU");
        assert!(tile.is_northern());
        assert_eq!(tile.zone_key(), ZoneKey { zone: 33, is_northern: true });
    }

    #[test]
    fn test_normalization() {
        assert_eq!(TileId::parse("1CCV").unwrap().as_str(), "01CCV");
        assert_eq!(TileId::parse("T12SWF").unwrap().as_str(), "12SWF");
        assert_eq!(TileId::parse(" 12swf ").unwrap().as_str(), "12SWF");
    }

    #[test]
    fn test_hemisphere_from_band() {
        assert!(!TileId::parse("01CCV").unwrap().is_northern());
        assert!(!TileId::parse("23MQS").unwrap().is_northern());
        assert!(TileId::parse("31NAA").unwrap().is_northern());
        assert!(TileId::parse("60XWF").unwrap().is_northern());
    }

    #[test]
    fn test_invalid_tiles() {
        assert!(TileId::parse("").is_err());
        assert!(TileId::parse("UUU").is_err());
        assert!(TileId::parse("61UUU").is_err());
        assert!(TileId::parse("00UUU").is_err());
        assert!(TileId::parse("33IUU").is_err()); // I is not a band
        assert!(TileId::parse("33UOU").is_err()); // O is not a square letter
        assert!(TileId::parse("33UUUU").is_err());
        assert!(TileId::parse("123UUU").is_err());
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let json = serde_json::to_string(&TileId::parse("33UUU").unwrap()).unwrap();
        assert_eq!(json, "\"33UUU\"");
        assert!(serde_json::from_str::<TileId>("\"99ZZZ\"").is_err());
    }
}
