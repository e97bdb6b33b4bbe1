//! Station code and station record types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Maximum length of a station abbreviation.
const MAX_CODE_LEN: usize = 8;

/// Error returned when parsing an invalid station code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid station code {input:?}: {reason}")]
pub struct InvalidStationCode {
    input: String,
    reason: &'static str,
}

/// A valid station abbreviation, e.g. `12TH` or `MLBR`.
///
/// Codes are 1 to 8 characters, each an uppercase ASCII letter or digit.
/// Codes order lexicographically, which gives the matrix its stable
/// enumeration order.
///
/// # Examples
///
/// ```
/// use fare_matrix::domain::StationCode;
///
/// let code = StationCode::parse("12TH").unwrap();
/// assert_eq!(code.as_str(), "12TH");
///
/// // Lowercase is rejected
/// assert!(StationCode::parse("12th").is_err());
///
/// // Empty and overlong codes are rejected
/// assert!(StationCode::parse("").is_err());
/// assert!(StationCode::parse("ABCDEFGHI").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StationCode(String);

impl StationCode {
    /// Parse a station code from a string.
    pub fn parse(s: &str) -> Result<Self, InvalidStationCode> {
        if s.is_empty() || s.len() > MAX_CODE_LEN {
            return Err(InvalidStationCode {
                input: s.to_string(),
                reason: "must be 1 to 8 characters",
            });
        }

        if !s.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
            return Err(InvalidStationCode {
                input: s.to_string(),
                reason: "must be uppercase ASCII letters or digits",
            });
        }

        Ok(StationCode(s.to_string()))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StationCode {
    type Error = InvalidStationCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        StationCode::parse(&value)
    }
}

impl From<StationCode> for String {
    fn from(code: StationCode) -> Self {
        code.0
    }
}

impl fmt::Debug for StationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StationCode({})", self.0)
    }
}

impl fmt::Display for StationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A WGS84 latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for Coordinates {
    /// Formats as `lat,lon`, the form routing APIs take as a point.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// A station in the transit network.
///
/// Fields are declared in key order so the serialized form matches the
/// persisted document. Keys supplied by manual overrides that have no
/// dedicated field (parking costs and the like) are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub abbr: StationCode,

    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub city: String,

    #[serde(default)]
    pub county: String,

    #[serde(deserialize_with = "lenient_f64")]
    pub lat: f64,

    #[serde(deserialize_with = "lenient_f64")]
    pub long: f64,

    pub name: String,

    #[serde(default)]
    pub zipcode: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Station {
    /// The station's position.
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.long)
    }
}

/// Accept a coordinate as either a JSON number or a numeric string.
///
/// The BART directory reports coordinates as strings, and snapshots written
/// by older tooling kept them that way.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid coordinate {s:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_valid_codes() {
        assert!(StationCode::parse("12TH").is_ok());
        assert!(StationCode::parse("MLBR").is_ok());
        assert!(StationCode::parse("A").is_ok());
        assert!(StationCode::parse("ABCDEFGH").is_ok());
    }

    #[test]
    fn reject_lowercase() {
        assert!(StationCode::parse("embr").is_err());
        assert!(StationCode::parse("Embr").is_err());
    }

    #[test]
    fn reject_wrong_length() {
        assert!(StationCode::parse("").is_err());
        assert!(StationCode::parse("ABCDEFGHI").is_err());
    }

    #[test]
    fn reject_punctuation() {
        assert!(StationCode::parse("12-TH").is_err());
        assert!(StationCode::parse("12 TH").is_err());
        assert!(StationCode::parse("ÖST").is_err());
    }

    #[test]
    fn display_and_debug() {
        let code = StationCode::parse("EMBR").unwrap();
        assert_eq!(format!("{}", code), "EMBR");
        assert_eq!(format!("{:?}", code), "StationCode(EMBR)");
    }

    #[test]
    fn ordering_is_lexicographic() {
        let mut codes = vec![
            StationCode::parse("MONT").unwrap(),
            StationCode::parse("12TH").unwrap(),
            StationCode::parse("EMBR").unwrap(),
        ];
        codes.sort();
        let as_str: Vec<&str> = codes.iter().map(|c| c.as_str()).collect();
        assert_eq!(as_str, vec!["12TH", "EMBR", "MONT"]);
    }

    #[test]
    fn code_deserialize_rejects_invalid() {
        let result: Result<StationCode, _> = serde_json::from_value(json!("bad code"));
        assert!(result.is_err());
    }

    #[test]
    fn station_accepts_string_coordinates() {
        let station: Station = serde_json::from_value(json!({
            "abbr": "12TH",
            "name": "12th St. Oakland City Center",
            "lat": "37.803768",
            "long": "-122.271450",
            "address": "1245 Broadway",
            "city": "Oakland",
            "county": "alameda",
            "zipcode": "94612",
        }))
        .unwrap();

        assert_eq!(station.lat, 37.803768);
        assert_eq!(station.long, -122.27145);
        assert_eq!(station.coordinates().to_string(), "37.803768,-122.27145");
    }

    #[test]
    fn station_keeps_extra_keys() {
        let station: Station = serde_json::from_value(json!({
            "abbr": "MLBR",
            "name": "Millbrae",
            "lat": 37.600271,
            "long": -122.386702,
            "parking": 300,
        }))
        .unwrap();

        assert_eq!(station.extra.get("parking"), Some(&json!(300)));
        assert_eq!(station.address, "");

        let value = serde_json::to_value(&station).unwrap();
        assert_eq!(value["parking"], json!(300));
        assert_eq!(value["lat"], json!(37.600271));
    }

    #[test]
    fn station_requires_coordinates() {
        let result: Result<Station, _> = serde_json::from_value(json!({
            "abbr": "MLBR",
            "name": "Millbrae",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn station_rejects_non_numeric_coordinate() {
        let result: Result<Station, _> = serde_json::from_value(json!({
            "abbr": "MLBR",
            "name": "Millbrae",
            "lat": "north",
            "long": "-122.386702",
        }));
        assert!(result.is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any well-formed code parses and round-trips through as_str
        #[test]
        fn roundtrip(s in "[A-Z0-9]{1,8}") {
            let code = StationCode::parse(&s).unwrap();
            prop_assert_eq!(code.as_str(), s.as_str());
        }

        /// Lowercase letters are always rejected
        #[test]
        fn lowercase_rejected(s in "[A-Z0-9]{0,3}[a-z][A-Z0-9]{0,3}") {
            prop_assert!(StationCode::parse(&s).is_err());
        }

        /// Overlong codes are always rejected
        #[test]
        fn overlong_rejected(s in "[A-Z0-9]{9,16}") {
            prop_assert!(StationCode::parse(&s).is_err());
        }
    }
}
