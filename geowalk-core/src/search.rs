use crate::coord::Coordinate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Language requested for address text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageCode {
    #[serde(rename = "en-GB")]
    EnGb,
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "de-DE")]
    DeDe,
    #[serde(rename = "de-CH")]
    DeCh,
    #[serde(rename = "fr-FR")]
    FrFr,
    #[serde(rename = "fr-CH")]
    FrCh,
    #[serde(rename = "it-IT")]
    ItIt,
    #[serde(rename = "es-ES")]
    EsEs,
}

impl LanguageCode {
    /// BCP-47 tag, as sent in `accept-language`
    pub fn tag(&self) -> &'static str {
        match self {
            LanguageCode::EnGb => "en-GB",
            LanguageCode::EnUs => "en-US",
            LanguageCode::DeDe => "de-DE",
            LanguageCode::DeCh => "de-CH",
            LanguageCode::FrFr => "fr-FR",
            LanguageCode::FrCh => "fr-CH",
            LanguageCode::ItIt => "it-IT",
            LanguageCode::EsEs => "es-ES",
        }
    }

    pub fn all() -> &'static [LanguageCode] {
        &[
            LanguageCode::EnGb,
            LanguageCode::EnUs,
            LanguageCode::DeDe,
            LanguageCode::DeCh,
            LanguageCode::FrFr,
            LanguageCode::FrCh,
            LanguageCode::ItIt,
            LanguageCode::EsEs,
        ]
    }
}

impl Default for LanguageCode {
    fn default() -> Self {
        LanguageCode::EnGb
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl std::str::FromStr for LanguageCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('_', "-");
        LanguageCode::all()
            .iter()
            .copied()
            .find(|code| code.tag().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| format!("unsupported language code: {}", s))
    }
}

/// Options applied to every lookup of a walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub language: LanguageCode,
    /// Cap on the number of places returned per lookup
    pub max_items: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            language: LanguageCode::EnGb,
            max_items: 1,
        }
    }
}

/// Position with optional elevation in metres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub coordinate: Coordinate,
    pub altitude: Option<f64>,
}

/// Address details of a place
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Address {
    /// Human-readable single-line address
    pub address_text: String,
    pub road: Option<String>,
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
}

/// One reverse geocoding result
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub address: Address,
    pub geo_point: Option<GeoPoint>,
}

impl Place {
    pub fn altitude(&self) -> Option<f64> {
        self.geo_point.and_then(|p| p.altitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_code_parsing() {
        assert_eq!("en-GB".parse::<LanguageCode>(), Ok(LanguageCode::EnGb));
        assert_eq!("de_ch".parse::<LanguageCode>(), Ok(LanguageCode::DeCh));
        assert!("xx-YY".parse::<LanguageCode>().is_err());
    }

    #[test]
    fn test_search_options_default() {
        let options = SearchOptions::default();
        assert_eq!(options.language, LanguageCode::EnGb);
        assert_eq!(options.max_items, 1);
    }

    #[test]
    fn test_search_options_serde() {
        let options: SearchOptions = serde_json::from_str(r#"{"language": "fr-CH"}"#).unwrap();
        assert_eq!(options.language, LanguageCode::FrCh);
        assert_eq!(options.max_items, 1);
    }
}
