//! The fixed set of Pacific Regional Navigation Initiative countries.
//!
//! Each country is identified by a two-letter code that selects both its
//! input directory (`<root>/<code>/...`) and its output file (`<code>.gpkg`).
//!
//! # Examples
//!
//! ```
//! use prni_core::countries::CountryCode;
//!
//! let fiji: CountryCode = "fj".parse().unwrap();
//! assert_eq!(fiji, CountryCode::Fiji);
//! assert_eq!(fiji.as_str(), "FJ");
//! assert_eq!(fiji.name(), "Fiji");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// A country handled by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub enum CountryCode {
    /// CK
    CookIslands,
    /// FJ
    Fiji,
    /// FM
    Micronesia,
    /// FP
    FrenchPolynesia,
    /// KI
    Kiribati,
    /// MH
    MarshallIslands,
    /// NC
    NewCaledonia,
    /// NR
    Nauru,
    /// NU
    Niue,
    /// PG
    PapuaNewGuinea,
    /// SB
    SolomonIslands,
    /// TO
    Tonga,
    /// TV
    Tuvalu,
    /// VU
    Vanuatu,
    /// WS
    Samoa,
}

impl CountryCode {
    /// Every country, in code order.
    pub const ALL: [Self; 15] = [
        Self::CookIslands,
        Self::Fiji,
        Self::Micronesia,
        Self::FrenchPolynesia,
        Self::Kiribati,
        Self::MarshallIslands,
        Self::NewCaledonia,
        Self::Nauru,
        Self::Niue,
        Self::PapuaNewGuinea,
        Self::SolomonIslands,
        Self::Tonga,
        Self::Tuvalu,
        Self::Vanuatu,
        Self::Samoa,
    ];

    /// The upper-case two-letter code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CookIslands => "CK",
            Self::Fiji => "FJ",
            Self::Micronesia => "FM",
            Self::FrenchPolynesia => "FP",
            Self::Kiribati => "KI",
            Self::MarshallIslands => "MH",
            Self::NewCaledonia => "NC",
            Self::Nauru => "NR",
            Self::Niue => "NU",
            Self::PapuaNewGuinea => "PG",
            Self::SolomonIslands => "SB",
            Self::Tonga => "TO",
            Self::Tuvalu => "TV",
            Self::Vanuatu => "VU",
            Self::Samoa => "WS",
        }
    }

    /// Human-readable country name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CookIslands => "Cook Islands",
            Self::Fiji => "Fiji",
            Self::Micronesia => "Federated States of Micronesia",
            Self::FrenchPolynesia => "French Polynesia",
            Self::Kiribati => "Kiribati",
            Self::MarshallIslands => "Marshall Islands",
            Self::NewCaledonia => "New Caledonia",
            Self::Nauru => "Nauru",
            Self::Niue => "Niue",
            Self::PapuaNewGuinea => "Papua New Guinea",
            Self::SolomonIslands => "Solomon Islands",
            Self::Tonga => "Tonga",
            Self::Tuvalu => "Tuvalu",
            Self::Vanuatu => "Vanuatu",
            Self::Samoa => "Samoa",
        }
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known country code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown country code '{0}'; expected one of {codes}", codes = known_codes())]
pub struct UnknownCountry(pub String);

fn known_codes() -> String {
    CountryCode::ALL
        .iter()
        .map(CountryCode::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromStr for CountryCode {
    type Err = UnknownCountry;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(code))
            .ok_or_else(|| UnknownCountry(s.to_string()))
    }
}

impl TryFrom<String> for CountryCode {
    type Error = UnknownCountry;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
