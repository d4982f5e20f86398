//! Coordinate reference system identification.
//!
//! Shapefiles carry their CRS as ESRI-flavoured WKT in a `.prj` sidecar. This
//! module resolves that text to an EPSG code where possible: first through an
//! explicit `AUTHORITY["EPSG", ...]` clause, then through the ESRI names that
//! the PRNI source data is known to use.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

static AUTHORITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)AUTHORITY\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#).expect("valid AUTHORITY regex")
});

static ROOT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(PROJCS|GEOGCS)\[\s*"([^"]*)""#).expect("valid root name regex")
});

static UTM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(WGS[ _]?(?:19)?84|WGS[ _]?(?:19)?72|RGPF|Fiji[ _]1956)[ _/]*UTM[ _]zone[ _](\d{1,2})([NS])$",
    )
    .expect("valid UTM regex")
});

static PNGMG94: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^PNG94[ _/]*PNGMG94[ _]zone[ _](\d{2})$").expect("valid PNGMG94 regex")
});

/// A coordinate reference system attached to a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Crs {
    /// A CRS identified by its EPSG code.
    Epsg(u16),
    /// A CRS whose definition could not be resolved to an EPSG code.
    ///
    /// Holds the root WKT name, or the raw text when no name was found.
    Unrecognized(String),
}

impl Crs {
    /// WGS84 geographic coordinates, the CRS of every collated output.
    pub const WGS84: Self = Self::Epsg(4326);

    /// Returns the EPSG code, if this CRS has one.
    #[must_use]
    pub fn epsg(&self) -> Option<u16> {
        match self {
            Self::Epsg(code) => Some(*code),
            Self::Unrecognized(_) => None,
        }
    }

    /// Resolves a WKT definition (as found in a `.prj` file).
    ///
    /// Returns `None` for blank input. Text that parses but cannot be mapped
    /// to an EPSG code yields [`Crs::Unrecognized`].
    ///
    /// # Examples
    ///
    /// ```
    /// use prni_core_common::Crs;
    ///
    /// let wkt = r#"PROJCS["WGS_1984_UTM_Zone_60S",GEOGCS["GCS_WGS_1984"]]"#;
    /// assert_eq!(Crs::from_wkt(wkt), Some(Crs::Epsg(32760)));
    /// assert_eq!(Crs::from_wkt("   "), None);
    /// ```
    #[must_use]
    pub fn from_wkt(wkt: &str) -> Option<Self> {
        let wkt = wkt.trim();
        if wkt.is_empty() {
            return None;
        }

        // The outermost AUTHORITY clause closes the WKT, so the last match wins.
        if let Some(code) = AUTHORITY
            .captures_iter(wkt)
            .last()
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u16>().ok())
        {
            return Some(Self::Epsg(code));
        }

        let Some(caps) = ROOT_NAME.captures(wkt) else {
            return Some(Self::Unrecognized(wkt.to_string()));
        };
        let name = caps.get(2).map_or("", |m| m.as_str());
        let projected = caps.get(1).is_some_and(|m| m.as_str() == "PROJCS");

        Some(match esri_name_to_epsg(name, projected) {
            Some(code) => Self::Epsg(code),
            None => Self::Unrecognized(name.to_string()),
        })
    }

    /// Reads and resolves a `.prj` file.
    ///
    /// A missing file is not an error: it yields `Ok(None)`, the same as a
    /// dataset that declares no CRS at all.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be read.
    pub fn from_prj_file(path: &Path) -> std::io::Result<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Self::from_wkt(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn esri_name_to_epsg(name: &str, projected: bool) -> Option<u16> {
    if !projected {
        return match name {
            "GCS_WGS_1984" | "WGS 84" | "WGS84" => Some(4326),
            "GCS_WGS_1972" | "WGS 72" => Some(4322),
            "GCS_Fiji_1986" | "Fiji 1986" => Some(4720),
            "GCS_Fiji_1956" | "Fiji 1956" => Some(4721),
            "GCS_RGNC_1991-93" | "RGNC91-93" => Some(4749),
            "GCS_RGPF" | "RGPF" => Some(4687),
            "GCS_PNG94" | "PNG94" => Some(5546),
            _ => None,
        };
    }

    if let Some(caps) = UTM.captures(name) {
        let zone: u16 = caps.get(2)?.as_str().parse().ok()?;
        if !(1..=60).contains(&zone) {
            return None;
        }
        let north = caps.get(3)?.as_str().eq_ignore_ascii_case("N");
        return utm_code(caps.get(1)?.as_str(), zone, north);
    }

    if let Some(caps) = PNGMG94.captures(name) {
        return match caps.get(1)?.as_str() {
            "54" => Some(5550),
            "55" => Some(5551),
            "56" => Some(5552),
            _ => None,
        };
    }

    match name {
        "Fiji_1986_Fiji_Map_Grid" | "Fiji 1986 / Fiji Map Grid" => Some(3460),
        "RGNC_1991-93_Lambert_New_Caledonia" | "RGNC91-93 / Lambert New Caledonia" => Some(3163),
        "WGS_1984_World_Mercator" | "WGS 84 / World Mercator" => Some(3395),
        "WGS_1984_Web_Mercator_Auxiliary_Sphere" | "WGS 84 / Pseudo-Mercator" => Some(3857),
        _ => None,
    }
}

/// EPSG code of a UTM zone on one of the datums used around the Pacific.
///
/// RGPF and Fiji 1956 only define the southern zones covering their territory.
fn utm_code(datum: &str, zone: u16, north: bool) -> Option<u16> {
    let datum = datum.to_ascii_uppercase();
    if datum.starts_with("RGPF") {
        return (!north && (5..=7).contains(&zone)).then_some(3291 + zone);
    }
    if datum.starts_with("FIJI") {
        return match (zone, north) {
            (60, false) => Some(3141),
            (1, false) => Some(3142),
            _ => None,
        };
    }
    if datum.ends_with("72") {
        return Some(if north { 32200 } else { 32300 } + zone);
    }
    Some(if north { 32600 } else { 32700 } + zone)
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epsg(code) => write!(f, "EPSG:{code}"),
            Self::Unrecognized(name) => write!(f, "unrecognized ({name})"),
        }
    }
}

impl FromStr for Crs {
    type Err = std::num::ParseIntError;

    /// Parses `EPSG:<code>` (case-insensitive prefix) or a bare code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let code = s
            .get(..5)
            .filter(|prefix| prefix.eq_ignore_ascii_case("EPSG:"))
            .map_or(s, |_| &s[5..]);
        code.trim().parse().map(Self::Epsg)
    }
}
