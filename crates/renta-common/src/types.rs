//! Core identifier types for RENTA

use std::fmt;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Property identifier as issued by the state store.
///
/// Opaque string key; the core never interprets its contents beyond
/// equality and use in artifact file names.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(String);

impl PropertyId {
    /// Create a new property id from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-name-safe form of the id, used in artifact paths
    pub fn slug(&self) -> String {
        slugify(&self.0)
    }
}

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyId(\"{}\")", self.0)
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PropertyId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Market key: a (country, city) pair.
///
/// Keys the city-level market-demand model used for cold-start properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CityKey {
    /// Country name as stored in `market_features`
    pub country: String,
    /// City name as stored in `market_features`
    pub city: String,
}

impl CityKey {
    /// Create a new market key
    pub fn new(country: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            city: city.into(),
        }
    }

    /// File-name-safe `country_city` form, used in artifact paths
    pub fn slug(&self) -> String {
        format!("{}_{}", slugify(&self.country), slugify(&self.city))
    }
}

impl fmt::Display for CityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.city, self.country)
    }
}

/// Normalize a name for use in a file path: lowercase, spaces and
/// separators collapsed to underscores.
fn slugify(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Currency Code (3 chars, ISO 4217)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct CurrencyCode([u8; 4]);

impl CurrencyCode {
    /// Creates a new currency code from a string.
    ///
    /// The code is automatically converted to uppercase.
    /// Only the first 3 characters are used.
    pub fn new(code: &str) -> Self {
        let mut bytes = [0u8; 4];
        let code_upper = code.to_uppercase();
        let code_bytes = code_upper.as_bytes();
        let len = code_bytes.len().min(3);
        bytes[..len].copy_from_slice(&code_bytes[..len]);
        Self(bytes)
    }

    /// Returns the currency code as a string slice.
    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(3);
        // Only uppercase ASCII is ever stored
        std::str::from_utf8(&self.0[..len]).unwrap_or("")
    }

    // Common currencies in RENTA markets
    /// Euro
    pub const EUR: Self = Self(*b"EUR\0");
    /// US Dollar
    pub const USD: Self = Self(*b"USD\0");
    /// British Pound
    pub const GBP: Self = Self(*b"GBP\0");
    /// Swiss Franc
    pub const CHF: Self = Self(*b"CHF\0");
    /// Australian Dollar
    pub const AUD: Self = Self(*b"AUD\0");
}

impl fmt::Debug for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CurrencyCode(\"{}\")", self.as_str())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for CurrencyCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() || s.len() > 3 {
            return Err(D::Error::custom(format!("invalid currency code: {:?}", s)));
        }
        Ok(CurrencyCode::new(&s))
    }
}
