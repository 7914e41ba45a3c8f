// src/version.rs

//! Schema version values
//!
//! A schema version is a non-negative decimal number parsed from the
//! textual form used in directory names (`0.01`, `1`, `2.10`). Ordering is
//! numeric, so `0.02 > 0.01` and `0.00 == 0`. The original text is kept
//! and used for display and bookkeeping inserts; only comparison works on
//! the parsed value. Version zero is the sentinel for "schema absent".

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A parsed schema version.
///
/// Equality and ordering are numeric: `Version::parse("0.10")` equals
/// `Version::parse("0.1")`. `Display` and [`Version::as_str`] give back the
/// text the version was parsed from.
#[derive(Debug, Clone)]
pub struct Version {
    text: String,
    int_part: u64,
    // Fraction digits with trailing zeros trimmed, so "0.10" and "0.1"
    // carry the same key.
    frac: String,
}

impl Version {
    /// The sentinel version meaning "schema absent".
    pub fn zero() -> Self {
        Version {
            text: "0".to_string(),
            int_part: 0,
            frac: String::new(),
        }
    }

    /// Parse a version from its canonical decimal text form.
    ///
    /// Accepts `<digits>` or `<digits>.<digits>`; anything else is
    /// [`Error::BadVersionSyntax`].
    pub fn parse(text: &str) -> Result<Self> {
        let bad = || Error::BadVersionSyntax(text.to_string());

        let (int_str, frac_str) = match text.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (text, None),
        };

        if int_str.is_empty() || !int_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        if let Some(f) = frac_str {
            if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) {
                return Err(bad());
            }
        }

        let int_part = int_str.parse::<u64>().map_err(|_| bad())?;
        let frac = frac_str
            .unwrap_or("")
            .trim_end_matches('0')
            .to_string();

        Ok(Version {
            text: text.to_string(),
            int_part,
            frac,
        })
    }

    /// True for the "schema absent" sentinel (any spelling of zero).
    pub fn is_zero(&self) -> bool {
        self.int_part == 0 && self.frac.is_empty()
    }

    /// The textual form this version was parsed from.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.int_part
            .cmp(&other.int_part)
            .then_with(|| cmp_fractions(&self.frac, &other.frac))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Must agree with Eq: hash the normalized numeric key, not the text.
        self.int_part.hash(state);
        self.frac.hash(state);
    }
}

impl serde::Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

/// Compare fraction digit strings, padding the shorter with zeros.
fn cmp_fractions(a: &str, b: &str) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let da = a.as_bytes().get(i).copied().unwrap_or(b'0');
        let db = b.as_bytes().get(i).copied().unwrap_or(b'0');
        match da.cmp(&db) {
            Ordering::Equal => continue,
            unequal => return unequal,
        }
    }
    Ordering::Equal
}
