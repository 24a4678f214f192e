//! KNX group addresses in 3-level notation.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A KNX group address (`main/middle/sub`).
///
/// - Main: 0-31 (5 bits)
/// - Middle: 0-7 (3 bits)
/// - Sub: 0-255 (8 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupAddress(u16);

impl GroupAddress {
    /// Build an address from its three levels.
    pub fn new(main: u8, middle: u8, sub: u8) -> Result<Self> {
        if main > 31 {
            return Err(Error::group_address(
                format!("{main}/{middle}/{sub}"),
                "main group must be 0-31",
            ));
        }
        if middle > 7 {
            return Err(Error::group_address(
                format!("{main}/{middle}/{sub}"),
                "middle group must be 0-7",
            ));
        }
        Ok(Self(
            (u16::from(main) << 11) | (u16::from(middle) << 8) | u16::from(sub),
        ))
    }

    /// Raw 16-bit encoding.
    pub fn raw(&self) -> u16 {
        self.0
    }

    pub fn main(&self) -> u8 {
        (self.0 >> 11) as u8
    }

    pub fn middle(&self) -> u8 {
        ((self.0 >> 8) & 0x07) as u8
    }

    pub fn sub(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}

impl From<u16> for GroupAddress {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl std::str::FromStr for GroupAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        if parts.len() != 3 {
            return Err(Error::group_address(s, "expected main/middle/sub"));
        }

        let level = |part: &str, name: &str| {
            part.parse::<u8>()
                .map_err(|_| Error::group_address(s, format!("invalid {name} group '{part}'")))
        };

        Self::new(
            level(parts[0], "main")?,
            level(parts[1], "middle")?,
            level(parts[2], "sub")?,
        )
    }
}

impl TryFrom<String> for GroupAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<GroupAddress> for String {
    fn from(value: GroupAddress) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for GroupAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.main(), self.middle(), self.sub())
    }
}
