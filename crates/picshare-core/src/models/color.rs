use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A color in canonical form: `#rrggbb`, lowercase.
///
/// Parsing accepts three- or six-digit hex with or without a leading `#`,
/// in any case, so values from every source compare equal once normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String, example = "#ff0000")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct HexColor(String);

impl HexColor {
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        HexColor(format!("#{:02x}{:02x}{:02x}", r, g, b))
    }

    pub fn rgb(&self) -> [u8; 3] {
        let hex = &self.0[1..];
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);
        [channel(0), channel(2), channel(4)]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid hex color: {0:?}")]
pub struct InvalidColor(String);

impl FromStr for HexColor {
    type Err = InvalidColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidColor(s.to_string()));
        }
        let digits = digits.to_ascii_lowercase();
        match digits.len() {
            6 => Ok(HexColor(format!("#{}", digits))),
            3 => {
                let expanded: String = digits.chars().flat_map(|c| [c, c]).collect();
                Ok(HexColor(format!("#{}", expanded)))
            }
            _ => Err(InvalidColor(s.to_string())),
        }
    }
}

impl TryFrom<String> for HexColor {
    type Error = InvalidColor;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.0
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
