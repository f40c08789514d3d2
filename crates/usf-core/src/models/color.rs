//! RGB chat colors and their `"r,g,b"` text form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A chat color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse the `"r,g,b"` text form.
    ///
    /// Exactly three comma-separated decimal channels are accepted, each
    /// may carry surrounding whitespace and must fit in `0..=255`.
    pub fn parse(input: &str) -> Result<Self, ColorParseError> {
        let mut channels = [0u8; 3];
        let mut parts = input.split(',');
        for (position, slot) in channels.iter_mut().enumerate() {
            let part = parts
                .next()
                .ok_or(ColorParseError::ChannelCount { found: position })?;
            *slot = parse_channel(part.trim())?;
        }
        let extra = parts.count();
        if extra > 0 {
            return Err(ColorParseError::ChannelCount { found: 3 + extra });
        }
        let [r, g, b] = channels;
        Ok(Self { r, g, b })
    }
}

fn parse_channel(part: &str) -> Result<u8, ColorParseError> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ColorParseError::NotANumber(part.to_string()));
    }
    // Digits only, so the only failure left is overflow.
    let value: u32 = part
        .parse()
        .map_err(|_| ColorParseError::OutOfRange(part.to_string()))?;
    u8::try_from(value).map_err(|_| ColorParseError::OutOfRange(part.to_string()))
}

impl FromStr for Rgb {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rgb::parse(s)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorParseError {
    #[error("expected 3 color channels, found {found}")]
    ChannelCount { found: usize },

    #[error("color channel is not a number: {0:?}")]
    NotANumber(String),

    #[error("color channel out of range 0-255: {0}")]
    OutOfRange(String),
}
