// ABOUTME: Blue/green colour assigned to each incarnation of a deployment group.
// ABOUTME: Alternates on every rollout; parsed from and written to app labels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid deployment colour '{0}' (expected blue or green)")]
pub struct ParseColourError(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colour {
    #[default]
    Blue,
    Green,
}

impl Colour {
    /// The colour the next rollout of the same group receives.
    pub fn opposite(self) -> Self {
        match self {
            Colour::Blue => Colour::Green,
            Colour::Green => Colour::Blue,
        }
    }

    /// Read a colour label written by any tool. Only `blue` is blue; every
    /// other value counts as green so the next rollout goes back to blue.
    pub fn from_label(value: &str) -> Self {
        match value.trim() {
            "blue" => Colour::Blue,
            _ => Colour::Green,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Colour::Blue => "blue",
            Colour::Green => "green",
        }
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Colour {
    type Err = ParseColourError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blue" => Ok(Colour::Blue),
            "green" => Ok(Colour::Green),
            other => Err(ParseColourError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_alternates() {
        assert_eq!(Colour::Blue.opposite(), Colour::Green);
        assert_eq!(Colour::Green.opposite(), Colour::Blue);
    }

    #[test]
    fn parse_rejects_unknown_colour() {
        assert!("red".parse::<Colour>().is_err());
        assert_eq!("green".parse::<Colour>().unwrap(), Colour::Green);
    }

    #[test]
    fn label_reading_is_lenient() {
        assert_eq!(Colour::from_label("blue"), Colour::Blue);
        assert_eq!(Colour::from_label("Green"), Colour::Green);
        assert_eq!(Colour::from_label("BLUE").opposite(), Colour::Blue);
        assert_eq!(Colour::from_label("red").opposite(), Colour::Blue);
    }
}
