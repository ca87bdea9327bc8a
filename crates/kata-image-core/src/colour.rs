//! The three traffic-light verdicts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of running a kata's tests.
///
/// Red is the expected-failing baseline, amber a syntax/compile error,
/// green all tests passing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colour {
    Red,
    Amber,
    Green,
}

impl Colour {
    /// Every colour, in the order probes are run.
    pub const ALL: [Colour; 3] = [Colour::Red, Colour::Amber, Colour::Green];

    pub fn as_str(&self) -> &'static str {
        match self {
            Colour::Red => "red",
            Colour::Amber => "amber",
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
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "red" => Ok(Colour::Red),
            "amber" => Ok(Colour::Amber),
            "green" => Ok(Colour::Green),
            other => Err(format!("unknown colour '{other}' (expected red, amber or green)")),
        }
    }
}
