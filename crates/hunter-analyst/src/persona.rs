//! Investor personas

use crate::error::{AnalystError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A famous investor whose style the model role-plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// Value investing: moats, cash flow, margin of safety
    Warren,
    /// Disruptive growth: innovation, total addressable market
    Cathie,
    /// Momentum and market sentiment
    Jim,
}

impl Persona {
    /// Every persona, in display order
    pub fn all() -> Vec<Persona> {
        vec![Persona::Warren, Persona::Cathie, Persona::Jim]
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Persona::Warren => "Warren",
            Persona::Cathie => "Cathie",
            Persona::Jim => "Jim",
        }
    }

    pub fn full_name(self) -> &'static str {
        match self {
            Persona::Warren => "Warren Buffett",
            Persona::Cathie => "Cathie Wood",
            Persona::Jim => "Jim Cramer",
        }
    }

    /// One-line description of the investing style, used in the system prompt
    pub fn style(self) -> &'static str {
        match self {
            Persona::Warren => {
                "the value investor: durable competitive moats, consistent free cash flow, \
                 low debt and a margin of safety on price"
            }
            Persona::Cathie => {
                "the disruptive-innovation investor: exponential growth, huge addressable \
                 markets and five-year horizons, tolerant of volatility and thin profits"
            }
            Persona::Jim => {
                "the TV market pundit: price momentum, sentiment and catalysts, \
                 quick to call a top or a bottom"
            }
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for Persona {
    type Err = AnalystError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "warren" | "buffett" | "warren buffett" | "value" => Ok(Persona::Warren),
            "cathie" | "wood" | "cathie wood" | "growth" => Ok(Persona::Cathie),
            "jim" | "cramer" | "jim cramer" | "momentum" => Ok(Persona::Jim),
            _ => Err(AnalystError::UnknownPersona(s.to_string())),
        }
    }
}
