//! Resource limits written into the isolation document
//!
//! The runtime applies these with setrlimit inside the container before exec.
//! Only the address space limit is set by prograreno.

use prograreno_core::{ContainError, Result, util};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value the runtime interprets as "no limit" (`RLIM_INFINITY`)
pub const RLIM_INFINITY: u64 = u64::MAX;

/// One entry of `process.rlimits`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rlimit {
    #[serde(rename = "type")]
    pub kind: String,
    pub hard: u64,
    pub soft: u64,
}

impl Rlimit {
    /// RLIMIT_AS entry with identical hard and soft bounds
    pub fn address_space(limit: MemoryLimit) -> Self {
        let value = limit.as_rlimit_value();
        Self {
            kind: "RLIMIT_AS".to_string(),
            hard: value,
            soft: value,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.hard == RLIM_INFINITY && self.soft == RLIM_INFINITY
    }
}

/// Maximum memory (address space) of the contained program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryLimit {
    #[default]
    Unlimited,
    Bytes(u64),
}

impl MemoryLimit {
    /// Parse "unlimited" or a size such as "50M"
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("unlimited") {
            return Ok(MemoryLimit::Unlimited);
        }
        let limit = MemoryLimit::Bytes(util::parse_memory_size(trimmed)?);
        limit.validate()?;
        Ok(limit)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            MemoryLimit::Bytes(0) => Err(ContainError::InvalidConfig(
                "Memory limit must be positive".to_string(),
            )),
            MemoryLimit::Bytes(RLIM_INFINITY) => Err(ContainError::InvalidConfig(
                "Memory limit collides with the unlimited sentinel".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Value written to both the hard and the soft bound
    pub fn as_rlimit_value(&self) -> u64 {
        match self {
            MemoryLimit::Unlimited => RLIM_INFINITY,
            MemoryLimit::Bytes(bytes) => *bytes,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, MemoryLimit::Unlimited)
    }
}

impl fmt::Display for MemoryLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryLimit::Unlimited => write!(f, "unlimited"),
            MemoryLimit::Bytes(bytes) => write!(f, "{} bytes", bytes),
        }
    }
}
