//! Engine version parsing.
//!
//! Catalog items list the engine versions they support as loose text
//! (`"4.26,4.27,5.0"`, `"UE_5.1"`, `"5"`). These helpers turn that text into
//! comparable versions and decide whether an asset is obsolete.

use std::fmt;
use std::str::FromStr;

/// A `major.minor` engine version. Patch levels are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineVersion {
    pub major: u32,
    pub minor: u32,
}

impl EngineVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for EngineVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = strip_engine_prefix(trimmed);
        let mut parts = body.split('.');
        let major = parts
            .next()
            .filter(|p| !p.is_empty())
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(|| format!("not an engine version: {trimmed:?}"))?;
        let minor = match parts.next() {
            Some(p) => p
                .parse::<u32>()
                .map_err(|_| format!("not an engine version: {trimmed:?}"))?,
            None => 0,
        };
        Ok(Self { major, minor })
    }
}

fn strip_engine_prefix(s: &str) -> &str {
    for prefix in ["UE_", "ue_", "UE", "ue", "v", "V"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            return rest;
        }
    }
    s
}

/// Every version found in a separated list. Tokens that are not versions are skipped.
pub fn parse_versions(text: &str) -> Vec<EngineVersion> {
    text.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .filter_map(|t| t.parse().ok())
        .collect()
}

/// Highest version mentioned in the text.
pub fn highest_version(text: &str) -> Option<EngineVersion> {
    parse_versions(text).into_iter().max()
}

/// An asset is obsolete when the highest engine version it supports is older
/// than the reference version. Unknown support or no reference means not obsolete.
pub fn is_obsolete(supported_versions: &str, reference: Option<EngineVersion>) -> bool {
    match (highest_version(supported_versions), reference) {
        (Some(highest), Some(reference)) => highest < reference,
        _ => false,
    }
}
