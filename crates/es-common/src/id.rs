//! Identity types for care sites, visits, and pipeline runs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Care site identifier as found in the reference table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct CareSiteId(pub i64);

impl fmt::Display for CareSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CareSiteId {
    fn from(id: i64) -> Self {
        CareSiteId(id)
    }
}

/// Visit identifier, the key linking secondary events to their visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitId(pub i64);

impl fmt::Display for VisitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for VisitId {
    fn from(id: i64) -> Self {
        VisitId(id)
    }
}

/// Run ID correlating the log lines and output envelope of one invocation.
///
/// Format: `es-YYYYMMDD-HHMMSS-XXXX`
/// Example: `es-20260115-143022-a7xq`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new run ID.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        RunId(format!(
            "es-{}-{}-{}",
            now.format("%Y%m%d"),
            now.format("%H%M%S"),
            generate_base32_suffix()
        ))
    }

    /// Parse an existing run ID string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 23 || !s.starts_with("es-") {
            return None;
        }
        let bytes = s.as_bytes();
        if bytes.get(11) != Some(&b'-') || bytes.get(18) != Some(&b'-') {
            return None;
        }
        if !s[3..11].chars().all(|c| c.is_ascii_digit())
            || !s[12..18].chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        if !s[19..23].chars().all(|c| matches!(c, 'a'..='z' | '2'..='7')) {
            return None;
        }
        Some(RunId(s.to_string()))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn generate_base32_suffix() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    let value = (((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | (bytes[2] as u32))
        & 0x000F_FFFF;
    let alphabet = b"abcdefghijklmnopqrstuvwxyz234567";
    [15_u32, 10, 5, 0]
        .iter()
        .map(|shift| alphabet[((value >> shift) & 0x1F) as usize] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_format() {
        let id = RunId::new();
        assert_eq!(id.0.len(), 23);
        assert!(RunId::parse(&id.0).is_some(), "{} should parse", id);
    }

    #[test]
    fn test_run_id_parse_rejects_garbage() {
        assert!(RunId::parse("pt-20260115-143022-a7xq").is_none());
        assert!(RunId::parse("es-2026011-1143022-a7xq").is_none());
        assert!(RunId::parse("es-20260115-143022-A7XQ").is_none());
        assert!(RunId::parse("").is_none());
    }

    #[test]
    fn test_care_site_id_is_transparent() {
        let id = CareSiteId(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let back: CareSiteId = serde_json::from_str("42").unwrap();
        assert_eq!(back, id);
        assert_eq!(id.to_string(), "42");
    }
}
