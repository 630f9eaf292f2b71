// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Sample identity
//!
//! A tumour/normal pairing is the join key for every stream in the graph.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::errors::GplError;

/// Maximum length of a sample name
const MAX_NAME_LEN: usize = 128;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9A-Za-z][\w-]*$").expect("static regex is valid"))
}

/// Identity of one analysis unit (a tumour/normal pair)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleIdentity {
    tumour_name: String,
    normal_name: String,
}

impl SampleIdentity {
    /// Create an identity, validating both sample names
    pub fn new(tumour_name: impl Into<String>, normal_name: impl Into<String>) -> Result<Self, GplError> {
        let tumour_name = tumour_name.into();
        let normal_name = normal_name.into();

        for name in [&tumour_name, &normal_name] {
            validate_name(name)?;
        }

        if tumour_name == normal_name {
            return Err(GplError::InvalidSample {
                sample: tumour_name,
                reason: "tumour and normal names must differ".into(),
            });
        }

        Ok(Self {
            tumour_name,
            normal_name,
        })
    }

    /// Tumour sample name, as it appears in VCF headers
    pub fn tumour_name(&self) -> &str {
        &self.tumour_name
    }

    /// Normal sample name, as it appears in VCF headers
    pub fn normal_name(&self) -> &str {
        &self.normal_name
    }

    /// Directory name under which all of this identity's artifacts live
    pub fn namespace(&self) -> String {
        format!("{}__{}", self.tumour_name, self.normal_name)
    }
}

impl fmt::Display for SampleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}__{}", self.tumour_name, self.normal_name)
    }
}

fn validate_name(name: &str) -> Result<(), GplError> {
    if name.len() > MAX_NAME_LEN {
        return Err(GplError::InvalidSample {
            sample: name.to_string(),
            reason: format!(
                "name is {} characters long but must be no longer than {}",
                name.len(),
                MAX_NAME_LEN
            ),
        });
    }

    if !name_pattern().is_match(name) {
        return Err(GplError::InvalidSample {
            sample: name.to_string(),
            reason: "name contains characters outside [A-Za-z0-9_-]".into(),
        });
    }

    // The double underscore separates tumour and normal in the namespace
    if name.contains("__") {
        return Err(GplError::InvalidSample {
            sample: name.to_string(),
            reason: "name must not contain '__'".into(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identity() {
        let identity = SampleIdentity::new("SBJ00001_PRJ001_L01", "SBJ00001_PRJ002_L01").unwrap();
        assert_eq!(identity.tumour_name(), "SBJ00001_PRJ001_L01");
        assert_eq!(identity.to_string(), "SBJ00001_PRJ001_L01__SBJ00001_PRJ002_L01");
        assert_eq!(identity.namespace(), identity.to_string());
    }

    #[test]
    fn test_rejects_bad_names() {
        assert!(SampleIdentity::new("-tumour", "normal").is_err());
        assert!(SampleIdentity::new("tumour/1", "normal").is_err());
        assert!(SampleIdentity::new("same", "same").is_err());
        assert!(SampleIdentity::new("t".repeat(129), "normal").is_err());
        assert!(SampleIdentity::new("A__B", "C").is_err());
        assert!(SampleIdentity::new("A", "B__C").is_err());
    }

    #[test]
    fn test_distinct_identities_get_distinct_namespaces() {
        let pairs = [("A_", "B"), ("A", "B"), ("A", "B_"), ("A_", "B_"), ("A-", "B")];
        let mut namespaces: Vec<String> = pairs
            .iter()
            .map(|(t, n)| SampleIdentity::new(*t, *n).unwrap().namespace())
            .collect();
        namespaces.sort();
        namespaces.dedup();
        assert_eq!(namespaces.len(), pairs.len());
    }
}
