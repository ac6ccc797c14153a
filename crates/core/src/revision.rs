//! Revision types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of a revision node in a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionType {
    File,
    Witness,
    Signature,
    Form,
    Link,
}

impl RevisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Witness => "witness",
            Self::Signature => "signature",
            Self::Form => "form",
            Self::Link => "link",
        }
    }

    /// Whether revisions of this type must carry a `file_hash` and a FileIndex reference.
    pub fn carries_file(&self) -> bool {
        matches!(self, Self::File | Self::Form)
    }
}

impl fmt::Display for RevisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RevisionType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "file" => Ok(Self::File),
            "witness" => Ok(Self::Witness),
            "signature" => Ok(Self::Signature),
            "form" => Ok(Self::Form),
            "link" => Ok(Self::Link),
            other => Err(crate::Error::InvalidRevisionType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_type_str_roundtrip() {
        for ty in [
            RevisionType::File,
            RevisionType::Witness,
            RevisionType::Signature,
            RevisionType::Form,
            RevisionType::Link,
        ] {
            assert_eq!(ty.as_str().parse::<RevisionType>().unwrap(), ty);
        }
        assert!("anchor".parse::<RevisionType>().is_err());
    }

    #[test]
    fn test_carries_file() {
        assert!(RevisionType::File.carries_file());
        assert!(RevisionType::Form.carries_file());
        assert!(!RevisionType::Link.carries_file());
    }
}
