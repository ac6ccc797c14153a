//! Storage-location strings recorded in `files.file_location`.
//!
//! A location names the backend that holds the blob: `s3://{key}` for object
//! storage, anything else is a key (or legacy path) under the local root.

use std::fmt;
use std::str::FromStr;

use crate::error::StorageError;

const OBJECT_SCHEME: &str = "s3://";

/// Where a blob lives.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlobLocation {
    /// Key relative to the local filesystem root.
    Local(String),
    /// Key inside the object-storage bucket.
    Object(String),
}

impl BlobLocation {
    /// Parse a stored location string.
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        let s = s.trim();
        if let Some(key) = s.strip_prefix(OBJECT_SCHEME) {
            if key.is_empty() {
                return Err(StorageError::InvalidLocation(s.to_string()));
            }
            return Ok(Self::Object(key.to_string()));
        }
        if s.is_empty() {
            return Err(StorageError::InvalidLocation(s.to_string()));
        }
        Ok(Self::Local(s.to_string()))
    }

    /// Backend-relative key.
    pub fn key(&self) -> &str {
        match self {
            Self::Local(key) | Self::Object(key) => key,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }
}

impl fmt::Display for BlobLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(key) => f.write_str(key),
            Self::Object(key) => write!(f, "{OBJECT_SCHEME}{key}"),
        }
    }
}

impl FromStr for BlobLocation {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_location() {
        let loc = BlobLocation::parse("s3://abc-report.pdf").unwrap();
        assert_eq!(loc, BlobLocation::Object("abc-report.pdf".to_string()));
        assert_eq!(loc.key(), "abc-report.pdf");
        assert!(loc.is_object());
        assert_eq!(loc.to_string(), "s3://abc-report.pdf");
    }

    #[test]
    fn test_parse_local_location() {
        let loc: BlobLocation = "abc-report.pdf".parse().unwrap();
        assert_eq!(loc, BlobLocation::Local("abc-report.pdf".to_string()));
        assert!(!loc.is_object());
        assert_eq!(loc.to_string(), "abc-report.pdf");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(BlobLocation::parse("").is_err());
        assert!(BlobLocation::parse("s3://").is_err());
    }
}
