//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to the ambient AWS credential chain if not set.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to the ambient AWS credential chain if not set.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key`). Required for MinIO.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/files"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            StorageConfig::Filesystem { .. } => Ok(()),
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database. `:memory:` opens a private in-memory database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/aquachain.db"),
        }
    }
}

/// Options applied when assembling genesis trees.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Base URL used to build the `/files/{hash}` download link.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Embed file content in the genesis revision.
    #[serde(default)]
    pub enable_content: bool,
    /// Hash the revision as a single scalar instead of per-field leaves.
    /// Always off for form genesis.
    #[serde(default = "default_enable_scalar")]
    pub enable_scalar: bool,
    /// Sign new genesis revisions with the server key when one is configured.
    #[serde(default = "default_auto_sign")]
    pub auto_sign: bool,
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_enable_scalar() -> bool {
    true
}

fn default_auto_sign() -> bool {
    true
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            public_base_url: default_public_base_url(),
            enable_content: false,
            enable_scalar: default_enable_scalar(),
            auto_sign: default_auto_sign(),
        }
    }
}

impl GenesisConfig {
    /// Download URL for a stored file.
    pub fn file_url(&self, file_hash: &str) -> String {
        format!(
            "{}/files/{}",
            self.public_base_url.trim_end_matches('/'),
            file_hash
        )
    }
}

/// Signing configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Key name (e.g., "aquachain-server-1").
    pub key_name: String,
    /// Private key source.
    pub private_key: PrivateKeyConfig,
}

/// Private key source configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PrivateKeyConfig {
    /// Key stored in a file.
    File {
        /// Path to the private key file.
        path: PathBuf,
    },
    /// Key stored in environment variable.
    Env {
        /// Environment variable name.
        var: String,
    },
    /// Key provided directly as a value (NOT recommended for production).
    Value {
        /// The signing key as `name:base64`.
        key: String,
    },
    /// Generate a new key (for development only).
    Generate,
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Primary blob storage for file content.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Filesystem root for blobs recorded as local when the primary store is S3.
    #[serde(default)]
    pub local_storage: Option<PathBuf>,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Genesis assembly options.
    #[serde(default)]
    pub genesis: GenesisConfig,
    /// Server signing key (optional).
    #[serde(default)]
    pub signing: Option<SigningConfig>,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses filesystem storage and SQLite metadata.
    pub fn for_testing() -> Self {
        Self {
            storage: StorageConfig::default(),
            local_storage: None,
            metadata: MetadataConfig::default(),
            genesis: GenesisConfig::default(),
            signing: None,
        }
    }

    /// Validate all sections.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        if self.genesis.public_base_url.trim().is_empty() {
            return Err("genesis.public_base_url cannot be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_config_defaults() {
        let config = GenesisConfig::default();
        assert!(config.enable_scalar);
        assert!(config.auto_sign);
        assert!(!config.enable_content);
    }

    #[test]
    fn test_genesis_config_deserialize_partial() {
        let json = r#"{"public_base_url": "https://aqua.example.com/"}"#;
        let config: GenesisConfig = serde_json::from_str(json).unwrap();
        assert!(config.enable_scalar);
        assert_eq!(
            config.file_url("abc"),
            "https://aqua.example.com/files/abc"
        );
    }

    #[test]
    fn test_storage_config_s3_validate_partial_credentials() {
        let invalid = StorageConfig::S3 {
            bucket: "bucket".to_string(),
            endpoint: None,
            region: None,
            prefix: None,
            access_key_id: Some("access-key".to_string()),
            secret_access_key: None,
            force_path_style: false,
        };
        assert!(invalid.validate().is_err());

        let valid = StorageConfig::S3 {
            bucket: "bucket".to_string(),
            endpoint: None,
            region: None,
            prefix: None,
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
        };
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn test_storage_config_s3_force_path_style_defaults_to_false() {
        let json = r#"{"type":"s3","bucket":"test","endpoint":"https://s3.amazonaws.com"}"#;
        let config: StorageConfig = serde_json::from_str(json).unwrap();
        match config {
            StorageConfig::S3 {
                force_path_style, ..
            } => assert!(!force_path_style),
            _ => panic!("expected S3 config"),
        }
    }

    #[test]
    fn test_app_config_validate_rejects_empty_base_url() {
        let mut config = AppConfig::for_testing();
        config.genesis.public_base_url = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
