//! Genesis/Tree Assembly.
//!
//! Turns raw content into a one-revision AquaTree through the verifier, stores
//! the blob once per content hash and persists the genesis revision under its
//! owner.

use crate::error::{ChainError, ChainResult};
use crate::persist::{SaveOptions, save_tree};
use crate::verifier::{GenesisOptions, TreeVerifier};
use aqua_core::config::GenesisConfig;
use aqua_core::{AquaTree, FileObject, GenesisContent, PubkeyHash};
use aqua_metadata::MetadataStore;
use aqua_metadata::models::FileRow;
use aqua_signer::RevisionSigner;
use aqua_storage::BlobStore;
use bytes::Bytes;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Blob key for a newly stored file.
fn blob_key(file_name: &str) -> String {
    let sanitized: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}-{}", Uuid::new_v4(), sanitized)
}

/// Envelope for content that has not been stored yet.
fn pending_file_object(file_name: &str, bytes: &[u8]) -> FileObject {
    FileObject {
        file_name: file_name.to_string(),
        file_content: String::from_utf8_lossy(bytes).into_owned(),
        path: format!("./{file_name}"),
        file_size: Some(bytes.len() as u64),
    }
}

#[derive(Clone)]
pub struct GenesisAssembler {
    store: Arc<dyn MetadataStore>,
    blobs: BlobStore,
    verifier: Arc<dyn TreeVerifier>,
    signer: Option<Arc<RevisionSigner>>,
    config: GenesisConfig,
}

impl GenesisAssembler {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        blobs: BlobStore,
        verifier: Arc<dyn TreeVerifier>,
        signer: Option<Arc<RevisionSigner>>,
        config: GenesisConfig,
    ) -> Self {
        Self {
            store,
            blobs,
            verifier,
            signer,
            config,
        }
    }

    /// Build and persist a genesis tree for `owner`.
    ///
    /// Returns the tree and a FileObject whose content is the download URL.
    pub async fn create_genesis_tree(
        &self,
        owner: &str,
        content: GenesisContent,
        file_name: &str,
    ) -> ChainResult<(AquaTree, FileObject)> {
        let bytes = content.to_bytes()?;
        let mut file_object = pending_file_object(file_name, &bytes);

        let options = GenesisOptions {
            enable_content: self.config.enable_content,
            enable_scalar: self.config.enable_scalar && !content.is_form(),
        };
        let mut tree = self
            .verifier
            .create_genesis_revision(&file_object, &content, &options)
            .await
            .map_err(|logs| ChainError::from_logs(&logs))?;

        if self.config.auto_sign
            && let Some(signer) = &self.signer
        {
            tree = self
                .verifier
                .sign_aqua_tree(&tree, signer)
                .await
                .map_err(|logs| {
                    let err = ChainError::from_logs(&logs);
                    warn!(owner, error = %err, "auto-sign failed");
                    err
                })?;
        }

        let genesis_hash = tree
            .genesis_hash()
            .ok_or(ChainError::GenesisNotFound)?
            .to_string();
        let file_hash = tree
            .genesis_file_hash()
            .ok_or_else(|| ChainError::MissingFileHash(genesis_hash.clone()))?
            .to_string();
        let pubkey_hash = PubkeyHash::new(owner, &genesis_hash).to_string();

        let known = self.store.get_file_index(&file_hash).await?.is_some()
            && self.store.get_file(&file_hash).await?.is_some();
        if known {
            debug!(file_hash, pubkey_hash, "file content already stored, adding reference");
            self.store
                .add_file_reference(&file_hash, &pubkey_hash)
                .await?;
        } else {
            let location = self
                .blobs
                .put(&blob_key(file_name), Bytes::from(bytes.clone()))
                .await?;
            self.store
                .register_file(
                    &FileRow {
                        file_hash: file_hash.clone(),
                        file_location: location.to_string(),
                        file_size: Some(bytes.len() as i64),
                        created_at: OffsetDateTime::now_utc(),
                    },
                    &pubkey_hash,
                )
                .await?;
        }

        save_tree(self.store.as_ref(), &tree, owner, &SaveOptions::default()).await?;
        self.store
            .upsert_file_name(&pubkey_hash, file_name)
            .await?;

        file_object.file_content = self.config.file_url(&file_hash);
        info!(owner, pubkey_hash, file_hash, deduplicated = known, "created genesis tree");
        Ok((tree, file_object))
    }
}
