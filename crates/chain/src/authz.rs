//! Deletion authorization.

use aqua_core::PubkeyHash;
use aqua_metadata::MetadataStore;
use tracing::warn;

/// Whether `requester` may delete `revision_hash`.
///
/// A hash naming another owner is rejected. A bare hash is looked up in the
/// requester's own namespace. The revision must exist. Store failures deny.
pub async fn can_delete(store: &dyn MetadataStore, revision_hash: &str, requester: &str) -> bool {
    let qualified = PubkeyHash::qualify(revision_hash, requester);
    if qualified.owner() != requester {
        warn!(
            hash = revision_hash,
            owner = qualified.owner(),
            requester,
            "requester does not own revision"
        );
        return false;
    }

    let pubkey_hash = qualified.to_string();
    match store.revision_exists(&pubkey_hash).await {
        Ok(true) => true,
        Ok(false) => {
            warn!(pubkey_hash, "revision not found");
            false
        }
        Err(err) => {
            warn!(pubkey_hash, error = %err, "failed to check revision");
            false
        }
    }
}
