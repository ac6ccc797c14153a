//! Reference-counted shared entities.
//!
//! Signatures, witnesses, links and file contents may be referenced by many
//! revisions across owners. Every change to a reference count goes through
//! [`attach`], [`detach`], [`attach_file_reference`] or
//! [`detach_file_reference`]. They run on a caller-supplied connection so
//! they compose into larger transactions.
//!
//! `entity_references` holds one row per (entity, referencing revision).
//! Attaching the same revision twice is a no-op, so retried writes never
//! inflate a count.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{FileIndexRow, LinkRow, SignatureRow, WitnessRow};
use aqua_core::RevisionType;
use sqlx::SqliteConnection;
use sqlx::types::Json;
use tracing::{debug, warn};

/// Kind of shared entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Signature,
    Witness,
    Link,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signature => "signature",
            Self::Witness => "witness",
            Self::Link => "link",
        }
    }

    fn table(&self) -> &'static str {
        match self {
            Self::Signature => "signatures",
            Self::Witness => "witnesses",
            Self::Link => "links",
        }
    }

    /// The entity kind a revision type references, if any.
    pub fn for_revision_type(revision_type: RevisionType) -> Option<Self> {
        match revision_type {
            RevisionType::Signature => Some(Self::Signature),
            RevisionType::Witness => Some(Self::Witness),
            RevisionType::Link => Some(Self::Link),
            RevisionType::File | RevisionType::Form => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity payload used when the first reference creates the row.
#[derive(Clone, Debug)]
pub enum EntityRecord {
    Signature(SignatureRow),
    Witness(WitnessRow),
    Link(LinkRow),
}

impl EntityRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Signature(_) => EntityKind::Signature,
            Self::Witness(_) => EntityKind::Witness,
            Self::Link(_) => EntityKind::Link,
        }
    }

    pub fn content_key(&self) -> &str {
        match self {
            Self::Signature(row) => &row.content_key,
            Self::Witness(row) => &row.content_key,
            Self::Link(row) => &row.content_key,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachOutcome {
    /// First reference: the entity row was created with a count of one.
    Created,
    /// The count of an existing entity was incremented.
    Attached,
    /// This revision already referenced the entity.
    AlreadyAttached,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetachOutcome {
    /// The entity held at most one reference and was removed.
    Deleted,
    /// The count was decremented and the entity kept.
    Decremented { remaining: i64 },
    /// No such reference existed.
    Missing,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileDetachOutcome {
    /// The revision was removed from the reference list. Others remain.
    Removed { file_hash: String, remaining: usize },
    /// The last reference went away. The index row and file record were
    /// deleted. `file_location` names the blob to remove, if a file record existed.
    LastReference {
        file_hash: String,
        file_location: Option<String>,
    },
}

/// Reference `record` from `pubkey_hash`, creating the entity on first use.
pub async fn attach(
    conn: &mut SqliteConnection,
    record: &EntityRecord,
    pubkey_hash: &str,
) -> MetadataResult<AttachOutcome> {
    let kind = record.kind();
    let content_key = record.content_key();

    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO entity_references (kind, content_key, pubkey_hash) VALUES (?, ?, ?)",
    )
    .bind(kind.as_str())
    .bind(content_key)
    .bind(pubkey_hash)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if inserted == 0 {
        debug!(%kind, content_key, pubkey_hash, "reference already present");
        return Ok(AttachOutcome::AlreadyAttached);
    }

    let sql = format!(
        "UPDATE {} SET reference_count = reference_count + 1 WHERE content_key = ?",
        kind.table()
    );
    let updated = sqlx::query(&sql)
        .bind(content_key)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if updated > 0 {
        return Ok(AttachOutcome::Attached);
    }

    insert_entity(conn, record).await?;
    Ok(AttachOutcome::Created)
}

async fn insert_entity(conn: &mut SqliteConnection, record: &EntityRecord) -> MetadataResult<()> {
    match record {
        EntityRecord::Signature(row) => {
            sqlx::query(
                r#"
                INSERT INTO signatures (
                    content_key, signature_digest, signature_wallet_address,
                    signature_public_key, signature_type, reference_count
                ) VALUES (?, ?, ?, ?, ?, 1)
                "#,
            )
            .bind(&row.content_key)
            .bind(&row.signature_digest)
            .bind(&row.signature_wallet_address)
            .bind(&row.signature_public_key)
            .bind(&row.signature_type)
            .execute(&mut *conn)
            .await?;
        }
        EntityRecord::Witness(row) => {
            sqlx::query(
                "INSERT INTO witnesses (content_key, merkle_root, reference_count) VALUES (?, ?, 1)",
            )
            .bind(&row.content_key)
            .bind(&row.merkle_root)
            .execute(&mut *conn)
            .await?;
        }
        EntityRecord::Link(row) => {
            sqlx::query(
                r#"
                INSERT INTO links (
                    content_key, link_type, link_require_indepth_verification,
                    link_verification_hashes, link_file_hashes, reference_count
                ) VALUES (?, ?, ?, ?, ?, 1)
                "#,
            )
            .bind(&row.content_key)
            .bind(&row.link_type)
            .bind(row.link_require_indepth_verification)
            .bind(&row.link_verification_hashes)
            .bind(&row.link_file_hashes)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

/// Drop the reference from `pubkey_hash`.
///
/// The count read before removal decides the outcome: at most one deletes
/// the entity, anything higher is decremented.
pub async fn detach(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    content_key: &str,
    pubkey_hash: &str,
) -> MetadataResult<DetachOutcome> {
    let removed = sqlx::query(
        "DELETE FROM entity_references WHERE kind = ? AND content_key = ? AND pubkey_hash = ?",
    )
    .bind(kind.as_str())
    .bind(content_key)
    .bind(pubkey_hash)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if removed == 0 {
        warn!(%kind, content_key, pubkey_hash, "detach found no reference");
        return Ok(DetachOutcome::Missing);
    }

    let sql = format!(
        "SELECT reference_count FROM {} WHERE content_key = ?",
        kind.table()
    );
    let count: Option<i64> = sqlx::query_scalar(&sql)
        .bind(content_key)
        .fetch_optional(&mut *conn)
        .await?;

    match count {
        None => {
            warn!(%kind, content_key, pubkey_hash, "reference pointed at a missing entity");
            Ok(DetachOutcome::Missing)
        }
        Some(count) if count <= 1 => {
            let sql = format!("DELETE FROM {} WHERE content_key = ?", kind.table());
            sqlx::query(&sql)
                .bind(content_key)
                .execute(&mut *conn)
                .await?;
            let stale = sqlx::query("DELETE FROM entity_references WHERE kind = ? AND content_key = ?")
                .bind(kind.as_str())
                .bind(content_key)
                .execute(&mut *conn)
                .await?
                .rows_affected();
            if stale > 0 {
                warn!(%kind, content_key, stale, "dropped references beyond the recorded count");
            }
            Ok(DetachOutcome::Deleted)
        }
        Some(count) => {
            let sql = format!(
                "UPDATE {} SET reference_count = reference_count - 1 WHERE content_key = ?",
                kind.table()
            );
            sqlx::query(&sql)
                .bind(content_key)
                .execute(&mut *conn)
                .await?;
            Ok(DetachOutcome::Decremented {
                remaining: count - 1,
            })
        }
    }
}

/// Delete the witness event for `merkle_root` once no witness names it.
pub async fn release_witness_event(
    conn: &mut SqliteConnection,
    merkle_root: &str,
) -> MetadataResult<bool> {
    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM witnesses WHERE merkle_root = ?")
        .bind(merkle_root)
        .fetch_one(&mut *conn)
        .await?;
    if remaining > 0 {
        return Ok(false);
    }
    let deleted = sqlx::query("DELETE FROM witness_events WHERE merkle_root = ?")
        .bind(merkle_root)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}

/// Add `pubkey_hash` to the reference set of `file_hash`.
///
/// Returns false if it was already present.
pub async fn attach_file_reference(
    conn: &mut SqliteConnection,
    file_hash: &str,
    pubkey_hash: &str,
) -> MetadataResult<bool> {
    let existing = sqlx::query_as::<_, FileIndexRow>(
        "SELECT file_hash, pubkey_hashes FROM file_index WHERE file_hash = ?",
    )
    .bind(file_hash)
    .fetch_optional(&mut *conn)
    .await?;

    match existing {
        None => {
            sqlx::query("INSERT INTO file_index (file_hash, pubkey_hashes) VALUES (?, ?)")
                .bind(file_hash)
                .bind(Json(vec![pubkey_hash.to_string()]))
                .execute(&mut *conn)
                .await?;
            Ok(true)
        }
        Some(row) => {
            let mut hashes = row.pubkey_hashes.0;
            if hashes.iter().any(|h| h == pubkey_hash) {
                return Ok(false);
            }
            hashes.push(pubkey_hash.to_string());
            sqlx::query("UPDATE file_index SET pubkey_hashes = ? WHERE file_hash = ?")
                .bind(Json(hashes))
                .bind(file_hash)
                .execute(&mut *conn)
                .await?;
            Ok(true)
        }
    }
}

/// Remove `pubkey_hash` from every file reference set that contains it.
pub async fn detach_file_reference(
    conn: &mut SqliteConnection,
    pubkey_hash: &str,
) -> MetadataResult<Vec<FileDetachOutcome>> {
    let rows = sqlx::query_as::<_, FileIndexRow>(
        r#"
        SELECT file_hash, pubkey_hashes FROM file_index
        WHERE EXISTS (SELECT 1 FROM json_each(file_index.pubkey_hashes) WHERE json_each.value = ?)
        ORDER BY file_hash
        "#,
    )
    .bind(pubkey_hash)
    .fetch_all(&mut *conn)
    .await?;

    let mut outcomes = Vec::with_capacity(rows.len());
    for row in rows {
        let hashes = row.pubkey_hashes.0;
        if hashes.len() <= 1 {
            sqlx::query("DELETE FROM file_index WHERE file_hash = ?")
                .bind(&row.file_hash)
                .execute(&mut *conn)
                .await?;
            let file_location: Option<String> =
                sqlx::query_scalar("SELECT file_location FROM files WHERE file_hash = ?")
                    .bind(&row.file_hash)
                    .fetch_optional(&mut *conn)
                    .await?;
            if file_location.is_some() {
                sqlx::query("DELETE FROM files WHERE file_hash = ?")
                    .bind(&row.file_hash)
                    .execute(&mut *conn)
                    .await?;
            }
            outcomes.push(FileDetachOutcome::LastReference {
                file_hash: row.file_hash,
                file_location,
            });
        } else {
            let remaining: Vec<String> = hashes.into_iter().filter(|h| h != pubkey_hash).collect();
            sqlx::query("UPDATE file_index SET pubkey_hashes = ? WHERE file_hash = ?")
                .bind(Json(&remaining))
                .bind(&row.file_hash)
                .execute(&mut *conn)
                .await?;
            outcomes.push(FileDetachOutcome::Removed {
                file_hash: row.file_hash,
                remaining: remaining.len(),
            });
        }
    }
    Ok(outcomes)
}

pub(crate) fn parse_revision_type(pubkey_hash: &str, value: &str) -> MetadataResult<RevisionType> {
    value.parse().map_err(|_| {
        MetadataError::Constraint(format!(
            "revision {pubkey_hash} has unknown type '{value}'"
        ))
    })
}
