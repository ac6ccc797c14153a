//! Metadata store trait and implementations.

use crate::entity_store::{self, DetachOutcome, EntityKind, FileDetachOutcome};
use crate::error::{DeletionFailure, MetadataError, MetadataResult};
use crate::repos::{
    ChainRepo, DeletionSummary, EntityRepo, FileRepo, LatestRepo, NewRevision, PersistOutcome,
    RevisionRepo,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, SqliteConnection};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    RevisionRepo + LatestRepo + FileRepo + EntityRepo + ChainRepo + Send + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`. `:memory:` opens a private
    /// in-memory database.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // One connection serializes writers and keeps `:memory:` databases alive.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::entity_store::{AttachOutcome, EntityRecord, parse_revision_type};
    use crate::models::*;
    use aqua_core::RevisionType;
    use sqlx::types::Json;
    use time::OffsetDateTime;
    use tracing::{debug, warn};

    /// SQL expression for the bare hash of a qualified column.
    fn bare_hash_expr(col: &str) -> String {
        format!("substr({col}, instr({col}, '_') + 1)")
    }

    #[async_trait]
    impl RevisionRepo for SqliteStore {
        async fn get_revision(&self, pubkey_hash: &str) -> MetadataResult<Option<RevisionRow>> {
            let row = sqlx::query_as::<_, RevisionRow>(
                "SELECT * FROM revisions WHERE pubkey_hash = ?",
            )
            .bind(pubkey_hash)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn revision_exists(&self, pubkey_hash: &str) -> MetadataResult<bool> {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM revisions WHERE pubkey_hash = ?)",
            )
            .bind(pubkey_hash)
            .fetch_one(&self.pool)
            .await?;
            Ok(exists)
        }

        async fn get_children(&self, pubkey_hash: &str) -> MetadataResult<Vec<RevisionRow>> {
            let rows = sqlx::query_as::<_, RevisionRow>(
                "SELECT * FROM revisions WHERE previous = ? ORDER BY pubkey_hash",
            )
            .bind(pubkey_hash)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn list_revisions_by_owner(&self, owner: &str) -> MetadataResult<Vec<RevisionRow>> {
            let rows = sqlx::query_as::<_, RevisionRow>(
                "SELECT * FROM revisions WHERE owner = ? ORDER BY pubkey_hash",
            )
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn find_revisions_by_hash(&self, hash: &str) -> MetadataResult<Vec<RevisionRow>> {
            let sql = format!(
                "SELECT * FROM revisions WHERE {} = ? ORDER BY pubkey_hash",
                bare_hash_expr("pubkey_hash")
            );
            let rows = sqlx::query_as::<_, RevisionRow>(&sql)
                .bind(hash)
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl LatestRepo for SqliteStore {
        async fn upsert_latest(&self, latest: &LatestRow) -> MetadataResult<()> {
            insert_latest(&mut *self.pool.acquire().await?, latest, true).await?;
            Ok(())
        }

        async fn create_latest(&self, latest: &LatestRow) -> MetadataResult<bool> {
            insert_latest(&mut *self.pool.acquire().await?, latest, false).await
        }

        async fn get_latest(&self, hash: &str) -> MetadataResult<Option<LatestRow>> {
            let row = sqlx::query_as::<_, LatestRow>("SELECT * FROM latest WHERE hash = ?")
                .bind(hash)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn find_latest_by_hash(&self, hash: &str) -> MetadataResult<Option<LatestRow>> {
            let sql = format!(
                "SELECT * FROM latest WHERE {} = ? ORDER BY hash LIMIT 1",
                bare_hash_expr("hash")
            );
            let row = sqlx::query_as::<_, LatestRow>(&sql)
                .bind(hash)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_latest(&self, user: &str) -> MetadataResult<Vec<LatestRow>> {
            let rows =
                sqlx::query_as::<_, LatestRow>("SELECT * FROM latest WHERE user = ? ORDER BY hash")
                    .bind(user)
                    .fetch_all(&self.pool)
                    .await?;
            Ok(rows)
        }

        async fn delete_latest(&self, hash: &str) -> MetadataResult<bool> {
            let result = sqlx::query("DELETE FROM latest WHERE hash = ?")
                .bind(hash)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn advance_latest(
            &self,
            previous_tip: Option<&str>,
            latest: &LatestRow,
        ) -> MetadataResult<LatestRow> {
            let mut tx = self.pool.begin().await?;

            let carried = match previous_tip {
                Some(previous_tip) => {
                    sqlx::query_as::<_, LatestRow>("SELECT * FROM latest WHERE hash = ?")
                        .bind(previous_tip)
                        .fetch_optional(&mut *tx)
                        .await?
                }
                None => None,
            };

            let row = match carried {
                Some(old) => {
                    sqlx::query("DELETE FROM latest WHERE hash = ?")
                        .bind(&old.hash)
                        .execute(&mut *tx)
                        .await?;
                    LatestRow {
                        hash: latest.hash.clone(),
                        user: latest.user.clone(),
                        is_workflow: old.is_workflow,
                        template_id: old.template_id,
                        updated_at: latest.updated_at,
                    }
                }
                None => latest.clone(),
            };

            insert_latest(&mut tx, &row, true).await?;
            tx.commit().await?;
            Ok(row)
        }
    }

    #[async_trait]
    impl FileRepo for SqliteStore {
        async fn get_file(&self, file_hash: &str) -> MetadataResult<Option<FileRow>> {
            let row = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE file_hash = ?")
                .bind(file_hash)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn register_file(&self, file: &FileRow, pubkey_hash: &str) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;
            sqlx::query(
                "INSERT OR IGNORE INTO files (file_hash, file_location, file_size, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&file.file_hash)
            .bind(&file.file_location)
            .bind(file.file_size)
            .bind(file.created_at)
            .execute(&mut *tx)
            .await?;
            entity_store::attach_file_reference(&mut tx, &file.file_hash, pubkey_hash).await?;
            tx.commit().await?;
            Ok(())
        }

        async fn add_file_reference(
            &self,
            file_hash: &str,
            pubkey_hash: &str,
        ) -> MetadataResult<bool> {
            let mut tx = self.pool.begin().await?;
            let added = entity_store::attach_file_reference(&mut tx, file_hash, pubkey_hash).await?;
            tx.commit().await?;
            Ok(added)
        }

        async fn get_file_index(&self, file_hash: &str) -> MetadataResult<Option<FileIndexRow>> {
            let row = sqlx::query_as::<_, FileIndexRow>(
                "SELECT file_hash, pubkey_hashes FROM file_index WHERE file_hash = ?",
            )
            .bind(file_hash)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn upsert_file_name(&self, pubkey_hash: &str, file_name: &str) -> MetadataResult<()> {
            upsert_file_name(&mut *self.pool.acquire().await?, pubkey_hash, file_name).await
        }

        async fn get_file_name(&self, pubkey_hash: &str) -> MetadataResult<Option<String>> {
            let name = sqlx::query_scalar("SELECT file_name FROM file_names WHERE pubkey_hash = ?")
                .bind(pubkey_hash)
                .fetch_optional(&self.pool)
                .await?;
            Ok(name)
        }
    }

    #[async_trait]
    impl EntityRepo for SqliteStore {
        async fn get_signature(&self, content_key: &str) -> MetadataResult<Option<SignatureRow>> {
            let row =
                sqlx::query_as::<_, SignatureRow>("SELECT * FROM signatures WHERE content_key = ?")
                    .bind(content_key)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn get_witness(&self, content_key: &str) -> MetadataResult<Option<WitnessRow>> {
            let row =
                sqlx::query_as::<_, WitnessRow>("SELECT * FROM witnesses WHERE content_key = ?")
                    .bind(content_key)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn get_witness_event(
            &self,
            merkle_root: &str,
        ) -> MetadataResult<Option<WitnessEventRow>> {
            let row = sqlx::query_as::<_, WitnessEventRow>(
                "SELECT * FROM witness_events WHERE merkle_root = ?",
            )
            .bind(merkle_root)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_link(&self, content_key: &str) -> MetadataResult<Option<LinkRow>> {
            let row = sqlx::query_as::<_, LinkRow>("SELECT * FROM links WHERE content_key = ?")
                .bind(content_key)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_form_fields(&self, pubkey_hash: &str) -> MetadataResult<Vec<FormFieldRow>> {
            let rows = sqlx::query_as::<_, FormFieldRow>(
                "SELECT * FROM aqua_forms WHERE pubkey_hash = ? ORDER BY key",
            )
            .bind(pubkey_hash)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn reference_count(
            &self,
            kind: EntityKind,
            content_key: &str,
        ) -> MetadataResult<Option<i64>> {
            let table = match kind {
                EntityKind::Signature => "signatures",
                EntityKind::Witness => "witnesses",
                EntityKind::Link => "links",
            };
            let sql = format!("SELECT reference_count FROM {table} WHERE content_key = ?");
            let count = sqlx::query_scalar(&sql)
                .bind(content_key)
                .fetch_optional(&self.pool)
                .await?;
            Ok(count)
        }

        async fn entity_references(
            &self,
            kind: EntityKind,
            content_key: &str,
        ) -> MetadataResult<Vec<String>> {
            let rows = sqlx::query_scalar(
                "SELECT pubkey_hash FROM entity_references WHERE kind = ? AND content_key = ? ORDER BY pubkey_hash",
            )
            .bind(kind.as_str())
            .bind(content_key)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn attach_entity(
            &self,
            record: &EntityRecord,
            pubkey_hash: &str,
        ) -> MetadataResult<AttachOutcome> {
            let mut tx = self.pool.begin().await?;
            let outcome = entity_store::attach(&mut tx, record, pubkey_hash).await?;
            tx.commit().await?;
            Ok(outcome)
        }

        async fn detach_entity(
            &self,
            kind: EntityKind,
            content_key: &str,
            pubkey_hash: &str,
        ) -> MetadataResult<DetachOutcome> {
            let mut tx = self.pool.begin().await?;
            let outcome = entity_store::detach(&mut tx, kind, content_key, pubkey_hash).await?;
            tx.commit().await?;
            Ok(outcome)
        }

        async fn upsert_witness_event(&self, event: &WitnessEventRow) -> MetadataResult<()> {
            insert_witness_event(&mut *self.pool.acquire().await?, event).await
        }
    }

    #[async_trait]
    impl ChainRepo for SqliteStore {
        async fn persist_revision(&self, new: &NewRevision) -> MetadataResult<PersistOutcome> {
            let revision = &new.revision;
            let mut tx = self.pool.begin().await?;

            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM revisions WHERE pubkey_hash = ?)",
            )
            .bind(&revision.pubkey_hash)
            .fetch_one(&mut *tx)
            .await?;
            if exists {
                return Ok(PersistOutcome::AlreadyExists);
            }

            sqlx::query(
                r#"
                INSERT INTO revisions (
                    pubkey_hash, owner, previous, nonce, shared, contract, children,
                    local_timestamp, revision_type, version, has_content, content,
                    verification_leaves, file_hash, entity_key, extra, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&revision.pubkey_hash)
            .bind(&revision.owner)
            .bind(&revision.previous)
            .bind(&revision.nonce)
            .bind(&revision.shared)
            .bind(&revision.contract)
            .bind(&revision.children)
            .bind(&revision.local_timestamp)
            .bind(&revision.revision_type)
            .bind(&revision.version)
            .bind(revision.has_content)
            .bind(&revision.content)
            .bind(&revision.verification_leaves)
            .bind(&revision.file_hash)
            .bind(&revision.entity_key)
            .bind(&revision.extra)
            .bind(revision.created_at)
            .execute(&mut *tx)
            .await?;

            if let Some(previous) = revision.previous.as_deref().filter(|p| !p.is_empty()) {
                update_children(&mut tx, previous, &revision.pubkey_hash, true).await?;
            }

            if let Some(entity) = &new.entity {
                entity_store::attach(&mut tx, entity, &revision.pubkey_hash).await?;
            }
            if let Some(event) = &new.witness_event {
                insert_witness_event(&mut tx, event).await?;
            }

            for field in &new.form_fields {
                sqlx::query(
                    "INSERT OR REPLACE INTO aqua_forms (pubkey_hash, key, value, type) VALUES (?, ?, ?, ?)",
                )
                .bind(&field.pubkey_hash)
                .bind(&field.key)
                .bind(&field.value)
                .bind(&field.value_type)
                .execute(&mut *tx)
                .await?;
            }

            if let Some(file_hash) = &new.file_reference {
                entity_store::attach_file_reference(&mut tx, file_hash, &revision.pubkey_hash)
                    .await?;
            }
            if let Some(file_name) = &new.file_name {
                upsert_file_name(&mut tx, &revision.pubkey_hash, file_name).await?;
            }

            tx.commit().await?;
            Ok(PersistOutcome::Inserted)
        }

        async fn delete_revisions(
            &self,
            leaf_first: &[String],
            delete_from_latest: bool,
        ) -> Result<DeletionSummary, DeletionFailure> {
            let mut summary = DeletionSummary::default();
            let result = async {
                let mut tx = self.pool.begin().await?;
                for pubkey_hash in leaf_first {
                    delete_revision(&mut tx, pubkey_hash, delete_from_latest, &mut summary).await?;
                }
                tx.commit().await?;
                Ok::<(), MetadataError>(())
            }
            .await;

            match result {
                Ok(()) => Ok(summary),
                Err(source) => Err(DeletionFailure {
                    partial: summary,
                    source,
                }),
            }
        }
    }

    async fn delete_revision(
        conn: &mut SqliteConnection,
        pubkey_hash: &str,
        delete_from_latest: bool,
        summary: &mut DeletionSummary,
    ) -> MetadataResult<()> {
        let Some(revision) =
            sqlx::query_as::<_, RevisionRow>("SELECT * FROM revisions WHERE pubkey_hash = ?")
                .bind(pubkey_hash)
                .fetch_optional(&mut *conn)
                .await?
        else {
            warn!(pubkey_hash, "revision vanished before deletion");
            return Ok(());
        };

        let revision_type = parse_revision_type(pubkey_hash, &revision.revision_type)?;
        match revision_type {
            RevisionType::Signature | RevisionType::Witness | RevisionType::Link => {
                detach_revision_entity(conn, &revision, revision_type, summary).await?;
            }
            RevisionType::Form => {
                let removed = sqlx::query("DELETE FROM aqua_forms WHERE pubkey_hash = ?")
                    .bind(pubkey_hash)
                    .execute(&mut *conn)
                    .await?
                    .rows_affected();
                summary.related.forms += removed;
                release_files(conn, pubkey_hash, summary).await?;
            }
            RevisionType::File => {
                release_files(conn, pubkey_hash, summary).await?;
            }
        }

        sqlx::query("DELETE FROM file_names WHERE pubkey_hash = ?")
            .bind(pubkey_hash)
            .execute(&mut *conn)
            .await?;

        repair_latest(conn, &revision, delete_from_latest, summary).await?;

        if let Some(previous) = revision.previous.as_deref().filter(|p| !p.is_empty()) {
            update_children(conn, previous, pubkey_hash, false).await?;
        }

        sqlx::query("DELETE FROM revisions WHERE pubkey_hash = ?")
            .bind(pubkey_hash)
            .execute(&mut *conn)
            .await?;
        summary.revisions.push(pubkey_hash.to_string());
        debug!(pubkey_hash, "deleted revision");
        Ok(())
    }

    async fn detach_revision_entity(
        conn: &mut SqliteConnection,
        revision: &RevisionRow,
        revision_type: RevisionType,
        summary: &mut DeletionSummary,
    ) -> MetadataResult<()> {
        let Some(kind) = EntityKind::for_revision_type(revision_type) else {
            return Ok(());
        };
        let Some(content_key) = revision.entity_key.as_deref() else {
            warn!(pubkey_hash = %revision.pubkey_hash, %kind, "revision has no entity key");
            return Ok(());
        };

        let merkle_root: Option<String> = if kind == EntityKind::Witness {
            sqlx::query_scalar("SELECT merkle_root FROM witnesses WHERE content_key = ?")
                .bind(content_key)
                .fetch_optional(&mut *conn)
                .await?
                .flatten()
        } else {
            None
        };

        let outcome = entity_store::detach(conn, kind, content_key, &revision.pubkey_hash).await?;
        if outcome != DetachOutcome::Deleted {
            return Ok(());
        }

        match kind {
            EntityKind::Signature => summary.related.signatures += 1,
            EntityKind::Link => summary.related.links += 1,
            EntityKind::Witness => {
                summary.related.witnesses += 1;
                if let Some(merkle_root) = merkle_root
                    && entity_store::release_witness_event(conn, &merkle_root).await?
                {
                    debug!(merkle_root, "removed witness event");
                }
            }
        }
        Ok(())
    }

    async fn release_files(
        conn: &mut SqliteConnection,
        pubkey_hash: &str,
        summary: &mut DeletionSummary,
    ) -> MetadataResult<()> {
        for outcome in entity_store::detach_file_reference(conn, pubkey_hash).await? {
            if let FileDetachOutcome::LastReference { file_location, .. } = outcome {
                summary.related.file_indexes += 1;
                if let Some(location) = file_location {
                    summary.related.files += 1;
                    summary.blob_locations.push(location);
                }
            }
        }
        Ok(())
    }

    async fn repair_latest(
        conn: &mut SqliteConnection,
        revision: &RevisionRow,
        delete_from_latest: bool,
        summary: &mut DeletionSummary,
    ) -> MetadataResult<()> {
        let Some(latest) = sqlx::query_as::<_, LatestRow>("SELECT * FROM latest WHERE hash = ?")
            .bind(&revision.pubkey_hash)
            .fetch_optional(&mut *conn)
            .await?
        else {
            return Ok(());
        };

        sqlx::query("DELETE FROM latest WHERE hash = ?")
            .bind(&latest.hash)
            .execute(&mut *conn)
            .await?;

        let previous = revision.previous.as_deref().filter(|p| !p.is_empty());
        match previous {
            Some(previous) if !delete_from_latest => {
                let repointed = LatestRow {
                    hash: previous.to_string(),
                    updated_at: OffsetDateTime::now_utc(),
                    ..latest
                };
                insert_latest(conn, &repointed, false).await?;
                summary.latest_repointed += 1;
            }
            _ => summary.latest_removed += 1,
        }
        Ok(())
    }

    async fn update_children(
        conn: &mut SqliteConnection,
        parent: &str,
        child: &str,
        add: bool,
    ) -> MetadataResult<()> {
        let children: Option<Json<Vec<String>>> =
            sqlx::query_scalar("SELECT children FROM revisions WHERE pubkey_hash = ?")
                .bind(parent)
                .fetch_optional(&mut *conn)
                .await?;
        let Some(Json(mut children)) = children else {
            return Ok(());
        };

        let present = children.iter().any(|c| c == child);
        match (add, present) {
            (true, false) => {
                children.push(child.to_string());
                children.sort();
            }
            (false, true) => children.retain(|c| c != child),
            _ => return Ok(()),
        }

        sqlx::query("UPDATE revisions SET children = ? WHERE pubkey_hash = ?")
            .bind(Json(children))
            .bind(parent)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn insert_latest(
        conn: &mut SqliteConnection,
        latest: &LatestRow,
        replace: bool,
    ) -> MetadataResult<bool> {
        let verb = if replace {
            "INSERT OR REPLACE"
        } else {
            "INSERT OR IGNORE"
        };
        let sql = format!(
            "{verb} INTO latest (hash, user, is_workflow, template_id, updated_at) VALUES (?, ?, ?, ?, ?)"
        );
        let result = sqlx::query(&sql)
            .bind(&latest.hash)
            .bind(&latest.user)
            .bind(latest.is_workflow)
            .bind(&latest.template_id)
            .bind(latest.updated_at)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_witness_event(
        conn: &mut SqliteConnection,
        event: &WitnessEventRow,
    ) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO witness_events (
                merkle_root, witness_timestamp, witness_network,
                witness_smart_contract_address, witness_transaction_hash,
                witness_sender_account_address
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.merkle_root)
        .bind(event.witness_timestamp)
        .bind(&event.witness_network)
        .bind(&event.witness_smart_contract_address)
        .bind(&event.witness_transaction_hash)
        .bind(&event.witness_sender_account_address)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn upsert_file_name(
        conn: &mut SqliteConnection,
        pubkey_hash: &str,
        file_name: &str,
    ) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO file_names (pubkey_hash, file_name) VALUES (?, ?)
            ON CONFLICT(pubkey_hash) DO UPDATE SET file_name = excluded.file_name
            "#,
        )
        .bind(pubkey_hash)
        .bind(file_name)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
-- Revisions, keyed by owner-qualified hash
CREATE TABLE IF NOT EXISTS revisions (
    pubkey_hash TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    previous TEXT,
    nonce TEXT,
    shared TEXT NOT NULL DEFAULT '[]',
    contract TEXT NOT NULL DEFAULT '[]',
    children TEXT NOT NULL DEFAULT '[]',
    local_timestamp TEXT NOT NULL,
    revision_type TEXT NOT NULL,
    version TEXT NOT NULL DEFAULT '',
    has_content INTEGER NOT NULL DEFAULT 0,
    content TEXT,
    verification_leaves TEXT,
    file_hash TEXT,
    entity_key TEXT,
    extra TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_revisions_previous ON revisions(previous);
CREATE INDEX IF NOT EXISTS idx_revisions_owner ON revisions(owner);

-- Chain heads per user
CREATE TABLE IF NOT EXISTS latest (
    hash TEXT PRIMARY KEY,
    user TEXT NOT NULL,
    is_workflow INTEGER NOT NULL DEFAULT 0,
    template_id TEXT,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_latest_user ON latest(user);

-- Stored blobs and their reverse-reference sets
CREATE TABLE IF NOT EXISTS files (
    file_hash TEXT PRIMARY KEY,
    file_location TEXT NOT NULL,
    file_size INTEGER,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS file_index (
    file_hash TEXT PRIMARY KEY,
    pubkey_hashes TEXT NOT NULL DEFAULT '[]'
);
CREATE TABLE IF NOT EXISTS file_names (
    pubkey_hash TEXT PRIMARY KEY,
    file_name TEXT NOT NULL
);

-- Reference-counted shared entities
CREATE TABLE IF NOT EXISTS signatures (
    content_key TEXT PRIMARY KEY,
    signature_digest TEXT NOT NULL,
    signature_wallet_address TEXT,
    signature_public_key TEXT,
    signature_type TEXT,
    reference_count INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS witnesses (
    content_key TEXT PRIMARY KEY,
    merkle_root TEXT,
    reference_count INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_witnesses_merkle_root ON witnesses(merkle_root);
CREATE TABLE IF NOT EXISTS witness_events (
    merkle_root TEXT PRIMARY KEY,
    witness_timestamp INTEGER,
    witness_network TEXT,
    witness_smart_contract_address TEXT,
    witness_transaction_hash TEXT,
    witness_sender_account_address TEXT
);
CREATE TABLE IF NOT EXISTS links (
    content_key TEXT PRIMARY KEY,
    link_type TEXT,
    link_require_indepth_verification INTEGER,
    link_verification_hashes TEXT NOT NULL DEFAULT '[]',
    link_file_hashes TEXT NOT NULL DEFAULT '[]',
    reference_count INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS entity_references (
    kind TEXT NOT NULL,
    content_key TEXT NOT NULL,
    pubkey_hash TEXT NOT NULL,
    PRIMARY KEY (kind, content_key, pubkey_hash)
);
CREATE INDEX IF NOT EXISTS idx_entity_references_hash ON entity_references(pubkey_hash);

-- Form fields, one row per field of a form revision
CREATE TABLE IF NOT EXISTS aqua_forms (
    pubkey_hash TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    type TEXT NOT NULL,
    PRIMARY KEY (pubkey_hash, key)
);
"#;
