//! Index lifecycle and write path

use crate::index::document::{build_entry_schema, entry_to_doc};
use crate::index::IndexError;
use crate::models::LogEntry;
use std::path::Path;
use std::sync::Arc;
use tantivy::schema::Schema;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy};
use tokio::sync::RwLock;

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Owns the on-disk index, its writer, and its reader.
///
/// Ingestion jobs write batches through this manager; the search side only
/// touches the reader.
pub struct IndexManager {
    index: Index,
    schema: Schema,
    writer: Arc<RwLock<IndexWriter>>,
    reader: IndexReader,
}

impl IndexManager {
    /// Open the index at `path`, creating it if absent
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)
            .map_err(|e| IndexError::Init(format!("failed to create index directory: {}", e)))?;

        let schema = build_entry_schema();

        let index = if path.join("meta.json").exists() {
            Index::open_in_dir(path)
                .map_err(|e| IndexError::Init(format!("failed to open existing index: {}", e)))?
        } else {
            Index::create_in_dir(path, schema.clone())
                .map_err(|e| IndexError::Init(format!("failed to create index: {}", e)))?
        };

        let writer = index
            .writer(WRITER_HEAP_BYTES)
            .map_err(|e| IndexError::Init(format!("failed to create writer: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| IndexError::Init(format!("failed to create reader: {}", e)))?;

        Ok(Self {
            index,
            schema,
            writer: Arc::new(RwLock::new(writer)),
            reader,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }

    /// Index a batch of entries for one tenant, replacing any prior
    /// documents with the same entry id, and commit.
    pub async fn index_entries(
        &self,
        tenant_id: &str,
        entries: &[LogEntry],
    ) -> Result<usize, IndexError> {
        let mut writer = self.writer.write().await;
        let mut indexed = 0;

        let id_field = self
            .schema
            .get_field("id")
            .map_err(|e| IndexError::Indexing(e.to_string()))?;

        for entry in entries {
            let Some(doc) = entry_to_doc(&self.schema, tenant_id, entry) else {
                tracing::warn!(entry_id = %entry.id, "skipping unserializable entry");
                continue;
            };

            let term = tantivy::Term::from_field_text(id_field, &entry.id.to_string());
            writer.delete_term(term);

            writer
                .add_document(doc)
                .map_err(|e| IndexError::Indexing(format!("failed to add document: {}", e)))?;
            indexed += 1;
        }

        writer
            .commit()
            .map_err(|e| IndexError::Indexing(format!("failed to commit batch: {}", e)))?;

        Ok(indexed)
    }

    /// Drop every document belonging to one analysis job
    pub async fn delete_job(&self, job_id: uuid::Uuid) -> Result<(), IndexError> {
        let mut writer = self.writer.write().await;

        let job_field = self
            .schema
            .get_field("job_id")
            .map_err(|e| IndexError::Indexing(e.to_string()))?;
        let term = tantivy::Term::from_field_text(job_field, &job_id.to_string());
        writer.delete_term(term);

        writer
            .commit()
            .map_err(|e| IndexError::Indexing(format!("failed to commit deletion: {}", e)))?;
        Ok(())
    }

    /// Block until the reader reflects the latest commit. Used by tests
    /// and by ingestion jobs that need read-your-writes.
    pub fn reload(&self) -> Result<(), IndexError> {
        self.reader
            .reload()
            .map_err(|e| IndexError::Init(format!("failed to reload reader: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogType;
    use chrono::{TimeZone, Utc};
    use tantivy::collector::Count;
    use tantivy::query::AllQuery;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn entry(job_id: Uuid) -> LogEntry {
        LogEntry::new(
            job_id,
            1,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            LogType::Api,
        )
        .with_raw_text("<API > OK")
    }

    fn doc_count(manager: &IndexManager) -> usize {
        manager
            .reader()
            .searcher()
            .search(&AllQuery, &Count)
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_and_reopens() {
        let temp_dir = TempDir::new().unwrap();
        {
            let manager = IndexManager::open(temp_dir.path()).unwrap();
            manager.index_entries("acme", &[entry(Uuid::new_v4())]).await.unwrap();
        }
        let reopened = IndexManager::open(temp_dir.path()).unwrap();
        reopened.reload().unwrap();
        assert_eq!(doc_count(&reopened), 1);
    }

    #[tokio::test]
    async fn test_reindex_same_id_replaces() {
        let temp_dir = TempDir::new().unwrap();
        let manager = IndexManager::open(temp_dir.path()).unwrap();

        let e = entry(Uuid::new_v4());
        manager.index_entries("acme", &[e.clone()]).await.unwrap();
        manager.index_entries("acme", &[e]).await.unwrap();
        manager.reload().unwrap();

        assert_eq!(doc_count(&manager), 1);
    }

    #[tokio::test]
    async fn test_delete_job_removes_only_that_job() {
        let temp_dir = TempDir::new().unwrap();
        let manager = IndexManager::open(temp_dir.path()).unwrap();

        let job_a = Uuid::new_v4();
        let job_b = Uuid::new_v4();
        manager
            .index_entries("acme", &[entry(job_a), entry(job_b)])
            .await
            .unwrap();
        manager.delete_job(job_a).await.unwrap();
        manager.reload().unwrap();

        assert_eq!(doc_count(&manager), 1);
    }
}
