
use super::{IndexEntry, ScoredEntry, StagingCollection, StoredEntry, VectorIndex};
use crate::config::Config;
use crate::{RagError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase, Select},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Table mapping each logical collection name to its live physical table
const ALIAS_TABLE: &str = "collections";

/// Length of the simple-format uuid appended to staging table names
const STAGING_SUFFIX_LEN: usize = 32;

/// Vector database store using LanceDB for similarity search
pub struct VectorStore {
    connection: Connection,
    collection: String,
    default_dimension: usize,
}

impl VectorStore {
    /// Open the store described by the index section of `config`
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::open(
            &config.index_path(),
            &config.index.collection,
            config.provider.embedding_dimension as usize,
        )
        .await
    }

    /// Open (creating if needed) a directory-backed LanceDB database.
    ///
    /// # Arguments
    /// * `db_path` - Directory holding the database
    /// * `collection` - Logical collection name queries resolve through
    /// * `default_dimension` - Vector width used when publishing a collection that
    ///   never received any entries
    #[inline]
    pub async fn open(db_path: &Path, collection: &str, default_dimension: usize) -> Result<Self> {
        debug!("Initializing LanceDB at path: {}", db_path.display());

        std::fs::create_dir_all(db_path).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let store = Self {
            connection,
            collection: collection.to_string(),
            default_dimension,
        };
        store.ensure_alias_table().await?;

        info!(
            "Vector store opened at {} (collection: {})",
            db_path.display(),
            collection
        );
        Ok(store)
    }

    #[inline]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Physical table currently serving the collection, if one was ever published
    #[inline]
    pub async fn active_table(&self) -> Result<Option<String>> {
        let table = self.open_table(ALIAS_TABLE).await?;
        let mut stream = table
            .query()
            .only_if(format!("name = '{}'", self.collection.replace('\'', "''")))
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read collection alias: {}", e)))?;

        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read alias stream: {}", e)))?
        {
            if batch.num_rows() == 0 {
                continue;
            }
            let physical = string_column(&batch, "physical")?;
            return Ok(Some(physical.value(0).to_string()));
        }

        Ok(None)
    }

    /// Names of all physical tables in the database
    #[inline]
    pub async fn table_names(&self) -> Result<Vec<String>> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))
    }

    async fn open_table(&self, name: &str) -> Result<Table> {
        self.connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table {}: {}", name, e)))
    }

    /// Open the live table, or `None` when nothing has been published yet
    async fn open_active(&self) -> Result<Option<Table>> {
        match self.active_table().await? {
            Some(name) => Ok(Some(self.open_table(&name).await?)),
            None => Ok(None),
        }
    }

    fn staging_prefix(&self) -> String {
        format!("{}__", self.collection)
    }

    /// Whether `name` has the exact shape of this collection's staging tables,
    /// `<collection>__<32 hex digits>`. Tables of other collections sharing the
    /// prefix, such as `<collection>__v2__<hex>`, never match.
    fn is_own_staging_table(&self, name: &str) -> bool {
        name.strip_prefix(&self.staging_prefix())
            .is_some_and(|suffix| {
                suffix.len() == STAGING_SUFFIX_LEN
                    && suffix.chars().all(|c| c.is_ascii_hexdigit())
            })
    }

    async fn ensure_alias_table(&self) -> Result<()> {
        if self.table_names().await?.iter().any(|t| t == ALIAS_TABLE) {
            return Ok(());
        }

        debug!("Creating collection alias table");
        self.connection
            .create_empty_table(ALIAS_TABLE, alias_schema())
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create alias table: {}", e)))?;
        Ok(())
    }

    /// Point the collection at `physical` in a single merge-insert commit
    async fn set_active_table(&self, physical: &str) -> Result<()> {
        let batch = RecordBatch::try_new(
            alias_schema(),
            vec![
                Arc::new(StringArray::from(vec![self.collection.as_str()])),
                Arc::new(StringArray::from(vec![physical])),
                Arc::new(StringArray::from(vec![Utc::now().to_rfc3339()])),
            ],
        )
        .map_err(|e| RagError::Database(format!("Failed to build alias record: {}", e)))?;

        let table = self.open_table(ALIAS_TABLE).await?;
        let reader = Box::new(RecordBatchIterator::new(
            std::iter::once(Ok(batch)),
            alias_schema(),
        ));

        let mut merge = table.merge_insert(&["name"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        let _ = merge
            .execute(reader)
            .await
            .map_err(|e| RagError::Database(format!("Failed to update collection alias: {}", e)))?;

        Ok(())
    }

    async fn create_table(&self, name: &str, vector_dim: usize) -> Result<()> {
        self.connection
            .create_empty_table(name, create_schema(vector_dim))
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create table {}: {}", name, e)))?;

        debug!("Created table {} with {} dimensions", name, vector_dim);
        Ok(())
    }

    /// Drop a physical table if it exists
    #[inline]
    pub async fn drop_table_if_exists(&self, name: &str) -> Result<()> {
        if self.table_names().await?.iter().any(|t| t == name) {
            debug!("Dropping table {}", name);
            self.connection
                .drop_table(name)
                .await
                .map_err(|e| RagError::Database(format!("Failed to drop table {}: {}", name, e)))?;
        }
        Ok(())
    }

    /// Drop staging tables left behind by rebuilds that never published
    async fn drop_orphaned_staging(&self) -> Result<()> {
        let active = self.active_table().await?;

        for name in self.table_names().await? {
            if self.is_own_staging_table(&name) && active.as_deref() != Some(name.as_str()) {
                warn!("Dropping orphaned staging table {}", name);
                self.drop_table_if_exists(&name).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for VectorStore {
    #[inline]
    async fn begin_rebuild(&self) -> Result<StagingCollection> {
        self.drop_orphaned_staging().await?;

        let name = format!("{}{}", self.staging_prefix(), Uuid::new_v4().simple());
        info!(
            "Starting rebuild of collection {} into {}",
            self.collection, name
        );
        Ok(StagingCollection::new(name))
    }

    #[inline]
    async fn add(&self, staging: &mut StagingCollection, entries: Vec<IndexEntry>) -> Result<()> {
        let Some(first) = entries.first() else {
            debug!("No entries to store");
            return Ok(());
        };

        let vector_dim = first.vector.len();
        match staging.dimension {
            None => {
                self.create_table(&staging.name, vector_dim).await?;
                staging.dimension = Some(vector_dim);
            }
            Some(dim) if dim != vector_dim => {
                return Err(RagError::Embedding(format!(
                    "Vector dimension changed mid-build from {} to {}",
                    dim, vector_dim
                )));
            }
            Some(_) => {}
        }

        debug!(
            "Storing batch of {} entries in {}",
            entries.len(),
            staging.name
        );

        let record_batch = create_record_batch(&entries, vector_dim)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        self.open_table(&staging.name)
            .await?
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert entries: {}", e)))?;

        staging.rows += entries.len() as u64;
        Ok(())
    }

    #[inline]
    async fn publish(&self, staging: StagingCollection) -> Result<u64> {
        if staging.dimension.is_none() {
            self.create_table(&staging.name, self.default_dimension)
                .await?;
        }

        let previous = self.active_table().await?;
        self.set_active_table(&staging.name).await?;
        info!(
            "Collection {} now served by {} ({} rows)",
            self.collection, staging.name, staging.rows
        );

        if let Some(previous) = previous.filter(|p| *p != staging.name) {
            if let Err(e) = self.drop_table_if_exists(&previous).await {
                warn!("Failed to drop previous table {}: {}", previous, e);
            }
        }

        self.count().await
    }

    #[inline]
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let Some(table) = self.open_active().await? else {
            warn!(
                "Collection {} has not been built yet, returning no results",
                self.collection
            );
            return Ok(Vec::new());
        };

        let dimension = table_dimension(&table).await?;
        if vector.len() != dimension {
            return Err(RagError::Embedding(format!(
                "Query vector has dimension {}, collection {} expects {}",
                vector.len(),
                self.collection,
                dimension
            )));
        }

        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;
        if rows == 0 {
            debug!("Collection {} is empty", self.collection);
            return Ok(Vec::new());
        }

        debug!("Searching for similar vectors with limit: {}", k);

        let mut results = table
            .vector_search(vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(k)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut hits = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            hits.extend(parse_scored_batch(&batch)?);
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);

        debug!("Found {} nearest entries", hits.len());
        Ok(hits)
    }

    #[inline]
    async fn count(&self) -> Result<u64> {
        let Some(table) = self.open_active().await? else {
            return Ok(0);
        };

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    #[inline]
    async fn entries(&self) -> Result<Vec<StoredEntry>> {
        let Some(table) = self.open_active().await? else {
            return Ok(Vec::new());
        };

        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;
        if rows == 0 {
            return Ok(Vec::new());
        }

        let mut stream = table
            .query()
            .select(Select::columns(&["id", "text", "source", "ordinal"]))
            .limit(rows)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to scan entries: {}", e)))?;

        let mut entries = Vec::with_capacity(rows);
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read entry stream: {}", e)))?
        {
            let ids = string_column(&batch, "id")?;
            let texts = string_column(&batch, "text")?;
            let sources = string_column(&batch, "source")?;
            let ordinals = u32_column(&batch, "ordinal")?;

            for row in 0..batch.num_rows() {
                entries.push(StoredEntry {
                    id: ids.value(row).to_string(),
                    text: texts.value(row).to_string(),
                    source: sources.value(row).to_string(),
                    ordinal: ordinals.value(row),
                });
            }
        }

        entries.sort_by(|a, b| a.source.cmp(&b.source).then(a.ordinal.cmp(&b.ordinal)));
        Ok(entries)
    }
}

/// Vector width of a collection table, read from its schema
async fn table_dimension(table: &Table) -> Result<usize> {
    let schema = table
        .schema()
        .await
        .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

    for field in schema.fields() {
        if field.name() == "vector" {
            if let DataType::FixedSizeList(_, size) = field.data_type() {
                if let Ok(size) = usize::try_from(*size) {
                    return Ok(size);
                }
            }
        }
    }

    Err(RagError::Database(
        "Could not find vector column or determine dimension".to_string(),
    ))
}

/// Schema of a collection table with the specified vector dimension
fn create_schema(vector_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                vector_dim as i32,
            ),
            false,
        ),
        Field::new("text", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("ordinal", DataType::UInt32, false),
    ]))
}

fn alias_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("name", DataType::Utf8, false),
        Field::new("physical", DataType::Utf8, false),
        Field::new("updated_at", DataType::Utf8, false),
    ]))
}

/// Create a RecordBatch from index entries
fn create_record_batch(entries: &[IndexEntry], vector_dim: usize) -> Result<RecordBatch> {
    let len = entries.len();

    let mut ids = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * vector_dim);
    let mut texts = Vec::with_capacity(len);
    let mut sources = Vec::with_capacity(len);
    let mut ordinals = Vec::with_capacity(len);

    for entry in entries {
        if entry.vector.len() != vector_dim {
            return Err(RagError::Embedding(format!(
                "Entry {} has dimension {}, expected {}",
                entry.id,
                entry.vector.len(),
                vector_dim
            )));
        }
        ids.push(entry.id.as_str());
        flat_values.extend_from_slice(&entry.vector);
        texts.push(entry.text.as_str());
        sources.push(entry.source.as_str());
        ordinals.push(entry.ordinal);
    }

    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array = FixedSizeListArray::try_new(
        field,
        vector_dim as i32,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(texts)),
        Arc::new(StringArray::from(sources)),
        Arc::new(UInt32Array::from(ordinals)),
    ];

    RecordBatch::try_new(create_schema(vector_dim), arrays)
        .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
}

/// Parse a single record batch of search results
fn parse_scored_batch(batch: &RecordBatch) -> Result<Vec<ScoredEntry>> {
    let ids = string_column(batch, "id")?;
    let texts = string_column(batch, "text")?;
    let sources = string_column(batch, "source")?;
    let ordinals = u32_column(batch, "ordinal")?;
    let distances = batch
        .column_by_name("_distance")
        .ok_or_else(|| RagError::Database("Missing _distance column".to_string()))?
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| RagError::Database("Invalid _distance column type".to_string()))?;

    (0..batch.num_rows())
        .map(|row| {
            if distances.is_null(row) {
                return Err(RagError::Database(format!(
                    "Null _distance for entry {}",
                    ids.value(row)
                )));
            }
            Ok(ScoredEntry {
                id: ids.value(row).to_string(),
                text: texts.value(row).to_string(),
                source: sources.value(row).to_string(),
                ordinal: ordinals.value(row),
                distance: distances.value(row),
            })
        })
        .collect()
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}
