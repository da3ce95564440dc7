//! LanceDB Vector Store - 외부 벡터 인덱스
//!
//! 청크 컬렉션을 LanceDB 테이블로 관리합니다.
//! 테이블이 없으면 고정 스키마로 만들고, 충분한 행이 쌓이면 코사인 IVF-PQ 인덱스를 생성합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::index::vector::IvfPqIndexBuilder;
use lancedb::index::Index;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;

use super::vector::{VectorEntry, VectorHit, VectorStore};

/// 기본 컬렉션 이름
pub const DEFAULT_COLLECTION: &str = "document_chunks";

/// IVF-PQ 학습에 필요한 최소 행 수 (이보다 적으면 전수 검색)
const MIN_INDEX_ROWS: usize = 256;

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
pub struct LanceVectorStore {
    db: Connection,
    collection: String,
    dimension: i32,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `collection` - 테이블 이름
    /// * `dimension` - 벡터 차원
    pub async fn open(path: &Path, collection: &str, dimension: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let dimension = i32::try_from(dimension).context("Vector dimension out of range")?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self {
            db,
            collection: collection.to_string(),
            dimension,
        })
    }

    /// 청크 테이블 스키마
    fn create_schema(&self) -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("token_count", DataType::Int64, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension,
                ),
                false,
            ),
        ])
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(&self, entries: &[VectorEntry]) -> Result<RecordBatch> {
        if entries.is_empty() {
            anyhow::bail!("Cannot create batch from empty entries");
        }

        if let Some(bad) = entries
            .iter()
            .find(|e| e.vector.len() != self.dimension as usize)
        {
            anyhow::bail!(
                "Vector dimension mismatch for chunk '{}': expected {}, got {}",
                bad.id,
                self.dimension,
                bad.vector.len()
            );
        }

        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
        let sources: Vec<&str> = entries.iter().map(|e| e.source.as_str()).collect();
        let token_counts: Vec<i64> = entries.iter().map(|e| e.token_count).collect();

        let vectors_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.vector.iter().copied())
            .collect();

        let values = Float32Array::from(vectors_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vectors = FixedSizeListArray::try_new(
            field,
            self.dimension,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create vector array")?;

        RecordBatch::try_new(
            Arc::new(self.create_schema()),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(sources)),
                Arc::new(Int64Array::from(token_counts)),
                Arc::new(vectors),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> Result<bool> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")?;
        Ok(names.contains(&self.collection))
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        self.db
            .open_table(&self.collection)
            .execute()
            .await
            .with_context(|| format!("Failed to open table '{}'", self.collection))
    }

    /// 코사인 IVF-PQ 인덱스 생성 (실패해도 전수 검색으로 동작)
    async fn build_index(&self, table: &lancedb::table::Table, rows: usize) {
        if rows < MIN_INDEX_ROWS {
            tracing::debug!(
                "Skipping vector index for '{}' ({} rows < {})",
                self.collection,
                rows,
                MIN_INDEX_ROWS
            );
            return;
        }

        let result = table
            .create_index(
                &["vector"],
                Index::IvfPq(IvfPqIndexBuilder::default().distance_type(DistanceType::Cosine)),
            )
            .execute()
            .await;

        match result {
            Ok(()) => tracing::info!("Built cosine vector index on '{}'", self.collection),
            Err(e) => tracing::warn!("Vector index build failed on '{}': {}", self.collection, e),
        }
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn ensure_ready(&self) -> Result<()> {
        if !self.table_exists().await? {
            tracing::info!("Creating collection '{}'", self.collection);
            self.db
                .create_empty_table(&self.collection, Arc::new(self.create_schema()))
                .execute()
                .await
                .with_context(|| format!("Failed to create table '{}'", self.collection))?;
        }

        // 테이블을 열어 검색 가능 상태인지 확인
        self.open_table().await?;
        Ok(())
    }

    async fn insert_all(&self, entries: &[VectorEntry]) -> Result<usize> {
        let table = self.open_table().await?;

        // 코퍼스 전체 교체
        table
            .delete("id IS NOT NULL")
            .await
            .context("Failed to clear previous chunks")?;

        if entries.is_empty() {
            return Ok(0);
        }

        let batch = self.entries_to_batch(entries)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        table
            .add(batches)
            .execute()
            .await
            .context("Failed to add chunks to table")?;

        self.build_index(&table, entries.len()).await;

        Ok(entries.len())
    }

    async fn similarity_search(&self, query: &[f32], top_k: usize) -> Result<Vec<VectorHit>> {
        if top_k == 0 {
            return Ok(vec![]);
        }

        let table = self.open_table().await?;

        let results = table
            .vector_search(query.to_vec())
            .context("Failed to create vector search")?
            .distance_type(DistanceType::Cosine)
            .limit(top_k)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .context("Failed to read search results")?;

        let mut hits = Vec::new();

        for batch in batches {
            let ids = string_column(&batch, "id")?;
            let texts = string_column(&batch, "text")?;
            let sources = string_column(&batch, "source")?;

            let token_counts = batch
                .column_by_name("token_count")
                .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing token_count column"))?;

            // _distance 컬럼 (LanceDB가 자동 추가, 코사인 거리)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                let source = sources.value(i);
                hits.push(VectorHit {
                    id: ids.value(i).to_string(),
                    text: texts.value(i).to_string(),
                    source: (!source.is_empty()).then(|| source.to_string()),
                    token_count: token_counts.value(i).max(0) as usize,
                    score: 1.0 - distances.value(i),
                });
            }
        }

        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self.open_table().await?;
        table.count_rows(None).await.context("Failed to count rows")
    }

    fn name(&self) -> &str {
        "lancedb"
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
}

// ============================================================================
// Tests
// ============================================================================
