//! Vector Store - 벡터 검색 트레이트 및 인메모리 구현
//!
//! 외부 백엔드(LanceDB)와 인메모리 백엔드가 같은 계약을 따릅니다.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::corpus::Chunk;

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub id: String,
    pub text: String,
    /// 출처 (없으면 빈 문자열로 저장)
    pub source: String,
    pub token_count: i64,
    /// 임베딩 벡터
    pub vector: Vec<f32>,
}

impl VectorEntry {
    /// 청크와 임베딩으로 생성
    pub fn from_chunk(chunk: &Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.id().to_string(),
            text: chunk.text().to_string(),
            source: chunk.source().unwrap_or_default().to_string(),
            token_count: chunk.token_count() as i64,
            vector,
        }
    }
}

/// 유사도 검색 결과
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub text: String,
    pub source: Option<String>,
    pub token_count: usize,
    /// 코사인 유사도 (-1.0 ~ 1.0)
    pub score: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 벡터 저장소의 공통 인터페이스입니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 컬렉션 준비 (없으면 생성 후 로드)
    async fn ensure_ready(&self) -> Result<()>;

    /// 전체 엔트리 저장 (기존 내용 교체)
    async fn insert_all(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// 코사인 유사도 검색
    async fn similarity_search(&self, query: &[f32], top_k: usize) -> Result<Vec<VectorHit>>;

    /// 엔트리 개수 조회
    async fn count(&self) -> Result<usize>;

    /// 백엔드 이름
    fn name(&self) -> &str;
}

// ============================================================================
// MemoryVectorStore
// ============================================================================

/// 인메모리 벡터 저장소 (전수 코사인 비교)
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    entries: RwLock<Vec<VectorEntry>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_all(&self, entries: &[VectorEntry]) -> Result<usize> {
        let mut guard = self
            .entries
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        *guard = entries.to_vec();
        Ok(guard.len())
    }

    async fn similarity_search(&self, query: &[f32], top_k: usize) -> Result<Vec<VectorHit>> {
        let guard = self
            .entries
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut hits: Vec<VectorHit> = guard
            .iter()
            .map(|entry| VectorHit {
                id: entry.id.clone(),
                text: entry.text.clone(),
                source: (!entry.source.is_empty()).then(|| entry.source.clone()),
                token_count: entry.token_count.max(0) as usize,
                score: cosine_similarity(query, &entry.vector),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let guard = self
            .entries
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(guard.len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 영벡터면 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::corpus::ChunkBuilder;

    fn entry(id: &str, vector: Vec<f32>) -> VectorEntry {
        VectorEntry {
            id: id.to_string(),
            text: format!("text {}", id),
            source: String::new(),
            token_count: 2,
            vector,
        }
    }

    #[test]
    fn test_cosine_similarity_same() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_mismatch_and_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_entry_from_chunk() {
        let chunk = ChunkBuilder::new("alpha beta").source("https://a.b").build(4);
        let entry = VectorEntry::from_chunk(&chunk, vec![1.0]);
        assert_eq!(entry.id, "4");
        assert_eq!(entry.source, "https://a.b");
        assert_eq!(entry.token_count, 2);
    }

    #[tokio::test]
    async fn test_memory_store_search_order() {
        let store = MemoryVectorStore::new();
        store.ensure_ready().await.unwrap();

        let inserted = store
            .insert_all(&[
                entry("far", vec![0.0, 1.0]),
                entry("near", vec![1.0, 0.1]),
                entry("mid", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 3);

        let hits = store.similarity_search(&[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(hits[0].source.is_none());
    }

    #[tokio::test]
    async fn test_memory_store_insert_replaces() {
        let store = MemoryVectorStore::new();
        store.insert_all(&[entry("a", vec![1.0])]).await.unwrap();
        store
            .insert_all(&[entry("b", vec![1.0]), entry("c", vec![1.0])])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.name(), "memory");
    }
}
