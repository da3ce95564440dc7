//! Retrieval Engine - 인덱싱 + 검색 오케스트레이션
//!
//! 인메모리 코퍼스는 항상 유지되며, 벡터 백엔드가 설정되어 있으면 함께 채웁니다.
//! 벡터 경로가 실패하면 같은 호출 안에서 인메모리 랭킹으로 한 번 폴백합니다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::{EngineConfig, VectorBackend};
use crate::embedding::{EmbeddingProvider, HashingEmbedding};
use crate::error::{EngineError, Outcome, Result};

use super::corpus::{Corpus, NewChunk};
use super::lance::LanceVectorStore;
use super::ranker::{Candidate, Ranker, RankerParams, ScoredResult, Strategy};
use super::tokenizer::Tokenizer;
use super::vector::{MemoryVectorStore, VectorEntry, VectorHit, VectorStore};

// ============================================================================
// Types
// ============================================================================

/// 인덱싱 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexReport {
    /// 코퍼스에 들어간 청크 수
    pub chunk_count: usize,
    /// 벡터 백엔드에 저장된 엔트리 수
    pub vector_count: usize,
}

/// 엔진 통계
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub chunk_count: usize,
    pub total_tokens: usize,
    pub indexed_at: Option<DateTime<Utc>>,
    pub vector_backend: Option<String>,
    pub vector_count: Option<usize>,
}

// ============================================================================
// RetrievalEngine
// ============================================================================

/// 검색 엔진
///
/// 코퍼스는 `RwLock<Arc<Corpus>>`로 보관합니다.
/// 검색은 스냅샷 `Arc`를 복제해 읽고, 인덱싱은 새 코퍼스를 만든 뒤 통째로 교체합니다.
/// 인덱싱 호출은 `index_lock`으로 직렬화되어 코퍼스와 벡터 백엔드가 같은 데이터를 가리킵니다.
pub struct RetrievalEngine {
    corpus: RwLock<Arc<Corpus>>,
    /// 코퍼스 교체 + 벡터 저장을 한 단위로 묶음
    index_lock: Mutex<()>,
    ranker: Ranker,
    tokenizer: Tokenizer,
    embedder: HashingEmbedding,
    vector: Option<Arc<dyn VectorStore>>,
    vector_ready: AtomicBool,
    /// 마지막 인덱싱이 벡터 백엔드에도 반영되었는지
    vector_in_sync: AtomicBool,
    default_limit: usize,
}

impl RetrievalEngine {
    /// 인메모리 전용 엔진
    pub fn in_memory() -> Self {
        Self::with_parts(
            Tokenizer::default(),
            HashingEmbedding::new(),
            RankerParams::default(),
            None,
        )
    }

    /// 설정으로 생성
    ///
    /// LanceDB 연결 실패는 에러가 아니라 인메모리 전용 엔진으로 처리합니다.
    pub async fn from_config(config: &EngineConfig) -> Result<Self> {
        let tokenizer = Tokenizer {
            lowercase: config.lowercase_tokens,
        };
        let embedder = HashingEmbedding::with_dimension(config.dimension)?.with_tokenizer(tokenizer);
        let params = RankerParams {
            relevance_floor: config.relevance_floor,
            ..Default::default()
        };

        let vector: Option<Arc<dyn VectorStore>> = match config.vector_backend {
            VectorBackend::Disabled => None,
            VectorBackend::Memory => Some(Arc::new(MemoryVectorStore::new())),
            VectorBackend::Lance => {
                match LanceVectorStore::open(&config.lance_path, &config.collection, config.dimension)
                    .await
                {
                    Ok(store) => Some(Arc::new(store)),
                    Err(e) => {
                        tracing::warn!(
                            "LanceDB unavailable at {}, using in-memory ranking: {:#}",
                            config.lance_path.display(),
                            e
                        );
                        None
                    }
                }
            }
        };

        let mut engine = Self::with_parts(tokenizer, embedder, params, vector);
        engine.default_limit = config.default_limit;
        Ok(engine)
    }

    /// 구성 요소를 직접 지정하여 생성
    pub fn with_parts(
        tokenizer: Tokenizer,
        embedder: HashingEmbedding,
        params: RankerParams,
        vector: Option<Arc<dyn VectorStore>>,
    ) -> Self {
        Self {
            corpus: RwLock::new(Arc::new(Corpus::empty())),
            index_lock: Mutex::new(()),
            ranker: Ranker::new(params),
            tokenizer,
            embedder,
            vector,
            vector_ready: AtomicBool::new(false),
            vector_in_sync: AtomicBool::new(false),
            default_limit: 10,
        }
    }

    /// 벡터 백엔드 지정
    pub fn with_vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector = Some(store);
        self.vector_ready.store(false, Ordering::SeqCst);
        self.vector_in_sync.store(false, Ordering::SeqCst);
        self
    }

    /// 기본 결과 수
    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// 현재 코퍼스 스냅샷
    pub fn corpus(&self) -> Arc<Corpus> {
        match self.corpus.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn swap_corpus(&self, corpus: Corpus) {
        let corpus = Arc::new(corpus);
        match self.corpus.write() {
            Ok(mut guard) => *guard = corpus,
            Err(poisoned) => *poisoned.into_inner() = corpus,
        }
    }

    /// 청크 인덱싱 (코퍼스 전체 교체)
    ///
    /// 인메모리 코퍼스는 항상 갱신됩니다. 벡터 백엔드 실패는 `Outcome::Degraded`로 보고됩니다.
    pub async fn index(&self, records: Vec<NewChunk>) -> Outcome<IndexReport> {
        let _guard = self.index_lock.lock().await;

        let corpus = Corpus::build(records, self.tokenizer);
        let chunk_count = corpus.len();

        let entries = self.vector.as_ref().map(|_| {
            corpus
                .chunks()
                .iter()
                .map(|chunk| VectorEntry::from_chunk(chunk, self.embedder.text_to_vector(chunk.text())))
                .collect::<Vec<_>>()
        });

        // 교체 전에 내려야 검색이 새 코퍼스와 이전 벡터를 섞지 않음
        self.vector_in_sync.store(false, Ordering::SeqCst);
        self.swap_corpus(corpus);
        tracing::info!("Indexed {} chunks in memory", chunk_count);

        let (Some(store), Some(entries)) = (self.vector.as_ref(), entries) else {
            return Outcome::Ok(IndexReport {
                chunk_count,
                vector_count: 0,
            });
        };

        let inserted = match self.ready_store(store.as_ref()).await {
            Ok(()) => store.insert_all(&entries).await,
            Err(e) => Err(e),
        };

        match inserted {
            Ok(vector_count) => {
                self.vector_in_sync.store(true, Ordering::SeqCst);
                tracing::info!("Stored {} vectors in {}", vector_count, store.name());
                Outcome::Ok(IndexReport {
                    chunk_count,
                    vector_count,
                })
            }
            Err(e) => {
                tracing::warn!(
                    "Vector backend {} insert failed, keeping in-memory corpus: {:#}",
                    store.name(),
                    e
                );
                Outcome::Degraded(
                    IndexReport {
                        chunk_count,
                        vector_count: 0,
                    },
                    EngineError::backend(&e),
                )
            }
        }
    }

    /// 검색
    ///
    /// 빈 쿼리, `limit == 0`, 빈 코퍼스는 빈 결과를 돌려줍니다.
    pub async fn search(&self, query: &str, limit: usize) -> Outcome<Vec<ScoredResult>> {
        if query.is_empty() || limit == 0 {
            return Outcome::Ok(vec![]);
        }

        let Some(store) = self.vector.as_ref() else {
            return Outcome::Ok(self.search_in_memory(query, limit));
        };

        if !self.vector_in_sync.load(Ordering::SeqCst) {
            let corpus = self.corpus();
            if corpus.indexed_at().is_none() {
                // 인덱싱 전: 벡터 백엔드와 무관하게 빈 결과
                return Outcome::Ok(vec![]);
            }
            tracing::warn!(
                "Vector backend {} is out of sync with the corpus, using in-memory ranking",
                store.name()
            );
            return Outcome::Degraded(
                self.search_in_memory(query, limit),
                EngineError::BackendUnavailable(format!(
                    "{} did not receive the latest index",
                    store.name()
                )),
            );
        }

        match self.search_vector(store.as_ref(), query, limit).await {
            Ok(results) => Outcome::Ok(results),
            Err(e) => {
                tracing::warn!(
                    "Vector search on {} failed, using in-memory ranking: {:#}",
                    store.name(),
                    e
                );
                Outcome::Degraded(self.search_in_memory(query, limit), EngineError::backend(&e))
            }
        }
    }

    /// 인메모리 BM25+ / 퍼지 랭킹
    pub fn search_in_memory(&self, query: &str, limit: usize) -> Vec<ScoredResult> {
        let corpus = self.corpus();
        let query_tokens = self.tokenizer.tokenize(query);
        let ranking = self.ranker.rank(query, &query_tokens, &corpus, limit);

        match ranking.strategy {
            Strategy::Lexical => tracing::debug!("Lexical ranking: {} results", ranking.results.len()),
            Strategy::Fuzzy => tracing::debug!("Fuzzy fallback: {} results", ranking.results.len()),
            Strategy::None => tracing::debug!("No candidates for query"),
        }

        ranking.results
    }

    /// 벡터 경로 검색 (`limit * 2` 후보 후 정규화)
    async fn search_vector(
        &self,
        store: &dyn VectorStore,
        query: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ScoredResult>> {
        self.ready_store(store).await?;

        let query_vector = self.embedder.embed(query).await?;
        let hits = store
            .similarity_search(&query_vector, limit.saturating_mul(2))
            .await?;

        Ok(self.normalize_hits(&hits, limit))
    }

    fn normalize_hits(&self, hits: &[VectorHit], limit: usize) -> Vec<ScoredResult> {
        let candidates: Vec<Candidate<'_>> = hits
            .iter()
            .map(|hit| Candidate {
                id: &hit.id,
                text: &hit.text,
                source: hit.source.as_deref(),
                token_count: hit.token_count,
                raw_score: f64::from(hit.score),
            })
            .collect();

        self.ranker
            .normalize(candidates, limit, |_, raw| (raw as f32).clamp(0.0, 1.0))
    }

    /// 벡터 백엔드 준비 (성공할 때까지 호출마다 한 번 시도)
    async fn ready_store(&self, store: &dyn VectorStore) -> anyhow::Result<()> {
        if self.vector_ready.load(Ordering::SeqCst) {
            return Ok(());
        }
        store.ensure_ready().await?;
        self.vector_ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// 엔진 통계
    pub async fn stats(&self) -> EngineStats {
        let corpus = self.corpus();

        let (vector_backend, vector_count) = match self.vector.as_ref() {
            Some(store) => {
                let count = match store.count().await {
                    Ok(count) => Some(count),
                    Err(e) => {
                        tracing::debug!("Vector count failed: {:#}", e);
                        None
                    }
                };
                (Some(store.name().to_string()), count)
            }
            None => (None, None),
        };

        EngineStats {
            chunk_count: corpus.len(),
            total_tokens: corpus.total_tokens(),
            indexed_at: corpus.indexed_at(),
            vector_backend,
            vector_count,
        }
    }
}

impl Default for RetrievalEngine {
    fn default() -> Self {
        Self::in_memory()
    }
}

// ============================================================================
// Tests
// ============================================================================
