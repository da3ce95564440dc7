//! Knowledge 모듈 - 청킹 + 검색 엔진
//!
//! - Tokenizer: 구두점/공백 기반 토큰 분할
//! - Chunker: 토큰 예산 기반 텍스트 분할
//! - Corpus: 불변 청크 스냅샷
//! - Ranker: BM25+ 랭킹 + 퍼지 폴백
//! - Vector / LanceDB: 벡터 검색 백엔드
//! - Engine: 인덱싱/검색 오케스트레이션

mod tokenizer;
mod chunker;
mod corpus;
mod ranker;
mod vector;
mod lance;
mod engine;

// Re-exports
pub use tokenizer::{count_tokens, tokenize, Tokenizer};
pub use chunker::{
    chunk_text, ChunkConfig, Chunker, TextChunk, TokenBudgetChunker,
    DEFAULT_MAX_TOKENS,
};
pub use corpus::{Chunk, ChunkBuilder, Corpus, NewChunk};
pub use ranker::{
    relevance_percentage, Candidate, Ranker, RankerParams, Ranking, ScoredResult, Strategy,
    DEFAULT_RELEVANCE_FLOOR,
};
pub use vector::{cosine_similarity, MemoryVectorStore, VectorEntry, VectorHit, VectorStore};
pub use lance::{LanceVectorStore, DEFAULT_COLLECTION};
pub use engine::{EngineStats, IndexReport, RetrievalEngine};
