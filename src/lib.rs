//! page-search - 웹 페이지 청킹 + 관련도 검색
//!
//! 정리된 텍스트를 토큰 예산 청크로 나누고,
//! BM25+ 랭킹(또는 선택적 벡터 인덱스)으로 쿼리에 맞는 청크를 찾습니다.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod scraper;

// Re-exports
pub use config::{get_data_dir, EngineConfig, VectorBackend};
pub use embedding::{text_to_vector, EmbeddingProvider, HashingEmbedding};
pub use error::{EngineError, Outcome};
pub use knowledge::{
    chunk_text, count_tokens, tokenize, Chunk, ChunkBuilder, Corpus, IndexReport,
    LanceVectorStore, MemoryVectorStore, NewChunk, RetrievalEngine, ScoredResult, TextChunk,
    VectorStore,
};
pub use scraper::{ScrapedPage, WebScraper};
