//! Corpus - 인메모리 청크 스냅샷
//!
//! 인덱싱된 청크는 불변입니다. 재인덱싱은 새 `Corpus`를 만들어 통째로 교체합니다.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tokenizer::Tokenizer;

// ============================================================================
// Types
// ============================================================================

/// 인덱싱 입력 레코드
///
/// 미리 분할된 청크 또는 `chunk_text` 결과에서 만들어집니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChunk {
    /// 청크 ID (없거나 비어 있으면 위치 인덱스 사용)
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    /// 출처 (URL 등)
    #[serde(default)]
    pub source: Option<String>,
    /// 캐시된 토큰 수 (있으면 재계산하지 않음)
    #[serde(default)]
    pub token_count: Option<usize>,
}

impl NewChunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// 인덱싱된 청크
///
/// `ChunkBuilder`로만 생성되며 토큰/빈도 캐시가 항상 채워져 있습니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    id: String,
    text: String,
    source: Option<String>,
    token_count: usize,
    #[serde(skip)]
    tokens: Vec<String>,
    #[serde(skip)]
    term_frequencies: HashMap<String, usize>,
}

impl Chunk {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    /// 순서가 보존된 토큰
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// 청크 내 토큰 빈도 (없으면 0)
    pub fn term_frequency(&self, token: &str) -> usize {
        self.term_frequencies.get(token).copied().unwrap_or(0)
    }

    /// 토큰 포함 여부
    pub fn contains_token(&self, token: &str) -> bool {
        self.term_frequencies.contains_key(token)
    }

    /// 고유 토큰 개수
    pub fn distinct_tokens(&self) -> usize {
        self.term_frequencies.len()
    }
}

// ============================================================================
// ChunkBuilder
// ============================================================================

/// 청크 빌더
#[derive(Debug, Clone)]
pub struct ChunkBuilder {
    record: NewChunk,
    tokenizer: Tokenizer,
}

impl ChunkBuilder {
    pub fn new(text: impl Into<String>) -> Self {
        Self::from_record(NewChunk::new(text))
    }

    pub fn from_record(record: NewChunk) -> Self {
        Self {
            record,
            tokenizer: Tokenizer::default(),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.record.id = Some(id.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.record.source = Some(source.into());
        self
    }

    pub fn token_count(mut self, token_count: usize) -> Self {
        self.record.token_count = Some(token_count);
        self
    }

    pub fn tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// 청크 생성
    ///
    /// # Arguments
    /// * `position` - 코퍼스 내 위치 (ID가 없을 때 기본 ID)
    pub fn build(self, position: usize) -> Chunk {
        let NewChunk {
            id,
            text,
            source,
            token_count,
        } = self.record;

        let tokens = self.tokenizer.tokenize(&text);
        let token_count = token_count.unwrap_or(tokens.len());

        let mut term_frequencies: HashMap<String, usize> = HashMap::new();
        for token in &tokens {
            *term_frequencies.entry(token.clone()).or_insert(0) += 1;
        }

        let id = id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| position.to_string());

        Chunk {
            id,
            text,
            source: source.filter(|s| !s.is_empty()),
            token_count,
            tokens,
            term_frequencies,
        }
    }
}

// ============================================================================
// Corpus
// ============================================================================

/// 불변 코퍼스 스냅샷
#[derive(Debug, Clone)]
pub struct Corpus {
    chunks: Vec<Chunk>,
    indexed_at: Option<DateTime<Utc>>,
}

impl Default for Corpus {
    fn default() -> Self {
        Self::empty()
    }
}

impl Corpus {
    /// 빈 코퍼스 (인덱싱 전 상태)
    pub fn empty() -> Self {
        Self {
            chunks: Vec::new(),
            indexed_at: None,
        }
    }

    /// 레코드에서 코퍼스 생성
    ///
    /// 중복 ID는 첫 번째 레코드만 유지합니다.
    pub fn build(records: Vec<NewChunk>, tokenizer: Tokenizer) -> Self {
        let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
        let mut chunks = Vec::with_capacity(records.len());

        for (position, record) in records.into_iter().enumerate() {
            let chunk = ChunkBuilder::from_record(record)
                .tokenizer(tokenizer)
                .build(position);

            if !seen.insert(chunk.id.clone()) {
                tracing::warn!("Duplicate chunk id '{}' skipped", chunk.id);
                continue;
            }
            chunks.push(chunk);
        }

        Self {
            chunks,
            indexed_at: Some(Utc::now()),
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.id == id)
    }

    /// 인덱싱 시각 (빈 초기 코퍼스는 None)
    pub fn indexed_at(&self) -> Option<DateTime<Utc>> {
        self.indexed_at
    }

    /// 토큰 수 합계
    pub fn total_tokens(&self) -> usize {
        self.chunks.iter().map(|c| c.token_count).sum()
    }

    /// 평균 문서 길이 (토큰 수)
    pub fn avg_doc_length(&self) -> f64 {
        if self.chunks.is_empty() {
            return 0.0;
        }
        self.total_tokens() as f64 / self.chunks.len() as f64
    }

    /// 토큰을 포함하는 청크 수
    pub fn document_frequency(&self, token: &str) -> usize {
        self.chunks.iter().filter(|c| c.contains_token(token)).count()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_derives_fields() {
        let chunk = ChunkBuilder::new("the cat, the hat").build(7);

        assert_eq!(chunk.id(), "7");
        assert_eq!(chunk.token_count(), 4);
        assert_eq!(chunk.tokens(), &["the", "cat", "the", "hat"]);
        assert_eq!(chunk.term_frequency("the"), 2);
        assert_eq!(chunk.term_frequency("dog"), 0);
        assert_eq!(chunk.distinct_tokens(), 3);
        assert!(chunk.source().is_none());
    }

    #[test]
    fn test_builder_keeps_cached_token_count() {
        let chunk = ChunkBuilder::new("a b c").token_count(42).build(0);
        assert_eq!(chunk.token_count(), 42);
        assert_eq!(chunk.tokens().len(), 3);
    }

    #[test]
    fn test_empty_id_gets_position() {
        let chunk = ChunkBuilder::new("x").id("").source("src").build(2);
        assert_eq!(chunk.id(), "2");
        assert_eq!(chunk.source(), Some("src"));
    }

    #[test]
    fn test_corpus_build_and_stats() {
        let corpus = Corpus::build(
            vec![
                NewChunk::new("quick brown fox"),
                NewChunk::new("lazy dog"),
                NewChunk::new("quick dog"),
            ],
            Tokenizer::default(),
        );

        assert_eq!(corpus.len(), 3);
        assert!(corpus.indexed_at().is_some());
        assert_eq!(corpus.total_tokens(), 7);
        assert!((corpus.avg_doc_length() - 7.0 / 3.0).abs() < 1e-9);
        assert_eq!(corpus.document_frequency("quick"), 2);
        assert_eq!(corpus.document_frequency("cat"), 0);
        assert_eq!(corpus.get("1").map(|c| c.text()), Some("lazy dog"));
    }

    #[test]
    fn test_corpus_skips_duplicate_ids() {
        let mut first = NewChunk::new("first");
        first.id = Some("a".to_string());
        let mut second = NewChunk::new("second");
        second.id = Some("a".to_string());

        let corpus = Corpus::build(vec![first, second], Tokenizer::default());
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.chunks()[0].text(), "first");
    }

    #[test]
    fn test_empty_corpus() {
        let corpus = Corpus::empty();
        assert!(corpus.is_empty());
        assert!(corpus.indexed_at().is_none());
        assert_eq!(corpus.avg_doc_length(), 0.0);
    }

    #[test]
    fn test_new_chunk_deserialize_camel_case() {
        let json = r#"{"text": "hello", "tokenCount": 1, "source": "s"}"#;
        let record: NewChunk = serde_json::from_str(json).expect("valid json");
        assert_eq!(record.token_count, Some(1));
        assert!(record.id.is_none());
    }
}
