//! 임베딩 모듈 - 해싱 Bag-of-Words 벡터화
//!
//! 학습된 모델 없이 토큰을 해시 버킷에 누적하고 L2 정규화합니다.
//! 저장된 인덱스와 호환되도록 해시 연산은 비트 단위로 고정되어 있습니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = HashingEmbedding::new();
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

use anyhow::Result;
use async_trait::async_trait;

use crate::error::EngineError;
use crate::knowledge::Tokenizer;

/// 기본 임베딩 차원
pub const DEFAULT_DIMENSION: usize = 128;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Hashing Embedding
// ============================================================================

/// 해싱 임베딩 구현체
///
/// 품질보다 재현성을 위한 자리표시자 임베딩입니다.
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    dimension: usize,
    tokenizer: Tokenizer,
}

impl HashingEmbedding {
    /// 기본 차원(128)으로 생성
    pub fn new() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
            tokenizer: Tokenizer::default(),
        }
    }

    /// 차원을 지정하여 생성
    pub fn with_dimension(dimension: usize) -> std::result::Result<Self, EngineError> {
        if dimension == 0 || dimension > i32::MAX as usize {
            return Err(EngineError::InvalidInput(format!(
                "Invalid embedding dimension: {}",
                dimension
            )));
        }

        Ok(Self {
            dimension,
            tokenizer: Tokenizer::default(),
        })
    }

    /// 토크나이저 지정
    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// 텍스트를 단위 벡터로 변환 (동기)
    pub fn text_to_vector(&self, text: &str) -> Vec<f32> {
        let mut counts = vec![0.0f64; self.dimension];

        for token in self.tokenizer.tokenize(text) {
            counts[bucket(hash_token(&token), self.dimension)] += 1.0;
        }

        let magnitude = counts.iter().map(|v| v * v).sum::<f64>().sqrt();
        if magnitude > 0.0 {
            counts.iter_mut().for_each(|v| *v /= magnitude);
        }

        counts.into_iter().map(|v| v as f32).collect()
    }
}

impl Default for HashingEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.text_to_vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.text_to_vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing-bow"
    }
}

// ============================================================================
// Hash Functions
// ============================================================================

/// 32비트 부호 있는 다항 해시
///
/// UTF-16 코드 유닛마다 `hash = hash * 31 + unit` (i32 wrapping).
pub fn hash_token(token: &str) -> i32 {
    token
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32))
}

/// 해시 버킷 `|hash % dimension|`
fn bucket(hash: i32, dimension: usize) -> usize {
    (hash % dimension as i32).unsigned_abs() as usize
}

/// 기본 차원 벡터화
pub fn text_to_vector(text: &str) -> Vec<f32> {
    HashingEmbedding::new().text_to_vector(text)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_hash_token_matches_reference_values() {
        assert_eq!(hash_token(""), 0);
        assert_eq!(hash_token("a"), 97);
        // "hello".hashCode() == 99162322
        assert_eq!(hash_token("hello"), 99162322);
        // 오버플로우 wrapping: "polygenelubricants" 는 i32::MIN
        assert_eq!(hash_token("polygenelubricants"), i32::MIN);
    }

    #[test]
    fn test_bucket_handles_negative_and_min() {
        assert_eq!(bucket(-130, 128), 2);
        assert_eq!(bucket(130, 128), 2);
        assert_eq!(bucket(i32::MIN, 128), 0);
    }

    #[test]
    fn test_unit_length() {
        let v = text_to_vector("The quick brown fox jumps over the lazy dog");
        assert_eq!(v.len(), DEFAULT_DIMENSION);
        assert!((norm(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_input_is_zero_vector() {
        let v = text_to_vector("");
        assert_eq!(v.len(), DEFAULT_DIMENSION);
        assert!(v.iter().all(|x| *x == 0.0));

        let v = text_to_vector("... ,,, ---");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_deterministic_buckets() {
        let v = text_to_vector("hello hello");
        let idx = bucket(hash_token("hello"), DEFAULT_DIMENSION);
        assert!((v[idx] - 1.0).abs() < 1e-6);
        assert_eq!(v, text_to_vector("hello, hello."));
    }

    #[test]
    fn test_invalid_dimension() {
        let result = HashingEmbedding::with_dimension(0);
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
        assert!(HashingEmbedding::with_dimension(16).is_ok());
    }

    #[tokio::test]
    async fn test_provider_trait() {
        let embedder = HashingEmbedding::with_dimension(32).expect("valid dimension");
        let batch = embedder
            .embed_batch(&["a b".to_string(), "".to_string()])
            .await
            .expect("embedding never fails");

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].len(), 32);
        assert_eq!(EmbeddingProvider::dimension(&embedder), 32);
        assert_eq!(embedder.name(), "hashing-bow");
    }
}
