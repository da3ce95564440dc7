//! 엔진 설정
//!
//! 기본값 + 환경변수 오버라이드
//!
//! | 환경변수 | 의미 |
//! |---|---|
//! | `PAGE_SEARCH_VECTOR_BACKEND` | `none` / `memory` / `lance` |
//! | `USE_VECTOR_SEARCH` | `true`면 `lance` (이전 설정 호환) |
//! | `PAGE_SEARCH_LANCE_PATH` | LanceDB 디렉토리 |
//! | `PAGE_SEARCH_COLLECTION` | 컬렉션(테이블) 이름 |
//! | `PAGE_SEARCH_MAX_TOKENS` | 청크 토큰 예산 |
//! | `PAGE_SEARCH_LOWERCASE_TOKENS` | 토큰 소문자 정규화 |

use std::path::PathBuf;
use std::str::FromStr;

use crate::embedding::DEFAULT_DIMENSION;
use crate::error::{EngineError, Result};
use crate::knowledge::{DEFAULT_COLLECTION, DEFAULT_MAX_TOKENS, DEFAULT_RELEVANCE_FLOOR};

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.page-search/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".page-search")
}

// ============================================================================
// Types
// ============================================================================

/// 벡터 백엔드 선택
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VectorBackend {
    /// 인메모리 BM25+ 랭킹만 사용
    #[default]
    Disabled,
    /// 인메모리 전수 코사인 검색
    Memory,
    /// LanceDB 외부 인덱스
    Lance,
}

impl FromStr for VectorBackend {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "off" | "disabled" => Ok(VectorBackend::Disabled),
            "memory" | "mem" => Ok(VectorBackend::Memory),
            "lance" | "lancedb" => Ok(VectorBackend::Lance),
            other => Err(EngineError::Config(format!(
                "Unknown vector backend '{}'. Use none, memory or lance",
                other
            ))),
        }
    }
}

/// 엔진 설정
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 청크 당 최대 토큰 수
    pub max_tokens: usize,
    /// 기본 검색 결과 수
    pub default_limit: usize,
    /// 관련도 하한 (%)
    pub relevance_floor: u32,
    /// 임베딩 차원
    pub dimension: usize,
    pub vector_backend: VectorBackend,
    /// LanceDB 디렉토리
    pub lance_path: PathBuf,
    /// LanceDB 테이블 이름
    pub collection: String,
    /// 토큰 소문자 정규화
    pub lowercase_tokens: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            default_limit: 10,
            relevance_floor: DEFAULT_RELEVANCE_FLOOR,
            dimension: DEFAULT_DIMENSION,
            vector_backend: VectorBackend::Disabled,
            lance_path: get_data_dir().join("vectors.lance"),
            collection: DEFAULT_COLLECTION.to_string(),
            lowercase_tokens: false,
        }
    }
}

impl EngineConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 키 조회 함수로 설정 로드
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(backend) = get("PAGE_SEARCH_VECTOR_BACKEND") {
            config.vector_backend = backend.parse()?;
        } else if let Some(legacy) = get("USE_VECTOR_SEARCH") {
            if parse_bool("USE_VECTOR_SEARCH", &legacy)? {
                config.vector_backend = VectorBackend::Lance;
            }
        }

        if let Some(path) = get("PAGE_SEARCH_LANCE_PATH") {
            config.lance_path = PathBuf::from(path);
        }

        if let Some(collection) = get("PAGE_SEARCH_COLLECTION") {
            config.collection = collection;
        }

        if let Some(max_tokens) = get("PAGE_SEARCH_MAX_TOKENS") {
            config.max_tokens = max_tokens.trim().parse().map_err(|_| {
                EngineError::Config(format!("PAGE_SEARCH_MAX_TOKENS is not a number: {}", max_tokens))
            })?;
        }

        if let Some(lowercase) = get("PAGE_SEARCH_LOWERCASE_TOKENS") {
            config.lowercase_tokens = parse_bool("PAGE_SEARCH_LOWERCASE_TOKENS", &lowercase)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(EngineError::Config("max_tokens must be positive".into()));
        }
        if self.dimension == 0 {
            return Err(EngineError::Config("dimension must be positive".into()));
        }
        if self.relevance_floor > 100 {
            return Err(EngineError::Config(format!(
                "relevance_floor must be within 0..=100, got {}",
                self.relevance_floor
            )));
        }
        if self.collection.is_empty() {
            return Err(EngineError::Config("collection name is empty".into()));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EngineError::Config(format!(
            "{} must be true or false, got '{}'",
            key, value
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================
