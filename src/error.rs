//! 엔진 에러 타입
//!
//! 검색 엔진의 에러는 호출자에게 치명적이지 않습니다.
//! 입력 오류는 빈 결과로, 백엔드 오류는 인메모리 폴백 + `Outcome::Degraded`로 흡수됩니다.

use thiserror::Error;

/// 엔진 에러
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// 잘못된 입력 (차원 0 등)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 벡터 백엔드 사용 불가 (연결/초기화/쿼리 실패)
    #[error("Vector backend unavailable: {0}")]
    BackendUnavailable(String),

    /// 잘못된 설정값
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// anyhow 에러 체인을 BackendUnavailable로 변환
    pub fn backend(err: &anyhow::Error) -> Self {
        Self::BackendUnavailable(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

// ============================================================================
// Outcome
// ============================================================================

/// 작업 결과
///
/// 호출자 관점에서 항상 값을 돌려주되, 폴백이 일어났는지 구분합니다.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// 설정된 경로로 정상 처리됨
    Ok(T),
    /// 벡터 백엔드 실패로 인메모리 경로로 처리됨
    Degraded(T, EngineError),
}

impl<T> Outcome<T> {
    /// 결과 값 (폴백 여부 무시)
    pub fn into_inner(self) -> T {
        match self {
            Outcome::Ok(value) | Outcome::Degraded(value, _) => value,
        }
    }

    /// 결과 값 참조
    pub fn value(&self) -> &T {
        match self {
            Outcome::Ok(value) | Outcome::Degraded(value, _) => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded(..))
    }

    /// 폴백 사유
    pub fn reason(&self) -> Option<&EngineError> {
        match self {
            Outcome::Ok(_) => None,
            Outcome::Degraded(_, reason) => Some(reason),
        }
    }
}
