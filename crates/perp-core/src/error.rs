//! 핵심 에러 타입.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 심볼 매핑 파일을 읽을 수 없음
    #[error("심볼 매핑 로드 실패 ({path}): {source}")]
    MappingIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 심볼 매핑 형식 오류
    #[error("심볼 매핑 파싱 실패: {0}")]
    MappingFormat(#[from] serde_json::Error),

    /// 매핑이 비어 있음
    #[error("심볼 매핑이 비어 있습니다: {0}")]
    EmptyMapping(String),

    /// 유효하지 않은 값
    #[error("유효하지 않은 값: {0}")]
    InvalidValue(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;
