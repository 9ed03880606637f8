//! 에러 타입
//!
//! 라이브러리 계층은 `KnowledgeError`를 반환하고,
//! CLI 계층은 `anyhow`로 감싸서 컨텍스트를 덧붙입니다.

use std::path::PathBuf;

use thiserror::Error;

/// 지식 로딩/청킹 에러
///
/// 검색 결과가 없는 경우는 에러가 아닙니다 (빈 결과 목록).
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// 코퍼스 경로가 존재하지 않음
    #[error("Corpus not found: {0:?}")]
    CorpusNotFound(PathBuf),

    /// 파일 읽기 실패
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 디렉토리 순회 실패
    #[error("Failed to walk corpus directory: {0}")]
    Walk(#[from] ignore::Error),

    /// JSON 코퍼스 파싱 실패
    #[error("Failed to parse JSON corpus {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// 잘못된 설정값
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl KnowledgeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// 라이브러리 Result 별칭
pub type Result<T> = std::result::Result<T, KnowledgeError>;
