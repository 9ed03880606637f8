//! Text Chunking Module
//!
//! 문서 본문을 고정 크기(단어 수) 윈도우로 분할합니다.
//! 오버랩이 0이면 서로 겹치지 않는 청크, 0보다 크면 겹치는 청크가 됩니다.
//! 각 청크는 제목/카테고리와 주변 문맥(context)을 함께 가집니다.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use super::loader::KnowledgeDocument;
use crate::error::{KnowledgeError, Result};

/// 첫 번째 청크 ID
pub const FIRST_CHUNK_ID: i64 = 1;

pub const CHUNK_WORDS_ENV: &str = "KB_SEARCH_CHUNK_WORDS";
pub const OVERLAP_WORDS_ENV: &str = "KB_SEARCH_OVERLAP_WORDS";
pub const CONTEXT_WORDS_ENV: &str = "KB_SEARCH_CONTEXT_WORDS";

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkConfig {
    /// 청크당 단어 수
    pub chunk_words: usize,
    /// 인접 청크 간 중첩 단어 수
    pub overlap_words: usize,
    /// 문맥 윈도우 확장 단어 수 (양쪽, 0이면 문맥 없음)
    pub context_words: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_words: 120,
            overlap_words: 20,
            context_words: 40,
        }
    }
}

impl ChunkConfig {
    /// 오버랩 없는 설정 (서로 겹치지 않는 청크)
    pub fn for_fast() -> Self {
        Self {
            overlap_words: 0,
            ..Self::default()
        }
    }

    /// 문맥 없는 설정
    pub fn without_context() -> Self {
        Self {
            context_words: 0,
            ..Self::default()
        }
    }

    /// 환경변수로 기본값 덮어쓰기
    ///
    /// - `KB_SEARCH_CHUNK_WORDS`
    /// - `KB_SEARCH_OVERLAP_WORDS`
    /// - `KB_SEARCH_CONTEXT_WORDS`
    pub fn from_env() -> Result<Self> {
        let config = Self::default().with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 환경변수 값 적용 (검증하지 않음)
    ///
    /// CLI 플래그를 추가로 덮어쓴 뒤 한 번만 검증할 때 사용합니다.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// 키 조회 함수로 값 적용 (검증하지 않음)
    pub(crate) fn with_overrides_from(
        mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        if let Some(v) = parse_usize(CHUNK_WORDS_ENV, var(CHUNK_WORDS_ENV))? {
            self.chunk_words = v;
        }
        if let Some(v) = parse_usize(OVERLAP_WORDS_ENV, var(OVERLAP_WORDS_ENV))? {
            self.overlap_words = v;
        }
        if let Some(v) = parse_usize(CONTEXT_WORDS_ENV, var(CONTEXT_WORDS_ENV))? {
            self.context_words = v;
        }
        Ok(self)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.chunk_words == 0 {
            return Err(KnowledgeError::InvalidConfig(
                "chunk_words must be greater than 0".to_string(),
            ));
        }
        if self.overlap_words >= self.chunk_words {
            return Err(KnowledgeError::InvalidConfig(format!(
                "overlap_words ({}) must be smaller than chunk_words ({})",
                self.overlap_words, self.chunk_words
            )));
        }
        Ok(())
    }
}

fn parse_usize(key: &str, raw: Option<String>) -> Result<Option<usize>> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| KnowledgeError::InvalidConfig(format!("{key} must be a number, got {raw:?}"))),
        _ => Ok(None),
    }
}

// ============================================================================
// Chunk
// ============================================================================

/// 검색 단위 청크
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    /// 청킹 1회 내에서 유일한 ID
    pub id: i64,
    pub title: String,
    pub category: String,
    /// 청크 본문 (문서 본문의 부분 문자열)
    pub text: String,
    /// 주변 문맥 (문서가 여러 청크로 나뉜 경우에만)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// 문서 내 청크 순서 (0-based)
    pub chunk_index: usize,
}

// ============================================================================
// Chunking
// ============================================================================

/// 문서 목록을 청크로 분할
///
/// ID는 `FIRST_CHUNK_ID`부터 문서 순서, 문서 내 청크 순서로 1씩 증가합니다.
/// 같은 입력은 항상 같은 ID와 내용을 만듭니다.
pub fn chunk_knowledge(documents: &[KnowledgeDocument], config: &ChunkConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut next_id = FIRST_CHUNK_ID;

    for doc in documents {
        let words = word_spans(&doc.body);
        if words.is_empty() {
            tracing::debug!("No chunks generated for document: {}", doc.title);
            continue;
        }

        // 단어 인덱스 [start, end) → 본문 바이트 구간 (원문 공백 유지)
        let slice = |start: usize, end: usize| doc.body[words[start].0..words[end - 1].1].to_string();

        let windows = word_windows(words.len(), config.chunk_words, config.overlap_words);
        let with_context = config.context_words > 0 && windows.len() > 1;

        for (chunk_index, &(start, end)) in windows.iter().enumerate() {
            let context = with_context.then(|| {
                let ctx_start = start.saturating_sub(config.context_words);
                let ctx_end = (end + config.context_words).min(words.len());
                slice(ctx_start, ctx_end)
            });

            chunks.push(Chunk {
                id: next_id,
                title: doc.title.clone(),
                category: doc.category.clone(),
                text: slice(start, end),
                context,
                chunk_index,
            });
            next_id += 1;
        }
    }

    tracing::debug!(
        "Chunked {} documents into {} chunks",
        documents.len(),
        chunks.len()
    );
    chunks
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\S+").expect("valid word pattern"))
}

/// 공백으로 구분된 단어의 바이트 구간 (start, end) 목록
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    word_re()
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect()
}

/// 단어 윈도우 (start, end) 목록
///
/// 마지막 윈도우는 항상 마지막 단어에서 끝납니다.
fn word_windows(word_count: usize, chunk_words: usize, overlap_words: usize) -> Vec<(usize, usize)> {
    if word_count == 0 {
        return vec![];
    }

    let chunk_words = chunk_words.max(1);
    if word_count <= chunk_words {
        return vec![(0, word_count)];
    }

    let step = chunk_words.saturating_sub(overlap_words).max(1);
    let mut windows = Vec::new();
    let mut start = 0;

    while start < word_count {
        let end = (start + chunk_words).min(word_count);
        windows.push((start, end));

        if end >= word_count {
            break;
        }

        start += step;
    }

    windows
}

// ============================================================================
// Tests
// ============================================================================
