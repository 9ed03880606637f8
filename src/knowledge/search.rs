//! 관련도 검색 - 어휘 기반 청크 랭킹
//!
//! 쿼리를 토큰화하고 모든 청크를 고정 가중치로 점수화합니다.
//! 인덱스 없이 매 호출마다 코퍼스를 다시 읽고 청킹합니다.
//!
//! 점수 규칙 (청크당 합산):
//! - 제목에 포함된 토큰마다 +15
//! - 카테고리에 포함된 토큰마다 +8
//! - 본문에 포함된 토큰마다 +2
//! - 본문에 전체 쿼리 문자열이 포함되면 +25
//! - 본문에 포함된 서로 다른 토큰이 2개 이상이면 +3 × 개수
//! - 문맥에 전체 쿼리 문자열이 포함되면 +5

use std::collections::HashSet;

use serde::Serialize;

use super::chunker::{chunk_knowledge, Chunk, ChunkConfig};
use super::loader::{load_all_knowledge, CorpusSource, KnowledgeDocument};
use crate::error::Result;

/// 기본 결과 개수
pub const DEFAULT_TOP_K: usize = 10;

/// 이 길이(문자 수) 이하의 토큰은 버림
pub const MAX_DISCARDED_TOKEN_CHARS: usize = 2;

const TITLE_WEIGHT: u32 = 15;
const CATEGORY_WEIGHT: u32 = 8;
const TEXT_WEIGHT: u32 = 2;
const PHRASE_BONUS: u32 = 25;
const MULTI_MATCH_WEIGHT: u32 = 3;
const CONTEXT_BONUS: u32 = 5;

// ============================================================================
// Types
// ============================================================================

/// 검색 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    /// 청크 ID
    pub id: i64,
    pub title: String,
    pub category: String,
    /// 청크 텍스트
    pub chunk: String,
    /// 관련도 점수 (높을수록 좋음)
    pub relevance: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl SearchResult {
    fn from_chunk(chunk: &Chunk, relevance: u32) -> Self {
        Self {
            id: chunk.id,
            title: chunk.title.clone(),
            category: chunk.category.clone(),
            chunk: chunk.text.clone(),
            relevance,
            context: chunk.context.clone(),
        }
    }
}

/// 신호별 점수 내역
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelevanceBreakdown {
    pub title: u32,
    pub category: u32,
    pub text: u32,
    pub phrase: u32,
    pub multi_match: u32,
    pub context: u32,
}

impl RelevanceBreakdown {
    /// 총 관련도
    pub fn total(&self) -> u32 {
        self.title + self.category + self.text + self.phrase + self.multi_match + self.context
    }
}

/// 점수 내역이 포함된 검색 결과 (`--explain`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainedResult {
    #[serde(flatten)]
    pub result: SearchResult,
    pub breakdown: RelevanceBreakdown,
}

// ============================================================================
// Scoring
// ============================================================================

/// 쿼리 토큰화
///
/// 소문자 변환 → 공백 분할 → 2자 이하 토큰 제거. 중복 토큰은 유지합니다.
pub fn tokenize_query(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|word| word.chars().count() > MAX_DISCARDED_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

/// 청크 하나의 점수 계산
///
/// # Arguments
/// * `query` - 원본 쿼리 (전체 문자열 일치 보너스에 사용)
/// * `tokens` - `tokenize_query(query)` 결과
/// * `chunk` - 대상 청크
pub fn score_chunk(query: &str, tokens: &[String], chunk: &Chunk) -> RelevanceBreakdown {
    let query = query.to_lowercase();
    let title = chunk.title.to_lowercase();
    let category = chunk.category.to_lowercase();
    let text = chunk.text.to_lowercase();

    let mut breakdown = RelevanceBreakdown::default();

    for token in tokens {
        if title.contains(token.as_str()) {
            breakdown.title += TITLE_WEIGHT;
        }
        if category.contains(token.as_str()) {
            breakdown.category += CATEGORY_WEIGHT;
        }
        if text.contains(token.as_str()) {
            breakdown.text += TEXT_WEIGHT;
        }
    }

    if text.contains(&query) {
        breakdown.phrase = PHRASE_BONUS;
    }

    let matched: HashSet<&str> = tokens
        .iter()
        .map(String::as_str)
        .filter(|token| text.contains(token))
        .collect();
    if matched.len() > 1 {
        breakdown.multi_match = MULTI_MATCH_WEIGHT * matched.len() as u32;
    }

    if let Some(ref context) = chunk.context {
        if context.to_lowercase().contains(&query) {
            breakdown.context = CONTEXT_BONUS;
        }
    }

    breakdown
}

/// 점수 > 0 인 청크를 내림차순으로 정렬 (동점은 청크 순서 유지)
fn ranked<'a>(query: &str, chunks: &'a [Chunk], top_k: usize) -> Vec<(&'a Chunk, RelevanceBreakdown)> {
    // 빈/공백 쿼리는 부분 문자열 보너스가 모든 청크에 붙으므로 검색하지 않음
    if query.trim().is_empty() {
        tracing::debug!("Empty query, skipping scoring");
        return vec![];
    }

    let tokens = tokenize_query(query);

    let mut scored: Vec<(&Chunk, RelevanceBreakdown)> = chunks
        .iter()
        .map(|chunk| (chunk, score_chunk(query, &tokens, chunk)))
        .filter(|(_, breakdown)| breakdown.total() > 0)
        .collect();

    // sort_by는 안정 정렬
    scored.sort_by(|a, b| b.1.total().cmp(&a.1.total()));
    scored.truncate(top_k);

    scored
}

/// 청크 목록 랭킹
///
/// 결과 길이는 `top_k` 이하이며 관련도 내림차순입니다.
pub fn rank_chunks(query: &str, chunks: &[Chunk], top_k: usize) -> Vec<SearchResult> {
    ranked(query, chunks, top_k)
        .into_iter()
        .map(|(chunk, breakdown)| SearchResult::from_chunk(chunk, breakdown.total()))
        .collect()
}

/// 점수 내역 포함 랭킹
pub fn explain_chunks(query: &str, chunks: &[Chunk], top_k: usize) -> Vec<ExplainedResult> {
    ranked(query, chunks, top_k)
        .into_iter()
        .map(|(chunk, breakdown)| ExplainedResult {
            result: SearchResult::from_chunk(chunk, breakdown.total()),
            breakdown,
        })
        .collect()
}

// ============================================================================
// SimpleRetriever
// ============================================================================

/// 단순 검색기
///
/// 코퍼스 소스와 청킹 설정만 가지며, 상태를 캐시하지 않습니다.
/// 매 검색마다 로딩 → 청킹 → 점수화를 새로 수행합니다.
#[derive(Debug, Clone)]
pub struct SimpleRetriever {
    source: CorpusSource,
    chunk_config: ChunkConfig,
}

impl SimpleRetriever {
    /// 소스와 설정으로 생성
    pub fn new(source: CorpusSource, chunk_config: ChunkConfig) -> Result<Self> {
        chunk_config.validate()?;
        Ok(Self {
            source,
            chunk_config,
        })
    }

    /// 환경변수 설정으로 생성
    ///
    /// `KB_SEARCH_CORPUS`, `KB_SEARCH_CHUNK_WORDS` 등을 읽습니다.
    pub fn from_env() -> Result<Self> {
        Self::new(CorpusSource::from_env(), ChunkConfig::from_env()?)
    }

    /// 코퍼스 소스
    pub fn source(&self) -> &CorpusSource {
        &self.source
    }

    /// 청킹 설정
    pub fn chunk_config(&self) -> &ChunkConfig {
        &self.chunk_config
    }

    /// 문서 로딩
    pub fn load_documents(&self) -> Result<Vec<KnowledgeDocument>> {
        load_all_knowledge(&self.source)
    }

    /// 문서 로딩 + 청킹
    pub fn load_chunks(&self) -> Result<Vec<Chunk>> {
        let documents = self.load_documents()?;
        Ok(chunk_knowledge(&documents, &self.chunk_config))
    }

    /// 검색
    ///
    /// 코퍼스를 읽지 못하면 에러, 일치 항목이 없으면 빈 목록을 반환합니다.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let chunks = self.load_chunks()?;
        let results = rank_chunks(query, &chunks, top_k);

        tracing::debug!(
            "Search {:?}: {} of {} chunks returned (top_k={})",
            query,
            results.len(),
            chunks.len(),
            top_k
        );
        Ok(results)
    }

    /// 점수 내역 포함 검색
    pub fn search_explained(&self, query: &str, top_k: usize) -> Result<Vec<ExplainedResult>> {
        let chunks = self.load_chunks()?;
        Ok(explain_chunks(query, &chunks, top_k))
    }
}

/// 환경변수로 설정된 코퍼스에서 검색
///
/// `SimpleRetriever::from_env()?.search(query, top_k)`와 같습니다.
pub fn simple_search(query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
    SimpleRetriever::from_env()?.search(query, top_k)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chunk(id: i64, title: &str, category: &str, text: &str, context: Option<&str>) -> Chunk {
        Chunk {
            id,
            title: title.to_string(),
            category: category.to_string(),
            text: text.to_string(),
            context: context.map(str::to_string),
            chunk_index: 0,
        }
    }

    fn score(query: &str, chunk: &Chunk) -> RelevanceBreakdown {
        score_chunk(query, &tokenize_query(query), chunk)
    }

    #[test]
    fn test_tokenize_query() {
        assert_eq!(tokenize_query("HCIA 5G"), vec!["hcia"]);
        assert!(tokenize_query("is it ok").is_empty());
        assert_eq!(
            tokenize_query("  Radio\tNETWORK \n planning "),
            vec!["radio", "network", "planning"]
        );
        assert_eq!(tokenize_query("radio radio"), vec!["radio", "radio"]);
        // 문자 수 기준 (바이트 아님)
        assert_eq!(tokenize_query("5G 네트워크 망"), vec!["네트워크"]);
    }

    #[test]
    fn test_hcia_title_match() {
        let c = chunk(
            1,
            "HCIA-5G Certification Overview",
            "certification",
            "This course introduces 5G fundamentals.",
            None,
        );

        let b = score("HCIA 5G", &c);
        assert_eq!(b.title, 15);
        assert_eq!(b.category, 0);
        assert_eq!(b.text, 0);
        assert_eq!(b.phrase, 0);
        assert_eq!(b.total(), 15);

        // 본문에 "hcia 5g" 포함 → +2 (토큰) +25 (전체 문자열)
        let c = chunk(
            2,
            "HCIA-5G Certification Overview",
            "certification",
            "The HCIA 5G exam covers radio basics.",
            None,
        );
        let b = score("HCIA 5G", &c);
        assert_eq!(b.text, 2);
        assert_eq!(b.phrase, 25);
        assert_eq!(b.multi_match, 0);
        assert_eq!(b.total(), 42);
    }

    #[test]
    fn test_multi_match_bonus() {
        let c = chunk(1, "x", "y", "planning of radio and network", None);

        let b = score("radio network planning", &c);
        assert_eq!(b.text, 6);
        assert_eq!(b.multi_match, 9);
        assert_eq!(b.phrase, 0);
        assert_eq!(b.total(), 15);

        // 토큰 하나만 일치하면 보너스 없음
        let b = score("radio antenna", &c);
        assert_eq!(b.multi_match, 0);
        assert_eq!(b.total(), 2);
    }

    #[test]
    fn test_duplicate_tokens() {
        let c = chunk(1, "x", "y", "radio network", None);

        // 토큰별 점수는 중복 포함, 다중 일치 보너스는 서로 다른 토큰 수 기준
        let b = score("radio radio network", &c);
        assert_eq!(b.text, 6);
        assert_eq!(b.multi_match, 6);
        assert_eq!(b.total(), 12);
    }

    #[test]
    fn test_category_match() {
        let c = chunk(1, "Exam fee", "Certification", "Listed online.", None);
        let b = score("certification", &c);
        assert_eq!(b.category, 8);
        assert_eq!(b.total(), 8);
    }

    #[test]
    fn test_context_bonus() {
        let c = chunk(1, "T", "c", "unrelated words", Some("adjust the Antenna Tilt carefully"));

        let b = score("antenna tilt", &c);
        assert_eq!(b.context, 5);
        assert_eq!(b.total(), 5);

        let no_context = chunk(2, "T", "c", "unrelated words", None);
        assert_eq!(score("antenna tilt", &no_context).total(), 0);
    }

    #[test]
    fn test_short_token_query_only_phrase_bonus() {
        let chunks = vec![
            chunk(1, "is it", "ok", "nothing here", None),
            chunk(2, "Retake", "policy", "Is it OK to retake the exam?", None),
            chunk(3, "T", "c", "other", Some("so is it ok then")),
        ];

        let results = rank_chunks("is it ok", &chunks, 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 2);
        assert_eq!(results[0].relevance, 25);
        assert_eq!(results[1].id, 3);
        assert_eq!(results[1].relevance, 5);
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let chunks = vec![chunk(1, "T", "c", "text", Some("context"))];
        assert!(rank_chunks("", &chunks, 10).is_empty());
        assert!(rank_chunks("   \t", &chunks, 10).is_empty());
    }

    #[test]
    fn test_top_k_and_ordering() {
        let mut chunks: Vec<Chunk> = (1..=10)
            .map(|id| chunk(id, "plain", "misc", "radio text", None))
            .collect();
        // 모든 청크: 본문 토큰 +2, 전체 문자열 +25
        chunks[2].title = "Radio basics".to_string(); // id 3: +15
        chunks[6].title = "Radio planning".to_string(); // id 7: +15
        chunks[4].category = "radio".to_string(); // id 5: +8

        let results = rank_chunks("radio", &chunks, 3);
        assert_eq!(results.len(), 3);
        assert_eq!(
            results.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![3, 7, 5]
        );
        assert_eq!(
            results.iter().map(|r| r.relevance).collect::<Vec<_>>(),
            vec![42, 42, 35]
        );
    }

    #[test]
    fn test_ties_keep_chunk_order() {
        let chunks: Vec<Chunk> = [5, 2, 9, 1]
            .into_iter()
            .map(|id| chunk(id, "t", "c", "radio", None))
            .collect();

        let results = rank_chunks("radio", &chunks, 10);
        assert_eq!(
            results.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![5, 2, 9, 1]
        );
    }

    #[test]
    fn test_results_sorted_and_positive() {
        let chunks = vec![
            chunk(1, "Core network", "5g", "the core network routes traffic", None),
            chunk(2, "Unrelated", "misc", "cooking recipes", None),
            chunk(3, "Radio", "5g", "radio access network basics", Some("core network and radio")),
            chunk(4, "Network slicing", "core", "slices of the network", None),
        ];

        for top_k in 0..6 {
            let results = rank_chunks("core network", &chunks, top_k);
            assert!(results.len() <= top_k);
            assert!(results.iter().all(|r| r.relevance > 0));
            assert!(results.windows(2).all(|w| w[0].relevance >= w[1].relevance));
            assert!(results.iter().all(|r| r.id != 2));
        }
    }

    #[test]
    fn test_title_bonus_is_monotonic() {
        let with_title = chunk(1, "network slicing", "c", "body", None);
        let without_title = chunk(2, "", "c", "body", None);

        let query = "network slicing";
        assert!(score(query, &with_title).total() > score(query, &without_title).total());
        assert!(score(query, &with_title).title >= 15);
    }

    #[test]
    fn test_phrase_bonus_at_least_25() {
        let with_phrase = chunk(1, "t", "c", "we discuss Beam Forming today", None);
        let without_phrase = chunk(2, "t", "c", "we discuss nothing today", None);

        let query = "beam forming";
        assert!(score(query, &with_phrase).total() >= score(query, &without_phrase).total() + 25);
    }

    #[test]
    fn test_result_carries_context() {
        let chunks = vec![chunk(7, "Radio", "5g", "radio", Some("wider radio context"))];
        let results = rank_chunks("radio", &chunks, 10);
        assert_eq!(results[0].context.as_deref(), Some("wider radio context"));
        assert_eq!(results[0].chunk, "radio");

        let json = serde_json::to_value(&results[0]).unwrap();
        assert_eq!(json["context"], "wider radio context");

        let bare = rank_chunks("radio", &[chunk(8, "Radio", "5g", "radio", None)], 10);
        let json = serde_json::to_value(&bare[0]).unwrap();
        assert!(json.get("context").is_none());
    }

    #[test]
    fn test_explain_matches_rank() {
        let chunks = vec![
            chunk(1, "HCIA-5G", "certification", "hcia 5g exam", None),
            chunk(2, "Other", "misc", "nothing", None),
        ];

        let explained = explain_chunks("HCIA 5G", &chunks, 10);
        let ranked = rank_chunks("HCIA 5G", &chunks, 10);

        assert_eq!(explained.len(), ranked.len());
        assert_eq!(explained[0].result, ranked[0]);
        assert_eq!(explained[0].breakdown.total(), ranked[0].relevance);
    }

    #[test]
    fn test_empty_corpus() {
        let retriever =
            SimpleRetriever::new(CorpusSource::Inline(vec![]), ChunkConfig::default()).unwrap();
        assert!(retriever.search("anything", 10).unwrap().is_empty());

        let dir = TempDir::new().unwrap();
        let retriever = SimpleRetriever::new(
            CorpusSource::Directory(dir.path().to_path_buf()),
            ChunkConfig::default(),
        )
        .unwrap();
        assert!(retriever.search("anything", 10).unwrap().is_empty());
    }

    #[test]
    fn test_retriever_idempotent() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("certification")).unwrap();
        std::fs::write(
            dir.path().join("certification/hcia.md"),
            "# HCIA-5G Certification Overview\n\nThe HCIA 5G exam covers radio and core network.",
        )
        .unwrap();
        std::fs::write(dir.path().join("radio.txt"), "Radio network planning guide.").unwrap();

        let retriever = SimpleRetriever::new(
            CorpusSource::Directory(dir.path().to_path_buf()),
            ChunkConfig::default(),
        )
        .unwrap();

        let first = retriever.search("radio network", 10).unwrap();
        let second = retriever.search("radio network", 10).unwrap();

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_retriever_sees_corpus_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "nothing relevant").unwrap();

        let retriever = SimpleRetriever::new(
            CorpusSource::Directory(dir.path().to_path_buf()),
            ChunkConfig::default(),
        )
        .unwrap();
        assert!(retriever.search("antenna", 10).unwrap().is_empty());

        std::fs::write(&path, "antenna alignment").unwrap();
        assert_eq!(retriever.search("antenna", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_retriever_missing_corpus_errors() {
        let dir = TempDir::new().unwrap();
        let retriever = SimpleRetriever::new(
            CorpusSource::Directory(dir.path().join("missing")),
            ChunkConfig::default(),
        )
        .unwrap();
        assert!(retriever.search("anything", 10).is_err());
    }

    #[test]
    fn test_retriever_rejects_invalid_config() {
        let config = ChunkConfig {
            chunk_words: 10,
            overlap_words: 10,
            context_words: 0,
        };
        assert!(SimpleRetriever::new(CorpusSource::Inline(vec![]), config).is_err());
    }
}
