//! Knowledge 모듈 - 코퍼스 로딩, 청킹, 관련도 검색
//!
//! - Loader: 디렉토리/파일/메모리 코퍼스에서 문서 로딩
//! - Chunker: 고정 크기 단어 윈도우 분할 + 주변 문맥
//! - Search: 가중치 기반 부분 문자열 매칭 랭킹

mod chunker;
mod loader;
mod search;

// Re-exports
pub use chunker::{
    chunk_knowledge, Chunk, ChunkConfig, CHUNK_WORDS_ENV, CONTEXT_WORDS_ENV, FIRST_CHUNK_ID,
    OVERLAP_WORDS_ENV,
};
pub use loader::{
    corpus_fingerprint, get_corpus_path, get_data_dir, load_all_knowledge, load_with_collector,
    CorpusSource, CorpusStats, KnowledgeDocument, CORPUS_ENV, DEFAULT_CATEGORY,
};
pub use search::{
    explain_chunks, rank_chunks, score_chunk, simple_search, tokenize_query, ExplainedResult,
    RelevanceBreakdown, SearchResult, SimpleRetriever, DEFAULT_TOP_K, MAX_DISCARDED_TOKEN_CHARS,
};
