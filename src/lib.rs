//! kb-search - 경량 지식 검색 도구
//!
//! 지식 문서를 고정 크기 청크로 나누고, 쿼리와의 어휘 일치도로
//! 청크를 랭킹하여 상위 K개를 반환합니다.
//! 인덱스나 임베딩 없이 매 검색마다 코퍼스를 다시 읽습니다.

pub mod cli;
pub mod collector;
pub mod error;
pub mod knowledge;

// Re-exports
pub use error::KnowledgeError;
pub use knowledge::{
    chunk_knowledge, corpus_fingerprint, get_data_dir, load_all_knowledge, rank_chunks,
    simple_search, tokenize_query, Chunk, ChunkConfig, CorpusSource, KnowledgeDocument,
    RelevanceBreakdown, SearchResult, SimpleRetriever, DEFAULT_TOP_K,
};
