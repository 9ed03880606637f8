//! CLI 모듈
//!
//! kb-search CLI 명령어 정의 및 구현

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::knowledge::{
    chunk_knowledge, corpus_fingerprint, get_data_dir, ChunkConfig, CorpusSource, CorpusStats,
    SimpleRetriever, DEFAULT_TOP_K,
};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "kb-search")]
#[command(version, about = "경량 지식 검색 도구", long_about = None)]
pub struct Cli {
    /// 코퍼스 경로 (디렉토리 또는 파일, 기본: $KB_SEARCH_CORPUS 또는 ~/.kb-search/corpus)
    #[arg(long, global = true)]
    pub corpus: Option<PathBuf>,

    /// 청크당 단어 수
    #[arg(long, global = true)]
    pub chunk_words: Option<usize>,

    /// 청크 간 중첩 단어 수
    #[arg(long, global = true)]
    pub overlap_words: Option<usize>,

    /// 문맥 윈도우 확장 단어 수
    #[arg(long, global = true)]
    pub context_words: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 지식베이스 검색
    Query {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 제한
        #[arg(short, long, default_value_t = DEFAULT_TOP_K)]
        limit: usize,

        /// JSON으로 출력
        #[arg(long)]
        json: bool,

        /// 점수 내역 출력
        #[arg(long)]
        explain: bool,
    },

    /// 청크 목록
    Chunks {
        /// 카테고리 필터
        #[arg(short, long)]
        category: Option<String>,

        /// 결과 개수 제한
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// 문서 목록
    List {
        /// 카테고리 필터
        #[arg(short, long)]
        category: Option<String>,

        /// 결과 개수 제한
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub fn run(cli: Cli) -> Result<()> {
    let retriever = build_retriever(&cli)?;

    match cli.command {
        Commands::Query {
            query,
            limit,
            json,
            explain,
        } => cmd_query(&retriever, &query, limit, json, explain),
        Commands::Chunks { category, limit } => cmd_chunks(&retriever, category, limit),
        Commands::List { category, limit } => cmd_list(&retriever, category, limit),
        Commands::Status => cmd_status(&retriever),
    }
}

/// 전역 옵션 > 환경변수 > 기본값 순으로 검색기 구성
fn build_retriever(cli: &Cli) -> Result<SimpleRetriever> {
    build_retriever_with(cli, |key| std::env::var(key).ok())
}

/// 청킹 설정은 환경변수와 플래그를 모두 적용한 뒤 한 번만 검증
fn build_retriever_with(
    cli: &Cli,
    var: impl Fn(&str) -> Option<String>,
) -> Result<SimpleRetriever> {
    let source = match cli.corpus {
        Some(ref path) => CorpusSource::from_path(path),
        None => CorpusSource::from_env(),
    };

    let mut config = ChunkConfig::default()
        .with_overrides_from(var)
        .context("청킹 설정 로드 실패")?;
    if let Some(v) = cli.chunk_words {
        config.chunk_words = v;
    }
    if let Some(v) = cli.overlap_words {
        config.overlap_words = v;
    }
    if let Some(v) = cli.context_words {
        config.context_words = v;
    }

    SimpleRetriever::new(source, config).context("검색기 초기화 실패")
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 검색 명령어 (query)
fn cmd_query(
    retriever: &SimpleRetriever,
    query: &str,
    limit: usize,
    json: bool,
    explain: bool,
) -> Result<()> {
    if json {
        let output = if explain {
            serde_json::to_string_pretty(&retriever.search_explained(query, limit)?)
        } else {
            serde_json::to_string_pretty(&retriever.search(query, limit)?)
        }
        .context("JSON 직렬화 실패")?;
        println!("{}", output);
        return Ok(());
    }

    println!("[*] 검색 중: \"{}\"", query);

    let results = retriever
        .search_explained(query, limit)
        .context("검색 실패")?;

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());

    for (i, explained) in results.iter().enumerate() {
        let result = &explained.result;

        println!(
            "{}. [점수: {}] Chunk #{} [{}]",
            i + 1,
            result.relevance,
            result.id,
            result.category
        );
        println!("   제목: {}", result.title);
        println!("   내용: {}", truncate_text(&result.chunk, 200));

        if explain {
            let b = &explained.breakdown;
            println!(
                "   내역: 제목 {} + 카테고리 {} + 본문 {} + 구문 {} + 다중일치 {} + 문맥 {}",
                b.title, b.category, b.text, b.phrase, b.multi_match, b.context
            );
        }

        println!();
    }

    Ok(())
}

/// 청크 목록 명령어 (chunks)
fn cmd_chunks(retriever: &SimpleRetriever, category: Option<String>, limit: usize) -> Result<()> {
    let chunks = retriever.load_chunks().context("코퍼스 로드 실패")?;

    let chunks: Vec<_> = chunks
        .into_iter()
        .filter(|c| matches_category(&c.category, category.as_deref()))
        .take(limit)
        .collect();

    if chunks.is_empty() {
        println!("[!] 청크가 없습니다.");
        return Ok(());
    }

    println!("[OK] 청크 ({} 건):\n", chunks.len());

    for chunk in chunks {
        println!(
            "  #{:<5} [{}] {} (part {})",
            chunk.id,
            chunk.category,
            truncate_text(&chunk.title, 40),
            chunk.chunk_index + 1
        );
        println!("         {}", truncate_text(&chunk.text, 100));
    }

    Ok(())
}

/// 목록 명령어 (list)
fn cmd_list(retriever: &SimpleRetriever, category: Option<String>, limit: usize) -> Result<()> {
    let docs = retriever.load_documents().context("코퍼스 로드 실패")?;

    let docs: Vec<_> = docs
        .into_iter()
        .filter(|d| matches_category(&d.category, category.as_deref()))
        .take(limit)
        .collect();

    if docs.is_empty() {
        println!("[!] 문서가 없습니다.");
        return Ok(());
    }

    println!("[OK] 문서 ({} 건):\n", docs.len());

    for (i, doc) in docs.iter().enumerate() {
        println!(
            "  {:<4} [{}] {}",
            i + 1,
            doc.category,
            truncate_text(&doc.title, 40)
        );
        if let Some(ref source) = doc.source {
            println!("       파일: {}", source.display());
        }
        let modified = doc
            .modified_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("       {} | {} chars", modified, doc.body.chars().count());
        println!();
    }

    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status(retriever: &SimpleRetriever) -> Result<()> {
    println!("kb-search v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", get_data_dir().display());
    println!("[*] 코퍼스: {}", retriever.source().describe());

    let config = retriever.chunk_config();
    println!(
        "[*] 청킹: {} 단어, 오버랩 {}, 문맥 ±{}",
        config.chunk_words, config.overlap_words, config.context_words
    );

    match retriever.load_documents() {
        Ok(docs) => {
            let stats = CorpusStats::from_documents(&docs);
            let chunk_count = chunk_knowledge(&docs, config).len();

            println!(
                "[OK] 문서: {} 건 ({} 카테고리)",
                stats.document_count, stats.category_count
            );
            println!("     청크: {} 개", chunk_count);
            println!("     총 콘텐츠: {}", format_bytes(stats.total_body_bytes));
            println!("     지문: {}", corpus_fingerprint(&docs));
        }
        Err(e) => {
            println!("[!] 코퍼스 로드 실패: {}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 카테고리 필터 (대소문자 무시)
fn matches_category(category: &str, filter: Option<&str>) -> bool {
    filter.map_or(true, |f| category.eq_ignore_ascii_case(f))
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
