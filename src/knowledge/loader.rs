//! Knowledge Loader - 코퍼스에서 지식 문서 로딩
//!
//! 코퍼스는 디렉토리, 단일 파일, 또는 메모리 내 문서 목록입니다.
//! 호출할 때마다 새로 읽으며 캐시하지 않습니다.
//!
//! 디렉토리 레이아웃:
//! ```text
//! corpus/
//! ├── certification/        ← 카테고리
//! │   ├── hcia-5g.md        ← 첫 헤더가 제목
//! │   └── faq.json          ← 문서 객체 또는 배열
//! └── intro.txt             ← 루트 파일은 "general" 카테고리
//! ```

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::collector::{CollectedFile, FileCollector, FileType};
use crate::error::{KnowledgeError, Result};

/// 카테고리를 알 수 없는 문서의 기본 카테고리
pub const DEFAULT_CATEGORY: &str = "general";

/// 코퍼스 경로 환경변수
pub const CORPUS_ENV: &str = "KB_SEARCH_CORPUS";

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.kb-search/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".kb-search")
}

/// 코퍼스 경로
///
/// `KB_SEARCH_CORPUS`가 설정되어 있으면 그 경로, 아니면 `~/.kb-search/corpus`
pub fn get_corpus_path() -> PathBuf {
    match std::env::var(CORPUS_ENV) {
        Ok(path) if !path.trim().is_empty() => {
            tracing::debug!("Using corpus path from {}", CORPUS_ENV);
            PathBuf::from(path)
        }
        _ => get_data_dir().join("corpus"),
    }
}

// ============================================================================
// Types
// ============================================================================

/// 지식 문서
///
/// JSON 코퍼스에서는 `body` 대신 `content` 키도 허용합니다.
/// 출처 정보(`source`, `modified_at`)는 로더가 채웁니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(alias = "content")]
    pub body: String,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl KnowledgeDocument {
    /// 출처 없는 문서 생성
    pub fn new(
        title: impl Into<String>,
        category: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            category: category.into(),
            body: body.into(),
            source: None,
            modified_at: None,
        }
    }
}

/// JSON 코퍼스 파일 형식 (배열 또는 단일 객체)
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonCorpus {
    Many(Vec<KnowledgeDocument>),
    One(KnowledgeDocument),
}

/// 코퍼스 소스
#[derive(Debug, Clone)]
pub enum CorpusSource {
    /// 디렉토리 재귀 (1단계 하위 디렉토리 = 카테고리)
    Directory(PathBuf),
    /// 단일 파일
    File(PathBuf),
    /// 메모리 내 문서
    Inline(Vec<KnowledgeDocument>),
}

impl CorpusSource {
    /// 경로 종류에 따라 소스 결정
    ///
    /// 존재하지 않는 경로는 디렉토리로 취급하고, 로딩 시점에 실패합니다.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_file() {
            Self::File(path)
        } else {
            Self::Directory(path)
        }
    }

    /// 환경변수/기본 경로에서 소스 결정
    pub fn from_env() -> Self {
        Self::from_path(get_corpus_path())
    }

    /// 표시용 설명
    pub fn describe(&self) -> String {
        match self {
            Self::Directory(path) => format!("dir:{}", path.display()),
            Self::File(path) => format!("file:{}", path.display()),
            Self::Inline(docs) => format!("inline ({} documents)", docs.len()),
        }
    }
}

/// 코퍼스 통계
#[derive(Debug, Clone, Serialize)]
pub struct CorpusStats {
    pub document_count: usize,
    pub category_count: usize,
    pub total_body_bytes: usize,
}

impl CorpusStats {
    pub fn from_documents(documents: &[KnowledgeDocument]) -> Self {
        let mut categories: Vec<&str> = documents.iter().map(|d| d.category.as_str()).collect();
        categories.sort_unstable();
        categories.dedup();

        Self {
            document_count: documents.len(),
            category_count: categories.len(),
            total_body_bytes: documents.iter().map(|d| d.body.len()).sum(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

/// 코퍼스 전체 로딩 (기본 수집기 설정)
///
/// 문서 순서는 결정적입니다 (파일 경로 순, 파일 내 순서).
pub fn load_all_knowledge(source: &CorpusSource) -> Result<Vec<KnowledgeDocument>> {
    load_with_collector(source, &FileCollector::with_defaults())
}

/// 수집기를 지정하여 코퍼스 로딩
pub fn load_with_collector(
    source: &CorpusSource,
    collector: &FileCollector,
) -> Result<Vec<KnowledgeDocument>> {
    let documents = match source {
        CorpusSource::Inline(docs) => docs.clone(),
        CorpusSource::File(path) => match collector.collect_file(path)? {
            Some(file) => parse_file(&file, DEFAULT_CATEGORY)?,
            None => {
                tracing::warn!("Unsupported corpus file: {:?}", path);
                vec![]
            }
        },
        CorpusSource::Directory(root) => {
            let files = collector.collect_directory(root)?;
            let mut documents = Vec::new();
            for file in &files {
                let category = category_for(root, &file.path);
                documents.extend(parse_file(file, &category)?);
            }
            documents
        }
    };

    tracing::debug!(
        "Loaded {} documents from {}",
        documents.len(),
        source.describe()
    );
    Ok(documents)
}

/// 수집된 파일을 문서로 변환
fn parse_file(file: &CollectedFile, category: &str) -> Result<Vec<KnowledgeDocument>> {
    let text =
        std::fs::read_to_string(&file.path).map_err(|e| KnowledgeError::io(&file.path, e))?;
    let modified_at = file.modified_at.map(DateTime::<Utc>::from);
    let stem = file
        .path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string();

    let mut documents = match file.file_type {
        FileType::Markdown => {
            let (title, body) = split_markdown_title(&text);
            vec![KnowledgeDocument::new(title.unwrap_or(stem), category, body)]
        }
        FileType::Text => vec![KnowledgeDocument::new(stem, category, text.trim())],
        FileType::Json => {
            let parsed: JsonCorpus =
                serde_json::from_str(&text).map_err(|e| KnowledgeError::Json {
                    path: file.path.clone(),
                    source: e,
                })?;
            let mut docs = match parsed {
                JsonCorpus::Many(docs) => docs,
                JsonCorpus::One(doc) => vec![doc],
            };
            for doc in &mut docs {
                if doc.category.trim().is_empty() {
                    doc.category = category.to_string();
                }
            }
            docs
        }
    };

    for doc in &mut documents {
        doc.source = Some(file.path.clone());
        doc.modified_at = modified_at;
    }

    Ok(documents)
}

/// 코퍼스 루트 기준 첫 번째 하위 디렉토리 이름
fn category_for(root: &Path, path: &Path) -> String {
    let root = if root.is_absolute() {
        root.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(root))
            .unwrap_or_else(|_| root.to_path_buf())
    };

    let Ok(relative) = path.strip_prefix(&root) else {
        return DEFAULT_CATEGORY.to_string();
    };

    let mut components = relative.components();
    match (components.next(), components.next()) {
        (Some(first), Some(_)) => first.as_os_str().to_string_lossy().into_owned(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#{1,6}\s+(.+?)\s*#*\s*$").expect("valid heading pattern"))
}

/// 마크다운 첫 헤더를 제목으로 분리
///
/// 헤더 줄은 본문에서 제거됩니다. 헤더가 없으면 `(None, 원문)`.
fn split_markdown_title(text: &str) -> (Option<String>, String) {
    let mut title = None;
    let mut body_lines = Vec::new();

    for line in text.lines() {
        if title.is_none() {
            if let Some(caps) = heading_re().captures(line.trim_end()) {
                title = Some(caps[1].to_string());
                continue;
            }
        }
        body_lines.push(line);
    }

    (title, body_lines.join("\n").trim().to_string())
}

// ============================================================================
// Fingerprint
// ============================================================================

/// 코퍼스 지문 (SHA-256 hex)
///
/// 문서 내용이나 순서가 바뀌면 청크 ID도 바뀔 수 있으므로,
/// 외부 캐시 계층이 무효화 판단에 사용합니다.
pub fn corpus_fingerprint(documents: &[KnowledgeDocument]) -> String {
    let mut hasher = Sha256::new();
    for doc in documents {
        hasher.update(doc.title.as_bytes());
        hasher.update([0u8]);
        hasher.update(doc.category.as_bytes());
        hasher.update([0u8]);
        hasher.update(doc.body.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// Tests
// ============================================================================
