//! CLI 모듈
//!
//! page-search CLI 명령어 정의 및 구현

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{get_data_dir, EngineConfig, VectorBackend};
use crate::knowledge::{chunk_text, RetrievalEngine, ScoredResult, TextChunk};
use crate::scraper::WebScraper;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "page-search")]
#[command(version, about = "웹 페이지 청킹 + 관련도 검색", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 입력 소스 (셋 중 하나)
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct InputSource {
    /// 스크랩할 URL
    #[arg(short, long)]
    pub url: Option<String>,

    /// 직접 입력할 텍스트
    #[arg(short, long)]
    pub text: Option<String>,

    /// 읽을 텍스트 파일 경로
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 입력을 청킹/인덱싱한 뒤 쿼리로 검색
    Search {
        /// 검색 쿼리
        query: String,

        #[command(flatten)]
        source: InputSource,

        /// 결과 개수 제한 (기본: 설정값)
        #[arg(short, long)]
        limit: Option<usize>,

        /// 청크 당 최대 토큰 수 (기본: 설정값)
        #[arg(short, long)]
        max_tokens: Option<usize>,

        /// JSON 출력
        #[arg(long)]
        json: bool,
    },

    /// 입력을 청크로 분할하여 출력
    Chunk {
        #[command(flatten)]
        source: InputSource,

        /// 청크 당 최대 토큰 수 (기본: 설정값)
        #[arg(short, long)]
        max_tokens: Option<usize>,

        /// JSON 출력
        #[arg(long)]
        json: bool,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = EngineConfig::from_env().context("설정 로드 실패")?;

    match cli.command {
        Commands::Search {
            query,
            source,
            limit,
            max_tokens,
            json,
        } => cmd_search(&config, &query, source, limit, max_tokens, json).await,
        Commands::Chunk {
            source,
            max_tokens,
            json,
        } => cmd_chunk(&config, source, max_tokens, json).await,
        Commands::Status => cmd_status(&config).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 검색 명령어 (search)
///
/// 입력 텍스트를 청킹해 인덱싱한 뒤 쿼리에 맞는 청크를 출력합니다.
async fn cmd_search(
    config: &EngineConfig,
    query: &str,
    source: InputSource,
    limit: Option<usize>,
    max_tokens: Option<usize>,
    json: bool,
) -> Result<()> {
    let (text, source_name) = load_source(&source, json).await?;
    let chunks = chunk_text(&text, max_tokens.unwrap_or(config.max_tokens));

    let engine = RetrievalEngine::from_config(config)
        .await
        .context("검색 엔진 초기화 실패")?;

    if !json {
        println!("[*] {} 청크 인덱싱 중...", chunks.len());
    }

    let records = chunks
        .into_iter()
        .map(|chunk| chunk.into_record(Some(source_name.clone())))
        .collect();

    let report = engine.index(records).await;
    if let Some(reason) = report.reason() {
        eprintln!("[!] 벡터 인덱스 저장 실패, 인메모리 검색 사용: {}", reason);
    }

    let limit = limit.unwrap_or_else(|| engine.default_limit());
    let outcome = engine.search(query, limit).await;
    if let Some(reason) = outcome.reason() {
        eprintln!("[!] 벡터 검색 실패, 인메모리 랭킹으로 대체: {}", reason);
    }
    let results = outcome.into_inner();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&results).context("JSON 직렬화 실패")?
        );
        return Ok(());
    }

    print_results(query, &results);
    Ok(())
}

/// 청킹 명령어 (chunk)
async fn cmd_chunk(
    config: &EngineConfig,
    source: InputSource,
    max_tokens: Option<usize>,
    json: bool,
) -> Result<()> {
    let (text, _) = load_source(&source, json).await?;
    let chunks = chunk_text(&text, max_tokens.unwrap_or(config.max_tokens));

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&chunks).context("JSON 직렬화 실패")?
        );
        return Ok(());
    }

    print_chunks(&chunks);
    Ok(())
}

/// 상태 명령어 (status)
///
/// 설정과 벡터 백엔드 상태를 확인합니다.
async fn cmd_status(config: &EngineConfig) -> Result<()> {
    println!("page-search v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", get_data_dir().display());
    println!("[*] 청크 토큰 예산: {}", config.max_tokens);
    println!("[*] 기본 결과 수: {}", config.default_limit);
    println!("[*] 관련도 하한: {}%", config.relevance_floor);
    println!(
        "[*] 토큰 소문자 정규화: {}",
        if config.lowercase_tokens { "켜짐" } else { "꺼짐" }
    );

    match config.vector_backend {
        VectorBackend::Disabled => {
            println!("[OK] 벡터 백엔드: 없음 (BM25+ 인메모리 랭킹)");
            return Ok(());
        }
        VectorBackend::Memory => println!("[OK] 벡터 백엔드: memory"),
        VectorBackend::Lance => {
            println!("[*] 벡터 백엔드: lance ({})", config.lance_path.display());
            println!("    컬렉션: {}", config.collection);
        }
    }

    match RetrievalEngine::from_config(config).await {
        Ok(engine) => {
            let stats = engine.stats().await;
            match (stats.vector_backend, stats.vector_count) {
                (Some(name), Some(count)) => {
                    println!("[OK] 벡터 인덱스 ({}): {} 청크", name, count)
                }
                (Some(name), None) => println!("[!] 벡터 인덱스 ({}): 조회 실패", name),
                (None, _) => println!("[!] 벡터 백엔드를 열 수 없습니다"),
            }
        }
        Err(e) => {
            println!("[!] 검색 엔진 초기화 실패: {}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 입력 소스에서 텍스트 로드 (텍스트, 출처 이름)
async fn load_source(source: &InputSource, quiet: bool) -> Result<(String, String)> {
    if let Some(ref url) = source.url {
        if !quiet {
            println!("[*] URL 스크래핑 중: {}", url);
        }

        let scraper = WebScraper::new().context("WebScraper 생성 실패")?;
        let page = scraper.scrape(url).await.context("URL 스크래핑 실패")?;

        if !quiet {
            if let Some(ref title) = page.title {
                println!("[OK] 제목: {}", title);
            }
            println!("[OK] 본문: {}", format_bytes(page.text.len()));
        }

        Ok((page.text, page.url))
    } else if let Some(ref text) = source.text {
        Ok((text.clone(), "direct-input".to_string()))
    } else if let Some(ref path) = source.file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("파일 읽기 실패: {}", path.display()))?;
        Ok((text, format!("file://{}", path.display())))
    } else {
        bail!("--url, --text, --file 중 하나를 지정해야 합니다");
    }
}

fn print_results(query: &str, results: &[ScoredResult]) {
    if results.is_empty() {
        println!("\n[!] \"{}\"에 대한 검색 결과가 없습니다.", query);
        return;
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:>3}%] [점수: {:.4}] Chunk #{} ({} tokens)",
            i + 1,
            result.relevance_percentage,
            result.score,
            result.id,
            result.token_count
        );

        if let Some(ref source) = result.source {
            println!("   출처: {}", source);
        }

        println!("   내용: {}", truncate_text(&result.text, 200));
        println!();
    }
}

fn print_chunks(chunks: &[TextChunk]) {
    if chunks.is_empty() {
        println!("[!] 청크가 없습니다.");
        return;
    }

    let total_tokens: usize = chunks.iter().map(|c| c.token_count).sum();
    println!("[OK] {} 청크, 총 {} 토큰\n", chunks.len(), total_tokens);

    for chunk in chunks {
        println!("  #{:<4} {} tokens", chunk.id, chunk.token_count);
        println!("        {}", truncate_text(&chunk.text, 120));
        println!();
    }
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
