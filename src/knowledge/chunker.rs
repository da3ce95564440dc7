//! Text Chunking Module
//!
//! 토큰 예산 기반 텍스트 분할을 제공합니다.
//! 문단 → 문장 → 토큰 순으로 점점 작은 단위로 내려가며 청크를 채웁니다.

use serde::Serialize;

use super::corpus::NewChunk;
use super::tokenizer::{count_tokens, tokenize};

/// 기본 청크 토큰 예산
pub const DEFAULT_MAX_TOKENS: usize = 500;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 청크 당 최대 토큰 수 (0은 1로 취급)
    pub max_tokens: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl ChunkConfig {
    pub fn with_max_tokens(max_tokens: usize) -> Self {
        Self { max_tokens }
    }
}

/// 분할된 텍스트 청크
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextChunk {
    /// 출력 순서 (0-based)
    pub id: usize,
    pub text: String,
    pub token_count: usize,
}

impl TextChunk {
    /// 인덱싱 입력 레코드로 변환 (토큰 수 캐시 유지)
    pub fn into_record(self, source: Option<String>) -> NewChunk {
        NewChunk {
            id: Some(self.id.to_string()),
            text: self.text,
            source,
            token_count: Some(self.token_count),
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<TextChunk>;
}

// ============================================================================
// TokenBudgetChunker
// ============================================================================

/// 토큰 예산 청커
///
/// - 문단을 `\n`으로 이어 붙이며 예산까지 채움
/// - 예산을 넘는 문단은 문장 단위(`.!?` + 공백)로 분할
/// - 예산을 넘는 문장은 정확히 `max_tokens` 개씩 토큰 그룹으로 분할
pub struct TokenBudgetChunker {
    config: ChunkConfig,
}

impl TokenBudgetChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    fn max_tokens(&self) -> usize {
        self.config.max_tokens.max(1)
    }

    /// 긴 문단을 문장 단위로 누적
    fn pack_sentences(&self, paragraph: &str, acc: &mut Accumulator) {
        let max_tokens = self.max_tokens();

        for sentence in split_sentences(paragraph) {
            let sentence_tokens = count_tokens(sentence);

            if sentence_tokens > max_tokens {
                // 문장 자체가 예산 초과: 토큰 그룹으로 직접 분할
                acc.flush();
                let tokens = tokenize(sentence);
                for group in tokens.chunks(max_tokens) {
                    acc.emit(group.join(" "));
                }
            } else if acc.tokens + sentence_tokens > max_tokens {
                acc.flush();
                acc.append(sentence, sentence_tokens, " ");
            } else {
                acc.append(sentence, sentence_tokens, " ");
            }
        }
    }
}

impl Chunker for TokenBudgetChunker {
    fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let max_tokens = self.max_tokens();
        let mut acc = Accumulator::default();

        for paragraph in text.split('\n').filter(|p| !p.is_empty()) {
            let paragraph_tokens = count_tokens(paragraph);

            if paragraph_tokens > max_tokens {
                acc.flush();
                self.pack_sentences(paragraph, &mut acc);
            } else if acc.tokens + paragraph_tokens > max_tokens {
                acc.flush();
                acc.append(paragraph, paragraph_tokens, "\n");
            } else {
                acc.append(paragraph, paragraph_tokens, "\n");
            }
        }

        acc.flush();

        acc.chunks
            .into_iter()
            .enumerate()
            .map(|(id, text)| TextChunk {
                id,
                token_count: count_tokens(&text),
                text,
            })
            .collect()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 진행 중인 청크 누적기
#[derive(Default)]
struct Accumulator {
    current: String,
    tokens: usize,
    chunks: Vec<String>,
}

impl Accumulator {
    fn append(&mut self, piece: &str, tokens: usize, separator: &str) {
        if !self.current.is_empty() {
            self.current.push_str(separator);
        }
        self.current.push_str(piece);
        self.tokens += tokens;
    }

    /// 현재 청크 저장 (빈 청크는 버림)
    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.chunks.push(std::mem::take(&mut self.current));
        }
        self.tokens = 0;
    }

    fn emit(&mut self, text: String) {
        if !text.is_empty() {
            self.chunks.push(text);
        }
    }
}

/// 문장 경계(`.`, `!`, `?` 뒤의 공백 연속)에서 분할
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    let mut chars = paragraph.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c.is_whitespace() && matches!(prev, Some('.' | '!' | '?')) {
            sentences.push(&paragraph[start..i]);

            let mut end = i + c.len_utf8();
            while let Some(&(j, next)) = chars.peek() {
                if !next.is_whitespace() {
                    break;
                }
                end = j + next.len_utf8();
                chars.next();
            }

            start = end;
            prev = None;
            continue;
        }
        prev = Some(c);
    }

    sentences.push(&paragraph[start..]);
    sentences.retain(|s| !s.is_empty());
    sentences
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 토큰 예산을 지정하여 분할
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<TextChunk> {
    TokenBudgetChunker::new(ChunkConfig::with_max_tokens(max_tokens)).chunk(text)
}

// ============================================================================
// Tests
// ============================================================================
