//! Tokenizer
//!
//! 구두점과 공백으로 텍스트를 단어 토큰으로 분할합니다.
//! 기본 토크나이저는 대소문자를 보존합니다 (기존 인덱스와의 호환).

/// 공백으로 취급하는 구두점 집합
///
/// `?`, `'`, `"`, `[`, `]` 등은 포함되지 않으므로 토큰에 남습니다.
const SEPARATORS: &[char] = &[
    '.', ',', '/', '#', '!', '$', '%', '^', '&', '*', ';', ':', '{', '}', '=', '-', '_', '`', '~',
    '(', ')',
];

// ============================================================================
// Tokenizer
// ============================================================================

/// 토크나이저 설정
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tokenizer {
    /// 토큰을 소문자로 정규화
    pub lowercase: bool,
}

impl Tokenizer {
    /// 대소문자 보존 토크나이저
    pub const fn new() -> Self {
        Self { lowercase: false }
    }

    /// 소문자 정규화 토크나이저
    pub const fn lowercase() -> Self {
        Self { lowercase: true }
    }

    /// 텍스트를 토큰 목록으로 분할
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
            .filter(|t| !t.is_empty())
            .map(|t| {
                if self.lowercase {
                    t.to_lowercase()
                } else {
                    t.to_string()
                }
            })
            .collect()
    }

    /// 토큰 개수
    pub fn count_tokens(&self, text: &str) -> usize {
        text.split(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
            .filter(|t| !t.is_empty())
            .count()
    }
}

/// 기본 토크나이저로 분할
pub fn tokenize(text: &str) -> Vec<String> {
    Tokenizer::new().tokenize(text)
}

/// 기본 토크나이저로 토큰 개수 계산
pub fn count_tokens(text: &str) -> usize {
    Tokenizer::new().count_tokens(text)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert_eq!(count_tokens(""), 0);
        assert!(tokenize("  \n\t ").is_empty());
    }

    #[test]
    fn test_tokenize_punctuation_as_separator() {
        let tokens = tokenize("Hello, world! foo-bar_baz (qux) a.b/c");
        assert_eq!(
            tokens,
            vec!["Hello", "world", "foo", "bar", "baz", "qux", "a", "b", "c"]
        );
    }

    #[test]
    fn test_tokenize_keeps_unlisted_punctuation() {
        // ? 와 ' 는 구분자가 아님
        let tokens = tokenize("what's up?");
        assert_eq!(tokens, vec!["what's", "up?"]);
    }

    #[test]
    fn test_tokenize_preserves_case_by_default() {
        assert_eq!(tokenize("Quick FOX"), vec!["Quick", "FOX"]);
        assert_eq!(Tokenizer::lowercase().tokenize("Quick FOX"), vec!["quick", "fox"]);
    }

    #[test]
    fn test_tokenize_idempotent() {
        let original = "The  quick,brown\n\nfox; jumps -- over {the} lazy=dog.";
        let first = tokenize(original);
        let second = tokenize(&first.join(" "));
        assert_eq!(first, second);
    }

    #[test]
    fn test_count_matches_tokenize() {
        let text = "one two, three. four!five";
        assert_eq!(count_tokens(text), tokenize(text).len());
        assert_eq!(count_tokens(text), 5);
    }

    #[test]
    fn test_unicode_text() {
        let tokens = tokenize("안녕하세요, 세계! café");
        assert_eq!(tokens, vec!["안녕하세요", "세계", "café"]);
    }
}
