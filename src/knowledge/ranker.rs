//! Ranker - BM25+ 기반 관련도 랭킹
//!
//! 1. 어휘 점수 (BM25+) + 구문 일치 / 위치 부스트
//! 2. 어휘 일치가 하나도 없으면 퍼지 점수 (가중 겹침 + Jaccard)
//! 3. 최고 점수 대비 백분율로 정규화, 하한(15%) 미만 제거
//!
//! ref: Robertson & Zaragoza (2009), "The Probabilistic Relevance Framework: BM25 and Beyond"

use std::collections::HashSet;

use serde::Serialize;

use super::corpus::{Chunk, Corpus};

/// 기본 관련도 하한 (%)
pub const DEFAULT_RELEVANCE_FLOOR: u32 = 15;

// ============================================================================
// Types
// ============================================================================

/// 검색 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredResult {
    pub id: String,
    pub text: String,
    pub source: Option<String>,
    pub token_count: usize,
    /// 정규화 점수 (0.0 ~ 1.0)
    pub score: f32,
    /// 최고 점수 대비 관련도 (0 ~ 100)
    pub relevance_percentage: u32,
}

/// 결과를 만든 랭킹 전략
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// BM25+ 어휘 점수
    Lexical,
    /// 퍼지 폴백 (가중 겹침 + Jaccard)
    Fuzzy,
    /// 후보 없음
    None,
}

/// 랭킹 결과
#[derive(Debug, Clone)]
pub struct Ranking {
    pub strategy: Strategy,
    pub results: Vec<ScoredResult>,
}

/// 랭킹 파라미터
#[derive(Debug, Clone)]
pub struct RankerParams {
    /// 단어 빈도 포화
    pub k1: f64,
    /// 길이 정규화
    pub b: f64,
    /// BM25+ 하한 상수
    pub delta: f64,
    /// 전체 쿼리 구문 일치 시 배율
    pub phrase_boost: f64,
    /// 위치 부스트 최대 비율
    pub position_weight: f64,
    /// 관련도 하한 (%)
    pub relevance_floor: u32,
}

impl Default for RankerParams {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            delta: 1.0,
            phrase_boost: 1.5,
            position_weight: 0.3,
            relevance_floor: DEFAULT_RELEVANCE_FLOOR,
        }
    }
}

/// 정규화 전 후보
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub id: &'a str,
    pub text: &'a str,
    pub source: Option<&'a str>,
    pub token_count: usize,
    pub raw_score: f64,
}

impl<'a> Candidate<'a> {
    fn from_chunk(chunk: &'a Chunk, raw_score: f64) -> Self {
        Self {
            id: chunk.id(),
            text: chunk.text(),
            source: chunk.source(),
            token_count: chunk.token_count(),
            raw_score,
        }
    }
}

// ============================================================================
// Ranker
// ============================================================================

/// 인메모리 랭커
#[derive(Debug, Clone, Default)]
pub struct Ranker {
    params: RankerParams,
}

impl Ranker {
    pub fn new(params: RankerParams) -> Self {
        Self { params }
    }

    /// 코퍼스 랭킹
    ///
    /// # Arguments
    /// * `query` - 원본 쿼리 (구문 부스트용)
    /// * `query_tokens` - 토큰화된 쿼리
    /// * `corpus` - 코퍼스 스냅샷
    /// * `limit` - 최대 결과 수
    pub fn rank(
        &self,
        query: &str,
        query_tokens: &[String],
        corpus: &Corpus,
        limit: usize,
    ) -> Ranking {
        if query.is_empty() || query_tokens.is_empty() || corpus.is_empty() || limit == 0 {
            return Ranking {
                strategy: Strategy::None,
                results: vec![],
            };
        }

        let lexical = self.lexical_candidates(query, query_tokens, corpus);
        let (strategy, candidates) = if !lexical.is_empty() {
            (Strategy::Lexical, lexical)
        } else {
            (Strategy::Fuzzy, self.fuzzy_candidates(query_tokens, corpus))
        };

        let results = self.normalize(candidates, limit, |pct, _| pct as f32 / 100.0);
        let strategy = if results.is_empty() {
            Strategy::None
        } else {
            strategy
        };

        Ranking { strategy, results }
    }

    /// Strategy A: BM25+ 점수 + 부스트
    pub fn lexical_candidates<'a>(
        &self,
        query: &str,
        query_tokens: &[String],
        corpus: &'a Corpus,
    ) -> Vec<Candidate<'a>> {
        let p = &self.params;
        let n = corpus.len() as f64;
        let avg_doc_length = corpus.avg_doc_length();

        // 쿼리 토큰별 IDF (중복 토큰은 같은 값)
        let idfs: Vec<f64> = query_tokens
            .iter()
            .map(|token| {
                let df = corpus.document_frequency(token) as f64;
                (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
            })
            .collect();

        let query_set: HashSet<&str> = query_tokens.iter().map(String::as_str).collect();
        let query_lower = query.to_lowercase();

        corpus
            .chunks()
            .iter()
            .filter_map(|chunk| {
                let doc_length = chunk.token_count() as f64;
                let length_ratio = if avg_doc_length > 0.0 {
                    doc_length / avg_doc_length
                } else {
                    0.0
                };

                let mut score = 0.0;
                for (token, idf) in query_tokens.iter().zip(&idfs) {
                    let tf = chunk.term_frequency(token) as f64;
                    if tf > 0.0 {
                        let tf_component =
                            ((p.k1 + 1.0) * tf) / (p.k1 * (1.0 - p.b + p.b * length_ratio) + tf);
                        score += idf * (tf_component + p.delta);
                    }
                }

                if chunk.text().to_lowercase().contains(&query_lower) {
                    score *= p.phrase_boost;
                }

                if let Some(first) = first_match_position(chunk.tokens(), &query_set) {
                    let position_factor = 1.0 - first as f64 / (doc_length + 1.0);
                    score *= 1.0 + position_factor * p.position_weight;
                }

                (score > 0.0).then(|| Candidate::from_chunk(chunk, score))
            })
            .collect()
    }

    /// Strategy B: 가중 겹침 70% + Jaccard 30%
    pub fn fuzzy_candidates<'a>(
        &self,
        query_tokens: &[String],
        corpus: &'a Corpus,
    ) -> Vec<Candidate<'a>> {
        corpus
            .chunks()
            .iter()
            .filter_map(|chunk| {
                let score = fuzzy_score(query_tokens, chunk);
                (score > 0.0).then(|| Candidate::from_chunk(chunk, score))
            })
            .collect()
    }

    /// 백분율 정규화 + 하한 필터 + 안정 정렬 + 절단
    ///
    /// `score_of(percentage, raw_score)`로 결과 점수를 정합니다.
    pub fn normalize<F>(
        &self,
        candidates: Vec<Candidate<'_>>,
        limit: usize,
        score_of: F,
    ) -> Vec<ScoredResult>
    where
        F: Fn(u32, f64) -> f32,
    {
        let max_score = candidates
            .iter()
            .map(|c| c.raw_score)
            .fold(f64::NEG_INFINITY, f64::max);

        if candidates.is_empty() || max_score <= 0.0 {
            return vec![];
        }

        let mut results: Vec<ScoredResult> = candidates
            .into_iter()
            .filter(|c| c.raw_score > 0.0)
            .filter_map(|c| {
                let percentage = relevance_percentage(c.raw_score, max_score);
                (percentage >= self.params.relevance_floor).then(|| ScoredResult {
                    id: c.id.to_string(),
                    text: c.text.to_string(),
                    source: c.source.map(str::to_string),
                    token_count: c.token_count,
                    score: score_of(percentage, c.raw_score),
                    relevance_percentage: percentage,
                })
            })
            .collect();

        // sort_by는 안정 정렬: 동점은 원래 순서 유지
        results.sort_by(|a, b| b.relevance_percentage.cmp(&a.relevance_percentage));
        results.truncate(limit);
        results
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// `round(min(100, raw / max * 100))`
pub fn relevance_percentage(raw_score: f64, max_score: f64) -> u32 {
    let pct = (raw_score / max_score * 100.0).round().min(100.0);
    if pct.is_nan() || pct < 0.0 {
        0
    } else {
        pct as u32
    }
}

/// 쿼리 토큰이 처음 등장하는 청크 토큰 위치
fn first_match_position(doc_tokens: &[String], query_set: &HashSet<&str>) -> Option<usize> {
    doc_tokens
        .iter()
        .position(|token| query_set.contains(token.as_str()))
}

/// 퍼지 유사도
///
/// 쿼리 앞쪽 토큰일수록 가중치가 큽니다 (`len - position`).
fn fuzzy_score(query_tokens: &[String], chunk: &Chunk) -> f64 {
    let query_set: HashSet<&str> = query_tokens.iter().map(String::as_str).collect();

    let intersection = query_set.iter().filter(|t| chunk.contains_token(t)).count();
    let union = query_set.len() + chunk.distinct_tokens() - intersection;
    let jaccard = if union > 0 {
        intersection as f64 / union as f64
    } else {
        0.0
    };

    let len = query_tokens.len();
    let mut weighted_overlap = 0.0;
    let mut total_weight = 0.0;
    for (position, token) in query_tokens.iter().enumerate() {
        let weight = (len - position) as f64;
        total_weight += weight;
        if chunk.contains_token(token) {
            weighted_overlap += weight;
        }
    }

    let weighted_score = if total_weight > 0.0 {
        weighted_overlap / total_weight
    } else {
        0.0
    };

    weighted_score * 0.7 + jaccard * 0.3
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::corpus::NewChunk;
    use crate::knowledge::tokenizer::{tokenize, Tokenizer};

    fn corpus(texts: &[&str]) -> Corpus {
        Corpus::build(
            texts.iter().map(|t| NewChunk::new(*t)).collect(),
            Tokenizer::default(),
        )
    }

    fn rank(query: &str, corpus: &Corpus, limit: usize) -> Ranking {
        Ranker::default().rank(query, &tokenize(query), corpus, limit)
    }

    #[test]
    fn test_quick_fox_scenario() {
        let corpus = corpus(&["The quick brown fox", "Lazy dogs sleep all day"]);
        let ranking = rank("quick fox", &corpus, 10);

        assert_eq!(ranking.strategy, Strategy::Lexical);
        assert_eq!(ranking.results.len(), 1);
        assert_eq!(ranking.results[0].id, "0");
        assert_eq!(ranking.results[0].relevance_percentage, 100);
        assert!((ranking.results[0].score - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_bm25_plus_single_chunk_value() {
        // N=1, df=1: idf = ln(1 + 0.5/1.5); docLen == avg: tf_c = 2.5*1/(1.5+1) = 1
        let corpus = corpus(&["alpha beta"]);
        let tokens = tokenize("beta");
        let candidates = Ranker::default().lexical_candidates("beta", &tokens, &corpus);

        let idf = (1.0f64 + 0.5 / 1.5).ln();
        // 구문 일치 1.5배, 첫 일치 위치 1: 1 + (1 - 1/3) * 0.3 = 1.2
        let expected = idf * (1.0 + 1.0) * 1.5 * 1.2;
        assert_eq!(candidates.len(), 1);
        assert!((candidates[0].raw_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_results_sorted_floored_and_limited() {
        let corpus = corpus(&[
            "rust rust rust language",
            "rust compiler",
            "python language",
            "rust",
            "gardening tips for spring",
        ]);
        let ranking = rank("rust language", &corpus, 3);

        assert!(ranking.results.len() <= 3);
        assert!(ranking
            .results
            .windows(2)
            .all(|w| w[0].relevance_percentage >= w[1].relevance_percentage));
        assert!(ranking.results.iter().all(|r| r.relevance_percentage >= 15));
        assert!(ranking.results.iter().all(|r| r.id != "4"));
    }

    #[test]
    fn test_phrase_boost_is_case_insensitive() {
        // 구문 비교는 소문자로, 토큰 비교는 대소문자 구분
        let corpus = corpus(&["brown fox jumps", "jumps fox brown"]);
        let tokens = tokenize("Brown fox");
        let candidates = Ranker::default().lexical_candidates("Brown fox", &tokens, &corpus);

        assert_eq!(candidates.len(), 2);
        let ratio = candidates[0].raw_score / candidates[1].raw_score;
        assert!((ratio - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_position_boost_prefers_early_match() {
        let corpus = corpus(&["target a b c d e", "a b c d e target"]);
        let ranking = rank("target", &corpus, 10);

        assert_eq!(ranking.results[0].id, "0");
        assert!(ranking.results[1].relevance_percentage < 100);
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        let corpus = corpus(&["same words here", "other stuff", "same words here"]);
        let ranking = rank("same words", &corpus, 10);
        let ids: Vec<&str> = ranking.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "2"]);
    }

    #[test]
    fn test_fuzzy_fallback_when_no_lexical_match() {
        // 구문 부스트 0 배율이면 어휘 점수가 모두 0이 되어 퍼지 경로로 넘어감
        let params = RankerParams {
            phrase_boost: 0.0,
            ..Default::default()
        };
        let corpus = corpus(&["quick fox", "slow turtle"]);
        let ranking = Ranker::new(params).rank("quick fox", &tokenize("quick fox"), &corpus, 10);

        assert_eq!(ranking.strategy, Strategy::Fuzzy);
        assert_eq!(ranking.results.len(), 1);
        assert_eq!(ranking.results[0].id, "0");
        assert_eq!(ranking.results[0].relevance_percentage, 100);
    }

    #[test]
    fn test_no_candidates_from_either_strategy() {
        let corpus = corpus(&["alpha beta", "gamma delta"]);
        let ranking = rank("zeta?", &corpus, 10);
        assert_eq!(ranking.strategy, Strategy::None);
        assert!(ranking.results.is_empty());
    }

    #[test]
    fn test_fuzzy_candidates_score() {
        let corpus = corpus(&["apple banana", "cherry"]);
        let tokens = tokenize("apple kiwi");
        let candidates = Ranker::default().fuzzy_candidates(&tokens, &corpus);

        // weighted: apple(2) / (2 + 1) = 2/3; jaccard: 1 / 3
        let expected = (2.0 / 3.0) * 0.7 + (1.0 / 3.0) * 0.3;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "0");
        assert!((candidates[0].raw_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_fuzzy_output_obeys_normalization() {
        let ranker = Ranker::default();
        let candidates = vec![
            Candidate {
                id: "a",
                text: "a",
                source: None,
                token_count: 1,
                raw_score: 0.2,
            },
            Candidate {
                id: "b",
                text: "b",
                source: None,
                token_count: 1,
                raw_score: 0.8,
            },
            Candidate {
                id: "c",
                text: "c",
                source: None,
                token_count: 1,
                raw_score: 0.1,
            },
        ];
        let results = ranker.normalize(candidates, 10, |pct, _| pct as f32 / 100.0);

        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        // c: 12.5% -> 13% 는 하한 미만
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(results[0].relevance_percentage, 100);
        assert_eq!(results[1].relevance_percentage, 25);
    }

    #[test]
    fn test_empty_inputs() {
        let corpus = corpus(&["something"]);
        assert!(rank("", &corpus, 10).results.is_empty());
        assert!(rank("...", &corpus, 10).results.is_empty());
        assert!(rank("something", &corpus, 0).results.is_empty());
        assert!(rank("something", &Corpus::empty(), 10).results.is_empty());
    }

    #[test]
    fn test_relevance_percentage() {
        assert_eq!(relevance_percentage(1.0, 1.0), 100);
        assert_eq!(relevance_percentage(0.15, 1.0), 15);
        assert_eq!(relevance_percentage(0.144, 1.0), 14);
        assert_eq!(relevance_percentage(2.0, 1.0), 100);
    }
}
