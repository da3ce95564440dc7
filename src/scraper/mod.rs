//! 웹 스크래퍼 모듈 - URL 텍스트 추출
//!
//! 검색 엔진 바깥의 협력자입니다. 페이지를 가져와 script/style을 제외한
//! 본문 텍스트를 만들고, 블록 요소 경계를 줄바꿈으로 남겨 청커가 문단을 인식하게 합니다.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// 텍스트를 버리는 요소
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// 줄바꿈을 만드는 블록 요소
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// 본문으로 인정하는 최소 길이
const MIN_CONTENT_CHARS: usize = 100;

/// 스크랩된 페이지
#[derive(Debug, Clone)]
pub struct ScrapedPage {
    /// 원본 URL
    pub url: String,
    /// 페이지 제목
    pub title: Option<String>,
    /// 본문 텍스트 (문단은 줄바꿈으로 구분)
    pub text: String,
}

/// 웹 스크래퍼
pub struct WebScraper {
    client: reqwest::Client,
}

impl WebScraper {
    /// 새 스크래퍼 생성
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("page-search/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("HTTP 클라이언트 생성 실패")?;

        Ok(Self { client })
    }

    /// URL에서 텍스트 추출
    pub async fn scrape(&self, url: &str) -> Result<ScrapedPage> {
        let parsed = parse_url(url)?;
        tracing::info!("Scraping: {}", parsed);

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .context("HTTP 요청 실패")?
            .error_for_status()
            .context("HTTP 오류 응답")?;

        let html = response.text().await.context("응답 본문 읽기 실패")?;
        let mut page = parse_html(&html);
        page.url = parsed.to_string();

        tracing::debug!(
            "Extracted {} chars from {}",
            page.text.len(),
            page.url
        );

        Ok(page)
    }
}

// ============================================================================
// HTML Extraction
// ============================================================================

/// http/https URL만 허용
pub fn parse_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim()).with_context(|| format!("잘못된 URL: {}", url))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => anyhow::bail!("지원하지 않는 URL 스킴: {}", scheme),
    }
}

/// HTML 문서에서 제목과 본문 추출
pub fn parse_html(html: &str) -> ScrapedPage {
    let document = Html::parse_document(html);

    ScrapedPage {
        url: String::new(),
        title: extract_title(&document),
        text: extract_content(&document),
    }
}

/// 제목 추출 (<title> → <h1>)
fn extract_title(document: &Html) -> Option<String> {
    for selector_str in ["title", "h1"] {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let title = collapse_whitespace(&element.text().collect::<String>());
                if !title.is_empty() {
                    return Some(title);
                }
            }
        }
    }

    None
}

/// 본문 추출 (article > main > body)
fn extract_content(document: &Html) -> String {
    let selectors = ["article", "main", "[role=main]", "#content", "body"];

    for selector_str in selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = element_text(element);
                if text.len() > MIN_CONTENT_CHARS {
                    return text;
                }
            }
        }
    }

    // 폴백: 짧더라도 문서 전체
    element_text(document.root_element())
}

/// 요소 텍스트 (블록 경계는 줄바꿈, 줄 내 공백은 하나로)
fn element_text(element: ElementRef) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);

    raw.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(&text.replace('\n', " "));
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if SKIPPED_ELEMENTS.contains(&name) {
                continue;
            }

            let is_block = BLOCK_ELEMENTS.contains(&name);
            if is_block {
                out.push('\n');
            }
            collect_text(child_element, out);
            if is_block {
                out.push('\n');
            }
        }
    }
}

/// 공백 정규식 (한 번만 컴파일)
fn whitespace_regex() -> Option<&'static Regex> {
    static WHITESPACE: OnceLock<Option<Regex>> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").ok()).as_ref()
}

/// 연속 공백 정리
fn collapse_whitespace(text: &str) -> String {
    match whitespace_regex() {
        Some(re) => re.replace_all(text, " ").trim().to_string(),
        None => text.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scraper_creation() {
        assert!(WebScraper::new().is_ok());
    }

    #[test]
    fn test_parse_url() {
        assert!(parse_url("https://example.com/page").is_ok());
        assert!(parse_url("  http://example.com ").is_ok());
        assert!(parse_url("ftp://example.com").is_err());
        assert!(parse_url("not a url").is_err());
    }

    #[test]
    fn test_extract_title() {
        let page = parse_html(
            r#"<html><head><title>Test Page Title</title></head>
               <body><h1>Main Heading</h1></body></html>"#,
        );
        assert_eq!(page.title, Some("Test Page Title".to_string()));
    }

    #[test]
    fn test_extract_title_h1_fallback() {
        let page = parse_html(
            r#"<html><head><title></title></head><body><h1>H1 Heading</h1></body></html>"#,
        );
        assert_eq!(page.title, Some("H1 Heading".to_string()));
    }

    #[test]
    fn test_scripts_and_styles_removed() {
        let page = parse_html(
            r#"<html><body>
                <script>var secret = "hidden";</script>
                <style>.x { color: red; }</style>
                <p>Visible paragraph text.</p>
                <!-- a comment -->
            </body></html>"#,
        );
        assert!(page.text.contains("Visible paragraph text."));
        assert!(!page.text.contains("secret"));
        assert!(!page.text.contains("color"));
        assert!(!page.text.contains("comment"));
    }

    #[test]
    fn test_block_elements_become_paragraphs() {
        let page = parse_html(
            r#"<html><body>
                <p>First <b>bold</b> paragraph.</p>
                <div>Second
                    paragraph.</div>
                <ul><li>item one</li><li>item two</li></ul>
            </body></html>"#,
        );
        let lines: Vec<&str> = page.text.lines().collect();
        assert_eq!(
            lines,
            vec!["First bold paragraph.", "Second paragraph.", "item one", "item two"]
        );
    }

    #[test]
    fn test_article_preferred_over_body() {
        let page = parse_html(
            r#"<html><body>
                <nav>Navigation menu</nav>
                <article>
                    <p>This is the main article content.</p>
                    <p>It should be extracted as the primary content, with more text
                    to ensure it's over one hundred characters.</p>
                </article>
                <footer>Footer content</footer>
            </body></html>"#,
        );
        assert!(page.text.contains("main article content"));
        assert!(!page.text.contains("Navigation menu"));
        assert!(!page.text.contains("Footer content"));
    }

    #[test]
    fn test_collapse_whitespace_reuses_compiled_regex() {
        let first = whitespace_regex().map(|re| re as *const Regex);
        assert!(first.is_some());
        assert_eq!(collapse_whitespace("  a \t b\u{a0} c  "), "a b c");
        assert_eq!(whitespace_regex().map(|re| re as *const Regex), first);
    }

    #[test]
    fn test_short_page_falls_back_to_whole_document() {
        let page = parse_html("<html><body><p>Tiny.</p></body></html>");
        assert_eq!(page.text, "Tiny.");
    }
}
