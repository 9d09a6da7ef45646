//! Task dispatch: decide how to answer a page, then answer it
//!
//! Classification walks `DISPATCH_RULES` in order and stops at the first
//! predicate that matches. Handlers never fail outward: any error inside a
//! handler becomes an `error: ...` answer that is still submitted.

use crate::error::{is_error_answer, QuizError, QuizResult};
use crate::extract::{find_document_link, parse_tables, DocumentExtractor, DocumentKind};
use crate::llm::AnswerReasoner;
use crate::render::PageRenderer;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid number pattern"));

static SECRET_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bsecret(?:\s+code)?\s*(?:is\b)?\s*[:=]?\s*["']?([A-Za-z0-9_\-]+)"#)
        .expect("valid secret pattern")
});

static ANCHOR_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"']+)["']"#).expect("valid anchor pattern")
});

static SCRAPE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|\s)(/[^\s"'<>]*scrape[^\s"'<>]*)"#).expect("valid scrape path pattern")
});

const DEMO_SEGMENT: &str = "demo";
const DEMO_SCRAPE_SEGMENT: &str = "demo-scrape";
const DEMO_AUDIO_SEGMENT: &str = "demo-audio";

/// Everything a predicate or handler may inspect
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
    pub page_url: &'a str,
    pub markup: &'a str,
    pub text: &'a str,
    /// Interpreted instruction for this page, when interpretation is enabled
    pub instruction: Option<&'a str>,
}

impl<'a> TaskContext<'a> {
    pub fn new(page_url: &'a str, markup: &'a str, text: &'a str) -> Self {
        Self {
            page_url,
            markup,
            text,
            instruction: None,
        }
    }

    pub fn with_instruction(mut self, instruction: Option<&'a str>) -> Self {
        self.instruction = instruction;
        self
    }

    /// The question to put to the reasoner: the interpreted instruction if any
    fn question(&self) -> &'a str {
        self.instruction.unwrap_or(self.text)
    }
}

/// Answer-computation strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    DemoFixed,
    DemoScrape,
    DemoAudio,
    PdfDocument,
    CsvData,
    HtmlTables,
    PlainText,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::DemoFixed => "demo_fixed",
            TaskKind::DemoScrape => "demo_scrape",
            TaskKind::DemoAudio => "demo_audio",
            TaskKind::PdfDocument => "pdf_document",
            TaskKind::CsvData => "csv_data",
            TaskKind::HtmlTables => "html_tables",
            TaskKind::PlainText => "plain_text",
        };
        f.write_str(name)
    }
}

/// One entry of the dispatch chain
pub struct DispatchRule {
    pub kind: TaskKind,
    pub matches: fn(&TaskContext<'_>) -> bool,
}

/// Dispatch chain in priority order; `PlainText` always matches
pub const DISPATCH_RULES: &[DispatchRule] = &[
    DispatchRule {
        kind: TaskKind::DemoFixed,
        matches: is_demo_page,
    },
    DispatchRule {
        kind: TaskKind::DemoScrape,
        matches: is_demo_scrape_page,
    },
    DispatchRule {
        kind: TaskKind::DemoAudio,
        matches: is_demo_audio_page,
    },
    DispatchRule {
        kind: TaskKind::PdfDocument,
        matches: links_pdf,
    },
    DispatchRule {
        kind: TaskKind::CsvData,
        matches: links_csv,
    },
    DispatchRule {
        kind: TaskKind::HtmlTables,
        matches: embeds_tables,
    },
    DispatchRule {
        kind: TaskKind::PlainText,
        matches: always,
    },
];

fn is_demo_page(ctx: &TaskContext<'_>) -> bool {
    has_path_segment(ctx.page_url, DEMO_SEGMENT)
}

fn is_demo_scrape_page(ctx: &TaskContext<'_>) -> bool {
    has_path_segment(ctx.page_url, DEMO_SCRAPE_SEGMENT)
}

fn is_demo_audio_page(ctx: &TaskContext<'_>) -> bool {
    has_path_segment(ctx.page_url, DEMO_AUDIO_SEGMENT)
}

fn links_pdf(ctx: &TaskContext<'_>) -> bool {
    find_document_link(ctx.markup, ctx.page_url, DocumentKind::Pdf).is_some()
}

fn links_csv(ctx: &TaskContext<'_>) -> bool {
    find_document_link(ctx.markup, ctx.page_url, DocumentKind::Csv).is_some()
}

fn embeds_tables(ctx: &TaskContext<'_>) -> bool {
    !parse_tables(ctx.markup).is_empty()
}

fn always(_: &TaskContext<'_>) -> bool {
    true
}

/// First matching rule's kind (pure function)
pub fn classify(ctx: &TaskContext<'_>) -> TaskKind {
    DISPATCH_RULES
        .iter()
        .find(|rule| (rule.matches)(ctx))
        .map(|rule| rule.kind)
        .unwrap_or(TaskKind::PlainText)
}

/// Computes an answer for a rendered page
pub struct TaskDispatcher {
    renderer: Arc<dyn PageRenderer>,
    reasoner: Arc<dyn AnswerReasoner>,
    extractor: Arc<dyn DocumentExtractor>,
    demo_answer: String,
}

impl TaskDispatcher {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        reasoner: Arc<dyn AnswerReasoner>,
        extractor: Arc<dyn DocumentExtractor>,
        demo_answer: impl Into<String>,
    ) -> Self {
        Self {
            renderer,
            reasoner,
            extractor,
            demo_answer: demo_answer.into(),
        }
    }

    pub async fn compute(&self, page_url: &str, markup: &str, text: &str) -> String {
        self.compute_with_context(&TaskContext::new(page_url, markup, text))
            .await
    }

    pub async fn compute_with_context(&self, ctx: &TaskContext<'_>) -> String {
        let kind = classify(ctx);
        info!(task_kind = %kind, page_url = %ctx.page_url, "Dispatching task");

        match self.execute(kind, ctx).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(task_kind = %kind, "Task handler failed: {}", e);
                e.to_answer()
            }
        }
    }

    /// Ask the reasoner what the page wants; `None` if it could not say
    pub async fn interpret(&self, text: &str) -> Option<String> {
        let prompt = format!(
            "Read this quiz page and state briefly what is being asked, which data is needed \
             and what form the answer must take.\n\n{text}"
        );
        let instruction = self.reasoner.ask(&prompt).await;

        if is_error_answer(&instruction) {
            warn!("Instruction interpretation failed: {}", instruction);
            None
        } else {
            Some(instruction)
        }
    }

    async fn execute(&self, kind: TaskKind, ctx: &TaskContext<'_>) -> QuizResult<String> {
        match kind {
            TaskKind::DemoFixed => Ok(self.demo_answer.clone()),
            TaskKind::DemoScrape => self.scrape_secret(ctx).await,
            TaskKind::DemoAudio => Ok(sum_numbers(ctx.text)),
            TaskKind::PdfDocument => self.answer_from_pdf(ctx).await,
            TaskKind::CsvData => self.answer_from_csv(ctx).await,
            TaskKind::HtmlTables => self.answer_from_tables(ctx).await,
            TaskKind::PlainText => Ok(self.reasoner.ask(&plain_text_prompt(ctx.text)).await),
        }
    }

    /// Render the linked page once and pull the secret token out of it
    async fn scrape_secret(&self, ctx: &TaskContext<'_>) -> QuizResult<String> {
        let link = scrape_link(ctx).ok_or_else(|| QuizError::ScrapeLinkNotFound {
            url: ctx.page_url.to_string(),
        })?;

        debug!(scrape_url = %link, "Rendering scrape target");
        let page = self.renderer.render(&link).await?;

        extract_secret(&page.plain_text)
            .or_else(|| extract_secret(&page.markup))
            .ok_or(QuizError::SecretNotFound { url: link })
    }

    async fn answer_from_pdf(&self, ctx: &TaskContext<'_>) -> QuizResult<String> {
        let link = find_document_link(ctx.markup, ctx.page_url, DocumentKind::Pdf)
            .ok_or_else(|| QuizError::invalid_input("page has no PDF link"))?;

        let pdf_text = self.extractor.pdf_text(&link).await?;
        let prompt = format!(
            "Given this PDF text, answer the quiz:\n\n{pdf_text}\n\nQuiz page:\n{}",
            ctx.question()
        );
        Ok(self.reasoner.ask(&prompt).await)
    }

    async fn answer_from_csv(&self, ctx: &TaskContext<'_>) -> QuizResult<String> {
        let link = find_document_link(ctx.markup, ctx.page_url, DocumentKind::Csv)
            .ok_or_else(|| QuizError::invalid_input("page has no CSV link"))?;

        let rows = self.extractor.csv_rows(&link).await?;
        let rows = serde_json::to_string(&rows)
            .map_err(|e| QuizError::internal_error(format!("encoding CSV rows: {e}")))?;
        let prompt = format!(
            "Given this CSV data: {rows}, answer the quiz: {}",
            ctx.question()
        );
        Ok(self.reasoner.ask(&prompt).await)
    }

    async fn answer_from_tables(&self, ctx: &TaskContext<'_>) -> QuizResult<String> {
        let tables = serde_json::to_string(&parse_tables(ctx.markup))
            .map_err(|e| QuizError::internal_error(format!("encoding tables: {e}")))?;
        let prompt = format!(
            "Quiz instruction: {}\nTables extracted: {tables}\nCompute the correct answer.",
            ctx.question()
        );
        Ok(self.reasoner.ask(&prompt).await)
    }
}

fn plain_text_prompt(text: &str) -> String {
    format!("Solve the quiz question based ONLY on this text: {text}")
}

/// Whether any path segment of the URL equals `marker` exactly
pub fn has_path_segment(page_url: &str, marker: &str) -> bool {
    Url::parse(page_url)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .map(|mut segments| segments.any(|segment| segment == marker))
        })
        .unwrap_or(false)
}

/// Sum of every number in the text; integral sums print without a fraction
pub fn sum_numbers(text: &str) -> String {
    let total: f64 = NUMBER
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .sum();

    if total.fract() == 0.0 && total.abs() < i64::MAX as f64 {
        format!("{}", total as i64)
    } else {
        format!("{total}")
    }
}

/// The word following `secret` / `secret code`
pub fn extract_secret(text: &str) -> Option<String> {
    SECRET_TOKEN
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// Link to the page holding the secret, joined against the current page
///
/// Only `<a>` anchors count; an anchor mentioning `scrape` beats the first
/// relative one.
fn scrape_link(ctx: &TaskContext<'_>) -> Option<String> {
    let base = Url::parse(ctx.page_url).ok()?;

    let anchors: Vec<&str> = ANCHOR_HREF
        .captures_iter(ctx.markup)
        .filter_map(|caps| caps.get(1))
        .map(|href| href.as_str().trim())
        .filter(|href| is_relative_link(href) && !href.starts_with("/submit"))
        .collect();

    let from_anchor = anchors
        .iter()
        .find(|href| href.to_ascii_lowercase().contains("scrape"))
        .or_else(|| anchors.first())
        .map(|href| href.to_string());

    let candidate = from_anchor.or_else(|| {
        SCRAPE_PATH
            .captures(ctx.text)
            .map(|caps| caps[1].to_string())
    })?;

    base.join(&candidate).ok().map(|url| url.to_string())
}

fn is_relative_link(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    !(lower.starts_with("http:")
        || lower.starts_with("https:")
        || lower.starts_with("//")
        || lower.starts_with('#')
        || lower.starts_with("mailto:")
        || lower.starts_with("javascript:"))
}
