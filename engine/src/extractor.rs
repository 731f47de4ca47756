//! Email extraction from a rendered webmail page.
//!
//! The page is only reachable through [`EmailSource`]; the HTML snapshot
//! implementation parses markup with `scraper` and approximates the browser's
//! visible text.

use std::path::{Path, PathBuf};

use becwatch_config::{
    DEFAULT_BODY_SELECTOR, DEFAULT_CONTAINER_SELECTOR, DEFAULT_SUBJECT_SELECTOR, DetectorConfig,
};
use becwatch_types::{Email, NO_SUBJECT, text::tail_chars};
use scraper::{ElementRef, Html, Node, Selector};
use thiserror::Error;

/// Greetings that mark the start of a message body, in priority-free order:
/// the earliest occurrence in the page text wins.
pub const GREETINGS: [&str; 8] = [
    "Dear ",
    "Hello ",
    "Hi ",
    "Greetings",
    "Good morning",
    "Good afternoon",
    "Good evening",
    "To Whom It May Concern",
];

/// Trailing characters used as the body when no greeting is present.
pub const FALLBACK_TAIL_CHARS: usize = 2000;

const HIDDEN_TAGS: [&str; 5] = ["script", "style", "noscript", "template", "head"];

const BLOCK_TAGS: [&str; 20] = [
    "address",
    "article",
    "aside",
    "blockquote",
    "br",
    "div",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "li",
    "p",
    "pre",
    "section",
    "table",
    "tr",
];

/// Capability interface over the live page.
pub trait EmailSource {
    /// The currently displayed email, or `None` when nothing usable is on screen.
    fn extract_current_email(&self) -> Option<Email>;
}

#[derive(Debug, Error)]
#[error("invalid CSS selector `{selector}`: {message}")]
pub struct SelectorError {
    pub selector: String,
    pub message: String,
}

fn parse_selector(raw: &str) -> Result<Selector, SelectorError> {
    Selector::parse(raw).map_err(|e| SelectorError {
        selector: raw.to_string(),
        message: e.to_string(),
    })
}

/// CSS selectors locating the parts of a webmail page.
#[derive(Debug, Clone)]
pub struct PageSelectors {
    pub subject: Selector,
    pub body: Selector,
    pub container: Selector,
}

impl PageSelectors {
    pub fn new(subject: &str, body: &str, container: &str) -> Result<Self, SelectorError> {
        Ok(Self {
            subject: parse_selector(subject)?,
            body: parse_selector(body)?,
            container: parse_selector(container)?,
        })
    }

    /// Gmail layout.
    pub fn gmail() -> Result<Self, SelectorError> {
        Self::new(
            DEFAULT_SUBJECT_SELECTOR,
            DEFAULT_BODY_SELECTOR,
            DEFAULT_CONTAINER_SELECTOR,
        )
    }

    pub fn from_config(config: &DetectorConfig) -> Result<Self, SelectorError> {
        Self::new(
            config.subject_selector(),
            config.body_selector(),
            config.container_selector(),
        )
    }
}

/// Extract subject and body from page markup.
#[must_use]
pub fn extract_email(html: &str, selectors: &PageSelectors) -> Option<Email> {
    let document = Html::parse_document(html);
    let page_text = visible_text(document.root_element());
    let body = select_body(&page_text);
    if body.is_empty() {
        return None;
    }

    let subject = document
        .select(&selectors.subject)
        .next()
        .map(|el| visible_text(el).trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| NO_SUBJECT.to_string());

    Some(Email::new(subject, body))
}

/// Body text: from the earliest greeting to the end, else the page tail.
#[must_use]
pub fn select_body(page_text: &str) -> String {
    let start = GREETINGS
        .iter()
        .filter_map(|greeting| page_text.find(greeting))
        .min();

    match start {
        Some(idx) => page_text[idx..].trim().to_string(),
        None => tail_chars(page_text, FALLBACK_TAIL_CHARS).trim().to_string(),
    }
}

/// Identity of the part of the page a qualifying mutation must touch.
///
/// The container's visible text when present, else the whole page text.
#[must_use]
pub fn container_fingerprint(html: &str, selectors: &PageSelectors) -> String {
    let document = Html::parse_document(html);
    match document.select(&selectors.container).next() {
        Some(container) => visible_text(container),
        None => visible_text(document.root_element()),
    }
}

/// Approximate `innerText`: text nodes in document order, hidden subtrees
/// skipped, a line break after block elements, blank runs collapsed.
#[must_use]
pub fn visible_text(root: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(root, &mut raw);

    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.lines() {
        let line = collapse_spaces(line);
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 || out.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(&line);
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let tag = element.value().name();
    if HIDDEN_TAGS.contains(&tag) {
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    collect_text(el, out);
                }
            }
            _ => {}
        }
    }

    if BLOCK_TAGS.contains(&tag) {
        out.push('\n');
    }
}

fn collapse_spaces(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// [`EmailSource`] over an HTML snapshot of the webmail page on disk.
#[derive(Debug, Clone)]
pub struct HtmlSnapshotSource {
    path: PathBuf,
    selectors: PageSelectors,
}

impl HtmlSnapshotSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, selectors: PageSelectors) -> Self {
        Self {
            path: path.into(),
            selectors,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn selectors(&self) -> &PageSelectors {
        &self.selectors
    }

    /// Raw markup, or `None` if the snapshot cannot be read.
    #[must_use]
    pub fn read_html(&self) -> Option<String> {
        std::fs::read_to_string(&self.path)
            .inspect_err(|e| {
                tracing::debug!(path = %self.path.display(), "Snapshot unreadable: {e}");
            })
            .ok()
    }
}

impl EmailSource for HtmlSnapshotSource {
    fn extract_current_email(&self) -> Option<Email> {
        extract_email(&self.read_html()?, &self.selectors)
    }
}
