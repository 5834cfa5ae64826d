use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));
static META_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("valid regex"));
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<link\b[^>]*>").expect("valid regex"));
static IMG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<img\b[^>]*>").expect("valid regex"));
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z][a-z0-9:_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});
static H1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<h1[\s>]").expect("valid regex"));
static H2_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<h2[\s>]").expect("valid regex"));
static HTML_LANG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<html\b[^>]*\blang\s*=\s*["']?[a-z]"#).expect("valid regex")
});
static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(script|style|noscript)>")
        .expect("valid regex")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Individual SEO check result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoIssue {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub points_lost: i64,
}

/// Score and issues for one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub seo_score: i64,
    pub issues: Vec<SeoIssue>,
}

impl Analysis {
    pub fn issue_codes(&self) -> BTreeSet<String> {
        self.issues.iter().map(|i| i.code.clone()).collect()
    }
}

/// Facts pulled out of a page's HTML that the scoring rules look at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageFacts {
    pub is_https: bool,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub has_viewport: bool,
    pub has_canonical: bool,
    pub has_lang: bool,
    pub h1_count: usize,
    pub h2_count: usize,
    pub image_count: usize,
    pub images_missing_alt: usize,
    pub word_count: usize,
}

fn attributes(tag: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(tag)
        .map(|caps| {
            let name = caps[1].to_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            (name, value)
        })
        .collect()
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

fn non_empty(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

impl PageFacts {
    pub fn extract(html: &str, is_https: bool) -> Self {
        let mut facts = PageFacts {
            is_https,
            ..Default::default()
        };

        facts.title = TITLE_RE
            .captures(html)
            .and_then(|caps| non_empty(&caps[1]));

        for tag in META_RE.find_iter(html) {
            let attrs = attributes(tag.as_str());
            match attr(&attrs, "name").map(str::to_lowercase).as_deref() {
                Some("description") => {
                    facts.meta_description = attr(&attrs, "content").and_then(non_empty);
                }
                Some("viewport") => facts.has_viewport = true,
                _ => {}
            }
        }

        facts.has_canonical = LINK_RE.find_iter(html).any(|tag| {
            let attrs = attributes(tag.as_str());
            attr(&attrs, "rel").is_some_and(|rel| rel.eq_ignore_ascii_case("canonical"))
                && attr(&attrs, "href").is_some_and(|href| !href.is_empty())
        });

        for tag in IMG_RE.find_iter(html) {
            facts.image_count += 1;
            let attrs = attributes(tag.as_str());
            if attr(&attrs, "alt").map_or(true, |alt| alt.is_empty()) {
                facts.images_missing_alt += 1;
            }
        }

        facts.has_lang = HTML_LANG_RE.is_match(html);
        facts.h1_count = H1_RE.find_iter(html).count();
        facts.h2_count = H2_RE.find_iter(html).count();
        facts.word_count = count_words(html);

        facts
    }
}

/// Count visible words, ignoring markup, scripts and styles
pub fn count_words(html: &str) -> usize {
    let without_code = SCRIPT_STYLE_RE.replace_all(html, " ");
    let text = TAG_RE.replace_all(&without_code, " ");
    text.split_whitespace()
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .count()
}

struct Audit {
    issues: Vec<SeoIssue>,
}

impl Audit {
    fn flag(&mut self, code: &str, severity: Severity, message: String, points_lost: i64) {
        self.issues.push(SeoIssue {
            code: code.to_string(),
            severity,
            message,
            points_lost,
        });
    }
}

/// Compute the SEO score for a page.
/// Starts at 100 and deducts points for each issue found.
pub fn score(facts: &PageFacts) -> Analysis {
    let mut audit = Audit { issues: Vec::new() };

    if !facts.is_https {
        audit.flag(
            "not_https",
            Severity::Error,
            "Page is not served over HTTPS".into(),
            10,
        );
    }

    match &facts.title {
        None => audit.flag(
            "title_missing",
            Severity::Error,
            "Title tag is missing".into(),
            15,
        ),
        Some(title) => {
            let len = title.chars().count();
            if len < 30 {
                audit.flag(
                    "title_short",
                    Severity::Warning,
                    format!("Title is too short ({len} chars, aim for 50-60)"),
                    5,
                );
            } else if len > 60 {
                audit.flag(
                    "title_long",
                    Severity::Warning,
                    format!("Title is too long ({len} chars, may be truncated in search results)"),
                    3,
                );
            }
        }
    }

    match &facts.meta_description {
        None => audit.flag(
            "meta_desc_missing",
            Severity::Error,
            "Meta description is missing".into(),
            15,
        ),
        Some(desc) => {
            let len = desc.chars().count();
            if len < 70 {
                audit.flag(
                    "meta_desc_short",
                    Severity::Warning,
                    format!("Meta description is too short ({len} chars, aim for 120-160)"),
                    5,
                );
            } else if len > 170 {
                audit.flag(
                    "meta_desc_long",
                    Severity::Warning,
                    format!("Meta description is too long ({len} chars, may be truncated)"),
                    3,
                );
            }
        }
    }

    if !facts.has_viewport {
        audit.flag(
            "viewport_missing",
            Severity::Error,
            "Viewport meta tag is missing, page is not mobile friendly".into(),
            10,
        );
    }

    match facts.h1_count {
        0 => audit.flag(
            "h1_missing",
            Severity::Error,
            "No H1 heading found".into(),
            10,
        ),
        1 => {}
        n => audit.flag(
            "h1_multiple",
            Severity::Warning,
            format!("Page has {n} H1 headings, use exactly one"),
            3,
        ),
    }

    if facts.word_count < 100 {
        audit.flag(
            "content_thin",
            Severity::Error,
            format!(
                "Content is very thin ({} words, aim for 300+)",
                facts.word_count
            ),
            15,
        );
    } else if facts.word_count < 300 {
        audit.flag(
            "content_short",
            Severity::Warning,
            format!("Content is short ({} words, aim for 300+)", facts.word_count),
            5,
        );
    }

    if facts.word_count > 100 && facts.h2_count == 0 {
        audit.flag(
            "no_subheadings",
            Severity::Warning,
            "No H2 headings found, use headings to structure content".into(),
            5,
        );
    }

    if facts.images_missing_alt > 0 {
        let points = (facts.images_missing_alt as i64 * 2).min(10);
        audit.flag(
            "images_missing_alt",
            Severity::Warning,
            format!(
                "{} of {} images are missing alt text",
                facts.images_missing_alt, facts.image_count
            ),
            points,
        );
    }

    if !facts.has_canonical {
        audit.flag(
            "canonical_missing",
            Severity::Info,
            "Canonical link is missing".into(),
            3,
        );
    }

    if !facts.has_lang {
        audit.flag(
            "lang_missing",
            Severity::Warning,
            "The html element has no lang attribute".into(),
            3,
        );
    }

    let deductions: i64 = audit.issues.iter().map(|i| i.points_lost).sum();

    Analysis {
        seo_score: (100 - deductions).clamp(0, 100),
        issues: audit.issues,
    }
}
