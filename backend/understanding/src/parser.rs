//! Response parser: turn a numbered free-text model reply into typed findings.
//!
//! The model is asked for four sections, `1)` through `4)`. Marker `k)` maps to
//! the k-th category; when the model numbers its answer properly that is the
//! same as positional mapping. Replies that deviate are still structured, and
//! the deviations are reported as [`Anomaly`] values instead of being rejected.

use assetlens_core::{Category, Finding, Severity};
use once_cell::sync::Lazy;
use regex::Regex;

static MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\)").unwrap());

const NEGATIONS: &[&str] = &["no", "not", "without", "zero"];
const ARTICLES: &[&str] = &["a", "an", "any"];

/// Something unexpected about the reply's numbering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// Text before the first marker (dropped).
    Preamble,
    Missing(Category),
    /// Markers were not in ascending order.
    OutOfOrder,
    /// Marker number seen more than once; the first occurrence wins.
    Duplicate(usize),
    /// Marker beyond the four categories (e.g. an optimization section).
    Extra(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    /// Always four findings in category order.
    pub findings: Vec<Finding>,
    pub anomalies: Vec<Anomaly>,
}

impl ParsedReply {
    pub fn is_well_formed(&self) -> bool {
        self.anomalies.iter().all(|a| matches!(a, Anomaly::Extra(_)))
    }
}

/// Parse a reply into findings, ignoring anomalies.
pub fn parse_findings(text: &str) -> Vec<Finding> {
    parse_reply(text).findings
}

pub fn parse_reply(text: &str) -> ParsedReply {
    let mut anomalies = Vec::new();
    let mut sections: [Option<String>; 4] = Default::default();

    let markers: Vec<(usize, usize, usize)> = MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let n = caps[1].parse::<usize>().ok()?;
            Some((n, whole.start(), whole.end()))
        })
        .collect();

    if let Some(&(_, first_start, _)) = markers.first() {
        if !text[..first_start].trim().is_empty() {
            anomalies.push(Anomaly::Preamble);
        }
    }

    let mut previous = 0;
    for (i, &(n, _, body_start)) in markers.iter().enumerate() {
        let body_end = markers.get(i + 1).map_or(text.len(), |&(_, start, _)| start);
        let body = text[body_start..body_end].trim();

        if n <= previous && !anomalies.contains(&Anomaly::OutOfOrder) {
            anomalies.push(Anomaly::OutOfOrder);
        }
        previous = previous.max(n);

        let Some(category) = Category::from_marker(n) else {
            anomalies.push(Anomaly::Extra(n));
            continue;
        };
        let slot = &mut sections[n - 1];
        if slot.is_some() {
            anomalies.push(Anomaly::Duplicate(n));
            continue;
        }
        if body.is_empty() {
            tracing::debug!(%category, "Empty section in reply");
            continue;
        }
        *slot = Some(body.to_string());
    }

    let findings = Category::ORDERED
        .iter()
        .zip(sections)
        .map(|(&category, section)| match section {
            Some(text) => Finding { category, severity: classify(category, &text), text },
            None => {
                anomalies.push(Anomaly::Missing(category));
                Finding::fallback(category)
            }
        })
        .collect();

    ParsedReply { findings, anomalies }
}

/// Heuristic severity for one section's text.
pub fn classify(category: Category, text: &str) -> Severity {
    let (critical, warning): (&[&str], &[&str]) = match category {
        Category::Identification => (&[], &[]),
        Category::Safety => (&["critical", "danger", "immediate"], &["warning", "hazard", "risk"]),
        Category::Condition => (&["critical", "failure"], &["poor", "maintenance required", "worn"]),
        Category::Environmental => (&[], &["concern", "high impact", "leak"]),
    };
    let lower = text.to_lowercase();
    if critical.iter().any(|t| mentions(&lower, t)) {
        Severity::Critical
    } else if warning.iter().any(|t| mentions(&lower, t)) {
        Severity::Warning
    } else {
        Severity::Info
    }
}

/// Substring match that skips negated occurrences ("no concerns", "not a hazard").
fn mentions(lower: &str, trigger: &str) -> bool {
    lower.match_indices(trigger).any(|(at, _)| {
        let mut words = lower[..at]
            .rsplit(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty());
        let mut preceding = words.next().unwrap_or("");
        if ARTICLES.contains(&preceding) {
            preceding = words.next().unwrap_or("");
        }
        !NEGATIONS.contains(&preceding)
    })
}
