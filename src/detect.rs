//! Slide selector detection
//!
//! Detection runs in two stages. The session's probe reports the first class
//! token and rendered size of each direct child `div` of `body`; everything
//! after that (filtering, grouping, scoring) is pure and works on the probe's
//! output only.

use crate::DocumentSession;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Substrings marking decorative or chrome elements that sit next to slides
/// but are never slides themselves.
pub const BLACKLIST_KEYWORDS: &[&str] = &[
    "watermark",
    "overlay",
    "modal",
    "popup",
    "tooltip",
    "backdrop",
    "background",
    "bg-",
    "loading",
    "spinner",
    "notification",
    "toast",
    "header",
    "footer",
    "nav",
    "menu",
    "sidebar",
    "hidden",
    "invisible",
    "fixed",
    "absolute",
    "sticky",
];

/// Substrings conventionally used in slide class names.
pub const PRIORITY_KEYWORDS: &[&str] = &[
    "slide",
    "container",
    "page",
    "screen",
    "card",
    "section",
    "panel",
    "content",
    "main",
    "wrapper",
    "item",
    "block",
];

/// A detected class needs at least this many elements to be trusted.
pub const MIN_TRUSTED_COUNT: usize = 2;

const COUNT_WEIGHT: u64 = 10;
const PRIORITY_BONUS: u64 = 50;
const LARGE_BONUS: u64 = 30;
const MEDIUM_BONUS: u64 = 15;
const LARGE_EDGE: f64 = 500.0;
const MEDIUM_EDGE: f64 = 300.0;

/// Raw probe output for one direct child `div` of `body`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateElement {
    /// First declared class token
    pub token: String,
    /// Rendered width in layout pixels
    #[serde(default)]
    pub width: f64,
    /// Rendered height in layout pixels
    #[serde(default)]
    pub height: f64,
}

impl CandidateElement {
    pub fn new(token: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            token: token.into(),
            width,
            height,
        }
    }
}

/// Elements grouped under one first-class token
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateClass {
    pub name: String,
    pub count: usize,
    /// Width and height of the first element seen with this token
    pub representative_size: (f64, f64),
    pub has_priority_keyword: bool,
}

impl CandidateClass {
    /// Heuristic score: many, large, conventionally named groups win.
    pub fn score(&self) -> u64 {
        let mut score = self.count as u64 * COUNT_WEIGHT;
        if self.has_priority_keyword {
            score += PRIORITY_BONUS;
        }
        let (width, height) = self.representative_size;
        if width >= LARGE_EDGE && height >= LARGE_EDGE {
            score += LARGE_BONUS;
        } else if width >= MEDIUM_EDGE && height >= MEDIUM_EDGE {
            score += MEDIUM_BONUS;
        }
        score
    }
}

/// Trusted detection result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedSelector {
    /// Bare class selector, used in logs and reports
    pub selector: String,
    pub count: usize,
}

/// Elements the candidate probe inspects
pub const CANDIDATE_SCOPE: &str = "body > div";

impl DetectedSelector {
    /// Selector limited to the elements the probe scored.
    ///
    /// Nested elements sharing the class are not slides.
    pub fn scoped(&self) -> String {
        format!("{}{}", CANDIDATE_SCOPE, self.selector)
    }
}

fn contains_any(token: &str, keywords: &[&str]) -> bool {
    let lower = token.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

/// Whether the token names decorative chrome rather than content
pub fn is_blacklisted(token: &str) -> bool {
    contains_any(token, BLACKLIST_KEYWORDS)
}

pub fn has_priority_keyword(token: &str) -> bool {
    contains_any(token, PRIORITY_KEYWORDS)
}

/// Filter blacklisted tokens and group the rest, keeping first-seen order.
pub fn group_candidates(elements: &[CandidateElement]) -> Vec<CandidateClass> {
    let mut groups: Vec<CandidateClass> = Vec::new();

    for el in elements {
        let token = el.token.trim();
        if token.is_empty() || is_blacklisted(token) {
            continue;
        }
        match groups.iter_mut().find(|g| g.name == token) {
            Some(group) => group.count += 1,
            None => groups.push(CandidateClass {
                name: token.to_string(),
                count: 1,
                representative_size: (el.width, el.height),
                has_priority_keyword: has_priority_keyword(token),
            }),
        }
    }

    groups
}

/// Pick the best-scoring class and accept it if it is repeated enough.
///
/// Ties keep the earlier group.
pub fn select_trusted(classes: &[CandidateClass]) -> Option<DetectedSelector> {
    let mut best: Option<(&CandidateClass, u64)> = None;
    for class in classes {
        let score = class.score();
        debug!("candidate .{} count={} score={}", class.name, class.count, score);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((class, score));
        }
    }

    let (class, _) = best?;
    if class.count < MIN_TRUSTED_COUNT {
        debug!(
            "best candidate .{} only has {} element(s); not trusted",
            class.name, class.count
        );
        return None;
    }

    Some(DetectedSelector {
        selector: class_selector(&class.name),
        count: class.count,
    })
}

/// Build a class selector for `token`, escaping characters CSS would reject.
pub fn class_selector(token: &str) -> String {
    let mut out = String::with_capacity(token.len() + 1);
    out.push('.');
    for (i, ch) in token.chars().enumerate() {
        let leading_digit = ch.is_ascii_digit()
            && (i == 0 || (i == 1 && token.starts_with('-')));
        if leading_digit {
            out.push_str(&format!("\\{:x} ", ch as u32));
        } else if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii() {
            out.push(ch);
        } else {
            out.push('\\');
            out.push(ch);
        }
    }
    out
}

/// Propose the slide selector for the loaded document.
///
/// Probe failures are logged and treated as "no candidates".
pub fn detect<S: DocumentSession + ?Sized>(session: &S) -> Option<DetectedSelector> {
    let elements = match session.collect_candidates() {
        Ok(elements) => elements,
        Err(e) => {
            warn!(
                "Candidate probe failed for {}: {}",
                session.source().display(),
                e
            );
            return None;
        }
    };

    let classes = group_candidates(&elements);
    select_trusted(&classes)
}
