//! Selector resolution with ordered fallback strategies

use crate::detect;
use crate::{DocumentSession, SlideRef};
use log::{debug, info, warn};
use std::fmt;

/// Selectors tried, in order, when neither the user nor detection found slides.
pub const COMMON_SELECTORS: &[&str] = &[
    ".slide",
    ".slides",
    "section",
    ".page",
    ".screen",
    "[class*=\"slide\"]",
    "body > div > div",
];

/// Which strategy produced a resolved selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    UserOverride,
    Detected,
    CommonSweep,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::UserOverride => "user selector",
            Strategy::Detected => "auto-detected",
            Strategy::CommonSweep => "common selector",
        };
        f.write_str(name)
    }
}

/// Selector chosen for one document and the elements it matches
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSelector {
    pub selector: String,
    pub strategy: Strategy,
    pub slides: Vec<SlideRef>,
}

impl ResolvedSelector {
    pub fn match_count(&self) -> usize {
        self.slides.len()
    }
}

/// Query `selector`, mapping errors and empty results to `None`.
fn try_selector<S: DocumentSession + ?Sized>(
    session: &S,
    selector: &str,
    strategy: Strategy,
) -> Option<ResolvedSelector> {
    try_scoped(session, selector, selector, strategy)
}

/// Query `query` but report the match under `selector`.
fn try_scoped<S: DocumentSession + ?Sized>(
    session: &S,
    selector: &str,
    query: &str,
    strategy: Strategy,
) -> Option<ResolvedSelector> {
    match session.query(query) {
        Ok(slides) if !slides.is_empty() => Some(ResolvedSelector {
            selector: selector.to_string(),
            strategy,
            slides,
        }),
        Ok(_) => {
            debug!("{} matched nothing in {}", query, session.source().display());
            None
        }
        Err(e) => {
            warn!("Selector '{}' failed: {}", query, e);
            None
        }
    }
}

/// Resolve the slide selector for a loaded document.
///
/// Strategies run in order and the first one matching at least one element
/// wins: the user's selector, heuristic detection, then the common-selector
/// sweep. `None` means the document has no slides.
pub fn resolve<S: DocumentSession + ?Sized>(
    session: &S,
    user_selector: Option<&str>,
) -> Option<ResolvedSelector> {
    let source = session.source().display().to_string();

    if let Some(selector) = user_selector.map(str::trim).filter(|s| !s.is_empty()) {
        if let Some(resolved) = try_selector(session, selector, Strategy::UserOverride) {
            info!("Using user selector '{}' ({} matches)", selector, resolved.match_count());
            return Some(resolved);
        }
        warn!(
            "User selector '{}' found no slides in {}; falling back to detection",
            selector, source
        );
    }

    if let Some(detected) = detect::detect(session) {
        info!(
            "Auto-detected '{}' ({} top-level elements)",
            detected.selector, detected.count
        );
        let scoped = detected.scoped();
        if let Some(resolved) = try_scoped(session, &detected.selector, &scoped, Strategy::Detected)
        {
            if resolved.match_count() != detected.count {
                debug!(
                    "'{}' matched {} element(s), probe counted {}",
                    scoped,
                    resolved.match_count(),
                    detected.count
                );
            }
            return Some(resolved);
        }
    }

    for selector in COMMON_SELECTORS {
        if let Some(resolved) = try_selector(session, selector, Strategy::CommonSweep) {
            info!(
                "Falling back to common selector '{}' ({} matches)",
                selector,
                resolved.match_count()
            );
            return Some(resolved);
        }
    }

    warn!("No slide selector matched in {}", source);
    None
}
