//! Page-range expressions: `"1,3-5,8"` → `[0, 2, 3, 4, 7]`.
//!
//! The grammar is deliberately forgiving. Terms are comma-separated and
//! each is either a single 1-based page `N` or an inclusive range `N-M`.
//! Anything that does not match one of those two shapes is skipped rather
//! than rejected, so a half-typed expression in a settings panel still
//! selects the pages it can.
//!
//! Parsing yields 0-based indices, deduplicated and sorted ascending, bounded
//! by the document's page count (see [`PageRange::to_indices`]).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static RE_SINGLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)\s*$").unwrap());
static RE_RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)\s*-\s*(\d+)\s*$").unwrap());

/// Upper bound on pages [`parse`] will enumerate when no page count is known.
pub const MAX_PAGES: usize = 1 << 20;

/// Parse a page-range expression into sorted, deduplicated 0-based indices.
///
/// Page `0`, reversed ranges (`5-2`) and malformed terms contribute nothing.
/// Pages beyond [`MAX_PAGES`] are ignored.
pub fn parse(expr: &str) -> Vec<usize> {
    parse_within(expr, MAX_PAGES)
}

/// Like [`parse`], but only yields indices below `total_pages`.
///
/// Ranges are clamped before they are expanded, so `1-4000000000` on a
/// five-page document costs five entries.
pub fn parse_within(expr: &str, total_pages: usize) -> Vec<usize> {
    let mut out = Vec::new();
    for term in expr.split(',') {
        if let Some(caps) = RE_RANGE.captures(term) {
            let (Ok(start), Ok(end)) = (caps[1].parse::<usize>(), caps[2].parse::<usize>()) else {
                continue;
            };
            if start == 0 || end < start {
                continue;
            }
            out.extend((start..=end.min(total_pages)).map(|p| p - 1));
        } else if let Some(caps) = RE_SINGLE.captures(term) {
            match caps[1].parse::<usize>() {
                Ok(p) if p >= 1 && p <= total_pages => out.push(p - 1),
                _ => {}
            }
        }
    }
    out.sort_unstable();
    out.dedup();
    out
}

/// Render 0-based indices back into the canonical 1-based expression,
/// collapsing consecutive runs: `[0, 2, 3, 4]` → `"1,3-5"`.
pub fn canonical(indices: &[usize]) -> String {
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut terms = Vec::new();
    let mut iter = sorted.into_iter().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            iter.next();
        }
        if start == end {
            terms.push(format!("{}", start + 1));
        } else {
            terms.push(format!("{}-{}", start + 1, end + 1));
        }
    }
    terms.join(",")
}

/// A page-range expression as stored in node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageRange(pub String);

impl PageRange {
    pub fn new(expr: impl Into<String>) -> Self {
        Self(expr.into())
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Expand into 0-based indices valid for a document of `total_pages`.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        parse_within(&self.0, total_pages)
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
