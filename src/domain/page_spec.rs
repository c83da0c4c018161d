//! Page selection domain logic.
//!
//! Turns human-authored page specifications such as `"1-3,5,8-10"` into
//! normalised, zero-based page index sets validated against a document.

use crate::error::{ToolkitError, ToolkitResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

/// How page numbers outside `1..=page_count` are treated.
///
/// A single policy applies to every operation of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutOfRangePolicy {
    /// Fail with [`ToolkitError::OutOfRange`].
    #[default]
    Reject,
    /// Drop the offending page silently.
    Skip,
}

impl FromStr for OutOfRangePolicy {
    type Err = ToolkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "skip" => Ok(Self::Skip),
            other => Err(ToolkitError::invalid_format(
                other,
                "expected 'reject' or 'skip'",
            )),
        }
    }
}

/// One token of a page specification, still one-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageToken {
    Single(u64),
    Range(u64, u64),
}

/// A parsed page specification, independent of any document.
///
/// Parsing only checks the grammar; bounds are checked by
/// [`PageSpec::resolve`] once the page count is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSpec {
    tokens: Vec<PageToken>,
}

impl PageSpec {
    fn token_regex() -> &'static Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"^\s*(\d+)\s*(?:-\s*(\d+)\s*)?$").expect("Valid page token regex")
        });
        &PATTERN
    }

    /// Parses a comma-separated list of one-based pages and `A-B` ranges.
    ///
    /// Blank tokens are ignored, so `""` is an empty specification.
    pub fn parse(spec: &str) -> ToolkitResult<Self> {
        let mut tokens = Vec::new();

        for raw in spec.split(',') {
            if raw.trim().is_empty() {
                continue;
            }

            let caps = Self::token_regex().captures(raw).ok_or_else(|| {
                ToolkitError::invalid_format(
                    raw.trim(),
                    "expected a page number or a range such as 1-3",
                )
            })?;

            let start = parse_number(&caps[1], raw)?;
            let token = match caps.get(2) {
                Some(end) => {
                    let end = parse_number(end.as_str(), raw)?;
                    if start > end {
                        return Err(ToolkitError::invalid_format(
                            raw.trim(),
                            format!("range start {} is greater than end {}", start, end),
                        ));
                    }
                    PageToken::Range(start, end)
                }
                None => PageToken::Single(start),
            };
            tokens.push(token);
        }

        Ok(Self { tokens })
    }

    /// Returns the parsed tokens in input order.
    pub fn tokens(&self) -> &[PageToken] {
        &self.tokens
    }

    /// Returns true if the specification names no pages at all.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Expands the specification against a document with `page_count` pages.
    pub fn resolve(
        &self,
        page_count: usize,
        policy: OutOfRangePolicy,
    ) -> ToolkitResult<PageIndexSet> {
        let mut set = PageIndexSet::new();

        for token in &self.tokens {
            let (start, end) = match *token {
                PageToken::Single(page) => (page, page),
                PageToken::Range(start, end) => (start, end),
            };

            for page in start..=end {
                if page == 0 || page > page_count as u64 {
                    match policy {
                        OutOfRangePolicy::Reject => {
                            return Err(ToolkitError::OutOfRange {
                                page: i64::try_from(page).unwrap_or(i64::MAX),
                                page_count,
                            })
                        }
                        OutOfRangePolicy::Skip => {
                            // Everything past the end is out of range too.
                            if page > page_count as u64 {
                                break;
                            }
                            continue;
                        }
                    }
                }
                set.insert((page - 1) as usize);
            }
        }

        Ok(set)
    }
}

fn parse_number(digits: &str, token: &str) -> ToolkitResult<u64> {
    digits
        .parse::<u64>()
        .map_err(|e| ToolkitError::invalid_format(token.trim(), e.to_string()))
}

/// Parses `spec` and resolves it against `page_count` in one step.
///
/// # Examples
///
/// ```
/// use pdf_toolkit::domain::{parse_page_spec, OutOfRangePolicy};
///
/// let set = parse_page_spec("1-3,5", 10, OutOfRangePolicy::Reject).unwrap();
/// assert_eq!(set.as_slice(), &[0, 1, 2, 4]);
/// ```
pub fn parse_page_spec(
    spec: &str,
    page_count: usize,
    policy: OutOfRangePolicy,
) -> ToolkitResult<PageIndexSet> {
    PageSpec::parse(spec)?.resolve(page_count, policy)
}

/// Ordered set of unique zero-based page indices.
///
/// Insertion order is preserved: the first occurrence of an index fixes its
/// position, later duplicates are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageIndexSet {
    order: Vec<usize>,
    seen: HashSet<usize>,
}

impl PageIndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `index` unless already present. Returns whether it was added.
    pub fn insert(&mut self, index: usize) -> bool {
        if self.seen.insert(index) {
            self.order.push(index);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.seen.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.order.iter().copied()
    }

    /// Returns the indices of `self` that are not in `other`, keeping order.
    pub fn without(&self, other: &PageIndexSet) -> PageIndexSet {
        self.iter().filter(|i| !other.contains(*i)).collect()
    }

    /// Every index `0..page_count` in ascending order.
    pub fn all(page_count: usize) -> Self {
        (0..page_count).collect()
    }
}

impl FromIterator<usize> for PageIndexSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = Self::new();
        for index in iter {
            set.insert(index);
        }
        set
    }
}

impl<'a> IntoIterator for &'a PageIndexSet {
    type Item = &'a usize;
    type IntoIter = std::slice::Iter<'a, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.iter()
    }
}
