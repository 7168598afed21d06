//! Operator interaction points
//!
//! The orchestrator never reads a terminal itself. Track and release
//! selection go through [`Selector`], the retry question through
//! [`RetryPrompt`]; the binary supplies stdin-backed implementations.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::progress::{Issues, RunSummary};

/// Chooses entries from a numbered list
#[async_trait]
pub trait Selector: Send + Sync {
    /// Return the chosen 1-based positions of `items`
    async fn select(&self, title: &str, items: &[String]) -> Result<Vec<usize>>;
}

/// Selector that takes every entry
#[derive(Clone, Copy, Debug, Default)]
pub struct SelectAll;

#[async_trait]
impl Selector for SelectAll {
    async fn select(&self, _title: &str, items: &[String]) -> Result<Vec<usize>> {
        Ok((1..=items.len()).collect())
    }
}

/// Asked after a pass that left failures behind
#[async_trait]
pub trait RetryPrompt: Send + Sync {
    /// Whether to run another pass over the failed tracks
    async fn confirm_retry(&self, summary: &RunSummary, issues: &Issues) -> bool;
}

/// Prompt that always declines
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverRetry;

#[async_trait]
impl RetryPrompt for NeverRetry {
    async fn confirm_retry(&self, _summary: &RunSummary, _issues: &Issues) -> bool {
        false
    }
}

/// Parse a selection such as `1 3 5-7` or `all` against a list of `count` entries
///
/// Commas and whitespace both separate entries. An empty answer selects
/// everything. The result is ascending without duplicates.
pub fn parse_selection(input: &str, count: usize) -> Result<Vec<usize>> {
    let input = input.trim();
    if input.is_empty() || input.eq_ignore_ascii_case("all") {
        return Ok((1..=count).collect());
    }

    let invalid = |token: &str| Error::Other(format!("invalid selection '{token}' (1-{count})"));
    let parse = |token: &str| -> Result<usize> {
        token
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=count).contains(n))
            .ok_or_else(|| invalid(token))
    };

    let mut chosen = std::collections::BTreeSet::new();
    for token in input.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        match token.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (parse(start)?, parse(end)?);
                if start > end {
                    return Err(invalid(token));
                }
                chosen.extend(start..=end);
            }
            None => {
                chosen.insert(parse(token)?);
            }
        }
    }
    Ok(chosen.into_iter().collect())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_accepts_numbers_ranges_and_all() {
        assert_eq!(parse_selection("1 3 5-7", 8).unwrap(), vec![1, 3, 5, 6, 7]);
        assert_eq!(parse_selection("2,2, 1", 3).unwrap(), vec![1, 2]);
        assert_eq!(parse_selection("all", 3).unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_selection("  ", 2).unwrap(), vec![1, 2]);
    }

    #[test]
    fn selection_rejects_out_of_range_and_reversed() {
        assert!(parse_selection("0", 3).is_err());
        assert!(parse_selection("4", 3).is_err());
        assert!(parse_selection("3-1", 3).is_err());
        assert!(parse_selection("x", 3).is_err());
    }

    #[tokio::test]
    async fn default_implementations() {
        let items = vec!["a".to_string(), "b".to_string()];
        assert_eq!(SelectAll.select("t", &items).await.unwrap(), vec![1, 2]);
        assert!(
            !NeverRetry
                .confirm_retry(&RunSummary::default(), &Issues::default())
                .await
        );
    }
}
