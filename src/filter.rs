//! Comment selection
//!
//! Rules run in a fixed precedence order and the first match decides the
//! verdict: length, removed/deleted, blocked topic, pinned, link.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::text::{clean_comment_body, contains_url, strip_emoji};
use crate::thread::Comment;

/// Why a comment was left out of the video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    TooLong,
    RemovedOrDeleted,
    BlockedTopic,
    Pinned,
    ContainsUrl,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TooLong => "too-long",
            Self::RemovedOrDeleted => "removed-or-deleted",
            Self::BlockedTopic => "blocked-topic",
            Self::Pinned => "pinned",
            Self::ContainsUrl => "contains-url",
        };
        f.write_str(s)
    }
}

/// Outcome of classifying a single comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterVerdict {
    Accepted,
    Rejected(RejectReason),
}

/// Limits and word lists for comment selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Longest accepted body, in characters
    pub max_length: usize,
    /// Stop once this many comments are accepted
    pub comment_limit: usize,
    /// Bodies that mark a removed or deleted comment
    pub removed_sentinels: Vec<String>,
    /// Case-insensitive substrings that reject a comment
    pub blocked_topics: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_length: 3000,
            comment_limit: 10,
            removed_sentinels: vec!["[removed]".to_string(), "[deleted]".to_string()],
            blocked_topics: vec!["covid".to_string(), "vaccine".to_string()],
        }
    }
}

impl FilterConfig {
    /// Set the accepted-comment cap
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.comment_limit = limit;
        self
    }

    /// Set the maximum body length
    #[must_use]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }
}

/// Accepted comments (cleaned copies, input order) and rejected ones with
/// their reason.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub accepted: Vec<Comment>,
    pub rejected: Vec<(Comment, RejectReason)>,
}

/// Classify one comment against the rules.
#[must_use]
pub fn classify(comment: &Comment, limits: &FilterConfig) -> FilterVerdict {
    let body = comment.body.as_str();

    if comment.raw_len() > limits.max_length {
        return FilterVerdict::Rejected(RejectReason::TooLong);
    }

    if limits.removed_sentinels.iter().any(|s| s == body) {
        return FilterVerdict::Rejected(RejectReason::RemovedOrDeleted);
    }

    let lower = body.to_lowercase();
    if limits
        .blocked_topics
        .iter()
        .any(|topic| !topic.is_empty() && lower.contains(&topic.to_lowercase()))
    {
        return FilterVerdict::Rejected(RejectReason::BlockedTopic);
    }

    if comment.stickied {
        return FilterVerdict::Rejected(RejectReason::Pinned);
    }

    if contains_url(&strip_emoji(body)) {
        return FilterVerdict::Rejected(RejectReason::ContainsUrl);
    }

    FilterVerdict::Accepted
}

/// Select comments for the video.
///
/// Stops as soon as `comment_limit` comments are accepted; anything after
/// that point is neither accepted nor rejected.
#[must_use]
pub fn filter(candidates: &[Comment], limits: &FilterConfig) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();

    if limits.comment_limit == 0 {
        return outcome;
    }

    for (index, comment) in candidates.iter().enumerate() {
        debug!(
            index,
            id = %comment.id,
            author = comment.author.as_deref().unwrap_or("-"),
            stickied = comment.stickied,
            length = comment.raw_len(),
            "classifying comment"
        );

        match classify(comment, limits) {
            FilterVerdict::Accepted => {
                info!(id = %comment.id, "comment accepted");
                outcome.accepted.push(Comment {
                    body: clean_comment_body(&comment.body),
                    ..comment.clone()
                });
            }
            FilterVerdict::Rejected(reason) => {
                info!(id = %comment.id, %reason, "comment rejected");
                outcome.rejected.push((comment.clone(), reason));
            }
        }

        if outcome.accepted.len() == limits.comment_limit {
            info!(
                accepted = outcome.accepted.len(),
                rejected = outcome.rejected.len(),
                "comment limit reached"
            );
            break;
        }
    }

    outcome
}
