/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Structural acceptance checks for generated drafts.
//!
//! A draft failing any check is a failed attempt of the draft stage: the
//! content collaborator regenerates against the same topic, consuming the
//! stage's retry budget. Drafts are never silently patched or passed
//! downstream.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::GeneratedDraft;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static PARAGRAPH_OPEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<p[\s>]").unwrap());
static HEADING_OPEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<h2[\s>]").unwrap());

/// Characters that may legitimately end the final sentence of a body.
const SENTENCE_TERMINALS: &[char] = &['.', '!', '?', '…', '"', '\u{201d}', '»', ')'];

/// Thresholds for draft structural validation.
///
/// Defaults reflect the observed production tuning; all of them are
/// operator-configurable, not hardcoded law.
#[derive(Debug, Clone)]
pub struct DraftPolicy {
    /// Minimum body length in words, tags excluded.
    pub min_words: usize,
    pub min_title_chars: usize,
    pub max_title_chars: usize,
    pub min_summary_chars: usize,
    pub max_summary_chars: usize,
    /// Minimum number of `<h2>` section headings.
    pub min_headings: usize,
    /// Minimum number of paragraphs.
    pub min_paragraphs: usize,
}

impl Default for DraftPolicy {
    fn default() -> Self {
        Self {
            min_words: 1200,
            min_title_chars: 10,
            max_title_chars: 60,
            min_summary_chars: 20,
            max_summary_chars: 160,
            min_headings: 3,
            min_paragraphs: 8,
        }
    }
}

/// Runs all structural checks against a draft. An empty result means the
/// draft is acceptable.
pub fn validate_draft(draft: &GeneratedDraft, policy: &DraftPolicy) -> Vec<String> {
    let mut problems = Vec::new();

    check_title(draft, policy, &mut problems);
    check_summary(draft, policy, &mut problems);
    check_body(draft, policy, &mut problems);

    problems
}

fn check_title(draft: &GeneratedDraft, policy: &DraftPolicy, problems: &mut Vec<String>) {
    let title = draft.title.trim();
    if title.is_empty() {
        problems.push("title is empty".into());
        return;
    }
    let chars = title.chars().count();
    if chars < policy.min_title_chars {
        problems.push(format!(
            "title too short: {} chars (min {})",
            chars, policy.min_title_chars
        ));
    }
    if chars > policy.max_title_chars {
        problems.push(format!(
            "title too long: {} chars (max {})",
            chars, policy.max_title_chars
        ));
    }
}

fn check_summary(draft: &GeneratedDraft, policy: &DraftPolicy, problems: &mut Vec<String>) {
    let summary = draft.summary.trim();
    if summary.is_empty() {
        problems.push("summary is empty".into());
        return;
    }
    let chars = summary.chars().count();
    if chars < policy.min_summary_chars {
        problems.push(format!(
            "summary too short: {} chars (min {})",
            chars, policy.min_summary_chars
        ));
    }
    if chars > policy.max_summary_chars {
        problems.push(format!(
            "summary too long: {} chars (max {})",
            chars, policy.max_summary_chars
        ));
    }
}

fn check_body(draft: &GeneratedDraft, policy: &DraftPolicy, problems: &mut Vec<String>) {
    let body = draft.body_html.trim();
    if body.is_empty() {
        problems.push("body is empty".into());
        return;
    }

    if !body.starts_with("<p") {
        problems.push("body must begin with a paragraph".into());
    }

    let paragraph_opens = PARAGRAPH_OPEN_RE.find_iter(body).count();
    let paragraph_closes = body.matches("</p>").count();
    if paragraph_opens != paragraph_closes {
        problems.push(format!(
            "unbalanced paragraph tags: {} opened, {} closed",
            paragraph_opens, paragraph_closes
        ));
    }

    let heading_opens = HEADING_OPEN_RE.find_iter(body).count();
    let heading_closes = body.matches("</h2>").count();
    if heading_opens != heading_closes {
        problems.push(format!(
            "unbalanced heading tags: {} opened, {} closed",
            heading_opens, heading_closes
        ));
    }

    if paragraph_opens < policy.min_paragraphs {
        problems.push(format!(
            "too few paragraphs: {} (min {})",
            paragraph_opens, policy.min_paragraphs
        ));
    }
    if heading_opens < policy.min_headings {
        problems.push(format!(
            "too few section headings: {} (min {})",
            heading_opens, policy.min_headings
        ));
    }

    let text = TAG_RE.replace_all(body, " ");
    let words = text.split_whitespace().count();
    if words < policy.min_words {
        problems.push(format!(
            "body too short: {} words (min {})",
            words, policy.min_words
        ));
    }

    // A body cut off mid-sentence by a token limit ends without terminal
    // punctuation once the markup is stripped.
    match text.trim_end().chars().last() {
        Some(last) if SENTENCE_TERMINALS.contains(&last) => {}
        Some(_) => problems.push("body ends with a truncated sentence".into()),
        None => {}
    }

    let lowered = body.to_lowercase();
    for marker in ["lorem ipsum", "[insert", "{insert"] {
        if lowered.contains(marker) {
            problems.push(format!("body contains placeholder marker {:?}", marker));
        }
    }
    if body.contains("TODO") {
        problems.push("body contains placeholder marker \"TODO\"".into());
    }
}
