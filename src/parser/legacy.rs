use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use super::extract::{log_absent, ExtractedQuestion};
use super::paragraphs::{join_html, Paragraph};
use super::patterns::non_empty;
use crate::db::{AnswerChoiceRow, ArticleRow, QuestionRow, QuickHitAnswerRow, QuickHitRow};

pub const QUESTION_START: &str = "[QUESTION_START]";
const QUESTION_END: &str = "[QUESTION_END]";
const ANSWERS_START: &str = "[ANSWERS_START]";
const ANSWERS_END: &str = "[ANSWERS_END]";
const ARTICLES_START: &str = "--- Citations / Articles";
const QUICKHITS_START: &str = "--- QuickHits ---";
const QUICKHIT_START: &str = "[QUICKHIT_START]";

const ANSWER: &str = "[ANSWER]:";
const EXPLANATION: &str = "[EXPLANATION]:";
const ARTICLE: &str = "[ARTICLE]:";
const CHECKED: &str = "[x]";
const UNCHECKED: &str = "[ ]";

/// Any `[KEY]:` token; a single-line value ends where the next one begins.
static NEXT_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[A-Z_]+\]:").unwrap());

/// One slice per `[QUESTION_START]` paragraph; anything before the first is preamble.
pub fn split_blocks(paragraphs: &[Paragraph]) -> Vec<&[Paragraph]> {
    let starts: Vec<usize> = paragraphs
        .iter()
        .enumerate()
        .filter(|(_, p)| p.text == QUESTION_START)
        .map(|(i, _)| i)
        .collect();
    starts
        .iter()
        .enumerate()
        .map(|(n, &s)| {
            let end = starts.get(n + 1).copied().unwrap_or(paragraphs.len());
            &paragraphs[s + 1..end]
        })
        .collect()
}

/// Value of a single-line `[KEY]: value` field, from the first paragraph carrying `tag`.
///
/// The tag counts only in a run of fields: the paragraph must open with a
/// `[KEY]:` token, and `tag` must be one of the tokens in that run. So
/// `[BLUEPRINT]: X [TAGS]: a` carries `[TAGS]:` but `see [TAGS]: a` does not.
pub fn tag_content(block: &[Paragraph], tag: &str) -> Option<String> {
    block
        .iter()
        .find_map(|p| {
            let text = p.text.trim_start();
            let mut tokens = NEXT_TAG_RE.find_iter(text).peekable();
            if tokens.peek().map(|m| m.start()) != Some(0) {
                return None;
            }
            while let Some(m) = tokens.next() {
                if m.as_str() == tag {
                    let end = tokens.peek().map(|n| n.start()).unwrap_or(text.len());
                    return Some(text[m.end()..end].trim().to_string());
                }
            }
            None
        })
        .filter(|v| !v.is_empty())
}

/// Paragraphs after the one containing `start`, up to (not including) the
/// first containing `end`. Empty when `start` is missing; runs to the end of
/// the block when `end` is missing.
pub fn multiline<'a>(block: &'a [Paragraph], start: &str, end: &str) -> &'a [Paragraph] {
    let Some(s) = block.iter().position(|p| p.text.contains(start)) else {
        debug!(marker = start, "multiline marker not found");
        return &[];
    };
    let rest = &block[s + 1..];
    let e = rest
        .iter()
        .position(|p| p.text.contains(end))
        .unwrap_or(rest.len());
    &rest[..e]
}

fn multiline_html(block: &[Paragraph], start: &str, end: &str) -> Option<String> {
    non_empty(join_html(multiline(block, start, end)))
}

/// Strip the checkbox marker; `[x]` anywhere means correct.
fn checkbox(text: &str) -> (String, bool) {
    let is_correct = text.contains(CHECKED);
    let cleaned = text.replace(UNCHECKED, "").replace(CHECKED, "");
    (cleaned.trim().to_string(), is_correct)
}

fn answer_line(p: &Paragraph) -> Option<(String, bool)> {
    if !p.text.starts_with(ANSWER) {
        return None;
    }
    let (text, is_correct) = checkbox(&p.text.replace(ANSWER, ""));
    if text.is_empty() {
        None
    } else {
        Some((text, is_correct))
    }
}

pub fn tags(block: &[Paragraph]) -> Vec<String> {
    let Some(raw) = tag_content(block, "[TAGS]:") else {
        debug!(field = "tags", "field absent");
        return Vec::new();
    };
    let mut names: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

pub fn answers(block: &[Paragraph]) -> Vec<AnswerChoiceRow> {
    let section = multiline(block, ANSWERS_START, ANSWERS_END);
    let rows: Vec<AnswerChoiceRow> = section
        .iter()
        .enumerate()
        .filter_map(|(i, p)| {
            let (text, is_correct) = answer_line(p)?;
            let explanation = section
                .get(i + 1)
                .filter(|next| next.text.starts_with(EXPLANATION))
                .map(|next| next.text.replace(EXPLANATION, "").trim().to_string());
            Some(AnswerChoiceRow {
                text,
                is_correct,
                explanation,
            })
        })
        .collect();
    info!("answers: {} choices", rows.len());
    rows
}

pub fn articles(block: &[Paragraph]) -> Vec<ArticleRow> {
    multiline(block, ARTICLES_START, QUICKHITS_START)
        .iter()
        .filter(|p| p.text.starts_with(ARTICLE))
        .map(|p| p.text.replace(ARTICLE, "").trim().to_string())
        .filter(|t| !t.is_empty())
        .map(|text| ArticleRow { text })
        .collect()
}

pub fn quick_hits(block: &[Paragraph]) -> Vec<QuickHitRow> {
    let section = multiline(block, QUICKHITS_START, QUESTION_END);
    let starts: Vec<usize> = section
        .iter()
        .enumerate()
        .filter(|(_, p)| p.text.contains(QUICKHIT_START))
        .map(|(i, _)| i)
        .collect();

    let mut rows = Vec::new();
    for (n, &s) in starts.iter().enumerate() {
        let end = starts.get(n + 1).copied().unwrap_or(section.len());
        let hit = &section[s + 1..end];
        let Some(question_text) = tag_content(hit, "[QUESTION]:") else {
            debug!("quick hit without [QUESTION]: skipped");
            continue;
        };
        let rationale = tag_content(hit, "[RATIONALE]:").unwrap_or_else(|| {
            debug!(field = "rationale", "quick hit field absent");
            String::new()
        });
        rows.push(QuickHitRow {
            question_text,
            rationale,
            answers: hit
                .iter()
                .filter_map(answer_line)
                .map(|(text, is_correct)| QuickHitAnswerRow { text, is_correct })
                .collect(),
        });
    }
    info!("quick hits: {} of {} blocks", rows.len(), starts.len());
    rows
}

/// Everything one `[QUESTION_START]` block describes.
pub fn extract_block(block: &[Paragraph]) -> ExtractedQuestion {
    let difficulty = tag_content(block, "[DIFFICULTY]:").and_then(|d| match d.parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(value = %d, "difficulty is not a number");
            None
        }
    });

    let question = QuestionRow {
        question_bank: None,
        blueprint: tag_content(block, "[BLUEPRINT]:"),
        subject: tag_content(block, "[SUBJECT]:"),
        category: tag_content(block, "[CATEGORY]:"),
        subcategory: tag_content(block, "[SUBCATEGORY]:"),
        topic: tag_content(block, "[TOPIC]:"),
        difficulty,
        question_text: multiline_html(block, "[QUESTION_TEXT_START]", "[QUESTION_TEXT_END]"),
        short_explanation: multiline_html(block, "[SHORT_EXPLANATION_START]", "[SHORT_EXPLANATION_END]"),
        full_explanation: multiline_html(block, "[FULL_EXPLANATION_START]", "[FULL_EXPLANATION_END]"),
    };
    log_absent(&question);

    ExtractedQuestion {
        question,
        tags: tags(block),
        answer_choices: answers(block),
        articles: articles(block),
        quick_hits: quick_hits(block),
    }
}

// ── Tests ──
