use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::db::{QuickHitAnswerRow, QuickHitRow};
use crate::parser::paragraphs::markup_text;
use crate::parser::patterns::{capture, correct_letter};

/// Opening tag of a bolded "QuickHit #n" paragraph; each block starts here.
static BLOCK_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<p(?:\s[^>]*)?>\s*<strong>\s*QuickHit\b").unwrap());
static STEM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Stem:\s*").unwrap());
static STEM_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n[A-Z]\.").unwrap());
static RATIONALE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"One-line rationale:\s*(.+)").unwrap());
static CHOICE_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([A-E])\.\s*(.+?)$").unwrap());

/// Split section markup before every QuickHit heading paragraph. The heading
/// stays with its block; blank pieces are dropped.
pub fn split_blocks(markup: &str) -> Vec<&str> {
    let mut cuts: Vec<usize> = BLOCK_START_RE.find_iter(markup).map(|m| m.start()).collect();
    if cuts.first() != Some(&0) {
        cuts.insert(0, 0);
    }
    cuts.push(markup.len());
    cuts.windows(2)
        .map(|w| &markup[w[0]..w[1]])
        .filter(|b| !b.trim().is_empty())
        .collect()
}

/// Stem text: after "Stem:" up to the first line opening with "X." or the end.
pub fn stem(block_text: &str) -> Option<String> {
    let start = STEM_RE.find(block_text)?.end();
    let rest = &block_text[start..];
    let end = STEM_END_RE.find(rest).map(|m| m.start()).unwrap_or(rest.len());
    let stem = rest[..end].trim();
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

/// A block without a stem yields nothing at all.
pub fn parse_block(block_markup: &str) -> Option<QuickHitRow> {
    let text = markup_text(block_markup);
    let Some(question_text) = stem(&text) else {
        debug!("quick hit block without a stem skipped");
        return None;
    };
    let rationale = capture(&RATIONALE_RE, &text).unwrap_or_default();
    let correct = correct_letter(&text);

    let answers = CHOICE_LINE_RE
        .captures_iter(&text)
        .filter_map(|c| {
            let letter = c[1].chars().next()?;
            Some(QuickHitAnswerRow {
                text: format!("{}. {}", letter, c[2].trim()),
                is_correct: Some(letter) == correct,
            })
        })
        .collect();

    Some(QuickHitRow {
        question_text,
        rationale,
        answers,
    })
}

pub fn extract(section_markup: &str) -> Vec<QuickHitRow> {
    let rows: Vec<QuickHitRow> = split_blocks(section_markup)
        .into_iter()
        .filter_map(parse_block)
        .collect();
    info!("quick hits: {} parsed", rows.len());
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_HITS: &str = concat!(
        "<p><strong>QuickHit #1</strong></p>",
        "<p>Stem: Most common cause of SBO?</p>",
        "<p>A. Adhesions</p><p>B. Hernia</p><p>C. Tumor</p>",
        "<p>Correct answer: A</p>",
        "<p>One-line rationale: Prior surgery dominates.</p>",
        "<p><strong>QuickHit #2</strong></p>",
        "<p>Stem: First test for suspected SBO?</p>",
        "<p>A. CT</p><p>B. Upright film</p>",
        "<p>Correct answer: B</p>",
    );

    #[test]
    fn blocks_split_before_each_heading() {
        let blocks = split_blocks(TWO_HITS);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].starts_with("<p><strong>QuickHit #1"));
        assert!(blocks[1].starts_with("<p><strong>QuickHit #2"));
    }

    #[test]
    fn leading_preamble_is_its_own_block() {
        let blocks = split_blocks("<p>intro</p><p><strong>QuickHit 1</strong></p><p>Stem: x</p>");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], "<p>intro</p>");
    }

    #[test]
    fn parses_both_hits() {
        let hits = extract(TWO_HITS);
        assert_eq!(hits.len(), 2);

        let first = &hits[0];
        assert_eq!(first.question_text, "Most common cause of SBO?");
        assert_eq!(first.rationale, "Prior surgery dominates.");
        let texts: Vec<&str> = first.answers.iter().map(|a| a.text.as_str()).collect();
        assert_eq!(texts, vec!["A. Adhesions", "B. Hernia", "C. Tumor"]);
        assert!(first.answers[0].is_correct);
        assert!(!first.answers[1].is_correct);

        let second = &hits[1];
        assert_eq!(second.rationale, "");
        assert!(second.answers[1].is_correct);
    }

    #[test]
    fn block_without_stem_is_ignored() {
        let markup = concat!(
            "<p><strong>QuickHit #1</strong></p><p>Question: no stem label</p><p>A. x</p><p>Correct answer: A</p>",
            "<p><strong>QuickHit #2</strong></p><p>Stem: kept</p>",
        );
        let hits = extract(markup);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].question_text, "kept");
        assert!(hits[0].answers.is_empty());
    }

    #[test]
    fn stem_may_span_paragraphs_until_a_choice() {
        let text = "QuickHit #1\nStem: line one\nline two\nA. choice";
        assert_eq!(stem(text).as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn stem_with_bold_label() {
        let block = "<p><strong>QuickHit #3</strong></p><p><strong>Stem:</strong> Best imaging?</p><p>A. US</p>";
        let hit = parse_block(block).unwrap();
        assert_eq!(hit.question_text, "Best imaging?");
        assert_eq!(hit.answers.len(), 1);
        assert!(!hit.answers[0].is_correct);
    }

    #[test]
    fn empty_section_has_no_hits() {
        assert!(extract("").is_empty());
        assert!(extract("   ").is_empty());
    }
}
