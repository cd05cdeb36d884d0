use std::sync::LazyLock;

use regex::Regex;

use crate::db::QuestionRow;
use crate::parser::paragraphs::{join_html, Paragraph};
use crate::parser::patterns::{capture, choice_letter, non_empty};

/// Blueprint label → question bank it implies. Checked in order; first match wins.
static QUESTION_BANKS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"(?m)^Blueprint tag \(ABSITE\):\s*(.*)$").unwrap(), "ABSITE"),
        (Regex::new(r"(?m)^Blueprint tag \(ABS QE\):\s*(.*)$").unwrap(), "ABS QE"),
    ]
});

static SUBJECT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^Subject tag:\s*(.*)$").unwrap());
static TOPIC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^Topic tag:\s*(.*)$").unwrap());
static CATEGORY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^Category tag:\s*(.*)$").unwrap());
static SUBCATEGORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Subcategory tag:\s*(.*)$").unwrap());

const TOPIC_MARKER: &str = "Topic tag:";

/// Metadata fields from the header text. Absent lines leave the field `None`.
pub fn extract(header_text: &str) -> QuestionRow {
    let mut row = QuestionRow::default();

    if let Some((blueprint, bank)) = QUESTION_BANKS.iter().find_map(|(re, bank)| {
        re.captures(header_text)
            .map(|c| (c.get(1).map(|m| m.as_str().trim().to_string()), *bank))
    }) {
        row.question_bank = Some(bank.to_string());
        row.blueprint = blueprint.filter(|b| !b.is_empty());
    }

    row.subject = capture(&SUBJECT_RE, header_text);
    row.topic = capture(&TOPIC_RE, header_text);
    row.category = capture(&CATEGORY_RE, header_text);
    row.subcategory = capture(&SUBCATEGORY_RE, header_text);

    row
}

/// Question stem: the raw markup of every paragraph after the one carrying
/// "Topic tag:", up to the first answer choice paragraph.
pub fn question_text(header: &[Paragraph]) -> Option<String> {
    let start = header.iter().position(|p| p.text.contains(TOPIC_MARKER))?;
    let rest = &header[start + 1..];
    let end = rest
        .iter()
        .position(|p| choice_letter(p).is_some())
        .unwrap_or(rest.len());
    non_empty(join_html(&rest[..end]))
}
