use std::sync::LazyLock;

use regex::Regex;

use super::paragraphs::{join_html, Paragraph};

/// Recognized section headings, in the order authors write them.
pub const HEADINGS: &[&str] = &[
    "Key Point",
    "Expanded Explanation",
    "Answer-by-Answer Commentary",
    "References",
    "Image Source",
    "QUICKHITS",
];

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    let labels: Vec<String> = HEADINGS.iter().map(|h| regex::escape(h)).collect();
    Regex::new(&format!(r"^\s*({})\s*(?:–|-|$)", labels.join("|"))).unwrap()
});

pub const HEADER: &str = "header";

/// A named, contiguous run `start..end` of the paragraph stream.
/// `heading` is the index of the heading paragraph that opened it (none for the header).
#[derive(Debug, Clone, PartialEq)]
pub struct SectionSpan {
    pub kind: String,
    pub heading: Option<usize>,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug)]
pub struct Sections<'a> {
    paragraphs: &'a [Paragraph],
    spans: Vec<SectionSpan>,
}

impl<'a> Sections<'a> {
    pub fn spans(&self) -> &[SectionSpan] {
        &self.spans
    }

    /// Paragraphs of section `kind`. A repeated heading replaces the earlier one.
    pub fn get(&self, kind: &str) -> Option<&'a [Paragraph]> {
        let paragraphs = self.paragraphs;
        self.spans
            .iter()
            .rev()
            .find(|s| s.kind == kind)
            .map(|s| &paragraphs[s.start..s.end])
    }

    pub fn header(&self) -> &'a [Paragraph] {
        self.get(HEADER).unwrap_or(&[])
    }

    pub fn html(&self, kind: &str) -> Option<String> {
        self.get(kind).map(join_html).filter(|h| !h.is_empty())
    }
}

/// Section key for a heading label: lowercase, spaces and dashes folded to `_`,
/// every "answer by answer" variant folded to `commentary`.
pub fn section_key(label: &str) -> String {
    let key = label.trim().to_lowercase().replace([' ', '-'], "_");
    if key.contains("answer_by_answer") {
        "commentary".to_string()
    } else {
        key
    }
}

pub fn heading_label(paragraph: &Paragraph) -> Option<&str> {
    HEADING_RE
        .captures(&paragraph.text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Segment the paragraph stream by the linear position of known headings.
/// Everything before the first heading is the header; each heading's content
/// runs up to the next heading, the heading paragraph itself excluded.
pub fn segment(paragraphs: &[Paragraph]) -> Sections<'_> {
    let found: Vec<(usize, String)> = paragraphs
        .iter()
        .enumerate()
        .filter_map(|(i, p)| heading_label(p).map(|label| (i, section_key(label))))
        .collect();

    let first = found.first().map(|(i, _)| *i).unwrap_or(paragraphs.len());
    let mut spans = vec![SectionSpan {
        kind: HEADER.to_string(),
        heading: None,
        start: 0,
        end: first,
    }];

    for (n, (idx, kind)) in found.iter().enumerate() {
        let end = found
            .get(n + 1)
            .map(|(next, _)| *next)
            .unwrap_or(paragraphs.len());
        spans.push(SectionSpan {
            kind: kind.clone(),
            heading: Some(*idx),
            start: idx + 1,
            end,
        });
    }

    Sections { paragraphs, spans }
}

// ── Tests ──
