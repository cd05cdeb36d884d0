pub mod extract;
pub mod legacy;
pub mod paragraphs;
pub mod patterns;
pub mod sections;

use tracing::{debug, info, warn};

use crate::error::{ImportError, Result};
use extract::ExtractedQuestion;
use paragraphs::{split_paragraphs, Paragraph};

/// The two document layouts. Chosen once per document, never by fallthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `[QUESTION_START]` … `[QUESTION_END]` blocks, many questions per document.
    Legacy,
    /// One question per document, sections introduced by heading paragraphs.
    Headings,
}

impl Format {
    pub fn sniff(markup: &str) -> Format {
        if markup.contains(legacy::QUESTION_START) {
            Format::Legacy
        } else {
            Format::Headings
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Legacy => "legacy",
            Format::Headings => "headings",
        }
    }

    fn extract(&self, paragraphs: &[Paragraph]) -> Result<Vec<ExtractedQuestion>> {
        match self {
            Format::Legacy => {
                let blocks = legacy::split_blocks(paragraphs);
                if blocks.is_empty() {
                    return Err(ImportError::NoQuestionBlocks);
                }
                Ok(blocks.into_iter().map(legacy::extract_block).collect())
            }
            Format::Headings => {
                if paragraphs.is_empty() {
                    return Err(ImportError::EmptyDocument);
                }
                let sections = sections::segment(paragraphs);
                for span in sections.spans() {
                    debug!(
                        section = %span.kind,
                        heading = ?span.heading,
                        paragraphs = span.end - span.start,
                        "segmented"
                    );
                }
                if sections.spans().len() == 1 {
                    warn!("no section headings found, whole document treated as header");
                }
                Ok(vec![extract::extract_all(&sections)])
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub format: Format,
    pub questions: Vec<ExtractedQuestion>,
}

/// Markup → paragraphs → sections → extracted questions. Pure; nothing is persisted.
pub fn parse_markup(markup: &str) -> Result<ParsedDocument> {
    let format = Format::sniff(markup);
    let paragraphs = split_paragraphs(markup);
    let questions = format.extract(&paragraphs)?;
    info!(
        format = format.as_str(),
        paragraphs = paragraphs.len(),
        "parsed {} question(s)",
        questions.len()
    );
    Ok(ParsedDocument { format, questions })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_picks_legacy_on_sentinel() {
        assert_eq!(Format::sniff("<p>[QUESTION_START]</p>"), Format::Legacy);
        assert_eq!(Format::sniff("<p>Key Point – x</p>"), Format::Headings);
        assert_eq!(Format::sniff(""), Format::Headings);
    }

    #[test]
    fn legacy_fixture_yields_two_questions() {
        let html = std::fs::read_to_string("tests/fixtures/legacy_questions.html").unwrap();
        let doc = parse_markup(&html).unwrap();
        assert_eq!(doc.format, Format::Legacy);
        assert_eq!(doc.questions.len(), 2);
        assert_eq!(doc.questions[1].question.subject.as_deref(), Some("Breast"));
    }

    #[test]
    fn heading_fixture_yields_one_question() {
        let html = std::fs::read_to_string("tests/fixtures/heading_question.html").unwrap();
        let doc = parse_markup(&html).unwrap();
        assert_eq!(doc.format, Format::Headings);
        assert_eq!(doc.questions.len(), 1);
        assert_eq!(doc.questions[0].answer_choices.len(), 5);
    }

    #[test]
    fn sentinel_inline_only_is_structural_failure() {
        let err = parse_markup("<p>see [QUESTION_START] below</p>").unwrap_err();
        assert!(matches!(err, ImportError::NoQuestionBlocks));
    }

    #[test]
    fn empty_heading_document_fails() {
        assert!(matches!(parse_markup(""), Err(ImportError::EmptyDocument)));
        assert!(matches!(parse_markup("<div>no paragraphs</div>"), Err(ImportError::EmptyDocument)));
    }

    #[test]
    fn headingless_document_does_not_fall_back_to_legacy() {
        let doc = parse_markup("<p>Subject tag: Vascular</p><p>[ANSWER]: [x] no</p>").unwrap();
        assert_eq!(doc.format, Format::Headings);
        assert_eq!(doc.questions[0].question.subject.as_deref(), Some("Vascular"));
        assert!(doc.questions[0].answer_choices.is_empty());
    }
}
