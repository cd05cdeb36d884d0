pub mod answers;
pub mod metadata;
pub mod quickhits;
pub mod references;

use tracing::debug;

use super::paragraphs::join_text;
use super::sections::Sections;
use crate::db::*;

/// Everything recovered for one question, ready to persist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedQuestion {
    pub question: QuestionRow,
    pub tags: Vec<String>,
    pub answer_choices: Vec<AnswerChoiceRow>,
    pub articles: Vec<ArticleRow>,
    pub quick_hits: Vec<QuickHitRow>,
}

/// Names of the question fields left empty, in column order.
pub fn absent_fields(q: &QuestionRow) -> Vec<&'static str> {
    let present = [
        ("question_bank", q.question_bank.is_some()),
        ("blueprint", q.blueprint.is_some()),
        ("subject", q.subject.is_some()),
        ("category", q.category.is_some()),
        ("subcategory", q.subcategory.is_some()),
        ("topic", q.topic.is_some()),
        ("difficulty", q.difficulty.is_some()),
        ("question_text", q.question_text.is_some()),
        ("short_explanation", q.short_explanation.is_some()),
        ("full_explanation", q.full_explanation.is_some()),
    ];
    present
        .into_iter()
        .filter(|(_, is_set)| !is_set)
        .map(|(name, _)| name)
        .collect()
}

pub fn log_absent(q: &QuestionRow) {
    for field in absent_fields(q) {
        debug!(field, "field absent");
    }
}

/// Heading-format extraction over already segmented sections.
pub fn extract_all(sections: &Sections) -> ExtractedQuestion {
    let header = sections.header();

    let mut question = metadata::extract(&join_text(header));
    question.question_text = metadata::question_text(header);
    question.short_explanation = sections.html("key_point");
    question.full_explanation = sections.html("expanded_explanation");
    log_absent(&question);

    let answer_choices = answers::extract(header, sections.get("commentary"));
    let articles = sections
        .get("references")
        .map(references::extract)
        .unwrap_or_default();
    let quick_hits = sections
        .html("quickhits")
        .map(|h| quickhits::extract(&h))
        .unwrap_or_default();

    ExtractedQuestion {
        question,
        tags: Vec::new(),
        answer_choices,
        articles,
        quick_hits,
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::paragraphs::split_paragraphs;
    use crate::parser::sections::segment;

    fn parse(fixture: &str) -> ExtractedQuestion {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", fixture)).unwrap();
        let paras = split_paragraphs(&html);
        extract_all(&segment(&paras))
    }

    #[test]
    fn fixture_metadata() {
        let q = parse("heading_question").question;
        assert_eq!(q.question_bank.as_deref(), Some("ABSITE"));
        assert_eq!(q.blueprint.as_deref(), Some("Trauma – Abdomen"));
        assert_eq!(q.subject.as_deref(), Some("Trauma"));
        assert_eq!(q.category.as_deref(), Some("Abdominal"));
        assert_eq!(q.topic.as_deref(), Some("Splenic injury"));
        assert_eq!(q.subcategory, None);
        assert_eq!(q.difficulty, None);
    }

    #[test]
    fn fixture_question_text_and_explanations() {
        let q = parse("heading_question").question;
        let text = q.question_text.unwrap();
        assert!(text.starts_with("<p>A 24-year-old man"));
        assert!(text.contains("ct-spleen.png"));
        assert!(text.ends_with("<p>What is the most appropriate next step?</p>"));
        assert!(!text.contains("Repeat FAST"));

        assert_eq!(
            q.short_explanation.as_deref(),
            Some("<p>An unstable patient with a positive FAST goes to the operating room.</p>")
        );
        let full = q.full_explanation.unwrap();
        assert!(full.contains("<em>operative</em>"));
        assert!(full.contains("Imaging delays definitive care."));
    }

    #[test]
    fn fixture_answers() {
        let x = parse("heading_question");
        assert_eq!(x.answer_choices.len(), 5);
        let correct: Vec<&str> = x
            .answer_choices
            .iter()
            .filter(|a| a.is_correct)
            .map(|a| a.text.as_str())
            .collect();
        assert_eq!(correct, vec!["Exploratory laparotomy"]);
        assert_eq!(
            x.answer_choices[1].explanation.as_deref(),
            Some("<em>CT</em> is for stable patients only.")
        );
    }

    #[test]
    fn fixture_references_and_quick_hits() {
        let x = parse("heading_question");
        assert_eq!(x.articles.len(), 2);
        assert!(x.articles[0].text.contains("<em>J Trauma Acute Care Surg</em>"));

        assert_eq!(x.quick_hits.len(), 2);
        assert_eq!(x.quick_hits[0].question_text, "Most common solid organ injured in blunt trauma?");
        assert_eq!(x.quick_hits[0].answers.len(), 3);
        assert!(x.quick_hits[0].answers[1].is_correct);
        assert_eq!(x.quick_hits[1].rationale, "Parenchymal depth over 3 cm is grade III.");
    }

    #[test]
    fn fixture_absent_fields() {
        let q = parse("heading_question").question;
        assert_eq!(absent_fields(&q), vec!["subcategory", "difficulty"]);
    }

    #[test]
    fn headingless_document_only_fills_header_fields() {
        let paras = split_paragraphs("<p>Subject tag: Breast</p><p>Topic tag: Mass</p><p>Stem</p><p>A. one</p>");
        let x = extract_all(&segment(&paras));
        assert_eq!(x.question.subject.as_deref(), Some("Breast"));
        assert_eq!(x.question.question_text.as_deref(), Some("<p>Stem</p>"));
        assert_eq!(x.question.short_explanation, None);
        assert_eq!(x.question.full_explanation, None);
        assert_eq!(x.answer_choices.len(), 1);
        assert!(x.articles.is_empty());
        assert!(x.quick_hits.is_empty());
    }
}
