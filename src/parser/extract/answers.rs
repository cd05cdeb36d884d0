use tracing::{debug, info};

use crate::db::AnswerChoiceRow;
use crate::parser::paragraphs::{join_text, Paragraph};
use crate::parser::patterns::{choice_letter, correct_letter, strip_choice_prefix};

/// Letter → value in first-seen order. A repeated letter keeps its slot but
/// takes the later value.
fn by_letter<F>(paragraphs: &[Paragraph], value: F) -> Vec<(char, String)>
where
    F: Fn(&Paragraph, char) -> String,
{
    let mut out: Vec<(char, String)> = Vec::new();
    for p in paragraphs {
        let Some(letter) = choice_letter(p) else {
            continue;
        };
        let v = value(p, letter);
        match out.iter_mut().find(|(l, _)| *l == letter) {
            Some(slot) => slot.1 = v,
            None => out.push((letter, v)),
        }
    }
    out
}

/// Merge choice text from the header with per-choice commentary.
///
/// Only letters present in the header become choices; commentary for any other
/// letter is dropped, and a header choice without commentary has no explanation.
pub fn extract(header: &[Paragraph], commentary: Option<&[Paragraph]>) -> Vec<AnswerChoiceRow> {
    let texts = by_letter(header, |p, l| strip_choice_prefix(&p.text, l));
    let explanations = commentary
        .map(|c| by_letter(c, |p, l| strip_choice_prefix(&p.inner_html, l)))
        .unwrap_or_default();
    let correct = correct_letter(&join_text(header));

    for (letter, _) in &explanations {
        if !texts.iter().any(|(l, _)| l == letter) {
            debug!(%letter, "commentary for a choice missing from the header");
        }
    }

    let rows: Vec<AnswerChoiceRow> = texts
        .into_iter()
        .map(|(letter, text)| AnswerChoiceRow {
            text,
            is_correct: Some(letter) == correct,
            explanation: explanations
                .iter()
                .find(|(l, _)| *l == letter)
                .map(|(_, e)| e.clone()),
        })
        .collect();

    info!("answers: {} choices, correct: {:?}", rows.len(), correct);
    rows
}
