use tracing::info;

use crate::db::ArticleRow;
use crate::parser::paragraphs::Paragraph;

/// One article per non-blank paragraph, keeping its inner markup.
pub fn extract(references: &[Paragraph]) -> Vec<ArticleRow> {
    let rows: Vec<ArticleRow> = references
        .iter()
        .filter(|p| !p.text.is_empty())
        .map(|p| ArticleRow {
            text: p.inner_html.trim().to_string(),
        })
        .collect();
    info!("references: {} articles", rows.len());
    rows
}
