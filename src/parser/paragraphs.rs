use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

static P_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());

/// One block-level `<p>` node of the converted document.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    /// All text of the paragraph concatenated, trimmed.
    pub text: String,
    /// Non-blank text nodes in document order (bold label and value are separate runs).
    pub runs: Vec<String>,
    pub inner_html: String,
    pub outer_html: String,
}

impl Paragraph {
    fn from_element(el: ElementRef<'_>) -> Self {
        let mut text = String::new();
        let mut runs = Vec::new();
        for node in el.text() {
            text.push_str(node);
            if !node.trim().is_empty() {
                runs.push(node.to_string());
            }
        }
        Paragraph {
            text: text.trim().to_string(),
            runs,
            inner_html: el.inner_html(),
            outer_html: el.html(),
        }
    }
}

/// Flatten markup into the ordered paragraph stream. Anything outside a `<p>`
/// (tables are flattened by their cell paragraphs) is not part of the stream.
pub fn split_paragraphs(markup: &str) -> Vec<Paragraph> {
    let fragment = Html::parse_fragment(markup);
    fragment
        .select(&P_SELECTOR)
        .map(Paragraph::from_element)
        .collect()
}

/// Text of a paragraph run, one line per text node.
pub fn join_text(paragraphs: &[Paragraph]) -> String {
    paragraphs
        .iter()
        .flat_map(|p| p.runs.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Raw markup of a paragraph run, outer tags included.
pub fn join_html(paragraphs: &[Paragraph]) -> String {
    paragraphs.iter().map(|p| p.outer_html.as_str()).collect()
}

/// Text of an arbitrary markup fragment, one line per non-blank text node.
pub fn markup_text(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    fragment
        .root_element()
        .text()
        .filter(|t| !t.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_flat_paragraphs() {
        let paras = split_paragraphs("<p>one</p><p>two</p>\n<p>three</p>");
        let texts: Vec<&str> = paras.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn keeps_inner_and_outer_markup() {
        let paras = split_paragraphs("<p><strong>A.</strong> Aorta</p>");
        assert_eq!(paras[0].text, "A. Aorta");
        assert_eq!(paras[0].inner_html, "<strong>A.</strong> Aorta");
        assert_eq!(paras[0].outer_html, "<p><strong>A.</strong> Aorta</p>");
        assert_eq!(paras[0].runs, vec!["A.".to_string(), " Aorta".to_string()]);
    }

    #[test]
    fn decodes_entities_in_text() {
        let paras = split_paragraphs("<p>Na &amp; K &lt; 5</p>");
        assert_eq!(paras[0].text, "Na & K < 5");
        assert_eq!(paras[0].inner_html, "Na &amp; K &lt; 5");
    }

    #[test]
    fn paragraphs_inside_tables_are_found() {
        let paras = split_paragraphs("<p>x</p><table><tr><td><p>cell</p></td></tr></table>");
        assert_eq!(paras.len(), 2);
        assert_eq!(paras[1].text, "cell");
    }

    #[test]
    fn empty_markup_has_no_paragraphs() {
        assert!(split_paragraphs("").is_empty());
        assert!(split_paragraphs("<div>no paragraphs</div>").is_empty());
    }

    #[test]
    fn join_text_is_one_line_per_run() {
        let paras = split_paragraphs("<p><strong>Subject tag:</strong> Cardiology</p><p>Topic tag: Shock</p>");
        assert_eq!(join_text(&paras), "Subject tag:\n Cardiology\nTopic tag: Shock");
    }

    #[test]
    fn markup_text_ignores_blank_nodes() {
        let text = markup_text("<p><strong>QuickHit #1</strong></p>\n<p>Stem: why?</p>");
        assert_eq!(text, "QuickHit #1\nStem: why?");
    }
}
