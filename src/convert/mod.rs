pub mod docx;

use tracing::info;

use crate::error::{ImportError, Result};

/// What the image hook hands back; `src` replaces the image in the markup.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRef {
    pub src: String,
}

/// Called once per embedded image with its bytes and content type.
pub type ImageHook<'a> = dyn FnMut(&[u8], &str) -> Result<ImageRef> + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Docx,
    Html,
    Text,
}

impl SourceKind {
    pub fn detect(bytes: &[u8]) -> Result<SourceKind> {
        if bytes.starts_with(b"PK\x03\x04") {
            return Ok(SourceKind::Docx);
        }
        let text = std::str::from_utf8(bytes).map_err(|_| ImportError::UnrecognizedFormat)?;
        let head = text.trim_start_matches('\u{feff}').trim_start();
        if head.starts_with('<') {
            Ok(SourceKind::Html)
        } else {
            Ok(SourceKind::Text)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Converted {
    pub kind: SourceKind,
    pub markup: String,
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// One escaped `<p>` per non-blank line.
pub fn text_to_markup(text: &str) -> String {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| format!("<p>{}</p>", escape(l)))
        .collect()
}

/// Raw upload bytes → flat paragraph markup.
pub fn to_markup(bytes: &[u8], hook: &mut ImageHook) -> Result<Converted> {
    let kind = SourceKind::detect(bytes)?;
    let markup = match kind {
        SourceKind::Docx => docx::convert(bytes, hook)?,
        SourceKind::Html => String::from_utf8_lossy(bytes).into_owned(),
        SourceKind::Text => text_to_markup(&String::from_utf8_lossy(bytes)),
    };
    info!(kind = ?kind, "converted {} bytes to {} bytes of markup", bytes.len(), markup.len());
    Ok(Converted { kind, markup })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_images(_: &[u8], _: &str) -> Result<ImageRef> {
        panic!("no images expected");
    }

    #[test]
    fn detects_kinds() {
        assert_eq!(SourceKind::detect(b"PK\x03\x04rest").unwrap(), SourceKind::Docx);
        assert_eq!(SourceKind::detect(b"  <p>x</p>").unwrap(), SourceKind::Html);
        assert_eq!(SourceKind::detect("\u{feff}<html>".as_bytes()).unwrap(), SourceKind::Html);
        assert_eq!(SourceKind::detect(b"[QUESTION_START]").unwrap(), SourceKind::Text);
        assert!(matches!(
            SourceKind::detect(&[0xff, 0xfe, 0x00, 0x41]),
            Err(ImportError::UnrecognizedFormat)
        ));
    }

    #[test]
    fn text_lines_become_escaped_paragraphs() {
        let markup = text_to_markup("[ANSWER]: [x] a < b\n\n   \nnext");
        assert_eq!(markup, "<p>[ANSWER]: [x] a &lt; b</p><p>next</p>");
    }

    #[test]
    fn html_passes_through() {
        let c = to_markup(b"<p>Key Point</p>", &mut no_images).unwrap();
        assert_eq!(c.kind, SourceKind::Html);
        assert_eq!(c.markup, "<p>Key Point</p>");
    }

    #[test]
    fn docx_is_routed_to_the_docx_converter() {
        let bytes = docx::tests::build_docx("<w:p><w:r><w:t>Subject tag: Breast</w:t></w:r></w:p>", &[]);
        let c = to_markup(&bytes, &mut no_images).unwrap();
        assert_eq!(c.kind, SourceKind::Docx);
        assert_eq!(c.markup, "<p>Subject tag: Breast</p>");
    }
}
