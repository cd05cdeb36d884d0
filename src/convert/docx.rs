use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, info};

use super::{escape, ImageHook};
use crate::error::{ImportError, Result};

const DOCUMENT: &str = "word/document.xml";
const DOCUMENT_RELS: &str = "word/_rels/document.xml.rels";

fn conversion<E: std::fmt::Display>(what: &str) -> impl FnOnce(E) -> ImportError + '_ {
    move |e| ImportError::Conversion(format!("{}: {}", what, e))
}

/// Content type of an embedded media part, from its extension.
pub fn content_type(target: &str) -> &'static str {
    let ext = target.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct RunFormat {
    bold: bool,
    italic: bool,
}

/// Builds one `<p>`, merging adjacent runs that share a format.
#[derive(Default)]
struct ParagraphBuilder {
    html: String,
    pending: Option<(RunFormat, String)>,
}

impl ParagraphBuilder {
    fn push_text(&mut self, fmt: RunFormat, text: &str) {
        match &mut self.pending {
            Some((f, buf)) if *f == fmt => buf.push_str(&escape(text)),
            _ => {
                self.flush();
                self.pending = Some((fmt, escape(text)));
            }
        }
    }

    fn push_raw(&mut self, html: &str) {
        self.flush();
        self.html.push_str(html);
    }

    fn flush(&mut self) {
        let Some((fmt, text)) = self.pending.take() else {
            return;
        };
        match (fmt.bold, fmt.italic) {
            (true, true) => self.html.push_str(&format!("<strong><em>{}</em></strong>", text)),
            (true, false) => self.html.push_str(&format!("<strong>{}</strong>", text)),
            (false, true) => self.html.push_str(&format!("<em>{}</em>", text)),
            (false, false) => self.html.push_str(&text),
        }
    }

    fn finish(mut self) -> String {
        self.flush();
        format!("<p>{}</p>", self.html)
    }
}

/// `<w:b/>` is on unless `w:val` says otherwise.
fn toggle_on(e: &BytesStart) -> bool {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"val" {
            return !matches!(attr.value.as_ref(), b"0" | b"false" | b"none");
        }
    }
    true
}

fn attr_value(e: &BytesStart, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

/// Relationship id → archive path of its target.
pub fn parse_rels(xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    let mut rels = HashMap::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr_value(e, b"Id"), attr_value(e, b"Target")) {
                    let path = match target.strip_prefix('/') {
                        Some(abs) => abs.to_string(),
                        None => format!("word/{}", target),
                    };
                    rels.insert(id, path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(conversion("relationships")(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

fn read_entry<R: Read + Seek>(archive: &mut zip::ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut file = archive.by_name(name).map_err(conversion(name))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Upload the image an `a:blip` points at and return its `<img>` tag.
fn embed_image<R: Read + Seek>(
    blip: &BytesStart,
    rels: &HashMap<String, String>,
    archive: &mut zip::ZipArchive<R>,
    hook: &mut ImageHook,
) -> Result<Option<String>> {
    let Some(id) = attr_value(blip, b"embed") else {
        return Ok(None);
    };
    let Some(target) = rels.get(&id) else {
        debug!(rel = %id, "image relationship not found");
        return Ok(None);
    };
    let data = read_entry(archive, target)?;
    let image = hook(&data, content_type(target))?;
    Ok(Some(format!("<img src=\"{}\"/>", escape(&image.src))))
}

/// Flatten `word/document.xml` into one `<p>` per `w:p`, handing every
/// embedded image to `hook` and placing the returned reference inline.
///
/// A `w:p` nested in another (text boxes) does not end its parent: it is
/// emitted after the outermost paragraph closes.
pub fn convert(bytes: &[u8], hook: &mut ImageHook) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(conversion("docx archive"))?;

    let document = String::from_utf8(read_entry(&mut archive, DOCUMENT)?).map_err(conversion(DOCUMENT))?;
    let rels = match read_entry(&mut archive, DOCUMENT_RELS) {
        Ok(raw) => parse_rels(&String::from_utf8_lossy(&raw))?,
        Err(_) => {
            debug!("no document relationships, images will be skipped");
            HashMap::new()
        }
    };

    let mut reader = Reader::from_str(&document);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut open: Vec<ParagraphBuilder> = Vec::new();
    let mut nested: Vec<String> = Vec::new();
    let mut fmt = RunFormat::default();
    let mut in_ppr = false;
    let mut in_text = false;
    let mut paragraphs = 0usize;
    let mut images = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"p" => open.push(ParagraphBuilder::default()),
                b"pPr" => in_ppr = true,
                b"r" => fmt = RunFormat::default(),
                b"t" => in_text = true,
                b"b" if !in_ppr => fmt.bold = toggle_on(e),
                b"i" if !in_ppr => fmt.italic = toggle_on(e),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"b" if !in_ppr => fmt.bold = toggle_on(e),
                b"i" if !in_ppr => fmt.italic = toggle_on(e),
                b"br" | b"cr" => {
                    if let Some(p) = open.last_mut() {
                        p.push_raw("<br/>");
                    }
                }
                b"tab" if !in_ppr => {
                    if let Some(p) = open.last_mut() {
                        p.push_text(fmt, "\t");
                    }
                }
                b"blip" => {
                    if let Some(tag) = embed_image(e, &rels, &mut archive, hook)? {
                        images += 1;
                        match open.last_mut() {
                            Some(p) => p.push_raw(&tag),
                            None => out.push_str(&format!("<p>{}</p>", tag)),
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_text => {
                let text = e.unescape().map_err(conversion("document text"))?;
                if let Some(p) = open.last_mut() {
                    p.push_text(fmt, &text);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"p" => {
                    if let Some(p) = open.pop() {
                        paragraphs += 1;
                        if open.is_empty() {
                            out.push_str(&p.finish());
                            for inner in nested.drain(..) {
                                out.push_str(&inner);
                            }
                        } else {
                            nested.push(p.finish());
                        }
                    }
                }
                b"pPr" => in_ppr = false,
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(conversion(DOCUMENT)(e)),
            _ => {}
        }
        buf.clear();
    }

    info!("docx: {} paragraphs, {} images", paragraphs, images);
    Ok(out)
}
