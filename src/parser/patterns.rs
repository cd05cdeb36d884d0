use std::sync::LazyLock;

use regex::Regex;

use super::paragraphs::Paragraph;

/// Paragraph opening an answer choice: "A." through "E." at the very start.
pub static CHOICE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([A-E])\.").unwrap());
pub static CORRECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Correct answer:\s*([A-E])").unwrap());

/// Inline tags opened ahead of a choice letter in markup, then the letter itself.
static MARKUP_CHOICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*((?:<(?:strong|b|em|i|u)>\s*)*)([A-E])\.\s*").unwrap()
});
static EMPTY_INLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(strong|b|em|i|u)>\s*</(strong|b|em|i|u)>").unwrap()
});

/// First capture group of `re` in `text`, trimmed. Empty captures count as absent.
pub fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn choice_letter(paragraph: &Paragraph) -> Option<char> {
    CHOICE_RE
        .captures(&paragraph.text)
        .and_then(|c| c[1].chars().next())
}

pub fn correct_letter(text: &str) -> Option<char> {
    CORRECT_RE.captures(text).and_then(|c| c[1].chars().next())
}

/// Drop a leading "X." from `s` (after leading whitespace) and trim the rest.
///
/// Works on markup too: a letter wrapped in inline tags (`<strong>B.</strong>`)
/// loses the letter and the wrapper, while a tag that also spans the following
/// text stays open around it.
pub fn strip_choice_prefix(s: &str, letter: char) -> String {
    let Some(caps) = MARKUP_CHOICE_RE.captures(s) else {
        return s.trim().to_string();
    };
    if !caps[2].starts_with(letter) {
        return s.trim().to_string();
    }
    let mut out = format!("{}{}", &caps[1], &s[caps[0].len()..]);
    // Nested wrappers unwind one empty pair per pass.
    loop {
        let empty = EMPTY_INLINE_RE
            .captures_iter(&out)
            .find(|c| c[1] == c[2])
            .and_then(|c| c.get(0))
            .map(|m| m.range());
        match empty {
            Some(range) => out.replace_range(range, ""),
            None => break,
        }
    }
    out.trim().to_string()
}

pub fn non_empty(s: String) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else if t.len() == s.len() {
        Some(s)
    } else {
        Some(t.to_string())
    }
}
