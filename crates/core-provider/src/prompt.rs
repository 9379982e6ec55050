//! Prompt assembly and completion post-processing.
//!
//! The host buffer stores some characters escaped with a backslash (by
//! default `<`, written `\<`). Prompts are un-escaped before they leave the
//! process and completions are re-escaped before they become node text.

/// Prompt text ready for tokenization, plus what was trimmed from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPrompt {
    pub text: String,
    /// Trailing whitespace was removed from the path text.
    pub stripped_whitespace: bool,
}

/// Whether a provider continues text or answers a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStyle {
    Plain,
    Chat,
}

/// `prepend + path_text`, trailing whitespace stripped, escapes undone.
pub fn assemble(prepend: &str, path_text: &str, escaped_chars: &str) -> PreparedPrompt {
    let trimmed = path_text.trim_end();
    let stripped_whitespace = trimmed.len() != path_text.len();
    let mut text = String::with_capacity(prepend.len() + trimmed.len());
    text.push_str(prepend);
    text.push_str(&unescape(trimmed, escaped_chars));
    PreparedPrompt {
        text,
        stripped_whitespace,
    }
}

/// Replace `\c` with `c` for every `c` in `escaped_chars`. Other backslashes stay.
pub fn unescape(text: &str, escaped_chars: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(&next) = chars.peek()
            && escaped_chars.contains(next)
        {
            out.push(next);
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}

pub fn escape(text: &str, escaped_chars: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if escaped_chars.contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Turn one raw completion into node text.
///
/// Plain providers tend to open with the space that was stripped from the
/// prompt; since the parent node still ends with it, one leading space is
/// dropped. Chat providers never continue mid-word, so when nothing was
/// stripped a single separating space is added.
pub fn postprocess(
    raw: Option<String>,
    style: ProviderStyle,
    stripped_whitespace: bool,
    escaped_chars: &str,
) -> String {
    let raw = raw.unwrap_or_default();
    let mut text = escape(&raw, escaped_chars);
    match style {
        ProviderStyle::Plain if stripped_whitespace && text.starts_with(' ') => {
            text.remove(0);
        }
        ProviderStyle::Chat if !stripped_whitespace && !text.is_empty() => {
            text = format!(" {}", text.trim_start());
        }
        ProviderStyle::Chat if stripped_whitespace => {
            text = text.trim_start().to_string();
        }
        _ => {}
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn assemble_strips_and_unescapes() {
        let p = assemble("<|endoftext|>", "a \\<b> c  \n", "<");
        assert_eq!(p.text, "<|endoftext|>a <b> c");
        assert!(p.stripped_whitespace);
        let q = assemble("", "word", "<");
        assert!(!q.stripped_whitespace);
    }

    #[test]
    fn unescape_leaves_other_backslashes() {
        assert_eq!(unescape(r"a\nb\<", "<"), "a\\nb<");
        assert_eq!(unescape("trailing\\", "<"), "trailing\\");
    }

    #[test]
    fn escape_marks_reserved() {
        assert_eq!(escape("<a><b>", "<"), "\\<a>\\<b>");
        assert_eq!(escape("plain", ""), "plain");
    }

    #[test]
    fn plain_drops_duplicate_space_after_strip() {
        assert_eq!(
            postprocess(Some(" there".into()), ProviderStyle::Plain, true, "<"),
            "there"
        );
        assert_eq!(
            postprocess(Some(" there".into()), ProviderStyle::Plain, false, "<"),
            " there"
        );
    }

    #[test]
    fn chat_adds_single_space_when_prompt_ended_in_word() {
        assert_eq!(
            postprocess(Some("there".into()), ProviderStyle::Chat, false, "<"),
            " there"
        );
        assert_eq!(
            postprocess(Some("  there".into()), ProviderStyle::Chat, false, "<"),
            " there"
        );
        assert_eq!(
            postprocess(Some(" there".into()), ProviderStyle::Chat, true, "<"),
            "there"
        );
    }

    #[test]
    fn missing_completion_becomes_empty() {
        assert_eq!(postprocess(None, ProviderStyle::Chat, false, "<"), "");
        assert_eq!(
            postprocess(Some("<tag>".into()), ProviderStyle::Plain, false, "<"),
            "\\<tag>"
        );
    }
}
