//! Strip terminal control sequences from untrusted email text.
//!
//! Subjects, bodies, and model reasons all come from outside the process and
//! are printed to a terminal by the popup and the `show` command.

use std::borrow::Cow;

const ESC: char = '\x1b';
const BEL: char = '\x07';
const C1_CSI: char = '\u{009b}';

/// Remove ANSI escape sequences and control characters other than `\n`, `\t`, `\r`.
///
/// Returns the input borrowed when nothing needs removing.
///
/// ```
/// use becwatch_types::sanitize_terminal_text;
///
/// assert_eq!(sanitize_terminal_text("Invoice #42"), "Invoice #42");
/// assert_eq!(sanitize_terminal_text("Pay\x1b[2J now"), "Pay now");
/// ```
#[must_use]
pub fn sanitize_terminal_text(input: &str) -> Cow<'_, str> {
    if !input.chars().any(is_stripped) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ESC => match chars.next() {
                Some('[') => skip_csi(&mut chars),
                Some(']' | 'P' | '^' | '_' | 'X') => skip_string(&mut chars),
                // Two-character escapes (ESC 7, ESC c, ...) are already consumed.
                _ => {}
            },
            C1_CSI => skip_csi(&mut chars),
            c if is_stripped(c) => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn is_stripped(c: char) -> bool {
    if matches!(c, '\n' | '\t' | '\r') {
        return false;
    }
    c.is_control()
}

/// CSI: parameter and intermediate bytes, then one final byte in `@..=~`.
fn skip_csi(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    for c in chars.by_ref() {
        if ('@'..='~').contains(&c) {
            return;
        }
    }
}

/// OSC/DCS/PM/APC/SOS: runs until BEL or ESC `\`.
fn skip_string(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while let Some(c) = chars.next() {
        if c == BEL {
            return;
        }
        if c == ESC && chars.peek() == Some(&'\\') {
            chars.next();
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::sanitize_terminal_text;
    use std::borrow::Cow;

    #[test]
    fn clean_text_is_borrowed() {
        let text = "Hi Bob,\n\tplease review.";
        assert!(matches!(sanitize_terminal_text(text), Cow::Borrowed(_)));
    }

    #[test]
    fn strips_csi_sequences() {
        assert_eq!(sanitize_terminal_text("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(sanitize_terminal_text("a\u{009b}2Jb"), "ab");
    }

    #[test]
    fn strips_osc_hyperlinks_and_clipboard() {
        let link = "\x1b]8;;https://evil.example\x07click\x1b]8;;\x07";
        assert_eq!(sanitize_terminal_text(link), "click");
        let clip = "x\x1b]52;c;ZXZpbA==\x1b\\y";
        assert_eq!(sanitize_terminal_text(clip), "xy");
    }

    #[test]
    fn strips_bare_controls_but_keeps_whitespace() {
        assert_eq!(sanitize_terminal_text("a\x00b\x7fc\x08d\n"), "abcd\n");
    }

    #[test]
    fn keeps_non_ascii_text() {
        assert_eq!(sanitize_terminal_text("⚠️ Überweisung\x1b[K"), "⚠️ Überweisung");
    }
}
