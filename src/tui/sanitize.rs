use std::borrow::Cow;
use std::iter::Peekable;
use std::str::Chars;

/// Make server-provided text safe to draw: escape sequences are dropped and
/// remaining control characters become spaces, so a transcript line can never
/// move the cursor or retitle the terminal.
pub(crate) fn sanitize_line(input: &str) -> Cow<'_, str> {
    if !input.chars().any(needs_cleaning) {
        return Cow::Borrowed(input);
    }

    let mut sanitized = String::with_capacity(input.len());
    let mut iter = input.chars().peekable();

    while let Some(ch) = iter.next() {
        match ch {
            '\u{1b}' => match iter.peek().copied() {
                Some(']' | 'P' | '_' | '^' | 'X') => {
                    iter.next();
                    skip_control_string(&mut iter);
                }
                Some('[') => {
                    iter.next();
                    skip_csi(&mut iter);
                }
                Some(_) => {
                    iter.next();
                }
                None => {}
            },
            '\u{9c}' => {}
            ch if ch.is_control() => sanitized.push(' '),
            ch => sanitized.push(ch),
        }
    }

    Cow::Owned(sanitized)
}

fn needs_cleaning(ch: char) -> bool {
    ch.is_control()
}

fn skip_control_string(iter: &mut Peekable<Chars<'_>>) {
    while let Some(ch) = iter.next() {
        match ch {
            '\x07' | '\u{9c}' => break,
            '\u{1b}' => {
                if matches!(iter.peek().copied(), Some('\\')) {
                    iter.next();
                    break;
                }
            }
            _ => {}
        }
    }
}

fn skip_csi(iter: &mut Peekable<Chars<'_>>) {
    for ch in iter.by_ref() {
        if ('\u{40}'..='\u{7e}').contains(&ch) {
            break;
        }
    }
}
