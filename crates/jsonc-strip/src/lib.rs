//! JSONC comment stripping for specification trees and the diagnostic catalog.
//!
//! Supports:
//! - `//` line comments
//! - `/* ... */` block comments (newlines inside are kept so that JSON parse
//!   errors still point at the authored line)
//! - string literals, including escapes, are copied untouched

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    Str,
    StrEscape,
    LineComment,
    BlockComment,
}

/// Strip `//` and `/* */` comments from JSONC input.
#[must_use]
pub fn strip_jsonc(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut state = State::Code;

    while let Some(c) = chars.next() {
        state = match state {
            State::Code => match (c, chars.peek().copied()) {
                ('"', _) => {
                    out.push(c);
                    State::Str
                }
                ('/', Some('/')) => {
                    chars.next();
                    State::LineComment
                }
                ('/', Some('*')) => {
                    chars.next();
                    State::BlockComment
                }
                _ => {
                    out.push(c);
                    State::Code
                }
            },
            State::Str => {
                out.push(c);
                match c {
                    '\\' => State::StrEscape,
                    '"' => State::Code,
                    _ => State::Str,
                }
            }
            State::StrEscape => {
                out.push(c);
                State::Str
            }
            State::LineComment => {
                if c == '\n' {
                    out.push(c);
                    State::Code
                } else {
                    State::LineComment
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    State::Code
                } else {
                    if c == '\n' {
                        out.push(c);
                    }
                    State::BlockComment
                }
            }
        };
    }
    out
}
