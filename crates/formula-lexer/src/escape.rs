//! Backslash escape tables and decoding.
//!
//! Every scanning mode accepts the same base letters after `\`; each mode adds
//! the characters that would otherwise terminate it (its quote, the backtick,
//! the `$` of the open marker, the filter separator).

/// Letters legal after `\` in every mode.
pub const ESCAPE_LETTERS: &[char] = &['"', '\\', '/', 'b', 'f', 'n', 'r', 't', 'u', 'v'];

pub const RAW_EXTRAS: &[char] = &['$', '`'];
pub const TEMPLATE_EXTRAS: &[char] = &['`', '$'];
pub const FILTER_EXTRAS: &[char] = &[':'];

/// Outcome of checking the escape starting at a backslash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    /// Legal; spans this many characters after the backslash.
    Legal(usize),
    /// The character after the backslash is not a legal escape.
    Invalid(char),
    /// The backslash is the last character.
    Dangling,
}

/// Check the escape whose backslash sits at `chars[at]`.
pub fn check(chars: &[char], at: usize, extras: &[char]) -> Escape {
    let Some(&letter) = chars.get(at + 1) else {
        return Escape::Dangling;
    };

    if letter == 'u' {
        let digits = chars.get(at + 2..at + 6);
        return match digits {
            Some(digits) if digits.iter().all(char::is_ascii_hexdigit) => Escape::Legal(5),
            _ => Escape::Invalid('u'),
        };
    }

    if ESCAPE_LETTERS.contains(&letter) || extras.contains(&letter) {
        Escape::Legal(1)
    } else {
        Escape::Invalid(letter)
    }
}

fn control(letter: char) -> Option<char> {
    match letter {
        'b' => Some('\u{8}'),
        'f' => Some('\u{c}'),
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        'v' => Some('\u{b}'),
        _ => None,
    }
}

/// Decode already-validated escapes: control letters and `\uXXXX` become the
/// character they name, anything else loses its backslash.
pub fn unescape(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch != '\\' || i + 1 >= chars.len() {
            out.push(ch);
            i += 1;
            continue;
        }

        let letter = chars[i + 1];
        if let Some(c) = control(letter) {
            out.push(c);
            i += 2;
        } else if letter == 'u' {
            match decode_unicode(&chars[i + 2..]) {
                Some(c) => {
                    out.push(c);
                    i += 6;
                }
                None => {
                    out.push('u');
                    i += 2;
                }
            }
        } else {
            out.push(letter);
            i += 2;
        }
    }

    out
}

/// Decode a filter argument: only control letters and the `\:` separator
/// escape are decoded, other escapes are kept verbatim.
pub fn unescape_filter_argument(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.peek().copied() {
            Some(':') => {
                out.push(':');
                chars.next();
            }
            Some(letter) => {
                chars.next();
                match control(letter) {
                    Some(c) => out.push(c),
                    None => {
                        out.push('\\');
                        out.push(letter);
                    }
                }
            }
            None => out.push('\\'),
        }
    }

    out
}

fn decode_unicode(rest: &[char]) -> Option<char> {
    let digits: String = rest.get(..4)?.iter().collect();
    let code = u32::from_str_radix(&digits, 16).ok()?;
    Some(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
}
