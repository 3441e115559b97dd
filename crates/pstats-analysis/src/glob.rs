//! Shell-style glob translation.
//!
//! Patterns follow Python's `fnmatch` rules. `*` also crosses `/`, so
//! `foo/*/bar` matches `foo/one/two/bar`. Matching is anchored at both
//! ends: `foo/bar` matches `foo/bar` but not `baz/foo/bar`.
//!
//! Filenames are matched as marshal bytes, so lone surrogates (from
//! `surrogateescape`) count as one character, like they do in Python.

use crate::FilterError;
use regex::bytes::Regex;

/// Any run of bytes.
const ANY_RUN: &str = "(?s-u:.)*";

/// One code point, including a lone surrogate.
const ANY_CHAR: &str = r"(?:(?s:.)|(?-u:\xED[\xA0-\xBF][\x80-\xBF]))";

/// A lone surrogate, which no Unicode class matches.
const SURROGATE: &str = r"(?-u:\xED[\xA0-\xBF][\x80-\xBF])";

/// Translate `glob` into regex source that matches whole filenames.
pub fn translate(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::with_capacity(glob.len() * 2);
    let mut last_was_star = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => {
                if !last_was_star {
                    out.push_str(ANY_RUN);
                }
                last_was_star = true;
                continue;
            }
            '?' => out.push_str(ANY_CHAR),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push_str(&translate_class(&chars[i..end]));
                    i = end + 1;
                }
                None => out.push_str(r"\["),
            },
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
        last_was_star = false;
    }

    format!("(?s)^(?:{})$", out)
}

/// Translate and compile `glob`.
pub fn compile(glob: &str) -> Result<Regex, FilterError> {
    Regex::new(&translate(glob)).map_err(|source| FilterError::InvalidPattern {
        pattern: glob.to_string(),
        source,
    })
}

/// Index of the `]` closing a class whose body starts at `start`.
///
/// A `]` directly after `[` or `[!` is part of the body.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    (j..chars.len()).find(|&k| chars[k] == ']')
}

fn translate_class(body: &[char]) -> String {
    let (negated, body) = match body.split_first() {
        Some(('!', rest)) => (true, rest),
        _ => (false, body),
    };

    let mut items = String::new();
    let mut k = 0;
    while k < body.len() {
        let c = body[k];
        // `a-z` is a range unless the `-` is the last character.
        if k + 2 < body.len() && body[k + 1] == '-' {
            let hi = body[k + 2];
            if c <= hi {
                items.push_str(&escape_char(c));
                items.push('-');
                items.push_str(&escape_char(hi));
            }
            k += 3;
        } else {
            items.push_str(&escape_char(c));
            k += 1;
        }
    }

    match (negated, items.is_empty()) {
        // Only empty ranges were given, as in `[!z-a]`.
        (true, true) => ANY_CHAR.to_string(),
        (false, true) => r"[^\s\S]".to_string(),
        (true, false) => format!("(?:[^{}]|{})", items, SURROGATE),
        (false, false) => format!("[{}]", items),
    }
}

fn escape_char(c: char) -> String {
    regex::escape(c.encode_utf8(&mut [0; 4]))
}
