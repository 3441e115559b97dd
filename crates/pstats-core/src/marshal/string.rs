//! Python `str` values as stored by `marshal`.
//!
//! CPython writes strings as UTF-8 with the `surrogatepass` error handler,
//! so a filename decoded with `surrogateescape` (undecodable bytes on a
//! POSIX filesystem) arrives as lone surrogates encoded `ED A0..BF 80..BF`.
//! Rust's `String` rejects those, so strings keep their wire bytes.

use std::fmt;

/// A Python string in its marshal encoding.
///
/// The bytes are UTF-8 except that lone surrogate code points are allowed.
/// Byte order matches code point order, so sorting agrees with Python.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PyStr(Vec<u8>);

impl PyStr {
    /// Wrap marshal string bytes. Returns `None` unless every byte sequence
    /// is UTF-8 or an encoded surrogate.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        if is_well_formed(&bytes) {
            Some(Self(bytes))
        } else {
            None
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The string as `&str`, if it contains no surrogates.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_ascii(&self) -> bool {
        self.0.is_ascii()
    }

    /// Number of code points, counting each surrogate as one.
    pub fn char_count(&self) -> usize {
        self.pieces()
            .map(|piece| match piece {
                Piece::Text(text) => text.chars().count(),
                Piece::Surrogate(_) => 1,
            })
            .sum()
    }

    fn pieces(&self) -> Pieces<'_> {
        Pieces { rest: &self.0 }
    }
}

/// Lone surrogate as CPython's `surrogatepass` writes it.
fn is_surrogate(bytes: &[u8]) -> bool {
    matches!(bytes, [0xED, 0xA0..=0xBF, 0x80..=0xBF, ..])
}

fn is_well_formed(mut bytes: &[u8]) -> bool {
    loop {
        match std::str::from_utf8(bytes) {
            Ok(_) => return true,
            Err(err) => {
                let rest = &bytes[err.valid_up_to()..];
                if !is_surrogate(rest) {
                    return false;
                }
                bytes = &rest[3..];
            }
        }
    }
}

enum Piece<'a> {
    Text(&'a str),
    Surrogate(u16),
}

/// Splits well-formed bytes into UTF-8 runs and single surrogates.
struct Pieces<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Pieces<'a> {
    type Item = Piece<'a>;

    fn next(&mut self) -> Option<Piece<'a>> {
        if self.rest.is_empty() {
            return None;
        }
        let valid = match std::str::from_utf8(self.rest) {
            Ok(_) => self.rest.len(),
            Err(err) => err.valid_up_to(),
        };
        if valid == 0 {
            let (unit, rest) = self.rest.split_at(3);
            self.rest = rest;
            let unit = 0xD000 | (u16::from(unit[1] & 0x3F) << 6) | u16::from(unit[2] & 0x3F);
            return Some(Piece::Surrogate(unit));
        }
        let (text, rest) = self.rest.split_at(valid);
        self.rest = rest;
        std::str::from_utf8(text).ok().map(Piece::Text)
    }
}

/// Surrogates are shown as `\udcXX`, like Python's `backslashreplace`.
impl fmt::Display for PyStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for piece in self.pieces() {
            match piece {
                Piece::Text(text) => f.write_str(text)?,
                Piece::Surrogate(unit) => write!(f, "\\u{:04x}", unit)?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for PyStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(text) => write!(f, "{:?}", text),
            None => write!(f, "\"{}\"", self),
        }
    }
}

impl From<&str> for PyStr {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for PyStr {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl AsRef<[u8]> for PyStr {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq<str> for PyStr {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for PyStr {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<PyStr> for &str {
    fn eq(&self, other: &PyStr) -> bool {
        self.as_bytes() == other.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // "/srv/caf\udce9.py", i.e. b"/srv/caf\xe9.py" decoded with surrogateescape
    const ESCAPED: &[u8] = b"/srv/caf\xed\xb3\xa9.py";

    #[test]
    fn accepts_utf8_and_encoded_surrogates() {
        let s = PyStr::from_bytes("naïve.py".as_bytes().to_vec()).unwrap();
        assert_eq!(s.as_str(), Some("naïve.py"));

        let s = PyStr::from_bytes(ESCAPED.to_vec()).unwrap();
        assert_eq!(s.as_str(), None);
        assert_eq!(s.as_bytes(), ESCAPED);
        assert_eq!(s.char_count(), 12);
        assert!(!s.is_ascii());
    }

    #[test]
    fn rejects_other_invalid_bytes() {
        assert!(PyStr::from_bytes(b"\xff".to_vec()).is_none());
        assert!(PyStr::from_bytes(b"caf\xe9.py".to_vec()).is_none());
        // Truncated surrogate
        assert!(PyStr::from_bytes(b"a\xed\xb3".to_vec()).is_none());
        // Overlong sequence, not a surrogate
        assert!(PyStr::from_bytes(b"\xc0\x80".to_vec()).is_none());
    }

    #[test]
    fn displays_surrogates_escaped() {
        let s = PyStr::from_bytes(ESCAPED.to_vec()).unwrap();
        assert_eq!(s.to_string(), r"/srv/caf\udce9.py");
        assert_eq!(format!("{:?}", s), r#""/srv/caf\udce9.py""#);
        assert_eq!(PyStr::from("a.py").to_string(), "a.py");
        assert_eq!(format!("{:?}", PyStr::from("a.py")), "\"a.py\"");
    }

    #[test]
    fn orders_like_code_points() {
        let mut names = vec![
            PyStr::from("\u{e000}"),
            PyStr::from_bytes(b"\xed\xb3\xa9".to_vec()).unwrap(),
            PyStr::from("\u{d7ff}"),
            PyStr::from("z"),
        ];
        names.sort();
        let shown: Vec<String> = names.iter().map(PyStr::to_string).collect();
        assert_eq!(shown, vec!["z", "\u{d7ff}", r"\udce9", "\u{e000}"]);
    }

    #[test]
    fn compares_with_str() {
        assert_eq!(PyStr::from("x.py"), "x.py");
        assert!("x.py" == PyStr::from("x.py"));
        assert_ne!(PyStr::from_bytes(ESCAPED.to_vec()).unwrap(), "/srv/caf.py");
    }
}
