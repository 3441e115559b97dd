//! Typed model of a `pstats` stats table.
//!
//! A dump maps each call site `(filename, line, symbol)` to the 5-tuple
//! `(cc, nc, tt, ct, callers)`, where `callers` maps the calling site to
//! its share of those numbers.

use crate::marshal::{self, PyStr, Value};
use crate::{Error, Result};
use std::fmt;
use std::io::Write;
use std::path::Path;

/// A profiled location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallSite {
    pub filename: PyStr,
    pub line: u32,
    pub symbol: PyStr,
}

impl CallSite {
    pub fn new(filename: impl Into<PyStr>, line: u32, symbol: impl Into<PyStr>) -> Self {
        Self {
            filename: filename.into(),
            line,
            symbol: symbol.into(),
        }
    }

    fn from_value(value: &Value, what: &str) -> Result<Self> {
        let items = match value.as_tuple() {
            Some(items) if items.len() == 3 => items,
            _ => return Err(shape_error(what, "a (filename, line, symbol) tuple", value)),
        };
        let filename = items[0]
            .as_py_str()
            .ok_or_else(|| shape_error(&format!("{what} filename"), "a str", &items[0]))?;
        let line = items[1]
            .as_int()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| shape_error(&format!("{what} line"), "a line number", &items[1]))?;
        let symbol = items[2]
            .as_py_str()
            .ok_or_else(|| shape_error(&format!("{what} symbol"), "a str", &items[2]))?;
        Ok(Self::new(filename.clone(), line, symbol.clone()))
    }

    fn to_value(&self) -> Value {
        Value::Tuple(vec![
            Value::from(self.filename.clone()),
            Value::Int(self.line as i64),
            Value::from(self.symbol.clone()),
        ])
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}({})", self.filename, self.line, self.symbol)
    }
}

/// One caller's contribution to a callee's totals.
#[derive(Debug, Clone, PartialEq)]
pub enum CallerStats {
    /// `cProfile` records the full 4-tuple per caller.
    Timing {
        primitive_calls: u64,
        total_calls: u64,
        inline_time: f64,
        cumulative_time: f64,
    },
    /// The pure-Python `profile` module records only a call count.
    Count(u64),
}

impl CallerStats {
    fn from_value(value: &Value, what: &str) -> Result<Self> {
        if let Some(count) = value.as_int() {
            return Ok(CallerStats::Count(count_from(value, count, what)?));
        }
        match value.as_tuple() {
            Some([cc, nc, tt, ct]) => Ok(CallerStats::Timing {
                primitive_calls: read_count(cc, &format!("{what} primitive calls"))?,
                total_calls: read_count(nc, &format!("{what} total calls"))?,
                inline_time: read_time(tt, &format!("{what} inline time"))?,
                cumulative_time: read_time(ct, &format!("{what} cumulative time"))?,
            }),
            _ => Err(shape_error(what, "a 4-tuple or a call count", value)),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            CallerStats::Timing {
                primitive_calls,
                total_calls,
                inline_time,
                cumulative_time,
            } => Value::Tuple(vec![
                Value::Int(*primitive_calls as i64),
                Value::Int(*total_calls as i64),
                Value::Float(*inline_time),
                Value::Float(*cumulative_time),
            ]),
            CallerStats::Count(count) => Value::Int(*count as i64),
        }
    }
}

/// Totals recorded for one call site, plus its callers.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionStats {
    /// Calls that were not recursive (`cc`).
    pub primitive_calls: u64,
    /// All calls (`nc`).
    pub total_calls: u64,
    /// Time spent in the function itself (`tt`).
    pub inline_time: f64,
    /// Time including sub-calls (`ct`).
    pub cumulative_time: f64,
    pub callers: Vec<(CallSite, CallerStats)>,
}

impl FunctionStats {
    fn from_value(value: &Value, what: &str) -> Result<Self> {
        let (cc, nc, tt, ct, callers) = match value.as_tuple() {
            Some([cc, nc, tt, ct, callers]) => (cc, nc, tt, ct, callers),
            _ => return Err(shape_error(what, "a 5-tuple", value)),
        };
        let pairs = callers
            .as_dict()
            .ok_or_else(|| shape_error(&format!("{what} callers"), "a dict", callers))?;

        let callers = pairs
            .iter()
            .enumerate()
            .map(|(i, (key, stats))| {
                let what = format!("{what} caller {i}");
                Ok((
                    CallSite::from_value(key, &what)?,
                    CallerStats::from_value(stats, &what)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            primitive_calls: read_count(cc, &format!("{what} primitive calls"))?,
            total_calls: read_count(nc, &format!("{what} total calls"))?,
            inline_time: read_time(tt, &format!("{what} inline time"))?,
            cumulative_time: read_time(ct, &format!("{what} cumulative time"))?,
            callers,
        })
    }

    fn to_value(&self) -> Value {
        Value::Tuple(vec![
            Value::Int(self.primitive_calls as i64),
            Value::Int(self.total_calls as i64),
            Value::Float(self.inline_time),
            Value::Float(self.cumulative_time),
            Value::Dict(
                self.callers
                    .iter()
                    .map(|(site, stats)| (site.to_value(), stats.to_value()))
                    .collect(),
            ),
        ])
    }
}

/// A decoded stats table. Entries keep the order of the dump.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    entries: Vec<(CallSite, FunctionStats)>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<(CallSite, FunctionStats)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(CallSite, FunctionStats)] {
        &self.entries
    }

    pub fn get(&self, site: &CallSite) -> Option<&FunctionStats> {
        self.entries
            .iter()
            .find(|(key, _)| key == site)
            .map(|(_, stats)| stats)
    }

    /// Total number of caller edges across all entries.
    pub fn caller_edge_count(&self) -> usize {
        self.entries.iter().map(|(_, stats)| stats.callers.len()).sum()
    }

    /// Sum of inline time over all entries.
    pub fn total_inline_time(&self) -> f64 {
        self.entries.iter().map(|(_, stats)| stats.inline_time).sum()
    }

    /// Filename of every top-level entry, in entry order.
    pub fn filenames(&self) -> impl Iterator<Item = &PyStr> {
        self.entries.iter().map(|(site, _)| &site.filename)
    }

    /// Keep only the entries, and within them the caller edges, whose
    /// filename satisfies `keep`. Counts and timings are left as recorded.
    pub fn retain_filenames<F>(&mut self, mut keep: F)
    where
        F: FnMut(&PyStr) -> bool,
    {
        self.entries.retain(|(site, _)| keep(&site.filename));
        for (_, stats) in &mut self.entries {
            stats.callers.retain(|(caller, _)| keep(&caller.filename));
        }
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let pairs = value
            .as_dict()
            .ok_or_else(|| shape_error("stats table", "a dict", value))?;

        let entries = pairs
            .iter()
            .enumerate()
            .map(|(i, (key, stats))| {
                let what = format!("stats entry {i}");
                Ok((
                    CallSite::from_value(key, &what)?,
                    FunctionStats::from_value(stats, &what)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { entries })
    }

    pub fn to_value(&self) -> Value {
        Value::Dict(
            self.entries
                .iter()
                .map(|(site, stats)| (site.to_value(), stats.to_value()))
                .collect(),
        )
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_value(&marshal::decode(data)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        marshal::encode(&self.to_value())
    }

    /// Load a dump written by `cProfile`/`pstats`.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let profile = Self::from_bytes(&data)?;
        tracing::debug!(
            path = %path.display(),
            bytes = data.len(),
            entries = profile.len(),
            "loaded profile"
        );
        Ok(profile)
    }

    /// Serialize the table in the same format it was read in.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        marshal::encode_to(writer, &self.to_value())
    }
}

fn shape_error(what: &str, expected: &str, found: &Value) -> Error {
    Error::Malformed(format!(
        "{what}: expected {expected}, found {}",
        found.type_name()
    ))
}

fn count_from(value: &Value, n: i64, what: &str) -> Result<u64> {
    u64::try_from(n).map_err(|_| shape_error(what, "a non-negative count", value))
}

fn read_count(value: &Value, what: &str) -> Result<u64> {
    match value.as_int() {
        Some(n) => count_from(value, n, what),
        None => Err(shape_error(what, "an int", value)),
    }
}

fn read_time(value: &Value, what: &str) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| shape_error(what, "a number", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(filename: &str, line: i64, symbol: &str) -> Value {
        Value::Tuple(vec![Value::from(filename), Value::Int(line), Value::from(symbol)])
    }

    fn timing(cc: i64, nc: i64, tt: f64, ct: f64) -> Value {
        Value::Tuple(vec![Value::Int(cc), Value::Int(nc), Value::Float(tt), Value::Float(ct)])
    }

    fn sample_dump() -> Value {
        Value::Dict(vec![
            (
                site("app/main.py", 1, "<module>"),
                Value::Tuple(vec![
                    Value::Int(1),
                    Value::Int(1),
                    Value::Float(0.001),
                    Value::Float(0.5),
                    Value::Dict(vec![(
                        site("~", 0, "<built-in method builtins.exec>"),
                        timing(1, 1, 0.001, 0.5),
                    )]),
                ]),
            ),
            (
                site("app/util.py", 10, "helper"),
                Value::Tuple(vec![
                    Value::Int(3),
                    Value::Int(4),
                    Value::Float(0.25),
                    Value::Float(0.3),
                    Value::Dict(vec![
                        (site("app/main.py", 1, "<module>"), timing(3, 3, 0.2, 0.25)),
                        (site("app/util.py", 10, "helper"), timing(0, 1, 0.05, 0.05)),
                    ]),
                ]),
            ),
        ])
    }

    #[test]
    fn decodes_cprofile_layout() {
        let profile = Profile::from_value(&sample_dump()).unwrap();
        assert_eq!(profile.len(), 2);
        assert_eq!(profile.caller_edge_count(), 3);

        let helper = profile
            .get(&CallSite::new("app/util.py", 10, "helper"))
            .unwrap();
        assert_eq!(helper.primitive_calls, 3);
        assert_eq!(helper.total_calls, 4);
        assert_eq!(helper.inline_time, 0.25);
        assert_eq!(
            helper.callers[0].1,
            CallerStats::Timing {
                primitive_calls: 3,
                total_calls: 3,
                inline_time: 0.2,
                cumulative_time: 0.25,
            }
        );
        assert_eq!(
            profile.filenames().collect::<Vec<_>>(),
            vec!["app/main.py", "app/util.py"]
        );
    }

    #[test]
    fn converts_back_to_the_same_tree() {
        let dump = sample_dump();
        let profile = Profile::from_value(&dump).unwrap();
        assert_eq!(profile.to_value(), dump);

        let bytes = profile.to_bytes().unwrap();
        assert_eq!(Profile::from_bytes(&bytes).unwrap(), profile);
    }

    #[test]
    fn accepts_bare_caller_counts() {
        let dump = Value::Dict(vec![(
            site("a.py", 2, "f"),
            Value::Tuple(vec![
                Value::Int(2),
                Value::Int(2),
                Value::Float(0.0),
                Value::Float(0.0),
                Value::Dict(vec![(site("b.py", 5, "g"), Value::Int(2))]),
            ]),
        )]);
        let profile = Profile::from_value(&dump).unwrap();
        assert_eq!(profile.entries()[0].1.callers[0].1, CallerStats::Count(2));
        assert_eq!(profile.to_value(), dump);
    }

    #[test]
    fn widens_integer_times() {
        let dump = Value::Dict(vec![(
            site("a.py", 2, "f"),
            Value::Tuple(vec![
                Value::Int(1),
                Value::Int(1),
                Value::Int(0),
                Value::Int(2),
                Value::Dict(vec![]),
            ]),
        )]);
        let profile = Profile::from_value(&dump).unwrap();
        assert_eq!(profile.entries()[0].1.cumulative_time, 2.0);
    }

    #[test]
    fn rejects_wrong_shapes() {
        let err = Profile::from_value(&Value::List(vec![])).unwrap_err();
        assert!(err.to_string().contains("stats table: expected a dict"));

        let dump = Value::Dict(vec![(site("a.py", 1, "f"), Value::Tuple(vec![Value::Int(1)]))]);
        let err = Profile::from_value(&dump).unwrap_err();
        assert!(err.to_string().contains("stats entry 0: expected a 5-tuple"));

        let dump = Value::Dict(vec![(
            Value::Tuple(vec![Value::from("a.py"), Value::Int(-1), Value::from("f")]),
            Value::None,
        )]);
        let err = Profile::from_value(&dump).unwrap_err();
        assert!(err.to_string().contains("stats entry 0 line"));

        let dump = Value::Dict(vec![(
            site("a.py", 1, "f"),
            Value::Tuple(vec![
                Value::Int(-3),
                Value::Int(1),
                Value::Float(0.0),
                Value::Float(0.0),
                Value::Dict(vec![]),
            ]),
        )]);
        let err = Profile::from_value(&dump).unwrap_err();
        assert!(err.to_string().contains("non-negative count"));
    }

    #[test]
    fn retain_filters_both_levels() {
        let mut profile = Profile::from_value(&sample_dump()).unwrap();
        profile.retain_filenames(|filename| filename != "app/main.py");

        assert_eq!(profile.len(), 1);
        let helper = &profile.entries()[0].1;
        assert_eq!(helper.callers.len(), 1);
        assert_eq!(helper.callers[0].0.filename, "app/util.py");
        // Totals are not recomputed.
        assert_eq!(helper.total_calls, 4);
    }

    #[test]
    fn reads_and_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.prof");

        let profile = Profile::from_value(&sample_dump()).unwrap();
        let file = std::fs::File::create(&path).unwrap();
        profile.write_to(file).unwrap();

        assert_eq!(Profile::read_from(&path).unwrap(), profile);
        assert!(matches!(
            Profile::read_from(dir.path().join("missing.prof")),
            Err(Error::Io(_))
        ));
    }

    // Written by CPython 3.11: `cProfile` over a small script compiled as
    // "app/main.py", with `marshal.dump(profiler.stats, f)`.
    const CPROFILE_DUMP: &[u8] = include_bytes!("../testdata/cprofile.prof");

    // Hand-built stats table whose first filename is
    // b"/srv/caf\xe9.py" decoded with `surrogateescape`.
    const SURROGATE_DUMP: &[u8] = include_bytes!("../testdata/surrogate.prof");

    #[test]
    fn reads_a_cpython_dump() {
        // Top-level dict flagged for references, as CPython writes it.
        assert_eq!(CPROFILE_DUMP[0], b'{' | 0x80);

        let profile = Profile::from_bytes(CPROFILE_DUMP).unwrap();
        assert_eq!(profile.len(), 6);
        assert_eq!(profile.caller_edge_count(), 4);

        let helper = profile
            .get(&CallSite::new("app/main.py", 2, "helper"))
            .unwrap();
        assert_eq!(helper.primitive_calls, 3);
        assert_eq!(helper.total_calls, 3);
        assert_eq!(helper.callers.len(), 1);
        assert_eq!(helper.callers[0].0, CallSite::new("app/main.py", 5, "work"));
        assert!(matches!(
            helper.callers[0].1,
            CallerStats::Timing { total_calls: 3, .. }
        ));

        let sum = profile
            .get(&CallSite::new("~", 0, "<built-in method builtins.sum>"))
            .unwrap();
        assert_eq!(sum.callers[0].0, CallSite::new("app/main.py", 2, "helper"));

        let mut filenames: Vec<_> = profile.filenames().map(PyStr::to_string).collect();
        filenames.sort();
        filenames.dedup();
        assert_eq!(filenames, vec!["app/main.py", "~"]);
    }

    #[test]
    fn cpython_dump_survives_reencoding() {
        let profile = Profile::from_bytes(CPROFILE_DUMP).unwrap();
        let bytes = profile.to_bytes().unwrap();
        assert_eq!(Profile::from_bytes(&bytes).unwrap(), profile);
        assert_eq!(marshal::decode(&bytes).unwrap(), marshal::decode(CPROFILE_DUMP).unwrap());
    }

    #[test]
    fn keeps_surrogate_escaped_filenames() {
        let profile = Profile::from_bytes(SURROGATE_DUMP).unwrap();
        assert_eq!(profile.len(), 2);

        let (site, stats) = &profile.entries()[0];
        assert_eq!(site.filename.as_bytes(), b"/srv/caf\xed\xb3\xa9.py");
        assert_eq!(site.to_string(), r"/srv/caf\udce9.py:3(brew)");
        assert_eq!(stats.callers[0].0, CallSite::new("app/main.py", 1, "<module>"));

        let bytes = profile.to_bytes().unwrap();
        assert_eq!(Profile::from_bytes(&bytes).unwrap(), profile);
        assert_eq!(marshal::decode(&bytes).unwrap(), marshal::decode(SURROGATE_DUMP).unwrap());
    }

    #[test]
    fn displays_like_pstats() {
        assert_eq!(
            CallSite::new("app/util.py", 10, "helper").to_string(),
            "app/util.py:10(helper)"
        );
    }
}
