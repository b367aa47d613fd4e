//! Per-block distances to the fuzzing targets, read from a distance file.
//!
//! Every line of the file has the form `<key>,<distance>` where `<key>` is a block key
//! (`basename:line`) and `<distance>` a decimal number. Distances are scaled by 100 and truncated
//! so the instrumented program only ever adds integers.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use itertools::Itertools;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// Factor applied to distances before truncating them to integers.
pub const DISTANCE_SCALE: f64 = 100.0;

/// Longest prefix accepted as a floating point number, following the rules of C's `atof`.
static FLOAT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?|(?i:infinity|inf|nan))")
        .expect("invalid float prefix pattern")
});

/// Counters describing a single [`DistanceTable::load`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub lines: usize,
    pub inserted: usize,
    pub duplicates: usize,
    /// Lines whose distance could not be parsed and which were recorded with a distance of 0.
    pub malformed: usize,
}

/// Mapping from block keys to scaled distances.
///
/// Keys are unique and the first distance read for a key is kept: neither later lines of the
/// same file nor later loads overwrite it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistanceTable {
    distances: HashMap<String, i64>,
}

impl DistanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the distance file at `path` into the table.
    ///
    /// Entries read before an I/O error stay in the table. Loading the same file again is
    /// observationally a no-op.
    pub fn load(&mut self, path: Option<&Path>) -> Result<LoadStats> {
        let path = match path {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => return Err(Error::DistanceFileUnset),
        };

        let unreadable = |source| Error::DistanceFileUnreadable {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = BufReader::new(File::open(path).map_err(unreadable)?);
        let mut stats = LoadStats::default();
        let mut buffer = Vec::new();

        loop {
            buffer.clear();
            if reader.read_until(b'\n', &mut buffer).map_err(unreadable)? == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&buffer);
            let line = line.strip_suffix('\n').unwrap_or(&*line);
            stats.lines += 1;

            let (key, distance) = parse_line(line);
            if distance.is_none() {
                stats.malformed += 1;
            }

            if self.insert(key, distance.unwrap_or(0)) {
                stats.inserted += 1;
            } else {
                stats.duplicates += 1;
            }
        }

        if stats.malformed > 0 {
            warn!(
                "{} line(s) of {} have no valid distance and were recorded with distance 0",
                stats.malformed,
                path.display()
            );
        }

        if log::log_enabled!(log::Level::Debug) {
            debug!("Parsed contents of {}:", path.display());
            for (key, distance) in self.iter().sorted() {
                debug!("\t{key} - {distance}");
            }
        }

        Ok(stats)
    }

    /// Inserts `distance` for `key` unless the key is already known. Returns whether it was new.
    pub fn insert(&mut self, key: impl Into<String>, distance: i64) -> bool {
        match self.distances.entry(key.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(distance);
                true
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.distances.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.distances.iter().map(|(key, d)| (key.as_str(), *d))
    }
}

/// Splits a line at its first comma into key and scaled distance.
///
/// A line without a comma is used as key and as distance field at the same time. The distance is
/// `None` if no number prefixes the field.
fn parse_line(line: &str) -> (&str, Option<i64>) {
    let (key, field) = line.split_once(',').unwrap_or((line, line));
    (key, parse_distance(field))
}

fn parse_distance(field: &str) -> Option<i64> {
    let field = field.trim_start();
    let value: f64 = FLOAT_PREFIX.find(field)?.as_str().parse().ok()?;

    // `as` truncates toward zero, saturates at the bounds and maps NaN to 0
    Some((DISTANCE_SCALE * value) as i64)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn distance_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test_log::test]
    fn test_parse_scaled_distance() {
        assert_eq!(parse_line("a.c:10,1.5"), ("a.c:10", Some(150)));
        assert_eq!(parse_line("a.c:20,0.0"), ("a.c:20", Some(0)));
        assert_eq!(parse_line("b.c:1,3.14159"), ("b.c:1", Some(314)));
        assert_eq!(parse_line("b.c:2,  2.999"), ("b.c:2", Some(299)));
        assert_eq!(parse_line("b.c:3,-1.255"), ("b.c:3", Some(-125)));
        assert_eq!(parse_line("b.c:4,1e2"), ("b.c:4", Some(10000)));
    }

    #[test_log::test]
    fn test_parse_uses_first_comma() {
        assert_eq!(parse_line("a.c:10,2.5,7"), ("a.c:10", Some(250)));
    }

    #[test_log::test]
    fn test_parse_ignores_trailing_garbage() {
        assert_eq!(parse_line("a.c:10,1.5\r"), ("a.c:10", Some(150)));
        assert_eq!(parse_line("a.c:10,4.25abc"), ("a.c:10", Some(425)));
    }

    #[test_log::test]
    fn test_parse_malformed_distance() {
        assert_eq!(parse_line("a.c:10,abc"), ("a.c:10", None));
        assert_eq!(parse_line("a.c:10,"), ("a.c:10", None));
        assert_eq!(parse_line("a.c:10,-"), ("a.c:10", None));
        assert_eq!(parse_line(""), ("", None));
    }

    #[test_log::test]
    fn test_parse_line_without_comma() {
        assert_eq!(parse_line("a.c:10"), ("a.c:10", None));
        assert_eq!(parse_line("12"), ("12", Some(1200)));
    }

    #[test_log::test]
    fn test_load_first_wins() {
        let file = distance_file("a.c:10,1.5\na.c:20,0.0\na.c:10,9.0\n");
        let mut table = DistanceTable::new();

        let stats = table.load(Some(file.path())).unwrap();

        assert_eq!(
            stats,
            LoadStats {
                lines: 3,
                inserted: 2,
                duplicates: 1,
                malformed: 0,
            }
        );
        assert_eq!(table.get("a.c:10"), Some(150));
        assert_eq!(table.get("a.c:20"), Some(0));
        assert_eq!(table.len(), 2);
    }

    #[test_log::test]
    fn test_load_malformed_line_yields_zero() {
        let file = distance_file("a.c:10,oops\nb.c:3,2");
        let mut table = DistanceTable::new();

        let stats = table.load(Some(file.path())).unwrap();

        assert_eq!(stats.malformed, 1);
        assert_eq!(table.get("a.c:10"), Some(0));
        assert_eq!(table.get("b.c:3"), Some(200));
    }

    #[test_log::test]
    fn test_reload_does_not_overwrite() {
        let first = distance_file("a.c:10,1.5\n");
        let second = distance_file("a.c:10,3.0\nc.c:7,0.5\n");
        let mut table = DistanceTable::new();

        table.load(Some(first.path())).unwrap();
        let before = table.clone();
        table.load(Some(first.path())).unwrap();
        assert_eq!(table, before);

        let stats = table.load(Some(second.path())).unwrap();
        assert_eq!(stats.inserted, 1);
        assert_eq!(table.get("a.c:10"), Some(150));
        assert_eq!(table.get("c.c:7"), Some(50));
    }

    #[test_log::test]
    fn test_load_without_path() {
        let mut table = DistanceTable::new();

        assert!(matches!(table.load(None), Err(Error::DistanceFileUnset)));
        assert!(matches!(
            table.load(Some(Path::new(""))),
            Err(Error::DistanceFileUnset)
        ));
        assert!(table.is_empty());
    }

    #[test_log::test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = DistanceTable::new();

        let result = table.load(Some(&dir.path().join("distance.cfg.txt")));

        assert!(matches!(result, Err(Error::DistanceFileUnreadable { .. })));
        assert!(table.is_empty());
    }

    #[test_log::test]
    fn test_load_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"\xffa.c:1,1.0\nb.c:2,2.0\n").unwrap();
        let mut table = DistanceTable::new();

        let stats = table.load(Some(file.path())).unwrap();

        assert_eq!(stats.lines, 2);
        assert_eq!(table.get("b.c:2"), Some(200));
    }
}
