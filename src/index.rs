//! The sampled-substring index.
//!
//! Maps every string obtained by sampling the text through an MCS form to
//! the set of starting positions that produce it. Queries later extract the
//! same keys from their own windows and draw candidate positions from here.

use crate::error::{Result, SieveError};
use crate::mcs::Mcs;
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// A sampled substring, gaps included. Keys are at most the window length
/// (63 bytes); the inline capacity keeps typical keys off the heap.
pub type SampleKey = SmallVec<[u8; 24]>;

/// Map from sampled substring to the text positions producing it.
///
/// Invariant: `p` is recorded under `σ` iff some MCS form `F` satisfies
/// `F.extract(text, p) == σ` with `p + F.size() <= text.len()`. Position
/// sets are deduplicated; insertion order is irrelevant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleIndex {
    buckets: HashMap<SampleKey, BTreeSet<usize>>,
}

impl SampleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Positions recorded for a sampled substring, if any.
    pub fn positions(&self, key: &[u8]) -> Option<&BTreeSet<usize>> {
        self.buckets.get(key)
    }

    /// Scans the text once and buckets every position under every form.
    ///
    /// The scan over positions is embarrassingly parallel; each position
    /// extracts its keys into a local buffer and merges them into the shared
    /// map under a single short-lived lock.
    pub fn build(text: &[u8], mcs: &Mcs) -> SampleIndex {
        let shared: Mutex<HashMap<SampleKey, BTreeSet<usize>>> = Mutex::new(HashMap::new());

        (0..text.len()).into_par_iter().for_each(|pos| {
            let mut local: Vec<SampleKey> = Vec::with_capacity(mcs.forms().len());
            for &form in mcs.forms() {
                if pos + form.size() <= text.len() {
                    local.push(form.extract(text, pos));
                }
            }
            if local.is_empty() {
                return;
            }
            let mut buckets = shared.lock().unwrap();
            for key in local {
                buckets.entry(key).or_default().insert(pos);
            }
        });

        let buckets = shared.into_inner().unwrap();
        log::debug!(
            "index holds {} keys over {} text positions",
            buckets.len(),
            text.len()
        );
        SampleIndex { buckets }
    }

    /// Writes one key per line as `KEY;P1;P2;…;Pn;` (trailing semicolon).
    /// Keys are emitted in byte order and positions ascending, so the file
    /// is deterministic for a given index.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| SieveError::io(path, e))?;
        let mut w = BufWriter::new(file);
        self.write_to(&mut w).map_err(|e| SieveError::io(path, e))?;
        w.flush().map_err(|e| SieveError::io(path, e))
    }

    fn write_to(&self, w: &mut impl Write) -> std::io::Result<()> {
        let mut keys: Vec<&SampleKey> = self.buckets.keys().collect();
        keys.sort_unstable();
        for key in keys {
            w.write_all(key)?;
            w.write_all(b";")?;
            for pos in &self.buckets[key] {
                write!(w, "{pos};")?;
            }
            w.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Reads a file written by [`save`](Self::save). Lines split on `;`;
    /// the first token is the raw key, the rest are strictly-decimal
    /// positions (any non-digit byte rejects the line). Empty lines are
    /// ignored.
    pub fn load(path: &Path) -> Result<SampleIndex> {
        let content = std::fs::read(path).map_err(|e| SieveError::io(path, e))?;
        let mut buckets: HashMap<SampleKey, BTreeSet<usize>> = HashMap::new();

        for (n, line) in content.split(|&b| b == b'\n').enumerate() {
            if line.is_empty() {
                continue;
            }
            let mut tokens = line.split(|&b| b == b';');
            let key = tokens.next().unwrap_or_default();
            let positions = buckets.entry(SampleKey::from_slice(key)).or_default();
            for token in tokens {
                if token.is_empty() {
                    continue; // trailing semicolon
                }
                positions.insert(parse_position(token).ok_or_else(|| {
                    SieveError::Parse(format!(
                        "{}: line {}: invalid position {:?}",
                        path.display(),
                        n + 1,
                        String::from_utf8_lossy(token)
                    ))
                })?);
            }
        }
        Ok(SampleIndex { buckets })
    }
}

/// Strict decimal parse: digits only, no sign, no surrounding noise.
fn parse_position(token: &[u8]) -> Option<usize> {
    if !token.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(token).ok()?.parse().ok()
}
