//! Gapped sampling forms and the Minimum Covering Set (MCS).
//!
//! A *form* is a sampling mask: ones mark positions that are read, zeros mark
//! gaps. A *combination* describes one way `k` mismatches could fall inside a
//! window of length `L` (ones are matches, zeros are mismatches; the first
//! position is normalised to a match). By pigeonhole, a text window within
//! Hamming distance `k` of a query realises some combination, so a set of
//! forms that covers every combination guarantees at least one form samples
//! only matching positions. [`Mcs::build`] computes such a set greedily.

use crate::bitseq::{BitSeq, Word, MAX_PATTERN_LEN, WORD_BITS};
use crate::error::{Result, SieveError};
use crate::index::SampleKey;
use rayon::prelude::*;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Placeholder byte standing in for gap positions in extracted samples.
/// It is part of the index key and must be used consistently.
pub const GAP_BYTE: u8 = b'_';

/// A gapped sampling mask. The lowest and highest logical positions are both
/// sampled, and at least two positions are sampled overall.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Form(BitSeq);

impl Form {
    /// Validates and wraps a word as a form.
    ///
    /// The word must be odd (position 0 sampled), carry at least two set
    /// bits, and fit in [`MAX_PATTERN_LEN`] logical positions. The highest
    /// set bit is the last sampled position by construction.
    pub fn from_word(word: Word) -> Result<Form> {
        if word == 0 || word & 1 == 0 {
            return Err(SieveError::InvalidArgument(
                "a form must begin with a sampled position".into(),
            ));
        }
        if word.count_ones() < 2 {
            return Err(SieveError::InvalidArgument(
                "a form must sample at least 2 positions".into(),
            ));
        }
        let seq = BitSeq::new(word);
        if seq.size() > MAX_PATTERN_LEN {
            return Err(SieveError::InvalidArgument(format!(
                "a form may span at most {MAX_PATTERN_LEN} positions"
            )));
        }
        Ok(Form(seq))
    }

    /// The underlying word.
    pub fn word(self) -> Word {
        self.0.word()
    }

    /// Logical span of the form, gaps included.
    pub fn size(self) -> usize {
        self.0.size()
    }

    /// Number of sampled positions.
    pub fn matches(self) -> usize {
        self.0.popcount()
    }

    /// Number of gap positions.
    pub fn gaps(self) -> usize {
        self.size() - self.matches()
    }

    /// Samples `text` at `pos` through this form.
    ///
    /// The result has length [`size`](Self::size): byte `i` is
    /// `text[pos + i]` where position `i` is sampled and [`GAP_BYTE`]
    /// otherwise. The caller guarantees `pos + size <= text.len()`; the
    /// window access is bounds-checked.
    pub fn extract(self, text: &[u8], pos: usize) -> SampleKey {
        let size = self.size();
        let window = &text[pos..pos + size];
        let mut key = SampleKey::from_elem(GAP_BYTE, size);
        for i in self.0.ones() {
            key[i] = window[i];
        }
        key
    }

    /// Enumerates every form that fits a window of length `len`: all odd
    /// words with at least two set bits and span at most `len`.
    ///
    /// Shorter forms are part of the universe because containment (§ see
    /// [`Combination::contains`]) may place them anywhere inside a window.
    /// Requires `len - k >= 2` so that a form with two sampled positions can
    /// survive `k` mismatches; this is a hard precondition.
    pub fn generate_all(len: usize, k: usize) -> Result<Vec<Form>> {
        if len > MAX_PATTERN_LEN {
            return Err(SieveError::InvalidArgument(format!(
                "window length {len} exceeds the {MAX_PATTERN_LEN}-position limit"
            )));
        }
        if len.saturating_sub(k) < 2 {
            return Err(SieveError::InvalidArgument(format!(
                "forms need at least 2 sampled positions, impossible for length {len} with {k} mismatches"
            )));
        }
        let mut forms = Vec::new();
        let mut word: Word = 3;
        while word < 1 << len {
            forms.push(Form(BitSeq::new(word)));
            word += 2;
        }
        Ok(forms)
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One placement of `k` mismatches inside a window of length `L`: bit 0 is
/// set (the first position is a match) and exactly `k` of the remaining
/// `L - 1` positions are zero. Trailing mismatches live as implicit high
/// zero bits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Combination(BitSeq);

impl Combination {
    /// The underlying word.
    pub fn word(self) -> Word {
        self.0.word()
    }

    /// Tests whether the form's sampled positions all land on match
    /// positions of this combination under some left shift of the form.
    ///
    /// For each shift, `(combination | !form) == !0` holds exactly when the
    /// form's ones are a subset of the combination's ones. The scan stops
    /// once the form's top bit reaches the top of the word; shifts past the
    /// window fail naturally because the combination's high bits are zero.
    pub fn contains(self, form: Form) -> bool {
        const TOP: Word = 1 << (WORD_BITS - 1);
        let comb = self.0.word();
        let mut f = form.word();
        loop {
            if comb | !f == Word::MAX {
                return true;
            }
            if f & TOP != 0 {
                return false;
            }
            f <<= 1;
        }
    }

    /// Enumerates all `C(len - 1, k)` combinations of length `len` with
    /// exactly `k` mismatch positions, using Gosper's hack to walk the
    /// placements of the zero mask in bit-lexicographic order.
    pub fn generate_all(len: usize, k: usize) -> Result<Vec<Combination>> {
        if len == 0 || len > MAX_PATTERN_LEN {
            return Err(SieveError::InvalidArgument(format!(
                "window length {len} out of range 1..={MAX_PATTERN_LEN}"
            )));
        }
        let full: Word = (1 << len) - 1;
        if k == 0 {
            return Ok(vec![Combination(BitSeq::new(full))]);
        }
        let slots = len - 1; // position 0 is always a match
        if k > slots {
            return Ok(Vec::new());
        }
        let limit: Word = 1 << slots;
        let mut combinations = Vec::new();
        let mut zeros: Word = (1 << k) - 1;
        while zeros < limit {
            combinations.push(Combination(BitSeq::new(full & !(zeros << 1))));
            let low = zeros & zeros.wrapping_neg();
            let carry = zeros + low;
            zeros = carry + (((carry ^ zeros) / low) >> 2);
        }
        Ok(combinations)
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An ordered set of forms covering every combination for the `(L, k)` it
/// was built for. Greedy-minimal, not necessarily globally minimal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Mcs {
    forms: Vec<Form>,
}

impl Mcs {
    /// The covering forms, in selection order.
    pub fn forms(&self) -> &[Form] {
        &self.forms
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    /// Builds a covering set for the given queries and mismatch budget.
    ///
    /// `L` is the longest query length. Each round counts, for every
    /// candidate form, how many uncovered combinations contain it (the hot
    /// step, parallelised over forms), keeps the best form, and drops the
    /// combinations it covers. Ties break toward the smaller word so the
    /// result is deterministic.
    ///
    /// An empty query set (or one holding only empty queries) yields an
    /// empty covering set: there is nothing to search for.
    pub fn build(queries: &[Vec<u8>], k: usize) -> Result<Mcs> {
        let len = queries.iter().map(|q| q.len()).max().unwrap_or(0);
        if len == 0 {
            return Ok(Mcs::default());
        }
        if k > len {
            return Err(SieveError::InvalidArgument(format!(
                "mismatch budget {k} exceeds the longest query length {len}"
            )));
        }

        let mut combinations = Combination::generate_all(len, k)?;
        let forms = Form::generate_all(len, k)?;
        log::debug!(
            "covering {} combinations from {} candidate forms (L={len}, k={k})",
            combinations.len(),
            forms.len()
        );

        let mut picked = Vec::new();
        while !combinations.is_empty() {
            let (best, covered) = forms
                .par_iter()
                .map(|&form| {
                    let covered = combinations.iter().filter(|c| c.contains(form)).count();
                    (form, covered)
                })
                .reduce(
                    || (forms[0], 0),
                    |a, b| {
                        if a.1 == b.1 {
                            if a.0 <= b.0 {
                                a
                            } else {
                                b
                            }
                        } else if a.1 > b.1 {
                            a
                        } else {
                            b
                        }
                    },
                );
            if covered == 0 {
                return Err(SieveError::Invariant(format!(
                    "{} combinations cannot be covered by any form",
                    combinations.len()
                )));
            }
            picked.push(best);
            combinations.retain(|c| !c.contains(best));
            log::trace!(
                "picked form {best} covering {covered}, {} combinations left",
                combinations.len()
            );
        }

        log::debug!("covering set holds {} forms", picked.len());
        Ok(Mcs { forms: picked })
    }

    /// Writes one form per line, bits MSB first, `\n`-terminated.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| SieveError::io(path, e))?;
        let mut w = BufWriter::new(file);
        for form in &self.forms {
            writeln!(w, "{form}").map_err(|e| SieveError::io(path, e))?;
        }
        w.flush().map_err(|e| SieveError::io(path, e))
    }

    /// Reads a file written by [`save`](Self::save). Every line must consist
    /// of `'0'`/`'1'` bytes only and describe a valid form; blank lines are
    /// rejected.
    pub fn load(path: &Path) -> Result<Mcs> {
        let content = std::fs::read(path).map_err(|e| SieveError::io(path, e))?;
        let mut lines: Vec<&[u8]> = content.split(|&b| b == b'\n').collect();
        if lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop(); // final newline
        }

        let mut forms = Vec::with_capacity(lines.len());
        for (n, line) in lines.iter().enumerate() {
            if line.is_empty() {
                return Err(SieveError::Parse(format!("{}: line {}: empty form", path.display(), n + 1)));
            }
            if line.len() > MAX_PATTERN_LEN {
                return Err(SieveError::Parse(format!(
                    "{}: line {}: form longer than {MAX_PATTERN_LEN} bits",
                    path.display(),
                    n + 1
                )));
            }
            let mut word: Word = 0;
            for &b in *line {
                word <<= 1;
                match b {
                    b'0' => {}
                    b'1' => word |= 1,
                    _ => {
                        return Err(SieveError::Parse(format!(
                            "{}: line {}: unexpected byte {:#04x} in form",
                            path.display(),
                            n + 1,
                            b
                        )))
                    }
                }
            }
            let form = Form::from_word(word).map_err(|e| {
                SieveError::Parse(format!("{}: line {}: {e}", path.display(), n + 1))
            })?;
            forms.push(form);
        }
        Ok(Mcs { forms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn queries_of_len(len: usize) -> Vec<Vec<u8>> {
        vec![vec![b'A'; len]]
    }

    #[test]
    fn form_validation() {
        assert!(Form::from_word(0).is_err());
        assert!(Form::from_word(0b10).is_err()); // gap at position 0
        assert!(Form::from_word(1).is_err()); // single sampled position
        assert!(Form::from_word(0b101).is_ok());
    }

    #[test]
    fn extract_samples_through_gaps() {
        let form = Form::from_word(0b10011).unwrap();
        assert_eq!(form.size(), 5);
        assert_eq!(form.matches(), 3);
        assert_eq!(form.gaps(), 2);
        let key = form.extract(b"ABCDEFG", 1);
        assert_eq!(&key[..], b"BC__F");
    }

    #[test]
    fn extract_is_deterministic() {
        let form = Form::from_word(0b1101).unwrap();
        let text = b"ACGTACGT";
        for pos in 0..=text.len() - form.size() {
            let a = form.extract(text, pos);
            let b = form.extract(text, pos);
            assert_eq!(a.len(), form.size());
            assert_eq!(a, b);
        }
    }

    #[test]
    fn all_forms_of_length_four() {
        let forms = Form::generate_all(4, 1).unwrap();
        let words: Vec<Word> = forms.iter().map(|f| f.word()).collect();
        assert_eq!(words, vec![3, 5, 7, 9, 11, 13, 15]);
    }

    #[test]
    fn form_generation_preconditions() {
        assert!(Form::generate_all(4, 3).is_err()); // fewer than 2 samples survive
        assert!(Form::generate_all(1, 0).is_err());
        assert!(Form::generate_all(WORD_BITS, 0).is_err());
        assert!(Form::generate_all(5, 3).is_ok());
    }

    #[test]
    fn combinations_of_length_four() {
        let combos = Combination::generate_all(4, 1).unwrap();
        let mut words: Vec<Word> = combos.iter().map(|c| c.word()).collect();
        words.sort_unstable();
        assert_eq!(words, vec![0b0111, 0b1011, 0b1101]);
    }

    #[test]
    fn combination_counts_match_binomials() {
        // C(len - 1, k) placements of the zero mask.
        let binom = |n: usize, k: usize| -> usize {
            (0..k).fold(1, |acc, i| acc * (n - i) / (i + 1))
        };
        for len in 2..=10 {
            for k in 0..len {
                let combos = Combination::generate_all(len, k).unwrap();
                assert_eq!(combos.len(), binom(len - 1, k), "len={len} k={k}");
            }
        }
    }

    #[test]
    fn zero_mismatches_is_the_full_window() {
        let combos = Combination::generate_all(6, 0).unwrap();
        assert_eq!(combos.len(), 1);
        assert_eq!(combos[0].word(), 0b111111);
    }

    #[test]
    fn containment_with_and_without_shift() {
        let combos = Combination::generate_all(4, 1).unwrap();
        let c = |w: Word| *combos.iter().find(|c| c.word() == w).unwrap();
        let f = |w: Word| Form::from_word(w).unwrap();

        // zero at position 1
        let comb = c(0b1101);
        assert!(comb.contains(f(0b11))); // shifted to positions 2,3
        assert!(comb.contains(f(0b101))); // positions 0,2
        assert!(!comb.contains(f(0b111)));
        assert!(!comb.contains(f(0b1111)));

        // zero at position 3 (implicit high bit)
        let comb = c(0b0111);
        assert!(comb.contains(f(0b11)));
        assert!(comb.contains(f(0b111)));
        assert!(!comb.contains(f(0b1001)));
    }

    #[test]
    fn greedy_cover_is_deterministic() {
        let mcs = Mcs::build(&queries_of_len(3), 1).unwrap();
        let words: Vec<Word> = mcs.forms().iter().map(|f| f.word()).collect();
        // Both candidates cover one combination each; ties break toward the
        // smaller word.
        assert_eq!(words, vec![0b11, 0b101]);
    }

    #[test]
    fn cover_invariant_over_small_windows() {
        for len in 2..=8 {
            for k in 0..=len - 2 {
                let mcs = Mcs::build(&queries_of_len(len), k).unwrap();
                for combo in Combination::generate_all(len, k).unwrap() {
                    assert!(
                        mcs.forms().iter().any(|&f| combo.contains(f)),
                        "combination {combo} uncovered for len={len} k={k}"
                    );
                }
            }
        }
    }

    #[test]
    fn build_rejects_bad_budgets() {
        assert!(Mcs::build(&queries_of_len(3), 4).is_err()); // k > L
        assert!(Mcs::build(&queries_of_len(3), 2).is_err()); // L - k < 2
    }

    #[test]
    fn empty_queries_build_an_empty_cover() {
        assert!(Mcs::build(&[], 2).unwrap().is_empty());
        assert!(Mcs::build(&[Vec::new()], 0).unwrap().is_empty());
    }

    #[test]
    fn save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cover.mcs");
        let mcs = Mcs::build(&queries_of_len(6), 2).unwrap();
        mcs.save(&path).unwrap();
        let loaded = Mcs::load(&path).unwrap();
        assert_eq!(mcs, loaded);
    }

    #[test]
    fn load_rejects_malformed_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cover.mcs");

        std::fs::write(&path, "10x1\n").unwrap();
        assert!(matches!(Mcs::load(&path), Err(SieveError::Parse(_))));

        std::fs::write(&path, "101\n\n11\n").unwrap();
        assert!(matches!(Mcs::load(&path), Err(SieveError::Parse(_))));

        // forms must end on a sampled position
        std::fs::write(&path, "110\n").unwrap();
        assert!(matches!(Mcs::load(&path), Err(SieveError::Parse(_))));
    }
}
