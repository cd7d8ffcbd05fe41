//! Search orchestration: the MCS-filtered search and the naive oracle.

use crate::error::Result;
use crate::index::SampleIndex;
use crate::mcs::Mcs;
use crate::verify::verify;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::sync::Mutex;

/// Query → matching start positions. Ordered so that iteration and persisted
/// output are deterministic; no ordering between queries is otherwise
/// promised.
pub type ResultMap = BTreeMap<Vec<u8>, BTreeSet<usize>>;

/// A k-mismatch search session over one text and one query set.
///
/// The text and queries are immutable for the session. The MCS is built once
/// (or supplied); the index is built lazily by the first
/// [`mcs_search`](Self::mcs_search) and reused afterwards.
pub struct KMismatchSearch {
    text: Vec<u8>,
    queries: Vec<Vec<u8>>,
    mcs: Mcs,
    index: SampleIndex,
}

impl KMismatchSearch {
    /// Builds the covering set for `(queries, k)` and wraps a session around
    /// it. Fails when the budget leaves fewer than two sampled positions per
    /// form (`k > L - 2` for the longest query length `L`).
    pub fn new(text: Vec<u8>, queries: Vec<Vec<u8>>, k: usize) -> Result<Self> {
        let mcs = Mcs::build(&queries, k)?;
        Ok(Self::with_mcs(text, queries, mcs))
    }

    /// Wraps a session around a prebuilt (e.g. loaded) covering set.
    ///
    /// The covering set must have been built for a budget at least as large
    /// as any later passed to [`mcs_search`](Self::mcs_search); coverage is
    /// downward monotone in `k` but not upward.
    pub fn with_mcs(text: Vec<u8>, queries: Vec<Vec<u8>>, mcs: Mcs) -> Self {
        Self::with_mcs_and_index(text, queries, mcs, SampleIndex::new())
    }

    /// Wraps a session around a prebuilt covering set and a matching index.
    /// The index must have been produced from the same text and covering
    /// set.
    pub fn with_mcs_and_index(
        text: Vec<u8>,
        queries: Vec<Vec<u8>>,
        mcs: Mcs,
        index: SampleIndex,
    ) -> Self {
        KMismatchSearch {
            text,
            queries,
            mcs,
            index,
        }
    }

    pub fn text(&self) -> &[u8] {
        &self.text
    }

    pub fn queries(&self) -> &[Vec<u8>] {
        &self.queries
    }

    pub fn mcs(&self) -> &Mcs {
        &self.mcs
    }

    pub fn index(&self) -> &SampleIndex {
        &self.index
    }

    /// Verifies every query at every text position. Quadratic, but needs no
    /// index; kept as the oracle the filtered search is tested against.
    pub fn naive_search(&self, k: usize) -> ResultMap {
        let result: Mutex<ResultMap> = Mutex::new(ResultMap::new());

        (0..self.text.len()).into_par_iter().for_each(|pos| {
            let mut hits: Vec<&[u8]> = Vec::new();
            for query in &self.queries {
                if verify(&self.text, pos, query, k) {
                    hits.push(query);
                }
            }
            if hits.is_empty() {
                return;
            }
            let mut map = result.lock().unwrap();
            for query in hits {
                map.entry(query.to_vec()).or_default().insert(pos);
            }
        });

        result.into_inner().unwrap()
    }

    /// Index-filtered search.
    ///
    /// Builds the index on first use. For every query, every form, and every
    /// window of the query the form fits in, candidate positions are drawn
    /// from the index and verified against the full query. A candidate `p`
    /// found for window offset `qp` implies a query start of `p - qp`, so
    /// candidates with `p < qp` are skipped before the subtraction.
    pub fn mcs_search(&mut self, k: usize) -> ResultMap {
        if self.index.is_empty() && !self.mcs.is_empty() {
            log::info!(
                "building index: {} bytes of text, {} forms",
                self.text.len(),
                self.mcs.forms().len()
            );
            self.index = SampleIndex::build(&self.text, &self.mcs);
        }

        let result: Mutex<ResultMap> = Mutex::new(ResultMap::new());
        let text = &self.text;
        let index = &self.index;
        let mcs = &self.mcs;

        self.queries.par_iter().for_each(|query| {
            let mut hits: Vec<usize> = Vec::new();
            for &form in mcs.forms() {
                let span = form.size();
                if span > query.len() {
                    continue;
                }
                for qp in 0..=query.len() - span {
                    let key = form.extract(query, qp);
                    let Some(candidates) = index.positions(&key) else {
                        continue;
                    };
                    for &p in candidates {
                        if p < qp {
                            continue;
                        }
                        let start = p - qp;
                        if verify(text, start, query, k) {
                            hits.push(start);
                        }
                    }
                }
            }
            if hits.is_empty() {
                return;
            }
            let mut map = result.lock().unwrap();
            map.entry(query.clone()).or_default().extend(hits);
        });

        result.into_inner().unwrap()
    }
}

/// Writes one line per query: `QUERY P1 P2 …`, positions ascending.
pub fn write_results(result: &ResultMap, w: &mut impl Write) -> io::Result<()> {
    for (query, positions) in result {
        w.write_all(query)?;
        for pos in positions {
            write!(w, " {pos}")?;
        }
        writeln!(w)?;
    }
    Ok(())
}
