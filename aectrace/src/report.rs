// SPDX-License-Identifier: Apache-2.0

//! Analysis results, their on-disk form, and differences between two runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::aec::Aec;
use crate::redundancy::AecRedundancy;
use crate::trace_event::Iid;

/// Redundancy of every AEC seen in an analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedundancyReport {
    pub aecs: BTreeMap<Aec, AecRedundancy>,
    pub line_numbers: BTreeMap<Iid, u32>,
}

impl RedundancyReport {
    /// Highest score over all AECs; `0.0` when no heap load was observed.
    pub fn max_score(&self) -> f64 {
        self.aecs
            .values()
            .map(|r| r.score)
            .fold(0.0, f64::max)
    }

    /// AECs scoring at least `min_score`, least redundant first.
    pub fn ranked(&self, min_score: f64) -> Vec<(&Aec, &AecRedundancy)> {
        let mut ranked: Vec<(&Aec, &AecRedundancy)> = self
            .aecs
            .iter()
            .filter(|(_, r)| r.score >= min_score)
            .collect();
        ranked.sort_by(|a, b| a.1.score.total_cmp(&b.1.score));
        ranked
    }
}

/// Number of branch executions per AEC.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleCountReport {
    pub counts: BTreeMap<Aec, u64>,
    pub line_numbers: BTreeMap<Iid, u32>,
}

impl CycleCountReport {
    /// The AEC with the highest count; ties go to the first AEC in key order.
    pub fn top(&self) -> Option<(&Aec, u64)> {
        let mut best: Option<(&Aec, u64)> = None;
        for (aec, &count) in self.counts.iter() {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((aec, count));
            }
        }
        best
    }
}

/// Envelope written to disk so that a reader can tell report kinds apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SerializedReport {
    Redundancy(RedundancyReport),
    CycleCounts(CycleCountReport),
}

impl SerializedReport {
    pub fn kind_name(&self) -> &'static str {
        match self {
            SerializedReport::Redundancy(_) => "redundancy",
            SerializedReport::CycleCounts(_) => "cycle-counts",
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ReportError> {
        let w = BufWriter::new(File::create(path)?);
        bincode::serialize_into(w, self)?;
        log::info!("wrote {} report to {}", self.kind_name(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let r = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(r)?)
    }
}

#[derive(Debug)]
pub enum ReportError {
    Io(io::Error),
    Bincode(Box<bincode::ErrorKind>),
    /// Both runs know `iid` but disagree on its source line, i.e. they come
    /// from different instrumented builds.
    LineMapMismatch {
        iid: Iid,
        before: u32,
        after: u32,
    },
    KindMismatch {
        before: &'static str,
        after: &'static str,
    },
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Io(e) => write!(f, "report I/O error: {}", e),
            ReportError::Bincode(e) => write!(f, "report decode error: {}", e),
            ReportError::LineMapMismatch { iid, before, after } => write!(
                f,
                "iid {} maps to line {} in the first report but line {} in the second",
                iid, before, after
            ),
            ReportError::KindMismatch { before, after } => write!(
                f,
                "cannot diff a {} report against a {} report",
                before, after
            ),
        }
    }
}

impl std::error::Error for ReportError {}

impl From<io::Error> for ReportError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for ReportError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        Self::Bincode(e)
    }
}

/// Unions two iid -> line tables; an iid mapped to two different lines is an
/// error.
pub fn union_line_numbers(
    before: &BTreeMap<Iid, u32>,
    after: &BTreeMap<Iid, u32>,
) -> Result<BTreeMap<Iid, u32>, ReportError> {
    let mut result = before.clone();
    for (&iid, &line) in after.iter() {
        match result.insert(iid, line) {
            Some(prev) if prev != line => {
                return Err(ReportError::LineMapMismatch {
                    iid,
                    before: prev,
                    after: line,
                });
            }
            _ => {}
        }
    }
    Ok(result)
}

/// Signed change of one AEC between two redundancy reports (`after - before`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RedundancyDelta {
    pub score: f64,
    pub loads: i64,
    pub locations: i64,
}

impl std::ops::Neg for RedundancyDelta {
    type Output = RedundancyDelta;

    fn neg(self) -> RedundancyDelta {
        RedundancyDelta {
            score: -self.score,
            loads: -self.loads,
            locations: -self.locations,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportDiff<T> {
    pub deltas: BTreeMap<Aec, T>,
    pub line_numbers: BTreeMap<Iid, u32>,
}

impl<T: Copy + std::ops::Neg<Output = T>> ReportDiff<T> {
    pub fn negated(&self) -> ReportDiff<T> {
        ReportDiff {
            deltas: self.deltas.iter().map(|(k, v)| (k.clone(), -*v)).collect(),
            line_numbers: self.line_numbers.clone(),
        }
    }
}

fn all_keys<'a, A, B>(a: &'a BTreeMap<Aec, A>, b: &'a BTreeMap<Aec, B>) -> BTreeSet<&'a Aec> {
    a.keys().chain(b.keys()).collect()
}

/// Differences for every AEC present in either report; an AEC missing from a
/// report counts as score zero with no loads.
pub fn diff_redundancy(
    before: &RedundancyReport,
    after: &RedundancyReport,
) -> Result<ReportDiff<RedundancyDelta>, ReportError> {
    let line_numbers = union_line_numbers(&before.line_numbers, &after.line_numbers)?;
    let empty = AecRedundancy {
        score: 0.0,
        counts: Vec::new(),
    };
    let deltas = all_keys(&before.aecs, &after.aecs)
        .into_iter()
        .map(|aec| {
            let b = before.aecs.get(aec).unwrap_or(&empty);
            let a = after.aecs.get(aec).unwrap_or(&empty);
            let delta = RedundancyDelta {
                score: a.score - b.score,
                loads: a.total_loads() as i64 - b.total_loads() as i64,
                locations: a.counts.len() as i64 - b.counts.len() as i64,
            };
            (aec.clone(), delta)
        })
        .collect();
    Ok(ReportDiff {
        deltas,
        line_numbers,
    })
}

pub fn diff_cycle_counts(
    before: &CycleCountReport,
    after: &CycleCountReport,
) -> Result<ReportDiff<i64>, ReportError> {
    let line_numbers = union_line_numbers(&before.line_numbers, &after.line_numbers)?;
    let deltas = all_keys(&before.counts, &after.counts)
        .into_iter()
        .map(|aec| {
            let b = before.counts.get(aec).copied().unwrap_or(0) as i64;
            let a = after.counts.get(aec).copied().unwrap_or(0) as i64;
            (aec.clone(), a - b)
        })
        .collect();
    Ok(ReportDiff {
        deltas,
        line_numbers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec_context::Frame;
    use pretty_assertions::assert_eq;

    fn aec(pairs: &[(&str, Iid)]) -> Aec {
        Aec::from(
            pairs
                .iter()
                .map(|(m, i)| Frame::new(*m, *i))
                .collect::<Vec<_>>(),
        )
    }

    fn sample(scores: &[(&[(&str, Iid)], Vec<u64>)], lines: &[(Iid, u32)]) -> RedundancyReport {
        RedundancyReport {
            aecs: scores
                .iter()
                .map(|(k, counts)| (aec(k), AecRedundancy::from_counts(counts.clone())))
                .collect(),
            line_numbers: lines.iter().copied().collect(),
        }
    }

    #[test]
    fn max_score_of_empty_report_is_zero() {
        assert_eq!(RedundancyReport::default().max_score(), 0.0);
    }

    #[test]
    fn ranked_filters_and_sorts_ascending() {
        let r = sample(
            &[
                (&[("a", 1)], vec![1, 1, 1, 7]),
                (&[("b", 1)], vec![2, 2]),
                (&[("c", 1)], vec![1]),
            ],
            &[],
        );
        let ranked: Vec<&str> = r
            .ranked(0.0001)
            .iter()
            .map(|(k, _)| k.frames()[0].method.as_str())
            .collect();
        assert_eq!(ranked, vec!["b", "a"]);
    }

    #[test]
    fn diff_negation_is_reverse_diff() {
        let a = sample(
            &[(&[("a", 1)], vec![1, 1, 1, 7]), (&[("b", 2)], vec![2, 2])],
            &[(1, 10), (2, 20)],
        );
        let b = sample(
            &[(&[("b", 2)], vec![1, 3, 9]), (&[("c", 3)], vec![4])],
            &[(2, 20), (3, 30)],
        );
        let ab = diff_redundancy(&a, &b).unwrap();
        let ba = diff_redundancy(&b, &a).unwrap();
        assert_eq!(ab.deltas.len(), 3);
        assert_eq!(ab.negated(), ba);
        assert_eq!(ab.deltas[&aec(&[("a", 1)])].loads, -10);
        assert_eq!(ab.deltas[&aec(&[("c", 3)])].locations, 1);
    }

    #[test]
    fn diff_rejects_inconsistent_line_maps() {
        let a = sample(&[], &[(1, 10)]);
        let b = sample(&[], &[(1, 11)]);
        match diff_redundancy(&a, &b) {
            Err(ReportError::LineMapMismatch { iid, before, after }) => {
                assert_eq!((iid, before, after), (1, 10, 11));
            }
            other => panic!("expected a line map mismatch, got {:?}", other),
        }
    }

    #[test]
    fn cycle_count_diff_and_top() {
        let before = CycleCountReport {
            counts: [(aec(&[("a", 1)]), 5), (aec(&[("b", 1)]), 2)]
                .into_iter()
                .collect(),
            line_numbers: BTreeMap::new(),
        };
        let after = CycleCountReport {
            counts: [(aec(&[("a", 1)]), 3)].into_iter().collect(),
            line_numbers: BTreeMap::new(),
        };
        let d = diff_cycle_counts(&before, &after).unwrap();
        assert_eq!(d.deltas[&aec(&[("a", 1)])], -2);
        assert_eq!(d.deltas[&aec(&[("b", 1)])], -2);
        assert_eq!(d.negated(), diff_cycle_counts(&after, &before).unwrap());
        assert_eq!(before.top(), Some((&aec(&[("a", 1)]), 5)));
        assert_eq!(CycleCountReport::default().top(), None);
    }

    #[test]
    fn serialized_report_survives_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.bin");
        let report = SerializedReport::Redundancy(sample(
            &[(&[("main", 4)], vec![2, 2])],
            &[(4, 12)],
        ));
        report.save(&path).unwrap();
        assert_eq!(SerializedReport::load(&path).unwrap(), report);
    }
}
