use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use csv::StringRecord;
use smallvec::SmallVec;
use tracing::trace;

use crate::error::{AnalyzeError, Result};
use crate::gen::{field, line_of, RunTable};

/// Identifying columns of a benchmark run. Any of them can take part in a group key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    SubjSize,
    QuerySize,
    Success,
    SubjType,
    QueryStart,
    DirectSet,
    QueryType,
    ContainerMode,
}

impl Dimension {
    pub const ALL: [Dimension; 8] = [
        Dimension::SubjSize,
        Dimension::QuerySize,
        Dimension::Success,
        Dimension::SubjType,
        Dimension::QueryStart,
        Dimension::DirectSet,
        Dimension::QueryType,
        Dimension::ContainerMode,
    ];

    /// Header name of the column in the run CSV.
    pub fn column(self) -> &'static str {
        match self {
            Dimension::SubjSize => "subj size",
            Dimension::QuerySize => "query size",
            Dimension::Success => "success",
            Dimension::SubjType => "subj type",
            Dimension::QueryStart => "query start",
            Dimension::DirectSet => "direct set",
            Dimension::QueryType => "query type",
            Dimension::ContainerMode => "container mode",
        }
    }

    /// Column name with the spaces removed, used to build output file names.
    pub fn compact(self) -> String {
        self.column().replace(' ', "")
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().replace(['_', '-', ' '], "").to_ascii_lowercase();
        Dimension::ALL
            .iter()
            .copied()
            .find(|d| d.compact() == wanted)
            .ok_or_else(|| format!("unknown dimension \"{}\"", s))
    }
}

/// The fixed numeric columns summed and averaged per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    InitTime,
    WarmupTime,
    TotalQueryTime,
    RunCount,
    AverageTime,
}

pub const METRIC_COUNT: usize = 5;

impl Metric {
    pub const ALL: [Metric; METRIC_COUNT] = [
        Metric::InitTime,
        Metric::WarmupTime,
        Metric::TotalQueryTime,
        Metric::RunCount,
        Metric::AverageTime,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Metric::InitTime => "init time",
            Metric::WarmupTime => "warmup time",
            Metric::TotalQueryTime => "total query time",
            Metric::RunCount => "run count",
            Metric::AverageTime => "average time",
        }
    }

    pub fn sum_column(self) -> String {
        format!("sum {}", self.column())
    }

    pub fn compact(self) -> String {
        self.column().replace(' ', "")
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A key field value after coercion: integers where the text parses as one, text otherwise.
///
/// Ordering puts every integer before every text value; integers compare numerically
/// and text compares lexically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Int(i64),
    Text(String),
}

impl KeyValue {
    pub fn is_text(&self, s: &str) -> bool {
        matches!(self, KeyValue::Text(t) if t == s)
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Int(v) => write!(f, "{}", v),
            KeyValue::Text(s) => f.write_str(s),
        }
    }
}

pub trait Coerce {
    fn coerce(self) -> KeyValue;
}

impl Coerce for &str {
    fn coerce(self) -> KeyValue {
        match self.trim().parse::<i64>() {
            Ok(v) => KeyValue::Int(v),
            Err(_) => KeyValue::Text(self.to_string()),
        }
    }
}

impl Coerce for i64 {
    fn coerce(self) -> KeyValue {
        KeyValue::Int(self)
    }
}

impl Coerce for KeyValue {
    fn coerce(self) -> KeyValue {
        match self {
            KeyValue::Int(_) => self,
            KeyValue::Text(s) => s.as_str().coerce(),
        }
    }
}

/// Round `sum / count` to the nearest integer, ties to even.
pub fn round_half_even(sum: i64, count: u64) -> i64 {
    let count = count as i64;
    let q = sum.div_euclid(count);
    let r = sum.rem_euclid(count);
    match (2 * r as i128).cmp(&(count as i128)) {
        Ordering::Less => q,
        Ordering::Greater => q + 1,
        Ordering::Equal => {
            if q % 2 == 0 { q } else { q + 1 }
        }
    }
}

pub type GroupKey = SmallVec<[KeyValue; 4]>;
type MyMap = BTreeMap<GroupKey, KeySum>;

/// Running totals for one group key while the input is being folded.
#[derive(Debug, Default)]
pub struct KeySum {
    pub count: u64,
    pub sums: [i64; METRIC_COUNT],
}

impl KeySum {
    pub fn new() -> KeySum {
        KeySum::default()
    }

    /// Fold one run into the totals. Empty metric values leave the sum untouched.
    pub fn store_rec(&mut self, record: &StringRecord, metric_idx: &[usize; METRIC_COUNT], line: u64) -> Result<()> {
        self.count += 1;
        for (metric, &index) in Metric::ALL.iter().zip(metric_idx.iter()) {
            let raw = field(record, index, metric.column(), line)?;
            if raw.is_empty() {
                continue;
            }
            let v = raw.trim().parse::<i64>().map_err(|_| AnalyzeError::NotNumeric {
                column: metric.column().to_string(),
                value: raw.to_string(),
                line,
            })?;
            let slot = &mut self.sums[metric.slot()];
            *slot = slot.checked_add(v).ok_or_else(|| AnalyzeError::SumOverflow {
                column: metric.column().to_string(),
                line,
            })?;
        }
        Ok(())
    }

    fn finalize(self, key_fields: &[Dimension], keys: GroupKey) -> AggregatedGroup {
        let mut metrics = [MetricStat::default(); METRIC_COUNT];
        for (stat, &sum) in metrics.iter_mut().zip(self.sums.iter()) {
            stat.sum = sum;
            stat.average = round_half_even(sum, self.count);
        }
        AggregatedGroup {
            keys: key_fields.iter().copied().zip(keys).collect(),
            count: self.count,
            metrics,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricStat {
    pub sum: i64,
    pub average: i64,
}

/// Finalized statistics for one distinct group key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedGroup {
    pub keys: SmallVec<[(Dimension, KeyValue); 4]>,
    pub count: u64,
    metrics: [MetricStat; METRIC_COUNT],
}

impl AggregatedGroup {
    pub fn key(&self, dim: Dimension) -> Option<&KeyValue> {
        self.keys.iter().find(|(d, _)| *d == dim).map(|(_, v)| v)
    }

    pub fn metric(&self, metric: Metric) -> MetricStat {
        self.metrics[metric.slot()]
    }

    /// Whether the run group reported success. Groups not keyed by success never count as successful.
    pub fn is_success(&self) -> bool {
        self.key(Dimension::Success).is_some_and(|v| v.is_text("OK"))
    }
}

/// Group the runs by the coerced values of `key_fields`, then sum and average the metrics.
///
/// Groups come back sorted ascending by their key tuple.
pub fn aggregate(runs: &RunTable, key_fields: &[Dimension]) -> Result<Vec<AggregatedGroup>> {
    if key_fields.is_empty() {
        return Err(AnalyzeError::NoKeyFields);
    }
    let key_idx = key_fields
        .iter()
        .map(|d| runs.column(d.column()))
        .collect::<Result<SmallVec<[usize; 4]>>>()?;
    let mut metric_idx = [0usize; METRIC_COUNT];
    for (slot, metric) in metric_idx.iter_mut().zip(Metric::ALL) {
        *slot = runs.column(metric.column())?;
    }

    let mut map = MyMap::new();
    for record in runs.records() {
        let line = line_of(record);
        let mut key = GroupKey::with_capacity(key_idx.len());
        for (&index, dim) in key_idx.iter().zip(key_fields) {
            key.push(field(record, index, dim.column(), line)?.coerce());
        }
        let brec = match map.entry(key) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                trace!(line, key = ?e.key(), "new group");
                e.insert(KeySum::new())
            }
        };
        brec.store_rec(record, &metric_idx, line)?;
    }

    Ok(map.into_iter().map(|(keys, ks)| ks.finalize(key_fields, keys)).collect())
}
