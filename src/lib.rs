//! Aggregate benchmark run records into grouped averages, CSV reports and SVG charts.

pub mod chart;
pub mod driver;
pub mod error;
pub mod gen;
pub mod keysum;
pub mod report;

pub use error::{AnalyzeError, Result};
pub use keysum::{aggregate, AggregatedGroup, Coerce, Dimension, KeyValue, Metric};
