//! Record sources and flagged-record sinks around the engine.

pub mod sink;
pub mod source;

pub use sink::{CollectingSink, CsvSink, FlaggedSink, JsonLinesSink, CSV_SINK_HEADER};
pub use source::{CsvSource, RecordSource, SourceItem, VecSource, REQUIRED_COLUMNS};
