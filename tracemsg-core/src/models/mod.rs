pub mod range;
pub mod trace;

pub use range::{parse_timestamp, DateRange};
pub use trace::{NewTrace, TraceDocument, TraceMessage};
