pub mod message;

pub use message::{MessageRecord, ThreadSummaryRecord};
