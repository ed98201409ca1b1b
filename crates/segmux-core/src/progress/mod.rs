//! Progress and throughput reporting shared by the fetch paths and the merge.

mod reader;
mod reporter;

pub use reader::ProgressReader;
pub use reporter::ProgressReporter;
