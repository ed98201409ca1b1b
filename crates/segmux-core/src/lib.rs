pub mod config;
pub mod logging;

pub mod chunker;
mod downloader;
pub mod error;
pub mod merge;
pub mod observer;
pub mod probe;
pub mod progress;
pub mod retry;
pub mod session;
pub mod speed;
pub mod storage;
pub mod transport;

pub use error::DownloadError;
pub use merge::{ContainerKind, MergeError, MergePipeline, SegmentFile};
pub use observer::{NoopObserver, Observer};
pub use session::{DownloadItem, Downloader, SessionRequest};
pub use transport::{CurlTransport, Transport};
