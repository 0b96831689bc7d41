mod engine;
mod fetcher;
mod store;
mod extractor;
mod differ;
mod report;
mod notifier;
mod sources;

pub use fetcher::{Fetcher, HttpFetcher};
pub use store::SnapshotStore;
pub use extractor::{ContentExtractor, ExtractedContent};
pub use differ::{split_lines, DiffRecord, DiffStats, DiffStrategy, LcsDiffer};
pub use report::{Report, ReportRenderer};
pub use notifier::{DispatchReport, MailgunNotifier, Message, Notifier};
pub use sources::load_list;

// Export the main engine
pub use engine::{Engine, FailurePolicy};
