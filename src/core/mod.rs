pub mod classify;
pub mod date;
pub mod engine;
pub mod index;
pub mod relocate;
pub mod scanner;

pub use classify::{classify, reconcile, Classification, ClassificationResult, ClassificationSummary};
pub use date::{extract_date, CaptureDate};
pub use engine::{ReconcileEngine, ReconcileReport, RunStatus};
pub use index::{IndexStats, PhotoRecord, ReferenceIndex};
pub use relocate::{CollisionPolicy, RelocationOutcome, Relocator};
pub use scanner::{CandidateFile, CandidateOrigin, ExtensionFilter, FileScanner};
