pub mod batch;
pub mod finding;
pub mod image;
pub mod loaders;
pub mod report;

pub use batch::{Batch, BatchStatus};
pub use finding::{Finding, Severity, DEFAULT_FINDING_CONFIDENCE};
pub use image::MedicalImage;
pub use loaders::{load_images_from_folder, media_type_for};
pub use report::{BatchSummary, Report, RunOutcome};
