pub mod storage;
pub mod upload;

pub use storage::{LocalFileStore, ReportFileStore};
pub use upload::ReportService;
