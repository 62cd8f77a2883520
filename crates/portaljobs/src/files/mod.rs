//! Locating, generating and listing downloadable files.

pub mod cleanup;
pub mod content_type;
pub mod listing;
pub mod resolver;
pub mod sanitize;
pub mod source;
pub mod synthetic;

pub use content_type::content_type_for;
pub use listing::{find_by_job_id, format_size, job_files, list_reports, ReportSummary};
pub use resolver::{FileResolver, SolarQuery};
pub use sanitize::{sanitize_job_id, validate_component};
pub use source::{FileFamily, FileRequest, FileSource, RealFileSource, ServedFile, SyntheticFileSource};
