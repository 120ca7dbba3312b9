pub mod config;
pub mod document;
pub mod money;

pub use config::{AppConfig, ConfigError};
pub use document::{DocumentType, ExtractedRecord, NamingParams, ReimbursementStatus};
pub use money::Money;
