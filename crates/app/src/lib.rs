pub mod pipeline;

pub use pipeline::{
    BatchFailure, BatchReport, ImportedDocument, InvoicePipeline, PipelineError, ToggledDocument,
};
