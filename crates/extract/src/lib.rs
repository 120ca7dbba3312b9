pub mod classify;
pub mod extract;
pub mod pattern;
pub mod source;

pub use classify::Classifier;
pub use extract::Extractor;
pub use pattern::PatternRule;
pub use source::{
    default_source, is_text_document, join_pages, sidecar_path, PlainTextSource, StaticText,
    TextSource, TextSourceError,
};
