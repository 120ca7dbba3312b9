pub mod hash;
pub mod namer;
pub mod store;

pub use hash::content_digest;
pub use namer::{
    CanonicalNamer, Clock, FixedClock, NamedDocument, NamingError, StoreOutcome, SystemClock,
};
pub use store::{DocumentStore, FsStore, MemoryStore};
