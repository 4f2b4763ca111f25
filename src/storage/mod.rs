pub mod cache;

pub use cache::{
    CachePayload, CacheStore, LoadOutcome, MissReason, SaveOutcome, SkipReason, SCHEMA_VERSION,
};
