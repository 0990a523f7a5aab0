pub mod aggregation;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod retention;
pub mod stats;
pub mod utils;

pub use error::{CompactionError, StoreError};
pub use pipeline::{CompactionPipeline, PassReport};
