pub mod aggregate;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod country;
pub mod domain_utils;
pub mod entity;
pub mod identity;
pub mod input;
pub mod logger;
pub mod normalize;
pub mod pipeline;
pub mod result_sink;
pub mod source;
pub mod summary;

pub use checkpoint::{Checkpoint, ResumeMode};
pub use entity::{Entity, EntityRecord};
pub use pipeline::{EntityOutcome, EntityPipeline};
pub use result_sink::ResultSink;
