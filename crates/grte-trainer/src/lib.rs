//! # GRTE Trainer
//!
//! Data-side support for training table-filling relation extractors: run
//! configuration, explicit seeding, padding, and the batch generator that
//! turns annotated examples into label tensors.

pub mod config;
pub mod generator;
pub mod padding;
pub mod seed;

pub use config::{GeneratorConfig, RunConfig, SpanErrorPolicy, dump_config, render_config};
pub use generator::{DataGenerator, EvalBatch, EvalBatches, TrainBatch, TrainBatches};
pub use padding::{mask_padding, sequence_padding, table_padding};
pub use seed::{DEFAULT_SEED, seeded_rng, shuffle};
