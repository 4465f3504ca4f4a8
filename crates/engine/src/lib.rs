//! `OpenAPI` schema resolution and code-example synthesis.
//!
//! The entry point is [`ExampleEngine`]; the individual stages ([`SchemaResolver`],
//! [`ExampleSynthesizer`], [`composition`], [`response_shape`], [`ExampleCache`]) are public for
//! callers that need only one of them.

pub mod cache;
pub mod clock;
pub mod composition;
pub mod config;
pub mod engine;
pub mod error;
pub mod operation;
pub mod render;
pub mod resolver;
pub mod response_shape;
pub mod schema;
pub mod synth;

pub use cache::{CacheEntry, ExampleCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, EngineConfig};
pub use engine::ExampleEngine;
pub use error::{EngineError, ResolveError, Result};
pub use operation::{OperationDescriptor, OperationSummary, get_operation, get_schema, list_operations};
pub use render::GeneratedExample;
pub use resolver::SchemaResolver;
pub use response_shape::{ResponseShape, ShapeKind};
pub use schema::{InlineSchema, ResolvedSchema, SchemaNode, SchemaType};
pub use synth::ExampleSynthesizer;
