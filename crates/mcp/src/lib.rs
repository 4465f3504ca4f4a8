//! MCP server exposing `OpenAPI` introspection and generated client code examples over stdio.

pub mod config;
pub mod error;
pub mod registry;
pub mod server;
pub mod tools;

pub use config::{ServerConfig, load_config};
pub use error::{Result, ServerError};
pub use registry::{ApiSpec, DirectorySource, SpecRegistry, SpecSource};
pub use server::{serve, serve_stdio};
pub use tools::ToolHandler;
