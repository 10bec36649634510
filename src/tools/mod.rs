//! Tool system: in-process tools and the registries that dispatch them.

pub mod arguments;
#[cfg(feature = "mcp")]
pub mod mcp;
pub mod registry;
pub mod render;
pub mod tool;
pub mod validation;

pub use arguments::ToolArguments;
#[cfg(feature = "mcp")]
pub use mcp::McpToolRegistry;
pub use registry::{LazyRegistry, LocalToolRegistry, ToolRegistry};
pub use render::render_tool_output;
pub use tool::{FunctionTool, Tool};
pub use validation::validate_arguments;
