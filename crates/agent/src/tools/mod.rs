//! Tool catalog, argument validation and the handlers behind each tool name.

pub mod executor;
pub mod fuzzy;
pub mod read;
pub mod registry;
pub mod write;

pub use executor::{
    validate_arguments, ToolArguments, ToolContext, ToolError, ToolExecutor, ToolHandler,
    ToolInvocation, ToolResult,
};
pub use fuzzy::best_match;
pub use registry::{ActiveToolSet, ToolAccess, ToolDefinition, ToolRegistry};
