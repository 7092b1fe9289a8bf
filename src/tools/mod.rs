//! 远程工具调用：MCP JSON-RPC 信封、传输层、调用器与 Stitch 工具目录

pub mod executor;
pub mod mcp;
pub mod stitch;
pub mod transport;

pub use executor::ToolInvoker;
pub use mcp::{JsonRpcRequest, ToolCallParams};
pub use stitch::{GenerationParams, StitchTool};
pub use transport::{HttpTransport, McpTransport, TransportReply, API_KEY_HEADER};
