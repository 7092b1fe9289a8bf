//! 核心编排层：错误分类、流程状态与编排器

pub mod error;
pub mod orchestrator;
pub mod state;

pub use error::FlowError;
pub use orchestrator::{FlowSettings, Orchestrator};
pub use state::{
    ArtifactDescriptor, ContinuationToken, Credentials, FlowLog, FlowResult, FlowState,
    GenerationRequest, LogEntry, ProjectHandle,
};
