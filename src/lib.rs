pub mod agents;
pub mod analysis;
pub mod api;
pub mod backend;
pub mod config;
pub mod documents;
pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod report;
pub mod samples;
pub mod storage;
pub mod supervisor;

pub use agents::{Agent, AgentRegistry, AgentSession};
pub use config::Config;
pub use error::{Result, ShowcaseError};
pub use pipeline::{LocalPipeline, PipelineResult, RemotePipeline};
pub use supervisor::Supervisor;
