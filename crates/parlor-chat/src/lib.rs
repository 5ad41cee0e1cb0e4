//! Chat session and message lifecycle for Parlor.
//!
//! Tracks multiple chat sessions, per-message delivery status, simulated
//! attachment uploads and a deduplicated context pool per session. All
//! delays run on a virtual clock owned by [`ChatOrchestrator`].

pub mod clock;
pub mod context;
pub mod driver;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod response;
pub mod status;
pub mod store;
pub mod types;
pub mod upload;

pub use clock::{Job, SimClock};
pub use context::ContextPool;
pub use driver::ClockDriver;
pub use error::ChatError;
pub use orchestrator::ChatOrchestrator;
pub use registry::{welcome_message, SessionRegistry};
pub use response::{Reply, ResponseGenerator, ResponseSource};
pub use store::{MessageStore, StatusUpdate};
pub use types::{
    Artifact, ArtifactKind, Attachment, ContextAddOutcome, ContextItem, Extension, IncomingFile,
    Message, Session,
};
pub use upload::{TickOutcome, UploadSimulator};
