//! The capture → analyze → solve state machine.

mod controller;
mod events;
mod state;

pub use controller::{DEFAULT_AUTO_CLOSE, PipelineChannels, PipelineController, PipelineSettings};
pub use events::{CloseReason, PipelineEvent, PipelineMessage, TaskOutput};
pub use state::{PipelineSession, PipelineState, SessionMutation};
