//! Wire types exchanged with clients and the workflow engine

pub mod chat;
pub mod stream;
pub mod workflow;

pub use chat::{AnswerPayload, ChatRequest};
pub use stream::{
    DonePayload, DoneStatus, ErrorPayload, Event, EventKind, StatusPayload, StreamEvent,
    StreamSnapshot,
};
pub use workflow::{answer_text, WorkflowContext, WorkflowReply, WorkflowRequest};
