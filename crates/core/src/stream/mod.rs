//! Client-facing event streams

pub mod encoder;
pub mod factory;
pub mod registry;
pub mod session;

pub use encoder::{heartbeat_frame, EncodeError, Frame, FrameEncoder, FrameParser};
pub use factory::{stream_headers, StreamResponse, StreamingResponseFactory};
pub use registry::{RegistryTotals, StreamRegistry};
pub use session::{CloseReason, SessionBody, SessionMetadata, SessionOptions, StreamSession};
