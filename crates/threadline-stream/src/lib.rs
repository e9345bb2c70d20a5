pub mod config;
pub mod coordinator;
pub mod emitter;
pub mod sse;
pub mod state;

pub use config::StreamConfig;
pub use coordinator::{
    split_chunks, ChunkStream, FinalizeReport, StreamCoordinator, StreamFinalizer, StreamJob,
    StreamOutcome,
};
pub use emitter::{ChunkEmitter, EmitError};
pub use sse::{encode_chunk, wire_payload, DONE_EVENT};
pub use state::{InvalidTransition, StateMachine, StreamState};
