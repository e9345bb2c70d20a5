pub mod buffering;
pub mod config;
pub mod error;
pub mod openai;
pub mod streaming;
pub mod traits;

pub use config::OpenAIConfig;
pub use error::ProducerError;
pub use openai::OpenAIProducer;
pub use streaming::fragments_from_bytes;
pub use traits::{Fragment, FragmentStream, ProducerContext, ProducerOutput, ResponseProducer};
