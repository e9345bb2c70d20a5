mod client;

pub use client::OpenAIProducer;
