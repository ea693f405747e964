//! Retrieval-augmented answering: retriever, answer composer, the service
//! that drives them, and the startup routine that provides the index.
pub mod bootstrap;
pub mod composer;
pub mod retriever;
pub mod service;

pub use composer::AnswerComposer;
pub use retriever::Retriever;
pub use service::RagService;
