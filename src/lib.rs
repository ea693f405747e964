//! # InnovateHive RAG: Website Chat Backend
//!
//! Answers visitor questions over HTTP by retrieving the most relevant
//! documents from a local vector index and asking a language model to
//! answer with them as context.
//!
//! ## Architecture
//!
//! - **[`config`]**: Configuration loading, validation, and defaults
//! - **[`embedder`]**: Text embedding via ONNX Runtime (all-MiniLM-L6-v2) or feature hashing
//! - **[`index`]**: In-memory cosine index with a SQLite snapshot on disk
//! - **[`llm`]**: Language-model completion (Gemini REST API)
//! - **[`rag`]**: Retriever, answer composer, service, and index bootstrap
//! - **[`http`]**: `POST /chat` endpoint served with axum
//! - **[`error`]**: Error types shared by the RAG core

pub mod config;
pub mod embedder;
pub mod error;
pub mod http;
pub mod index;
pub mod llm;
pub mod rag;
