//! HTTP surface: the `/chat` endpoint and the server that hosts it.
pub mod handlers;
pub mod server;

pub use server::{AppState, router, serve};
