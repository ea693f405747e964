/// HTTP server setup using `axum`.
///
/// Provides `AppState` (shared state), the router, and startup logic with
/// graceful shutdown on Ctrl-C.
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::post;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers;
use crate::rag::RagService;

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub rag: Arc<RagService>,
}

impl AppState {
    pub fn new(rag: RagService) -> Self {
        Self { rag: Arc::new(rag) }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(handlers::chat))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve on an already bound listener until Ctrl-C.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener
        .local_addr()
        .context("Failed to read listener address")?;
    info!("Listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server encountered an error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::hashing::HashingEmbedder;
    use crate::embedder::Embedder;
    use crate::http::handlers::ChatResponse;
    use crate::index::{Document, VectorIndex};
    use crate::llm::{LanguageModel, LlmError};
    use crate::rag::{AnswerComposer, Retriever};
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use std::time::Duration;
    use tower::ServiceExt;

    struct EchoModel {
        fail: bool,
    }

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError> {
            if self.fail {
                return Err(LlmError::Request("connection refused".to_string()));
            }
            let question = prompt
                .lines()
                .find_map(|l| l.strip_prefix("Question: "))
                .unwrap_or_default();
            Ok(format!("You asked: {question}"))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn app(fail: bool) -> Router {
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
        let index = VectorIndex::build(
            vec![Document::new("AI development"), Document::new("cloud computing")],
            embedder.as_ref(),
        )
        .unwrap();
        let retriever = Retriever::new(Arc::new(index), embedder, 4);
        let composer = AnswerComposer::new(Arc::new(EchoModel { fail }), Duration::from_secs(5));
        router(AppState::new(RagService::new(retriever, composer)))
    }

    async fn post_chat(app: Router, body: &'static str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_chat_ok() {
        let (status, body) = post_chat(app(false), r#"{"message": "Tell me about AI"}"#).await;
        assert_eq!(status, StatusCode::OK);
        let parsed: ChatResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.response, "You asked: Tell me about AI");
    }

    #[tokio::test]
    async fn test_chat_missing_or_blank_message() {
        for body in [r#"{}"#, r#"{"message": null}"#, r#"{"message": ""}"#, r#"{"message": "   "}"#] {
            let (status, json) = post_chat(app(false), body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(json, serde_json::json!({"error": "No message provided"}));
        }
    }

    #[tokio::test]
    async fn test_chat_unparseable_body() {
        for body in ["not json", r#"{"message": 42}"#] {
            let (status, json) = post_chat(app(false), body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(json["error"], "No message provided");
        }
    }

    #[tokio::test]
    async fn test_chat_model_failure_is_500() {
        let (status, json) = post_chat(app(true), r#"{"message": "hello"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = json["error"].as_str().unwrap();
        assert!(message.contains("connection refused"), "{message}");
    }

    #[tokio::test]
    async fn test_chat_rejects_get() {
        let request = Request::builder()
            .method("GET")
            .uri("/chat")
            .body(Body::empty())
            .unwrap();
        let response = app(false).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
