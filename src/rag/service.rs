use tracing::{info, instrument};

use super::{AnswerComposer, Retriever};
use crate::error::{RagError, Result};

/// Entry point for chat requests: validate, retrieve, compose.
///
/// Holds no state beyond the retriever and composer it was built with.
/// Each query is answered independently.
#[derive(Clone)]
pub struct RagService {
    retriever: Retriever,
    composer: AnswerComposer,
}

impl RagService {
    pub fn new(retriever: Retriever, composer: AnswerComposer) -> Self {
        Self {
            retriever,
            composer,
        }
    }

    #[instrument(skip_all, fields(query_len = query.len()))]
    pub async fn answer(&self, query: &str) -> Result<String> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidQuery("query is empty".to_string()));
        }

        let retriever = self.retriever.clone();
        let owned_query = query.to_string();
        let documents = tokio::task::spawn_blocking(move || retriever.retrieve(&owned_query))
            .await
            .map_err(|e| RagError::Internal(format!("retrieval task failed: {e}")))??;

        let answer = self.composer.compose(&documents, query).await?;
        info!(
            documents = documents.len(),
            answer_len = answer.len(),
            "answered query"
        );
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::Embedder;
    use crate::embedder::hashing::HashingEmbedder;
    use crate::index::{Document, VectorIndex};
    use crate::llm::{LanguageModel, LlmError};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers with the first context line of the prompt.
    #[derive(Default)]
    struct FirstContextModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LanguageModel for FirstContextModel {
        async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let first = prompt.split("\n\n").nth(1).unwrap_or_default();
            Ok(format!("Based on our notes: {first}"))
        }

        fn model_name(&self) -> &str {
            "first-context"
        }
    }

    /// Counts embeddings so tests can see whether retrieval ran.
    struct CountingEmbedder {
        inner: HashingEmbedder,
        calls: AtomicUsize,
    }

    impl Embedder for CountingEmbedder {
        fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, crate::embedder::EmbedderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text)
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        fn name(&self) -> &str {
            self.inner.name()
        }
    }

    fn service() -> (RagService, Arc<CountingEmbedder>, Arc<FirstContextModel>) {
        let embedder = Arc::new(CountingEmbedder {
            inner: HashingEmbedder::default(),
            calls: AtomicUsize::new(0),
        });
        let docs = vec![
            Document::new("AI development basics"),
            Document::new("cloud computing overview"),
        ];
        let index = VectorIndex::build(docs, embedder.as_ref()).unwrap();
        embedder.calls.store(0, Ordering::SeqCst);

        let model = Arc::new(FirstContextModel::default());
        let retriever = Retriever::new(Arc::new(index), embedder.clone(), 4);
        let composer = AnswerComposer::new(model.clone(), Duration::from_secs(5));
        (RagService::new(retriever, composer), embedder, model)
    }

    #[tokio::test]
    async fn test_answer_uses_most_relevant_document() {
        let (service, _, _) = service();
        let answer = service.answer("Tell me about AI").await.unwrap();
        assert_eq!(answer, "Based on our notes: AI development basics");
    }

    #[tokio::test]
    async fn test_answer_rejects_blank_queries_without_work() {
        let (service, embedder, model) = service();
        for query in ["", " ", "\t\n  "] {
            let err = service.answer(query).await.unwrap_err();
            assert!(matches!(err, RagError::InvalidQuery(_)));
        }
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_answer_surfaces_retrieval_errors() {
        let (service, _, model) = service();
        let long_query = "word ".repeat(300);
        let err = service.answer(&long_query).await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }
}
