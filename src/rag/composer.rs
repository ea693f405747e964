use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{RagError, Result};
use crate::index::Document;
use crate::llm::LanguageModel;

const PROMPT_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Build the single prompt sent to the model: instructions, every retrieved
/// document in retrieval order, then the question.
pub fn build_prompt(documents: &[Document], query: &str) -> String {
    let context = documents
        .iter()
        .map(|d| d.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{PROMPT_PREAMBLE}\n\n{context}\n\nQuestion: {query}\nHelpful Answer:")
}

/// Stuffs retrieved documents into a prompt and asks the model to answer.
#[derive(Clone)]
pub struct AnswerComposer {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl AnswerComposer {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Return the model's answer verbatim.
    ///
    /// A model error, a timeout, or an empty answer is a
    /// [`RagError::Completion`]; an empty string is never returned as an
    /// answer.
    pub async fn compose(&self, documents: &[Document], query: &str) -> Result<String> {
        let prompt = build_prompt(documents, query);
        debug!(
            model = self.model.model_name(),
            documents = documents.len(),
            prompt_len = prompt.len(),
            "composing answer"
        );

        let answer = tokio::time::timeout(self.timeout, self.model.complete(&prompt))
            .await
            .map_err(|_| {
                warn!(timeout_secs = self.timeout.as_secs_f64(), "completion timed out");
                RagError::Completion(format!("model did not answer within {:?}", self.timeout))
            })?
            .map_err(|e| RagError::Completion(e.to_string()))?;

        if answer.trim().is_empty() {
            return Err(RagError::Completion("model returned an empty answer".to_string()));
        }

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    enum Behavior {
        Answer(&'static str),
        Fail,
        Hang,
    }

    struct ScriptedModel {
        behavior: Behavior,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.behavior {
                Behavior::Answer(text) => Ok(text.to_string()),
                Behavior::Fail => Err(LlmError::Status {
                    status: 503,
                    body: "overloaded".to_string(),
                }),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok("too late".to_string())
                }
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn docs() -> Vec<Document> {
        vec![
            Document::new("AI development basics"),
            Document::new("cloud computing overview"),
        ]
    }

    #[test]
    fn test_build_prompt_order() {
        let prompt = build_prompt(&docs(), "Tell me about AI");
        let ai = prompt.find("AI development basics").unwrap();
        let cloud = prompt.find("cloud computing overview").unwrap();
        let question = prompt.find("Question: Tell me about AI").unwrap();
        assert!(prompt.starts_with("Use the following pieces of context"));
        assert!(ai < cloud && cloud < question);
        assert!(prompt.ends_with("Helpful Answer:"));
    }

    #[tokio::test]
    async fn test_compose_returns_answer_verbatim() {
        let model = ScriptedModel::new(Behavior::Answer("  AI is about learning from data.\n"));
        let composer = AnswerComposer::new(model.clone(), Duration::from_secs(5));

        let answer = composer.compose(&docs(), "Tell me about AI").await.unwrap();
        assert_eq!(answer, "  AI is about learning from data.\n");

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0], build_prompt(&docs(), "Tell me about AI"));
    }

    #[tokio::test]
    async fn test_compose_model_error() {
        let composer = AnswerComposer::new(ScriptedModel::new(Behavior::Fail), Duration::from_secs(5));
        let err = composer.compose(&docs(), "q").await.unwrap_err();
        match err {
            RagError::Completion(msg) => assert!(msg.contains("503"), "{msg}"),
            other => panic!("expected Completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_compose_empty_answer() {
        let composer =
            AnswerComposer::new(ScriptedModel::new(Behavior::Answer(" \n")), Duration::from_secs(5));
        let err = composer.compose(&docs(), "q").await.unwrap_err();
        assert!(matches!(err, RagError::Completion(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_compose_timeout() {
        let composer =
            AnswerComposer::new(ScriptedModel::new(Behavior::Hang), Duration::from_secs(30));
        let err = composer.compose(&docs(), "q").await.unwrap_err();
        match err {
            RagError::Completion(msg) => assert!(msg.contains("within"), "{msg}"),
            other => panic!("expected Completion, got {other:?}"),
        }
    }
}
