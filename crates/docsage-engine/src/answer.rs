//! Retrieval-augmented answer service.
//!
//! Ownership is checked before anything else; an unauthorized document set
//! id fails with [`DocSageError::NotAuthorized`] and the passage index is
//! never queried. The raw question is logged before any oracle call so a
//! failure afterwards still leaves an auditable trail.

use std::sync::Arc;

use docsage_core::error::{DocSageError, Result};
use docsage_core::traits::{CompletionOracle, EmbeddingOracle, PassageIndex};
use docsage_core::types::ChatMessage;
use docsage_store::Store;

pub struct AnswerService {
    store: Arc<Store>,
    embedder: Arc<dyn EmbeddingOracle>,
    completer: Arc<dyn CompletionOracle>,
    index: Arc<dyn PassageIndex>,
    base_language: String,
    top_k: usize,
}

impl AnswerService {
    pub fn new(
        store: Arc<Store>,
        embedder: Arc<dyn EmbeddingOracle>,
        completer: Arc<dyn CompletionOracle>,
        index: Arc<dyn PassageIndex>,
        base_language: String,
        top_k: usize,
    ) -> Self {
        Self { store, embedder, completer, index, base_language, top_k }
    }

    /// Answer `question` from the passages of `document_set_id`, replying
    /// in `language`.
    pub async fn answer(
        &self,
        document_set_id: &str,
        question: &str,
        user_id: &str,
        language: &str,
    ) -> Result<String> {
        if !self.store.user_owns(user_id, document_set_id)? {
            return Err(DocSageError::NotAuthorized(document_set_id.to_string()));
        }

        // The original question is what gets logged, even when a
        // translation is embedded instead.
        let qna_id = self.store.insert_qna(user_id, document_set_id, question)?;

        let effective = if language.eq_ignore_ascii_case(&self.base_language) {
            question.to_string()
        } else {
            self.translate(question, language).await?
        };

        let embeddings = self.embedder.embed(std::slice::from_ref(&effective)).await?;
        let query_vector = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| DocSageError::Oracle("empty embedding response".into()))?;

        let matches = self
            .index
            .query(&query_vector, document_set_id, self.top_k)
            .await?;
        let context = matches
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        // One completion call, no retry; a transient failure surfaces as a
        // server error.
        let messages = [
            ChatMessage::system(format!(
                "Answer the question based on the context below. Answer in {language}."
            )),
            ChatMessage::user(format!("Context: {context}\nQuestion: {effective}")),
            ChatMessage::assistant("Answer: "),
        ];
        let response = self.completer.complete(&messages).await?;

        self.store.attach_answer(&qna_id, &response.raw, &response.content)?;
        Ok(response.content)
    }

    /// Translate a question to the base language before embedding.
    async fn translate(&self, question: &str, from_language: &str) -> Result<String> {
        let messages = [
            ChatMessage::system(format!(
                "Translate the user's message from {from_language} to {}. \
                 Reply with the translation only.",
                self.base_language
            )),
            ChatMessage::user(question),
        ];
        let response = self.completer.complete(&messages).await?;
        Ok(response.content)
    }
}
