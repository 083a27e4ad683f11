use super::{
    llm::Message,
    model::ScoredChunk,
};
use crate::{err, error::MedragError};

/// Placeholder for retrieved context in system prompts.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a medical assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If the context does not contain the answer, say that you don't know. \
Use three sentences maximum and keep the answer concise.\n\n{context}";

/// System prompt with a slot for the retrieved context.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    system: String,
}

impl PromptTemplate {
    /// Errors if the template has no `{context}` placeholder.
    pub fn new(system: impl Into<String>) -> Result<Self, MedragError> {
        let system = system.into();
        if !system.contains(CONTEXT_PLACEHOLDER) {
            return err!(
                InvalidPrompt,
                "system prompt must contain the '{CONTEXT_PLACEHOLDER}' placeholder"
            );
        }
        Ok(Self { system })
    }

    /// Stuff the chunk contents into the system prompt, separated by blank lines.
    pub fn render(&self, chunks: &[ScoredChunk]) -> String {
        let context = chunks
            .iter()
            .map(|c| c.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        self.system.replace(CONTEXT_PLACEHOLDER, &context)
    }

    /// The system message with the stuffed context followed by the question.
    pub fn messages(&self, chunks: &[ScoredChunk], question: &str) -> Vec<Message> {
        vec![Message::system(self.render(chunks)), Message::user(question)]
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{llm::Role, model::Chunk};

    fn scored(content: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                content: content.to_string(),
                source: "book.pdf".to_string(),
                page: Some(1),
                index: 0,
            },
            score: 0.9,
        }
    }

    #[test]
    fn stuffs_context() {
        let prompt = PromptTemplate::new("Context:\n{context}\nEnd").unwrap();
        let rendered = prompt.render(&[scored("first"), scored("second")]);
        assert_eq!("Context:\nfirst\n\nsecond\nEnd", rendered);
    }

    #[test]
    fn empty_context() {
        let prompt = PromptTemplate::new("[{context}]").unwrap();
        assert_eq!("[]", prompt.render(&[]));
    }

    #[test]
    fn rejects_template_without_placeholder() {
        assert!(PromptTemplate::new("You are a doctor.").is_err());
    }

    #[test]
    fn builds_messages() {
        let messages = PromptTemplate::default().messages(&[scored("Acne is common.")], "What is acne?");

        assert_eq!(2, messages.len());
        assert_eq!(Role::System, messages[0].role);
        assert!(messages[0].content.ends_with("Acne is common."));
        assert_eq!(Role::User, messages[1].role);
        assert_eq!("What is acne?", messages[1].content);
    }
}
