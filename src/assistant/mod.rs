// Assistant module
// One-shot question answering: retrieve, compose, generate


use tracing::{debug, info};

use crate::Result;
use crate::prompts::{TemplateKind, compose};
use crate::provider::Generator;
use crate::retrieval::Retriever;

/// How a question should be answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Explain,
    Compare,
}

impl Mode {
    /// Number of chunks retrieved for this mode
    #[inline]
    pub fn k(self) -> usize {
        match self {
            Self::Explain => 5,
            Self::Compare => 6,
        }
    }

    #[inline]
    pub fn template(self) -> TemplateKind {
        match self {
            Self::Explain => TemplateKind::Explain,
            Self::Compare => TemplateKind::Compare,
        }
    }
}

pub struct Assistant<'a> {
    retriever: Retriever<'a>,
    generator: &'a dyn Generator,
}

impl<'a> Assistant<'a> {
    #[inline]
    pub fn new(retriever: Retriever<'a>, generator: &'a dyn Generator) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    /// Answer `question` from retrieved context with a single generation call.
    ///
    /// The generator is called even when nothing was retrieved; the prompt tells
    /// the model to admit it doesn't know.
    #[inline]
    pub async fn answer(&self, mode: Mode, question: &str) -> Result<String> {
        let context = self.retriever.retrieve(question, mode.k()).await?;
        info!(
            "Answering {:?} question with {} context chunks",
            mode,
            context.len()
        );

        let prompt = compose(mode.template(), question, &context.texts());
        debug!("Prompt length: {} chars", prompt.chars().count());

        self.generator.generate(&prompt)
    }
}
