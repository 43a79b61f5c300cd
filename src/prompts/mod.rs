// Prompt templates for grounded answers


/// Separator placed between retrieved chunks in the context block
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const CONTEXT_HEADER: &str = "Context (excerpts from the NFL rulebook and analytics notes):";

const EXPLAIN_PREAMBLE: &str =
    "You are an assistant that explains NFL rules and analytics using ONLY the provided context.";

const EXPLAIN_INSTRUCTIONS: &str = "\
Instructions:
- Answer in clear, casual language.
- Base your answer ONLY on the context above. If the answer is not in the context, say you don't know.
- If relevant, quote or reference the rule or section in plain English.
- Keep the answer under 250 words.";

const COMPARE_PREAMBLE: &str =
    "You are an assistant that compares NFL rules using ONLY the provided context.";

const COMPARE_INSTRUCTIONS: &str = "\
Instructions:
- Identify the two main rules being compared from the question (for example, \"Defensive Pass Interference (DPI)\" vs \"Offensive Pass Interference (OPI)\").
- First, briefly define each rule separately.
- Then, compare them directly with a focus on:
  - When they apply
  - Yardage / enforcement (spot foul vs previous spot, automatic first down, etc.)
  - Who commits the foul (offense or defense)
- Present the comparison as:
  - A short bullet list **or**
  - A simple text table-style layout (no markdown table needed, just clear formatting).
- Base your answer ONLY on the context above. If you cannot fully answer from the context, say what is missing.
- Keep the answer under 300 words.";

/// Which answer style to prompt for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    /// Explain a single rule or analytics concept
    Explain,
    /// Compare two rules side by side
    Compare,
}

impl TemplateKind {
    fn preamble(self) -> &'static str {
        match self {
            Self::Explain => EXPLAIN_PREAMBLE,
            Self::Compare => COMPARE_PREAMBLE,
        }
    }

    fn instructions(self) -> &'static str {
        match self {
            Self::Explain => EXPLAIN_INSTRUCTIONS,
            Self::Compare => COMPARE_INSTRUCTIONS,
        }
    }
}

/// Join retrieved chunks into a single context block
#[inline]
pub fn context_block(chunks: &[String]) -> String {
    chunks.join(CONTEXT_SEPARATOR)
}

/// Render the full prompt for `question` over the retrieved `chunks`.
///
/// Chunks are inserted verbatim in the order given. An empty slice produces an
/// empty context block, leaving the model to say it doesn't know.
#[inline]
pub fn compose(kind: TemplateKind, question: &str, chunks: &[String]) -> String {
    format!(
        "\n{preamble}\n\n{header}\n{context}\n\nQuestion: {question}\n\n{instructions}\n\nNow answer the question.\n",
        preamble = kind.preamble(),
        header = CONTEXT_HEADER,
        context = context_block(chunks),
        instructions = kind.instructions(),
    )
}
