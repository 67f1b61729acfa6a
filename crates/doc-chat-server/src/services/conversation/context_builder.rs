use crate::document::DocumentRecord;

/// Builds the system instruction for a session from the active documents.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    base_instruction: String,
}

impl ContextBuilder {
    pub fn new(base_instruction: String) -> Self {
        Self { base_instruction }
    }

    pub fn base_instruction(&self) -> &str {
        &self.base_instruction
    }

    pub fn default_base_instruction() -> String {
        r#"You are a specialized Document Analysis Assistant.
Answer questions based ONLY on the provided document content.
Always cite the document name.
If information is missing, say you don't know based on these files."#
            .to_string()
    }

    /// Base policy, then `DOCUMENTS:` and one delimited block per document,
    /// numbered from 1 in insertion order.
    pub fn build_system_instruction(&self, documents: &[DocumentRecord]) -> String {
        let blocks = documents
            .iter()
            .enumerate()
            .map(|(i, doc)| Self::document_block(i + 1, doc))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!("{}\n\nDOCUMENTS:\n{}", self.base_instruction, blocks)
    }

    fn document_block(n: usize, doc: &DocumentRecord) -> String {
        format!(
            "--- DOCUMENT {n}: {} ---\n{}\n--- END OF DOCUMENT {n} ---",
            doc.name, doc.content
        )
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(Self::default_base_instruction())
    }
}
