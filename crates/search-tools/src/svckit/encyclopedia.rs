//! Encyclopedia lookup output

use crate::model::Document;

pub fn format(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|d| format!("Page: {}\nSummary: {}", d.title, d.summary))
        .collect::<Vec<_>>()
        .join("\n\n")
}
