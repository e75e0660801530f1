//! Web search output
//!
//! Only the snippets are kept, run together into one paragraph.

use crate::model::Document;

pub fn format(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|d| d.summary.as_str())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joins_snippets() {
        let docs = vec![
            Document::new("a", "First snippet."),
            Document::new("b", ""),
            Document::new("c", "Second snippet."),
        ];
        assert_eq!(format(&docs), "First snippet. Second snippet.");
    }
}
