//! Preprint lookup output

use crate::model::Document;

pub fn format(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|d| {
            format!(
                "Published: {}\nTitle: {}\nAuthors: {}\nSummary: {}",
                d.published.as_deref().unwrap_or("unknown"),
                d.title,
                d.authors.join(", "),
                d.summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprint_entry() {
        let doc = Document::new("Attention Is All You Need", "Transformers.")
            .with_published("2023-08-02")
            .with_authors(["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(
            format(&[doc]),
            "Published: 2023-08-02\nTitle: Attention Is All You Need\n\
             Authors: Ashish Vaswani, Noam Shazeer\nSummary: Transformers."
        );
    }
}
