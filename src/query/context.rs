//! Context assembly: retrieved chunks → labeled prompt blocks.

use crate::search::SearchResult;

/// Placed between context blocks
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Format one retrieved chunk as a labeled block.
pub fn format_block(result: &SearchResult) -> String {
    let doc = &result.metadata.document;
    match doc.source_file_id.as_deref() {
        Some(id) => format!("FILE: {} ({})\n{}", doc.filename, id, result.content),
        None => format!("FILE: {}\n{}", doc.filename, result.content),
    }
}

/// Context assembled from ranked search results
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub text: String,
    /// How many of the ranked results made it into `text`
    pub used: usize,
}

/// Join result blocks in rank order.
///
/// With a nonzero `max_chars`, stops before the first block that would push
/// the total past the budget. The top-ranked block is always kept.
pub fn assemble(results: &[SearchResult], max_chars: usize) -> AssembledContext {
    let mut text = String::new();
    let mut chars = 0;
    let mut used = 0;

    for result in results {
        let block = format_block(result);
        let sep = if used == 0 { "" } else { BLOCK_SEPARATOR };
        let added = sep.chars().count() + block.chars().count();

        if max_chars > 0 && used > 0 && chars + added > max_chars {
            log::debug!(
                "Context budget of {} chars reached after {} of {} blocks",
                max_chars,
                used,
                results.len()
            );
            break;
        }

        text.push_str(sep);
        text.push_str(&block);
        chars += added;
        used += 1;
    }

    AssembledContext { text, used }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{DocumentMetadata, FileDescriptor};

    fn result(content: &str, name: &str, id: &str, rank: usize) -> SearchResult {
        let descriptor = FileDescriptor::new(id, "text/plain", name);
        SearchResult {
            chunk_id: format!("chunk-{}", rank),
            content: content.to_string(),
            metadata: DocumentMetadata::for_file(&descriptor, None).at_offset(0),
            indexed_at: chrono::Utc::now(),
            score: 1.0 / rank as f32,
            rank,
        }
    }

    #[test]
    fn test_block_labels_file() {
        let block = format_block(&result("Refunds within 30 days.", "policy.pdf", "F1", 1));
        assert_eq!(block, "FILE: policy.pdf (F1)\nRefunds within 30 days.");
    }

    #[test]
    fn test_block_without_file_id() {
        let mut r = result("remember the milk", "note", "F1", 1);
        r.metadata = DocumentMetadata::for_message("note from U1", Some("C1")).at_offset(0);
        assert_eq!(format_block(&r), "FILE: note from U1\nremember the milk");
    }

    #[test]
    fn test_assemble_preserves_rank_order() {
        let results = vec![result("first", "a.txt", "A", 1), result("second", "b.txt", "B", 2)];
        let ctx = assemble(&results, 0);
        assert_eq!(
            ctx.text,
            "FILE: a.txt (A)\nfirst\n\n---\n\nFILE: b.txt (B)\nsecond"
        );
        assert_eq!(ctx.used, 2);
    }

    #[test]
    fn test_assemble_respects_budget() {
        let results = vec![
            result("first", "a.txt", "A", 1),
            result("second", "b.txt", "B", 2),
            result("third", "c.txt", "C", 3),
        ];
        let one = format_block(&results[0]).chars().count();
        let two = one + BLOCK_SEPARATOR.len() + format_block(&results[1]).chars().count();

        assert_eq!(assemble(&results, two).used, 2);
        assert_eq!(assemble(&results, two - 1).used, 1);
    }

    #[test]
    fn test_assemble_keeps_top_block_over_budget() {
        let results = vec![result("a long chunk of text", "a.txt", "A", 1)];
        let ctx = assemble(&results, 5);
        assert_eq!(ctx.used, 1);
        assert!(ctx.text.contains("a long chunk"));
    }

    #[test]
    fn test_assemble_empty() {
        let ctx = assemble(&[], 100);
        assert!(ctx.text.is_empty());
        assert_eq!(ctx.used, 0);
    }
}
