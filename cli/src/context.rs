use storyrag_retrieval::FusedResult;

/// Render fused results as the numbered story block handed to the prompt.
pub fn format_document_context(results: &[FusedResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(index, result)| {
            format!(
                "\nStory {}:\nKey: {}\nSummary: {}\nStatus: {}\nScore: {:.4}\nFound in: {}\n---",
                index + 1,
                result.key,
                result.summary,
                result.status_name().unwrap_or("Unknown"),
                result.hybrid_score,
                result.found_in
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
