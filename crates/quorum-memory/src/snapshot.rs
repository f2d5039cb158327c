use quorum_models::{AgentState, ReportKind};

/// Snapshot category order: policy, sentiment, technical, fundamentals.
const SNAPSHOT_ORDER: [ReportKind; 4] = [
    ReportKind::News,
    ReportKind::Sentiment,
    ReportKind::Market,
    ReportKind::Fundamentals,
];

/// Build the structured situation snapshot used as the unit of embedding.
///
/// Pure projection of the four reports: one labeled excerpt per category,
/// prefix-truncated to `excerpt_len` characters. Identical reports always
/// yield identical snapshots, so their embeddings are reproducible.
pub fn build_snapshot(state: &AgentState, excerpt_len: usize) -> String {
    let mut snapshot = String::from("### Market Snapshot\n");
    for kind in SNAPSHOT_ORDER {
        let excerpt = truncate_chars(state.report_or_default(kind), excerpt_len);
        snapshot.push_str("- ");
        snapshot.push_str(kind.snapshot_label());
        snapshot.push_str(": ");
        snapshot.push_str(excerpt);
        snapshot.push('\n');
    }
    snapshot
}

/// Stable prefix truncation to at most `budget` characters, never splitting
/// a multi-byte character.
pub fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
