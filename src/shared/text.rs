//! Small text helpers shared by prompt construction and logging.

/// Rough token estimate (~4 characters per token), used for log output only.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    (text.chars().count() + 3) / 4
}

/// First `limit` characters of `value`, cut on a character boundary.
pub fn truncate_chars(value: &str, limit: usize) -> &str {
    match value.char_indices().nth(limit) {
        Some((byte_idx, _)) => &value[..byte_idx],
        None => value,
    }
}

/// Single-line preview for log messages.
pub fn preview_text(value: &str, limit: usize) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let snippet = truncate_chars(trimmed, limit).replace('\n', " ");
    if trimmed.chars().count() > limit {
        format!("{}…", snippet)
    } else {
        snippet
    }
}

/// Left-aligned plain-text table, columns separated by two spaces.
pub fn render_aligned_table<S: AsRef<str>>(header: &[S], rows: &[Vec<S>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.as_ref().chars().count()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let len = cell.as_ref().chars().count();
            match widths.get_mut(idx) {
                Some(width) => *width = (*width).max(len),
                None => widths.push(len),
            }
        }
    }

    let render_row = |cells: &[S]| -> String {
        cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!("{:<width$}", cell.as_ref(), width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render_row(header));
    for row in rows {
        lines.push(render_row(row));
    }
    lines.join("\n")
}
