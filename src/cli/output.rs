use crate::download::{HistoryEntry, QueueItem, QueueSnapshot, QueueState};

/// Short marker for a queue state
pub fn state_icon(state: QueueState) -> &'static str {
    match state {
        QueueState::New => "·",
        QueueState::Selecting => "…",
        QueueState::InProgress => "⬇",
        QueueState::Completed => "✓",
        QueueState::Interrupted => "✗",
        QueueState::Failed => "!",
        QueueState::Skipped => "↷",
    }
}

/// Format a single queue item for display
pub fn format_queue_item(item: &QueueItem, detailed: bool) -> String {
    if !detailed {
        let mut line = format!("{} {} {}", state_icon(item.state), item.target_path, item.url());
        if let Some(reason) = item.skip_reason {
            line.push_str(&format!(" ({})", reason));
        } else if let Some(error) = &item.error {
            line.push_str(&format!(" ({})", error));
        }
        return line;
    }

    let mut output = String::new();
    output.push_str(&format!("ID: {}\n", item.id));
    output.push_str(&format!("URL: {}\n", item.url()));
    output.push_str(&format!("Target: {}\n", item.target_path));
    output.push_str(&format!("State: {:?}\n", item.state));
    if let Some(reason) = item.skip_reason {
        output.push_str(&format!("Skipped: {}\n", reason));
    }
    if let Some(error) = &item.error {
        output.push_str(&format!("Error: {}\n", error));
    }
    if let Some(start) = item.start {
        output.push_str(&format!("Started: {}\n", start.format("%Y-%m-%d %H:%M:%S")));
    }
    if let Some(elapsed) = item.elapsed() {
        output.push_str(&format!("Elapsed: {} ms\n", elapsed.num_milliseconds()));
    }
    output
}

/// Format a queue snapshot for display (human or JSON)
pub fn format_queue(snapshot: &QueueSnapshot, json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(snapshot).unwrap_or_else(|_| "{}".to_string());
    }
    if snapshot.items.is_empty() {
        return "Queue is empty.".to_string();
    }

    snapshot
        .items
        .iter()
        .map(|item| format_queue_item(item, false))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line per state that occurs, in state order
pub fn format_state_counts(items: &[QueueItem]) -> String {
    const ORDER: [QueueState; 7] = [
        QueueState::New,
        QueueState::Selecting,
        QueueState::InProgress,
        QueueState::Completed,
        QueueState::Interrupted,
        QueueState::Failed,
        QueueState::Skipped,
    ];

    ORDER
        .iter()
        .filter_map(|state| {
            let count = items.iter().filter(|i| i.state == *state).count();
            (count > 0).then(|| format!("{:?}: {}", state, count))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_history(entries: &[HistoryEntry], json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(entries).unwrap_or_else(|_| "[]".to_string());
    }
    if entries.is_empty() {
        return "No download history.".to_string();
    }

    entries
        .iter()
        .map(|entry| format!("{}  <-  {}", entry.path, entry.url))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Mask evaluation results as `url -> name` lines or a JSON object list
pub fn format_mask_results(results: &[(String, String)], json: bool) -> String {
    if json {
        let values: Vec<_> = results
            .iter()
            .map(|(url, name)| serde_json::json!({ "url": url, "name": name }))
            .collect();
        return serde_json::to_string_pretty(&values).unwrap_or_else(|_| "[]".to_string());
    }

    results
        .iter()
        .map(|(url, name)| format!("{} -> {}", url, name))
        .collect::<Vec<_>>()
        .join("\n")
}
