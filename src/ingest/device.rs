//! Topic-based device identity resolution.

// ---

/// Derive a device identifier from the topic path.
///
/// Total over any input: the result may be empty (e.g. `"farm/"` or
/// `"capteurs/"`), which callers treat as "no identity". A `capteurs` or
/// `node-red` segment only selects a device when another segment follows
/// it; a trailing one falls through to the last-segment rule.
pub fn resolve_device_id(topic: &str) -> String {
    // ---
    let parts: Vec<&str> = topic.split('/').collect();

    if topic.starts_with("farm/") {
        return segment(&parts, 1).to_string();
    }

    if topic.starts_with("soil/") {
        let suffix = match segment(&parts, 1) {
            "" => "sensor",
            s => s,
        };
        return format!("soil_{suffix}");
    }

    if let Some(pos) = followed_segment(&parts, "capteurs") {
        return segment(&parts, pos + 1).to_string();
    }

    if followed_segment(&parts, "node-red").is_some() {
        return match segment(&parts, 1) {
            "" => "node-red-inject".to_string(),
            s => s.to_string(),
        };
    }

    // `split` always yields at least one item
    parts.last().copied().unwrap_or_default().to_string()
}

fn followed_segment(parts: &[&str], name: &str) -> Option<usize> {
    parts
        .iter()
        .position(|p| *p == name)
        .filter(|pos| pos + 1 < parts.len())
}

fn segment<'a>(parts: &[&'a str], index: usize) -> &'a str {
    parts.get(index).copied().unwrap_or_default()
}
