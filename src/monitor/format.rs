use std::collections::BTreeMap;

use chrono::{DateTime, Local};

use super::types::ContainerSnapshot;

pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Backslash-escapes the characters that open an entity in Telegram's
/// Markdown mode. Every container-provided value goes through this.
pub fn escape_markdown(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub fn format_snapshot(snapshot: &ContainerSnapshot, label: &str) -> Option<String> {
    format_snapshot_at(snapshot, label, Local::now())
}

/// Renders the notification text for `snapshot`. Returns `None` when the
/// container has no name; every other field has a default.
pub fn format_snapshot_at(
    snapshot: &ContainerSnapshot,
    label: &str,
    at: DateTime<Local>,
) -> Option<String> {
    let name = snapshot.name.as_deref()?;
    Some(format!(
        "🚨 *Container {label}*\n\
         ⏰ *Time:* {time}\n\
         🆔 *ID:* `{short_id}`\n\
         📛 *Name:* {name}\n\
         🐳 *Image:* {image}\n\
         🔧 *Status:* {status}\n\
         🏷 *Labels:* {labels}",
        label = label.to_uppercase(),
        time = at.format(TIMESTAMP_FORMAT),
        name = escape_markdown(name),
        short_id = snapshot.short_id,
        image = escape_markdown(snapshot.image_or_default()),
        status = snapshot.state.as_ref().to_uppercase(),
        labels = escape_markdown(&render_labels(&snapshot.labels)),
    ))
}

fn render_labels(labels: &BTreeMap<String, String>) -> String {
    if labels.is_empty() {
        return "None".to_string();
    }
    let pairs = labels
        .iter()
        .map(|(k, v)| format!("{k:?}: {v:?}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{pairs}}}")
}
