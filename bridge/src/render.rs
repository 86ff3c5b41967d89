//! Rendering of inbound events into log/cue panel lines.

use transport::MultiMessage;

pub(crate) fn render_cue(key: &str, value: &str) -> String {
    format!("{key}: {value}")
}

/// Render a multi-message as a tree: a header naming the run, then one
/// branch per output fragment. Fragments spanning several lines continue
/// under the branch glyph.
pub(crate) fn render_multi_message(message: &MultiMessage) -> Vec<String> {
    let mut rendered = Vec::new();

    let mut header = format!("{{run: {}, time: {}", message.job_id, message.runtime);
    if let Some(thread_name) = &message.thread_name {
        header.push_str(&format!(", thread: {thread_name}"));
    }
    header.push('}');
    rendered.push(header);

    let count = message.parts.len();
    for (i, part) in message.parts.iter().enumerate() {
        let glyph = if part.text.is_empty() {
            " |"
        } else if i == count - 1 {
            " └─ "
        } else {
            " ├─ "
        };
        if part.text.is_empty() {
            rendered.push(glyph.to_owned());
            continue;
        }
        let indent = " ".repeat(glyph.chars().count());
        for (n, line) in part.text.lines().enumerate() {
            if n == 0 {
                rendered.push(format!("{glyph}{line}"));
            } else {
                rendered.push(format!("{indent}{line}"));
            }
        }
    }

    rendered
}
