//! Text helpers shared by the terminal renderer, the CLI and HTML transcript export

/// Escape `& < > " '` so text can be embedded in HTML
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Drop control characters (ANSI escapes included) from remote text before it
/// reaches the terminal. Newlines and tabs survive.
pub fn sanitize_terminal(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Confidence bar width, `0.845 -> "84.5%"`, `0.9 -> "90%"`
pub fn confidence_bar_width(confidence: f64) -> String {
    let confidence = if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let pct = (confidence * 1000.0).round() / 10.0;
    if pct.fract() == 0.0 {
        format!("{}%", pct as u32)
    } else {
        format!("{:.1}%", pct)
    }
}

/// Evidence count badge text
pub fn evidence_badge(count: usize) -> String {
    count.to_string()
}

/// Display title derived from a reply: first non-empty line, at most 50 chars
pub fn derive_title(content: &str) -> String {
    const MAX_CHARS: usize = 50;

    let line = content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    let line = line.trim_start_matches('#').trim();

    if line.chars().count() > MAX_CHARS {
        let head: String = line.chars().take(MAX_CHARS).collect();
        format!("{}...", head.trim_end())
    } else {
        line.to_string()
    }
}

/// Wrap text to fit within the given width
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current_line = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let word_len = word.chars().count();
            if current_len == 0 {
                current_line.push_str(word);
                current_len = word_len;
            } else if current_len + word_len + 1 <= width {
                current_line.push(' ');
                current_line.push_str(word);
                current_len += word_len + 1;
            } else {
                lines.push(std::mem::take(&mut current_line));
                current_line.push_str(word);
                current_len = word_len;
            }
        }

        lines.push(current_line);
    }

    // Trailing blank lines from the final newline are noise
    while lines.len() > 1 && lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    lines
}
