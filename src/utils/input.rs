//! Compose-box input sanitization.

/// Normalizes pasted or typed text before it enters the compose line:
/// tabs become four spaces, carriage returns become newlines, and other
/// control characters are dropped.
pub fn sanitize_text_input(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\t' => out.push_str("    "),
            '\r' => out.push('\n'),
            '\n' => out.push(c),
            _ if c.is_control() => {}
            _ => out.push(c),
        }
    }
    out
}
