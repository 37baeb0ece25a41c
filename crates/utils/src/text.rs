/// Trim and collapse runs of whitespace so "  Soy   sauce " and "Soy sauce"
/// compare equal.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Uniqueness key for a display name: normalized, then lowercased with full
/// Unicode case mapping so "Äpfel" and "äpfel" collide.
pub fn name_key(raw: &str) -> String {
    normalize_name(raw).to_lowercase()
}

/// Minimal HTML escaping for user text embedded in generated mail bodies.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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
