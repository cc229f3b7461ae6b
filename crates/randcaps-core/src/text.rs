/// Length in characters, not bytes.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub fn has_lowercase(text: &str) -> bool {
    text.chars().any(char::is_lowercase)
}

pub fn alphabetic_count(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphabetic()).count()
}

/// Share of characters that are alphabetic. Empty text has ratio 0.
pub fn alphabetic_ratio(text: &str) -> f64 {
    let total = char_len(text);
    if total == 0 {
        return 0.0;
    }
    alphabetic_count(text) as f64 / total as f64
}

/// Single-line preview for logs, cut at `max_chars` characters.
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    if char_len(&flat) <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{cut}...")
}
