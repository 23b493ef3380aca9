/// Common utilities for cleaning child output lines before they are logged
/// or classified
use std::borrow::Cow;

/// Detect if a line is text or binary based on control characters
///
/// Tabs are the only control character a text line may contain; line
/// terminators have already been stripped by the reader.
///
/// # Examples
/// ```ignore
/// assert_eq!(detect_data_type("EVAL:+0.35"), "text");
/// assert_eq!(detect_data_type("\x00\x01\x02binary"), "binary");
/// ```
pub fn detect_data_type(data_str: &str) -> &'static str {
    if data_str.chars().all(|c| !c.is_control() || c == '\t') {
        "text"
    } else {
        "binary"
    }
}

/// Convert a line to a representation that is safe to write to the log sink
///
/// * text lines are returned unchanged
/// * lines with other control characters are hex encoded with a `HEX:` prefix
pub fn data_to_string(line: &str) -> String {
    if detect_data_type(line) == "text" {
        line.to_string()
    } else {
        format!("HEX:{}", hex::encode(line.as_bytes()))
    }
}

/// Remove ANSI escape sequences (colour codes from the engine's console
/// library) from a line
pub fn strip_ansi_codes(line: &str) -> Cow<'_, str> {
    if !line.contains('\x1b') {
        return Cow::Borrowed(line);
    }

    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            // CSI: ESC [ params... final byte in 0x40..=0x7E
            Some('[') => {
                chars.next();
                for next in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&next) {
                        break;
                    }
                }
            }
            // Two-character escape
            Some(_) => {
                chars.next();
            }
            None => {}
        }
    }
    Cow::Owned(out)
}

/// Shorten a line for diagnostic output without splitting a character
pub fn preview(line: &str, max_chars: usize) -> Cow<'_, str> {
    match line.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(format!("{}...", &line[..idx])),
        None => Cow::Borrowed(line),
    }
}
