//! Small utility helpers used across modules.

/// Log-safe truncation for large strings, cut on a char boundary.
/// Avoids spamming logs with raw ASR dumps.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) {
    cut -= 1;
  }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

/// Trimmed, non-empty path/header value.
pub fn non_blank(s: &str) -> Option<&str> {
  let t = s.trim();
  if t.is_empty() { None } else { Some(t) }
}
