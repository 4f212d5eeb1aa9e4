//! Small string helpers used when building check-in comments.

/// Shorten `s` to `total_len` characters, including `trailing`.
///
/// Strings that already fit are returned unchanged.
pub fn trim_to(s: &str, total_len: usize, trailing: &str) -> String {
  if s.is_empty() || s.chars().count() <= total_len {
    return s.to_string();
  }

  let keep = total_len.saturating_sub(trailing.chars().count());
  let mut out: String = s.chars().take(keep).collect();
  out.push_str(trailing);
  out
}

/// Longest prefix shared by every string, taken from the shortest one.
pub fn longest_common_prefix<S: AsRef<str>>(strings: &[S], case_sensitive: bool) -> String {
  let Some(shortest) = strings.iter().map(AsRef::as_ref).min_by_key(|s| s.chars().count()) else {
    return String::new();
  };

  let same = |a: char, b: char| {
    if case_sensitive {
      a == b
    } else {
      a.to_lowercase().eq(b.to_lowercase())
    }
  };

  let mut end = shortest.chars().count();
  for s in strings {
    let mismatch = s
      .as_ref()
      .chars()
      .zip(shortest.chars())
      .position(|(a, b)| !same(a, b));
    if let Some(x) = mismatch {
      end = end.min(x);
    }
  }

  shortest.chars().take(end).collect()
}

/// Render a count with thousands separators, e.g. `1234` as `1,234`.
pub fn format_count(n: usize) -> String {
  let digits = n.to_string();
  let mut out = String::with_capacity(digits.len() + digits.len() / 3);
  for (i, c) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      out.push(',');
    }
    out.push(c);
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_trim_to_with_ellipsis() {
    assert_eq!(trim_to("hello world", 8, "..."), "hello...");
  }

  #[test]
  fn test_trim_to_short_strings_unchanged() {
    assert_eq!(trim_to("hello", 8, "..."), "hello");
    assert_eq!(trim_to("", 0, "..."), "");
    assert_eq!(trim_to("exactly8", 8, "..."), "exactly8");
  }

  #[test]
  fn test_trim_to_counts_characters() {
    assert_eq!(trim_to("ééééé", 4, "…"), "ééé…");
  }

  #[test]
  fn test_common_prefix_case_insensitive() {
    assert_eq!(
      longest_common_prefix(&["/src/a/b", "/src/a/c"], false),
      "/src/a/"
    );
    assert_eq!(
      longest_common_prefix(&["/SRC/Feature/x", "/src/feature/y"], false),
      "/SRC/Feature/"
    );
  }

  #[test]
  fn test_common_prefix_case_sensitive() {
    assert_eq!(longest_common_prefix(&["/SRC/a", "/src/a"], true), "/");
  }

  #[test]
  fn test_common_prefix_empty_set() {
    let empty: [&str; 0] = [];
    assert_eq!(longest_common_prefix(&empty, false), "");
  }

  #[test]
  fn test_common_prefix_single_string() {
    assert_eq!(longest_common_prefix(&["/src/a/"], false), "/src/a/");
  }

  #[test]
  fn test_format_count() {
    assert_eq!(format_count(7), "7");
    assert_eq!(format_count(999), "999");
    assert_eq!(format_count(1234), "1,234");
    assert_eq!(format_count(1234567), "1,234,567");
  }
}
