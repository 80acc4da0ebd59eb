//! Text rendering utilities for human-friendly error messages.
//!
//! Helpers to shorten type names, render lookup chains and compute
//! "did you mean" suggestions for keys that were not found.

/// Renders a lookup chain as a readable string.
///
/// # Examples
/// ```
/// use sanduq_support::rendering::render_chain;
///
/// let chain = ["Container(2)", "Container(5)"];
/// assert_eq!(render_chain(&chain), "Container(2) → Container(5)");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    let mut out = String::new();
    for (i, item) in chain.iter().enumerate() {
        if i > 0 {
            out.push_str(" → ");
        }
        out.push_str(item.as_ref());
    }
    out
}

/// Drops module paths from a fully qualified type name.
///
/// Generic arguments are shortened too.
///
/// ```
/// use sanduq_support::rendering::short_type_name;
///
/// assert_eq!(short_type_name("my_app::services::Mailer"), "Mailer");
/// assert_eq!(
///     short_type_name("alloc::sync::Arc<dyn my_app::Clock + core::marker::Send>"),
///     "Arc<dyn Clock + Send>",
/// );
/// ```
pub fn short_type_name(full_name: &str) -> String {
    let mut out = String::with_capacity(full_name.len());
    // Index in `out` where the identifier being written started.
    let mut segment_start = 0;
    let mut rest = full_name;

    while let Some(ch) = rest.chars().next() {
        if rest.starts_with("::") {
            out.truncate(segment_start);
            rest = &rest[2..];
            continue;
        }
        out.push(ch);
        if !(ch.is_alphanumeric() || ch == '_') {
            segment_start = out.len();
        }
        rest = &rest[ch.len_utf8()..];
    }

    out
}

/// Returns up to `limit` candidates that look like `requested`.
///
/// A candidate qualifies when one name contains the other or when the
/// edit distance is small relative to the name length. Closest first.
///
/// ```
/// use sanduq_support::rendering::suggest;
///
/// let found = suggest("databse", ["database", "mailer"], 3);
/// assert_eq!(found, vec!["database".to_string()]);
/// ```
pub fn suggest<'a>(
    requested: &str,
    candidates: impl IntoIterator<Item = &'a str>,
    limit: usize,
) -> Vec<String> {
    let wanted = requested.to_lowercase();
    let budget = (wanted.chars().count() / 3).max(1);

    let mut scored: Vec<(usize, &str)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let name = candidate.to_lowercase();
            if name == wanted {
                return None;
            }
            if name.contains(&wanted) || wanted.contains(&name) {
                return Some((0, candidate));
            }
            let distance = edit_distance(&wanted, &name);
            (distance <= budget).then_some((distance, candidate))
        })
        .collect();

    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    scored.dedup_by(|a, b| a.1 == b.1);
    scored
        .into_iter()
        .take(limit)
        .map(|(_, name)| name.to_string())
        .collect()
}

/// Levenshtein distance over chars.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_simple_chain() {
        assert_eq!(render_chain(&["A", "B", "C"]), "A → B → C");
    }

    #[test]
    fn render_empty_chain() {
        let chain: [&str; 0] = [];
        assert_eq!(render_chain(&chain), "");
    }

    #[test]
    fn shorten_plain_name() {
        assert_eq!(short_type_name("i32"), "i32");
    }

    #[test]
    fn shorten_nested_generics() {
        assert_eq!(
            short_type_name("std::collections::hash::map::HashMap<alloc::string::String, u8>"),
            "HashMap<String, u8>"
        );
    }

    #[test]
    fn suggest_typo() {
        let found = suggest("magik", ["magic", "clock", "mailer"], 3);
        assert_eq!(found, vec!["magic".to_string()]);
    }

    #[test]
    fn suggest_substring_first() {
        let found = suggest("db", ["db_pool", "dc", "cache"], 3);
        assert_eq!(found[0], "db_pool");
    }

    #[test]
    fn suggest_nothing_close() {
        assert!(suggest("xyzzy", ["database"], 3).is_empty());
    }

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("same", "same"), 0);
    }
}
