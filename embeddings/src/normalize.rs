//! Text normalization for embedding inputs.
//!
//! Cache correctness depends on these functions being pure: the same input
//! must always produce the same canonical string, which in turn produces the
//! same fingerprint.

/// Canonicalize a single piece of text.
///
/// Trims leading/trailing whitespace and collapses internal whitespace runs
/// to single spaces. Idempotent: `normalize_text(normalize_text(t)) ==
/// normalize_text(t)`.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compose an embedding input from prioritized text fields.
///
/// Fields are canonicalized individually, empty fields are skipped, and the
/// survivors are joined with single spaces in the order given (most salient
/// field first). When `category` is present and the body is non-empty the
/// result is prefixed as `"{category}: {body}"`.
///
/// Returns an empty string when every field is empty; callers map that to
/// the zero-vector sentinel.
pub fn normalize(category: Option<&str>, fields: &[&str]) -> String {
    let body = fields
        .iter()
        .map(|f| normalize_text(f))
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if body.is_empty() {
        return body;
    }

    match category.map(normalize_text) {
        Some(label) if !label.is_empty() => format!("{label}: {body}"),
        _ => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_text_trims_and_collapses() {
        assert_eq!(normalize_text("  hello   world \n"), "hello world");
    }

    #[test]
    fn test_normalize_text_idempotent() {
        let once = normalize_text("  a \t b\n\nc ");
        assert_eq!(normalize_text(&once), once);
    }

    #[test]
    fn test_normalize_joins_fields_in_order() {
        let out = normalize(None, &["primary question", "secondary context"]);
        assert_eq!(out, "primary question secondary context");
    }

    #[test]
    fn test_normalize_skips_empty_fields() {
        let out = normalize(None, &["", "  ", "only field"]);
        assert_eq!(out, "only field");
    }

    #[test]
    fn test_normalize_prefixes_category() {
        let out = normalize(Some("Security"), &["reentrancy", "withdraw"]);
        assert_eq!(out, "Security: reentrancy withdraw");
    }

    #[test]
    fn test_normalize_empty_body_ignores_category() {
        assert_eq!(normalize(Some("Security"), &["", "  "]), "");
    }

    #[test]
    fn test_normalize_idempotent_through_normalize_text() {
        let once = normalize(Some("Security"), &[" reentrancy  guard "]);
        assert_eq!(normalize_text(&once), once);
    }
}
