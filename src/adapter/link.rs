//! Link syntax: `[[target]]`, `[[target|alias]]`, or a bare identifier.

use crate::model::{RecordId, WarningKind};

/// Parse one link. `Ok(None)` for a blank value.
pub fn parse_link(text: &str) -> Result<Option<RecordId>, WarningKind> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let inner = match text.strip_prefix("[[") {
        Some(rest) => rest
            .strip_suffix("]]")
            .ok_or_else(|| WarningKind::BrokenLink(text.to_owned()))?,
        None => text,
    };
    if inner.contains("[[") || inner.contains("]]") || inner.contains('\n') {
        return Err(WarningKind::BrokenLink(text.to_owned()));
    }

    let target = inner.split('|').next().unwrap_or_default().trim();
    let target = target.strip_suffix(".md").unwrap_or(target);
    if target.is_empty() {
        return Err(WarningKind::BrokenLink(text.to_owned()));
    }
    Ok(Some(RecordId::new(target)))
}

/// Canonical link text written back to records.
pub fn format_link(id: &RecordId) -> String {
    format!("[[{id}]]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_forms() {
        assert_eq!(parse_link("[[p-1]]").unwrap(), Some("p-1".into()));
        assert_eq!(parse_link("[[p-1|John Smith]]").unwrap(), Some("p-1".into()));
        assert_eq!(parse_link("  p-1 ").unwrap(), Some("p-1".into()));
        assert_eq!(parse_link("[[p-1.md]]").unwrap(), Some("p-1".into()));
        assert_eq!(parse_link("").unwrap(), None);
    }

    #[test]
    fn test_broken_links() {
        for text in ["[[p-1", "p-1]]", "[[]]", "[[|alias]]", "[[a]] [[b]]"] {
            assert!(
                matches!(parse_link(text), Err(WarningKind::BrokenLink(_))),
                "{text:?} should be broken"
            );
        }
    }

    #[test]
    fn test_format_round_trip() {
        let id = RecordId::new("p-9");
        assert_eq!(parse_link(&format_link(&id)).unwrap(), Some(id));
    }
}
