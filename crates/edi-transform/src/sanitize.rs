//! Element and attribute name sanitization.
//!
//! Every name written into a generated template passes through here, so the
//! template never carries an illegal or undeclared-prefix name.

/// Name used when sanitization leaves nothing.
pub const FALLBACK_NAME: &str = "element";

/// Token placed before names that would start with a digit.
pub const DIGIT_PREFIX: char = '_';

/// The one namespace prefix kept on attribute names.
pub const XSI_PREFIX: &str = "xsi:";

/// Sanitize a raw string into a legal XML element name.
///
/// Strips a leading `xmlns`/`xml` reserved prefix, replaces illegal
/// characters (including `:`) with `_`, collapses repeated underscores, trims
/// leading and trailing underscores and prefixes a leading digit.
///
/// # Examples
///
/// ```
/// use edi_transform::sanitize::sanitize_name;
///
/// assert_eq!(sanitize_name("nfe:infNFe"), "nfe_infNFe");
/// assert_eq!(sanitize_name("  valor  total "), "valor_total");
/// assert_eq!(sanitize_name("1stLine"), "_1stLine");
/// assert_eq!(sanitize_name("xmlns:foo"), "foo");
/// assert_eq!(sanitize_name("%%"), "element");
/// ```
pub fn sanitize_name(raw: &str) -> String {
    let stripped = strip_reserved_prefix(raw.trim());

    let mut safe = String::with_capacity(stripped.len());
    let mut last_was_underscore = true;
    for ch in stripped.chars() {
        if ch.is_alphanumeric() || ch == '-' || ch == '.' {
            safe.push(ch);
            last_was_underscore = false;
        } else if !last_was_underscore {
            safe.push('_');
            last_was_underscore = true;
        }
    }
    while safe.ends_with('_') {
        safe.pop();
    }

    // `-` and `.` are legal inside a name but not at its start.
    let safe = safe.trim_start_matches(['-', '.', '_']).to_string();
    if safe.is_empty() {
        return FALLBACK_NAME.to_string();
    }
    if safe.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return format!("{DIGIT_PREFIX}{safe}");
    }
    safe
}

/// Sanitize an attribute name, preserving an `xsi:` prefix.
///
/// ```
/// use edi_transform::sanitize::sanitize_attribute_name;
///
/// assert_eq!(sanitize_attribute_name("@xsi:schemaLocation"), "xsi:schemaLocation");
/// assert_eq!(sanitize_attribute_name("@nfe:versao"), "nfe_versao");
/// ```
pub fn sanitize_attribute_name(raw: &str) -> String {
    let name = raw.trim().trim_start_matches('@');
    match name.strip_prefix(XSI_PREFIX) {
        Some(local) => format!("{XSI_PREFIX}{}", sanitize_name(local)),
        None => sanitize_name(name),
    }
}

/// Whether `name` is already a legal element name.
pub fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && sanitize_name(name) == name
}

/// Split a `/`-separated target path into non-empty raw segments.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Strip wrapping double or single quotes from a literal.
///
/// ```
/// use edi_transform::sanitize::strip_quotes;
///
/// assert_eq!(strip_quotes("\"hello\""), "hello");
/// assert_eq!(strip_quotes("  'world'  "), "world");
/// assert_eq!(strip_quotes("\"partial"), "\"partial");
/// ```
pub fn strip_quotes(value: &str) -> String {
    let trimmed = value.trim();
    let quoted = trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')));
    if quoted {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

fn strip_reserved_prefix(name: &str) -> &str {
    let lower = name.to_ascii_lowercase();
    for reserved in ["xmlns", "xml"] {
        if lower.starts_with(reserved) {
            return name[reserved.len()..].trim_start_matches(':');
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_is_idempotent_on_samples() {
        for raw in ["a b", "1x", "__x__", "ns:el", "xmlFoo", "ção", "-a", ""] {
            let once = sanitize_name(raw);
            assert_eq!(sanitize_name(&once), once, "{raw}");
            assert!(is_plain_name(&once));
        }
    }

    #[test]
    fn collapses_and_trims_underscores() {
        assert_eq!(sanitize_name("__a___b__"), "a_b");
        assert_eq!(sanitize_name("a:b:c"), "a_b_c");
    }

    #[test]
    fn keeps_accented_letters() {
        assert_eq!(sanitize_name("descrição"), "descrição");
    }

    #[test]
    fn segments_skip_empty_parts() {
        assert_eq!(path_segments("/NFe//infNFe/ ide /"), ["NFe", "infNFe", "ide"]);
    }
}
