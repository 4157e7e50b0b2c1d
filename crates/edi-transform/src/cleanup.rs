//! Post-pass cleanup of XSL templates.
//!
//! Works on any template text, generated or hand-written. Running it twice
//! yields the same output as running it once.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

const VENDOR_PREFIXES: &[&str] = &["msxsl", "saxon", "xalan", "exsl", "exslt"];
const VENDOR_URI_MARKERS: &[&str] = &[
    "urn:schemas-microsoft-com:xslt",
    "saxon.sf.net",
    "xml.apache.org/xalan",
    "exslt.org",
];

static NAMESPACE_DECL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s+xmlns:([A-Za-z_][\w.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("Invalid namespace declaration regex")
});

static PREFIX_LIST_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(\s+)(exclude-result-prefixes|extension-element-prefixes)\s*=\s*(?:"([^"]*)"|'([^']*)')"#,
    )
    .expect("Invalid prefix list regex")
});

static XSI_USE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\sxsi:[A-Za-z_][\w.-]*\s*=|\sname\s*=\s*["']xsi:"#).expect("Invalid xsi regex")
});

static STYLESHEET_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<xsl:(?:stylesheet|transform)\b[^>]*>").expect("Invalid stylesheet regex")
});

static ROOT_TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<xsl:template\b[^>]*\bmatch\s*=\s*["']/["'][^>]*>"#)
        .expect("Invalid template regex")
});

static START_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([A-Za-z_][\w.:-]*)(?:\s[^>]*)?/?>").expect("Invalid start tag regex")
});

/// Prefixes declared with a vendor extension namespace.
pub fn vendor_prefixes(xsl: &str) -> BTreeSet<String> {
    NAMESPACE_DECL_REGEX
        .captures_iter(xsl)
        .filter_map(|caps| {
            let prefix = caps.get(1)?.as_str();
            let uri = caps.get(2).or_else(|| caps.get(3))?.as_str();
            let vendor = VENDOR_PREFIXES.contains(&prefix)
                || VENDOR_URI_MARKERS.iter().any(|marker| uri.contains(marker));
            vendor.then(|| prefix.to_string())
        })
        .collect()
}

/// Remove vendor extensions and make sure `xsi:` attributes have a declaration.
pub fn clean_stylesheet(xsl: &str) -> String {
    let vendors = vendor_prefixes(xsl);
    let mut out = xsl.to_string();

    if !vendors.is_empty() {
        out = strip_declarations(&out, &vendors);
        out = strip_prefix_references(&out, &vendors);
        for prefix in &vendors {
            out = strip_scripts(&out, prefix);
        }
        debug!(prefixes = ?vendors, "removed vendor namespaces");
    }

    if XSI_USE_REGEX.is_match(&out) {
        out = inject_xsi(&out);
    }
    out
}

fn strip_declarations(xsl: &str, vendors: &BTreeSet<String>) -> String {
    NAMESPACE_DECL_REGEX
        .replace_all(xsl, |caps: &regex::Captures<'_>| {
            if vendors.contains(&caps[1]) {
                String::new()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

fn strip_prefix_references(xsl: &str, vendors: &BTreeSet<String>) -> String {
    PREFIX_LIST_REGEX
        .replace_all(xsl, |caps: &regex::Captures<'_>| {
            let list = caps
                .get(3)
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            let kept: Vec<&str> = list
                .split_whitespace()
                .filter(|prefix| !vendors.contains(*prefix))
                .collect();
            if kept.is_empty() {
                String::new()
            } else {
                format!("{}{}=\"{}\"", &caps[1], &caps[2], kept.join(" "))
            }
        })
        .into_owned()
}

fn strip_scripts(xsl: &str, prefix: &str) -> String {
    let pattern = format!(
        r"(?s)\s*<{p}:script\b[^>]*/>|\s*<{p}:script\b.*?</{p}:script>",
        p = regex::escape(prefix)
    );
    match Regex::new(&pattern) {
        Ok(regex) => regex.replace_all(xsl, "").into_owned(),
        Err(_) => xsl.to_string(),
    }
}

fn inject_xsi(xsl: &str) -> String {
    let mut out = xsl.to_string();
    if let Some(stylesheet) = STYLESHEET_REGEX.find(&out) {
        out = with_xsi_declaration(&out, stylesheet.start(), stylesheet.end());
    }
    if let Some(template) = ROOT_TEMPLATE_REGEX.find(&out) {
        let offset = template.end();
        let output_root = START_TAG_REGEX
            .captures_iter(&out[offset..])
            .find(|caps| !caps[1].starts_with("xsl:"))
            .and_then(|caps| caps.get(0))
            .map(|m| (offset + m.start(), offset + m.end()));
        if let Some((start, end)) = output_root {
            out = with_xsi_declaration(&out, start, end);
        }
    }
    out
}

/// Add `xmlns:xsi` to the start tag spanning `start..end` unless it is declared.
fn with_xsi_declaration(xsl: &str, start: usize, end: usize) -> String {
    let tag = &xsl[start..end];
    if tag.contains("xmlns:xsi") {
        return xsl.to_string();
    }
    let close = if tag.ends_with("/>") { end - 2 } else { end - 1 };
    let mut out = String::with_capacity(xsl.len() + XSI_NAMESPACE.len() + 16);
    out.push_str(xsl[..close].trim_end());
    out.push_str(&format!(" xmlns:xsi=\"{XSI_NAMESPACE}\""));
    out.push_str(&xsl[close..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const VENDOR: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform" xmlns:msxsl="urn:schemas-microsoft-com:xslt" xmlns:user="urn:user" exclude-result-prefixes="msxsl user">
  <msxsl:script language="C#" implements-prefix="user">
    public string Pad(string s) { return s; }
  </msxsl:script>
  <xsl:template match="/">
    <NFe xmlns="http://www.portalfiscal.inf.br/nfe">
      <xsl:attribute name="xsi:schemaLocation">nfe.xsd</xsl:attribute>
    </NFe>
  </xsl:template>
</xsl:stylesheet>"#;

    #[test]
    fn removes_vendor_namespace_and_references() {
        let cleaned = clean_stylesheet(VENDOR);
        assert!(!cleaned.contains("msxsl"));
        assert!(cleaned.contains(r#"exclude-result-prefixes="user""#));
        assert!(cleaned.contains(r#"xmlns:user="urn:user""#));
    }

    #[test]
    fn injects_xsi_on_stylesheet_and_output_root() {
        let cleaned = clean_stylesheet(VENDOR);
        assert_eq!(cleaned.matches("xmlns:xsi=").count(), 2);
        assert!(cleaned.contains(&format!(
            r#"<NFe xmlns="http://www.portalfiscal.inf.br/nfe" xmlns:xsi="{XSI_NAMESPACE}">"#
        )));
    }

    #[test]
    fn cleanup_is_idempotent() {
        let once = clean_stylesheet(VENDOR);
        assert_eq!(clean_stylesheet(&once), once);
    }

    #[test]
    fn empty_reference_list_is_dropped() {
        let xsl = r#"<xsl:stylesheet xmlns:exsl="http://exslt.org/common" extension-element-prefixes="exsl"><xsl:template match="/"><a/></xsl:template></xsl:stylesheet>"#;
        assert_eq!(
            clean_stylesheet(xsl),
            r#"<xsl:stylesheet><xsl:template match="/"><a/></xsl:template></xsl:stylesheet>"#
        );
    }
}
