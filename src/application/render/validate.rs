//! Checks on what a LaTeXML daemon sends back.
//!
//! The daemon answers with a JSON envelope whose `result` field holds the
//! converted markup. Markup is accepted only when it is well-formed XML and
//! its root is `math`, `table` or `div`, either without a namespace or in the
//! MathML namespace.

use thiserror::Error;
use tracing::debug;

pub const MATHML_NAMESPACE: &str = "http://www.w3.org/1998/Math/MathML";

const ALLOWED_ROOTS: [&str; 3] = ["math", "table", "div"];

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("daemon response is not a JSON object: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Decoded daemon reply.
#[derive(Debug, Clone, Default)]
pub struct DaemonEnvelope {
    fields: serde_json::Map<String, serde_json::Value>,
}

impl DaemonEnvelope {
    /// The converted markup. Missing or non-string results read as empty,
    /// which never validates.
    pub fn markup(&self) -> &str {
        self.string_field("result").unwrap_or_default()
    }

    pub fn status(&self) -> Option<&str> {
        self.string_field("status")
    }

    pub fn log(&self) -> Option<&str> {
        self.string_field("log")
    }

    fn string_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(serde_json::Value::as_str)
    }
}

pub fn parse_envelope(raw: &str) -> Result<DaemonEnvelope, EnvelopeError> {
    let fields = serde_json::from_str(raw)?;
    Ok(DaemonEnvelope { fields })
}

pub fn is_valid_markup(xml: &str) -> bool {
    let document = match roxmltree::Document::parse(xml) {
        Ok(document) => document,
        Err(err) => {
            debug!(
                target = "application::render::validate",
                op = "validate::is_valid_markup",
                result = "malformed",
                error = %err,
                xml_bytes = xml.len(),
                "XML validation error"
            );
            return false;
        }
    };

    let tag = document.root_element().tag_name();
    let namespace_ok = matches!(tag.namespace(), None | Some(MATHML_NAMESPACE));
    if namespace_ok && ALLOWED_ROOTS.iter().any(|root| *root == tag.name()) {
        return true;
    }

    debug!(
        target = "application::render::validate",
        op = "validate::is_valid_markup",
        result = "wrong_root",
        root = tag.name(),
        namespace = tag.namespace().unwrap_or_default(),
        "Got wrong root element"
    );
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_math_root() {
        assert!(is_valid_markup("<math><mi>x</mi></math>"));
    }

    #[test]
    fn accepts_table_and_div_roots() {
        assert!(is_valid_markup("<table><tr><td>1</td></tr></table>"));
        assert!(is_valid_markup("<div class=\"ltx_equation\"/>"));
    }

    #[test]
    fn strips_mathml_namespace_prefix() {
        let xml = r#"<m:math xmlns:m="http://www.w3.org/1998/Math/MathML"><m:mi>x</m:mi></m:math>"#;
        assert!(is_valid_markup(xml));

        let default_ns =
            r#"<math xmlns="http://www.w3.org/1998/Math/MathML" display="block"><mn>1</mn></math>"#;
        assert!(is_valid_markup(default_ns));
    }

    #[test]
    fn rejects_foreign_namespaces() {
        let xml = r#"<x:math xmlns:x="urn:example:not-mathml"/>"#;
        assert!(!is_valid_markup(xml));
    }

    #[test]
    fn rejects_unexpected_root() {
        assert!(!is_valid_markup("<foo>bar</foo>"));
    }

    #[test]
    fn rejects_malformed_xml() {
        assert!(!is_valid_markup("<math>"));
        assert!(!is_valid_markup(""));
        assert!(!is_valid_markup("<math><mi>x</mo></math>"));
    }

    #[test]
    fn envelope_exposes_result_markup() {
        let envelope = parse_envelope(r#"{"result":"<math/>","status":"No obvious problems","log":""}"#)
            .expect("valid envelope");
        assert_eq!(envelope.markup(), "<math/>");
        assert_eq!(envelope.status(), Some("No obvious problems"));
    }

    #[test]
    fn envelope_without_result_reads_as_empty() {
        let envelope = parse_envelope(r#"{"status":"Fatal error"}"#).expect("valid envelope");
        assert_eq!(envelope.markup(), "");

        let envelope = parse_envelope(r#"{"result":null}"#).expect("valid envelope");
        assert_eq!(envelope.markup(), "");
    }

    #[test]
    fn non_json_body_is_rejected() {
        let err = parse_envelope("<html>502 Bad Gateway</html>").expect_err("not json");
        assert!(matches!(err, EnvelopeError::InvalidJson(_)));

        assert!(parse_envelope("").is_err());
        assert!(parse_envelope(r#"["<math/>"]"#).is_err());
    }
}
