use std::sync::Arc;

use tracing::warn;
use url::form_urlencoded;

use crate::application::repos::FormulaPages;

const FORMULA_NAMESPACE: &str = "Formula:";

/// Wraps validated MathML for inline display, linking labelled formulas to their page.
#[derive(Clone)]
pub struct MarkupEmbedder {
    script_path: String,
    pages: Arc<dyn FormulaPages>,
}

impl MarkupEmbedder {
    pub fn new(script_path: impl Into<String>, pages: Arc<dyn FormulaPages>) -> Self {
        let script_path = script_path.into().trim_end_matches('/').to_string();
        Self { script_path, pages }
    }

    pub async fn embed(&self, mathml: &str, label: Option<&str>, tag_id: Option<&str>) -> String {
        let mathml = mathml.replace('\n', " ");
        let tag_id = tag_id.map(sanitize_id).filter(|id| !id.is_empty());

        match label.filter(|label| !label.is_empty()) {
            Some(label) => self.formula_link(&mathml, label, tag_id.as_deref()).await,
            None => {
                let mut attributes = vec![("class", "tex".to_string()), ("dir", "ltr".to_string())];
                if let Some(id) = tag_id {
                    attributes.push(("id", id));
                }
                element("span", &attributes, &mathml)
            }
        }
    }

    async fn formula_link(&self, mathml: &str, label: &str, tag_id: Option<&str>) -> String {
        let title = format!("{FORMULA_NAMESPACE}{label}");
        let exists = match self.pages.exists(&title).await {
            Ok(exists) => exists,
            Err(err) => {
                warn!(
                    target = "application::render::embed",
                    op = "embed::formula_link",
                    result = "lookup_error",
                    title = %title,
                    error = %err,
                    "Formula page lookup failed; linking as missing page"
                );
                false
            }
        };

        let mut href = format!(
            "{}/index.php?title={}",
            self.script_path,
            encode_title(&title)
        );
        let mut attributes = Vec::with_capacity(4);
        if !exists {
            href.push_str("&action=edit&redlink=1");
            attributes.push(("class", "new".to_string()));
        }

        attributes.push(("title", title));
        attributes.push(("href", href));
        if let Some(id) = tag_id {
            attributes.push(("id", id.to_string()));
        }
        element("a", &attributes, mathml)
    }
}

fn element(name: &str, attributes: &[(&str, String)], content: &str) -> String {
    let mut html = format!("<{name}");
    for (key, value) in attributes {
        html.push_str(&format!(" {key}=\"{}\"", escape_attribute(value)));
    }
    html.push('>');
    html.push_str(content);
    html.push_str(&format!("</{name}>"));
    html
}

/// Characters wiki links keep literal after form encoding.
const TITLE_SAFE: [(&str, &str); 11] = [
    ("%3A", ":"),
    ("%2F", "/"),
    ("%3B", ";"),
    ("%40", "@"),
    ("%24", "$"),
    ("%21", "!"),
    ("%2A", "*"),
    ("%28", "("),
    ("%29", ")"),
    ("%2C", ","),
    ("%7E", "~"),
];

/// Page title as it appears in a wiki URL: spaces become underscores and
/// only characters that would break the query string stay escaped.
fn encode_title(title: &str) -> String {
    let underscored = title.trim().replace(' ', "_");
    let mut encoded: String = form_urlencoded::byte_serialize(underscored.as_bytes()).collect();
    for (escaped, literal) in TITLE_SAFE {
        encoded = encoded.replace(escaped, literal);
    }
    encoded
}

/// Element ids may not contain whitespace.
fn sanitize_id(raw: &str) -> String {
    raw.trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\n' | '\r' | '\t' => escaped.push(' '),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub(crate) fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
