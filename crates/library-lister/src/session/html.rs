//! Owned element snapshots taken from parsed HTML.

use super::{ElementHandle, SessionError};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;

/// Elements whose boundaries separate words in rendered text
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Elements whose content is never rendered as text
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "template", "noscript"];

/// Snapshot of one element of a parsed page
///
/// Parsed documents are not `Send`, so queries copy what they match into
/// owned snapshots and drop the document before returning. A snapshot keeps
/// the source document and its position in it, so descendant queries run
/// against the original tree rather than a re-parsed fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlElement {
    document: Arc<str>,
    /// Position among the document's elements in tree order
    ordinal: usize,
    text: String,
    attributes: Vec<(String, String)>,
}

impl HtmlElement {
    fn capture(document: &Arc<str>, ordinal: usize, element: ElementRef<'_>) -> Self {
        Self {
            document: Arc::clone(document),
            ordinal,
            text: rendered_text(element),
            attributes: element
                .value()
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }

    /// Text as a browser renders it, on one line
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.as_str())
    }

    /// First descendant matching a selector
    pub fn select_first(&self, selector: &str) -> Result<Option<HtmlElement>, SessionError> {
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(&self.document);

        let Some(scope) = elements(&document).nth(self.ordinal) else {
            return Ok(None);
        };
        let scope_id = scope.id();

        // descendants directly follow their ancestor in tree order
        let found = elements(&document)
            .enumerate()
            .skip(self.ordinal + 1)
            .take_while(|(_, element)| element.ancestors().any(|node| node.id() == scope_id))
            .find(|(_, element)| selector.matches(element))
            .map(|(ordinal, element)| HtmlElement::capture(&self.document, ordinal, element));

        Ok(found)
    }
}

#[async_trait]
impl ElementHandle for HtmlElement {
    async fn get_attribute(&self, name: &str) -> Result<Option<String>, SessionError> {
        Ok(self.attribute(name).map(str::to_string))
    }

    async fn inner_text(&self) -> Result<String, SessionError> {
        Ok(self.text().to_string())
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<Self>, SessionError> {
        self.select_first(selector)
    }
}

/// All elements of a document matching a selector, in document order
pub fn select_all(source: &str, selector: &str) -> Result<Vec<HtmlElement>, SessionError> {
    let selector = parse_selector(selector)?;
    let shared: Arc<str> = Arc::from(source);
    let document = Html::parse_document(source);

    Ok(elements(&document)
        .enumerate()
        .filter(|(_, element)| selector.matches(element))
        .map(|(ordinal, element)| HtmlElement::capture(&shared, ordinal, element))
        .collect())
}

fn elements(document: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    document.tree.root().descendants().filter_map(ElementRef::wrap)
}

fn parse_selector(selector: &str) -> Result<Selector, SessionError> {
    Selector::parse(selector).map_err(|e| SessionError::InvalidSelector {
        selector: selector.to_string(),
        reason: format!("{:?}", e),
    })
}

/// Text content with `<br>` and block boundaries as word breaks, whitespace
/// collapsed to single spaces
fn rendered_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    push_text(element, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            let name = child.value().name();
            if HIDDEN_ELEMENTS.contains(&name) {
                continue;
            }

            let boundary = name == "br" || BLOCK_ELEMENTS.contains(&name);
            if boundary {
                out.push(' ');
            }
            push_text(child, out);
            if boundary {
                out.push(' ');
            }
        }
    }
}
