//! Pulling text and listing stubs out of parsed pages.

use imoscout_core::ListingStub;
use scraper::{ElementRef, Html};
use tracing::debug;
use url::Url;

/// A parsed HTML page plus the URL relative links resolve against.
pub struct Document {
    url: Url,
    html: Html,
}

impl Document {
    pub fn parse(url: Url, body: &str) -> Self {
        Self {
            url,
            html: Html::parse_document(body),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Elements matching `selector`, in document order.
    fn select<'a>(&'a self, selector: &'a FieldSelector) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        self.html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(move |element| selector.matches(element))
    }
}

/// Tag name plus the class attribute an element must carry.
///
/// `class` is matched token by token: every class it lists must be present.
/// An empty `class` only matches elements with no classes at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelector {
    tag: String,
    classes: Vec<String>,
}

impl FieldSelector {
    pub fn new(tag: &str, class: &str) -> Self {
        Self {
            tag: tag.trim().to_ascii_lowercase(),
            classes: class.split_whitespace().map(str::to_string).collect(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn matches(&self, element: &ElementRef) -> bool {
        let value = element.value();
        if value.name() != self.tag {
            return false;
        }

        if self.classes.is_empty() {
            value.classes().next().is_none()
        } else {
            self.classes
                .iter()
                .all(|class| value.classes().any(|c| c == class))
        }
    }
}

fn full_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Text fragments trimmed one by one and joined without separators.
fn compact_text(element: &ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect()
}

/// Trimmed text of every matching element, in document order.
pub fn extract_fields(doc: &Document, selector: &FieldSelector) -> Vec<String> {
    doc.select(selector).map(|element| full_text(&element)).collect()
}

/// Compact text of the first matching element; `None` when nothing matches
/// or the element is empty.
pub fn extract_first(doc: &Document, selector: &FieldSelector) -> Option<String> {
    doc.select(selector)
        .next()
        .map(|element| compact_text(&element))
        .filter(|text| !text.is_empty())
}

/// Pairs every title element with the `href` of its nearest enclosing link.
///
/// Titles without an enclosing link, or whose link does not resolve to a URL,
/// are dropped.
pub fn extract_listing_stubs(doc: &Document, title_selector: &FieldSelector) -> Vec<ListingStub> {
    let mut stubs = Vec::new();

    for title_element in doc.select(title_selector) {
        let title = full_text(&title_element);

        let href = title_element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|ancestor| ancestor.value().name() == "a" && ancestor.value().attr("href").is_some())
            .and_then(|anchor| anchor.value().attr("href"));

        let Some(href) = href else {
            debug!("Dropping '{}': no enclosing link", title);
            continue;
        };

        match doc.url().join(href.trim()) {
            Ok(link) => stubs.push(ListingStub::new(title, link)),
            Err(e) => debug!("Dropping '{}': bad link {}: {}", title, href, e),
        }
    }

    stubs
}
