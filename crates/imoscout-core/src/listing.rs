use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

/// Detail-page labels that map onto fixed output columns. Anything else the
/// detail table reports is dropped.
pub const KNOWN_ATTRIBUTES: &[&str] = &[
    "Área (m²)",
    "Certificado Energético",
    "Tipo",
    "Ano de construção",
    "Nº divisões",
    "Condição",
    "Acompanhamento Virtual",
];

const PRICE_SUFFIXES: &[&str] = &["€/m²", "€"];

/// A (title, link) pair scraped from a listing index page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingStub {
    pub title: String,
    pub link: Url,
}

impl ListingStub {
    pub fn new(title: impl Into<String>, link: Url) -> Self {
        Self {
            title: title.into(),
            link,
        }
    }
}

/// A stub that survived deduplication. Titles are pairwise distinct across
/// one `dedupe` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupedListing {
    pub title: String,
    pub link: Url,
}

impl From<DedupedListing> for ListingStub {
    fn from(listing: DedupedListing) -> Self {
        Self {
            title: listing.title,
            link: listing.link,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub title: String,
    pub link: Url,
    pub full_address: Option<String>,
    pub price: Option<String>,
    pub price_per_area: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    #[serde(default)]
    pub extra_attributes: IndexMap<String, String>,
}

impl EnrichedRecord {
    pub fn from_listing(listing: &DedupedListing) -> Self {
        Self {
            title: listing.title.clone(),
            link: listing.link.clone(),
            full_address: None,
            price: None,
            price_per_area: None,
            city: None,
            region: None,
            extra_attributes: IndexMap::new(),
        }
    }

    /// Sets the address and derives city/region from its last two segments.
    pub fn set_address(&mut self, address: Option<String>) {
        let (city, region) = address
            .as_deref()
            .map(split_address)
            .unwrap_or((None, None));
        self.full_address = address;
        self.city = city;
        self.region = region;
    }

    /// Stores `value` under `label` when the label is one of the fixed columns.
    /// Returns whether the label was kept.
    pub fn merge_attribute(&mut self, label: &str, value: String) -> bool {
        match KNOWN_ATTRIBUTES.iter().find(|known| **known == label) {
            Some(known) => {
                self.extra_attributes.insert((*known).to_string(), value);
                true
            }
            None => false,
        }
    }

    pub fn attribute(&self, label: &str) -> Option<&str> {
        self.extra_attributes.get(label).map(String::as_str)
    }

    pub fn price_value(&self) -> Option<f64> {
        self.price.as_deref().and_then(parse_amount)
    }

    pub fn price_per_area_value(&self) -> Option<f64> {
        self.price_per_area.as_deref().and_then(parse_amount)
    }
}

/// Collapses stubs to one link per title.
///
/// Builds link -> title (later stubs overwrite earlier ones), then inverts it to
/// title -> link, again letting later entries win. Output order follows the
/// first appearance of each key, as an insertion-ordered map would.
pub fn dedupe<I>(stubs: I) -> Vec<DedupedListing>
where
    I: IntoIterator<Item = ListingStub>,
{
    let mut by_link: IndexMap<Url, String> = IndexMap::new();
    for stub in stubs {
        by_link.insert(stub.link, stub.title);
    }

    let mut by_title: IndexMap<String, Url> = IndexMap::new();
    for (link, title) in by_link {
        by_title.insert(title, link);
    }

    by_title
        .into_iter()
        .map(|(title, link)| DedupedListing { title, link })
        .collect()
}

/// Splits a comma-separated address into (city, region), the last two
/// segments. Fewer than two segments yields nothing.
pub fn split_address(address: &str) -> (Option<String>, Option<String>) {
    let segments: Vec<&str> = address.split(',').collect();
    if segments.len() < 2 {
        return (None, None);
    }

    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    (
        non_empty(segments[segments.len() - 2]),
        non_empty(segments[segments.len() - 1]),
    )
}

/// Removes a trailing currency or currency-per-area unit from a price label.
pub fn strip_price_suffix(text: &str) -> String {
    let trimmed = text.trim();
    PRICE_SUFFIXES
        .iter()
        .find_map(|suffix| trimmed.strip_suffix(suffix))
        .unwrap_or(trimmed)
        .trim_end()
        .to_string()
}

/// Without a decimal comma, dots group thousands when there are several of
/// them or when the only one is followed by exactly three digits.
fn dots_are_grouping(digits: &str) -> bool {
    match digits.matches('.').count() {
        0 => false,
        1 => digits
            .split_once('.')
            .map_or(false, |(_, tail)| tail.len() == 3),
        _ => true,
    }
}

/// Parses a suffix-stripped amount such as "350 000", "350.000" or "2 500,50".
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else if dots_are_grouping(&cleaned) {
        cleaned.replace('.', "")
    } else {
        cleaned
    };

    normalized.parse::<f64>().ok()
}
