use crate::error::ExtractionError;
use crate::models::PropertyRecord;
use crate::scrapers::traits::FieldExtractor;
use crate::scrapers::types::PageSnapshot;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

static CARD_LINK: Lazy<Selector> =
    Lazy::new(|| selector(r#"[data-qa="POSTING_CARD_DESCRIPTION"] a"#));
static PRICE: Lazy<Selector> = Lazy::new(|| selector(".price-value"));
static EXPENSES: Lazy<Selector> = Lazy::new(|| selector(".price-expenses"));
static LOCATION: Lazy<Selector> =
    Lazy::new(|| selector(".section-location-property.section-location-property-classified"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector(".title-type-sup-property"));
static USER_VIEWS: Lazy<Selector> = Lazy::new(|| selector("#user-views p"));
static MULTIMEDIA: Lazy<Selector> = Lazy::new(|| selector("#multimedia-content"));
static IMG: Lazy<Selector> = Lazy::new(|| selector("img"));

static PRICE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:\$|USD)\s?[\d.,]+").expect("static regex must compile"));
static EXPENSES_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Expensas\s*\$?\s?[\d.,]+").expect("static regex must compile"));
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("static regex must compile"));
static PAGE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"pagina-(\d+)").expect("static regex must compile"));

const IMAGE_HOST: &str = "zonapropcdn.com";
const VIEWS_MARKER: &str = "visualizaciones";

/// Where the paginated listing index lives and how its cards link out
#[derive(Debug, Clone)]
pub struct ListingLayout {
    base_url: Url,
    path_template: String,
}

impl ListingLayout {
    pub const DEFAULT_BASE_URL: &'static str = "https://www.zonaprop.com.ar";
    pub const DEFAULT_PATH_TEMPLATE: &'static str =
        "/departamentos-alquiler-capital-federal-pagina-{page}.html";

    /// `path_template` must contain a `{page}` placeholder.
    pub fn new(base_url: &str, path_template: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            path_template: path_template.to_string(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn page_url(&self, page: u32) -> String {
        let path = self.path_template.replace("{page}", &page.to_string());
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// Page index encoded in a listing URL, if any.
    ///
    /// The site redirects out-of-range pages, so the final URL of a
    /// navigation is the only reliable source of the page actually served.
    pub fn page_index_of(url: &str) -> Option<u32> {
        PAGE_MARKER
            .captures_iter(url)
            .last()
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    /// Detail links on one listing page, absolute, first occurrence wins
    pub fn candidate_links(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for anchor in document.select(&CARD_LINK) {
            let raw = anchor.value().attr("href").unwrap_or("").trim();
            if raw.is_empty() {
                continue;
            }
            let absolute = match self.base_url.join(raw) {
                Ok(url) => url.to_string(),
                Err(e) => {
                    debug!("Dropping unresolvable link {:?}: {}", raw, e);
                    continue;
                }
            };
            if seen.insert(absolute.clone()) {
                links.push(absolute);
            }
        }

        links
    }
}

impl Default for ListingLayout {
    fn default() -> Self {
        Self {
            base_url: Url::parse(Self::DEFAULT_BASE_URL).expect("default base URL must parse"),
            path_template: Self::DEFAULT_PATH_TEMPLATE.to_string(),
        }
    }
}

/// Field extractor for the detail page schema
#[derive(Debug, Clone, Copy, Default)]
pub struct ZonapropExtractor;

fn collapsed_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).next().map(collapsed_text)
}

fn first_match(text: Option<String>, pattern: &Regex) -> String {
    text.and_then(|t| pattern.find(&t).map(|m| m.as_str().to_string()))
        .unwrap_or_default()
}

impl ZonapropExtractor {
    fn images(document: &Html) -> Vec<String> {
        let Some(gallery) = document.select(&MULTIMEDIA).next() else {
            return Vec::new();
        };
        gallery
            .select(&IMG)
            .filter_map(|img| {
                let attrs = img.value();
                attrs
                    .attr("src")
                    .filter(|src| !src.is_empty())
                    .or_else(|| attrs.attr("data-flickity-lazyload"))
            })
            .filter(|src| src.contains(IMAGE_HOST))
            .map(str::to_string)
            .collect()
    }

    fn views(document: &Html) -> String {
        document
            .select(&USER_VIEWS)
            .map(collapsed_text)
            .find(|text| text.contains(VIEWS_MARKER))
            .and_then(|text| DIGITS.find(&text).map(|m| m.as_str().to_string()))
            .unwrap_or_default()
    }
}

impl FieldExtractor for ZonapropExtractor {
    fn extract(
        &self,
        page: &PageSnapshot,
        requested_href: &str,
    ) -> Result<PropertyRecord, ExtractionError> {
        let document = Html::parse_document(&page.html);

        let price_text = first_text(&document, &PRICE);
        let title = first_text(&document, &TITLE);
        if price_text.is_none() && title.is_none() {
            return Err(ExtractionError::NotADetailPage(requested_href.to_string()));
        }

        // Keyed by the link as listed, so a redirected listing is still
        // recognised on the next walk.
        let href = if requested_href.trim().is_empty() {
            page.url.trim()
        } else {
            requested_href.trim()
        };
        if href.is_empty() {
            return Err(ExtractionError::MissingHref);
        }

        Ok(PropertyRecord {
            href: href.to_string(),
            price: first_match(price_text, &PRICE_PATTERN),
            expenses: first_match(first_text(&document, &EXPENSES), &EXPENSES_PATTERN),
            location: first_text(&document, &LOCATION).unwrap_or_default(),
            title_type_sup_property: title.unwrap_or_default(),
            days_published: first_text(&document, &USER_VIEWS).unwrap_or_default(),
            views: Self::views(&document),
            images: Self::images(&document),
            discount: String::new(),
        })
    }
}
