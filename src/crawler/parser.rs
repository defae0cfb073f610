//! HTML parser for catalogue pages
//!
//! This module turns a fetched page into item records and frontier entries:
//! - Listing pages: one summary record per `article.product_pod`, the
//!   pagination "next" link, item detail links and sidebar category links
//! - Item detail pages (`div.product_main`): one full record
//!
//! Records missing a title, URL or parseable price are dropped and counted,
//! never emitted partially.

use crate::crawler::{FrontierEntry, FrontierKind};
use crate::output::ItemRecord;
use crate::url::{canonicalize_url, resolve_link};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Which layout a page was parsed as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Listing,
    Detail,
}

/// Extracted information from a catalogue page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub kind: PageKind,

    /// Complete records found on the page
    pub items: Vec<ItemRecord>,

    /// Links to queue, already resolved and canonicalized
    pub next_urls: Vec<FrontierEntry>,

    /// Records discarded because a required field was missing
    pub dropped: u32,
}

impl ParsedPage {
    /// Number of sidebar category links on the page
    pub fn category_links(&self) -> usize {
        self.next_urls
            .iter()
            .filter(|entry| entry.kind == FrontierKind::CategoryIndex)
            .count()
    }
}

/// Parses a catalogue page
///
/// # Example
///
/// ```no_run
/// use shelf_sweep::crawler::parse_page;
/// use url::Url;
///
/// let html = r#"<ul class="breadcrumb"><li>Home</li><li class="active">Poetry</li></ul>"#;
/// let page_url = Url::parse("http://books.toscrape.com/catalogue/category/books/poetry_23/index.html").unwrap();
/// let parsed = parse_page(html, &page_url);
/// assert!(parsed.items.is_empty());
/// ```
pub fn parse_page(body: &str, page_url: &Url) -> ParsedPage {
    let document = Html::parse_document(body);
    let root = document.root_element();

    match select_first(root, "div.product_main") {
        Some(main) => parse_detail(root, main, page_url),
        None => parse_listing(root, page_url),
    }
}

fn parse_listing(root: ElementRef<'_>, page_url: &Url) -> ParsedPage {
    let category = resolve_category(&breadcrumb_trail(root), None);
    let mut items = Vec::new();
    let mut next_urls = Vec::new();
    let mut dropped = 0;

    for pod in select_all(root, "article.product_pod") {
        if let Some(url) = select_first(pod, "h3 a")
            .and_then(|link| link.value().attr("href"))
            .and_then(|href| resolve_link(href, page_url))
        {
            next_urls.push(FrontierEntry::new(url, FrontierKind::ItemPage));
        }

        match parse_summary(pod, page_url, &category) {
            Ok(item) => items.push(item),
            Err(missing) => {
                tracing::debug!("Dropping item on {}: {}", page_url, missing);
                dropped += 1;
            }
        }
    }

    if let Some(url) = select_first(root, "li.next a")
        .and_then(|link| link.value().attr("href"))
        .and_then(|href| resolve_link(href, page_url))
    {
        next_urls.push(FrontierEntry::new(url, FrontierKind::PaginationNext));
    }

    for link in select_all(root, ".side_categories ul.nav-list li ul a") {
        if let Some(url) = link
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, page_url))
        {
            next_urls.push(FrontierEntry::new(url, FrontierKind::CategoryIndex));
        }
    }

    tracing::debug!(
        "Parsed listing {}: {} items, {} dropped, category {}",
        page_url,
        items.len(),
        dropped,
        category
    );

    ParsedPage {
        kind: PageKind::Listing,
        items,
        next_urls,
        dropped,
    }
}

fn parse_summary(
    pod: ElementRef<'_>,
    page_url: &Url,
    category: &str,
) -> Result<ItemRecord, &'static str> {
    let link = select_first(pod, "h3 a").ok_or("missing title link")?;

    let title = link
        .value()
        .attr("title")
        .map(collapse_whitespace)
        .filter(|title| !title.is_empty())
        .or_else(|| Some(element_text(link)).filter(|text| !text.is_empty()))
        .ok_or("missing title")?;

    let url = link
        .value()
        .attr("href")
        .and_then(|href| resolve_link(href, page_url))
        .ok_or("missing url")?;

    let price = select_first(pod, "p.price_color")
        .and_then(|el| parse_price(&element_text(el)))
        .ok_or("unparseable price")?;

    Ok(ItemRecord::new(
        title,
        price,
        availability(pod),
        rating(pod),
        category,
        url.as_str(),
    ))
}

fn parse_detail(root: ElementRef<'_>, main: ElementRef<'_>, page_url: &Url) -> ParsedPage {
    let mut page = ParsedPage {
        kind: PageKind::Detail,
        items: Vec::new(),
        next_urls: Vec::new(),
        dropped: 0,
    };

    let title = match select_first(main, "h1")
        .map(element_text)
        .filter(|title| !title.is_empty())
    {
        Some(title) => title,
        None => {
            tracing::debug!("Dropping item on {}: missing title", page_url);
            page.dropped = 1;
            return page;
        }
    };

    let price = match select_first(main, "p.price_color").and_then(|el| parse_price(&element_text(el))) {
        Some(price) => price,
        None => {
            tracing::debug!("Dropping item on {}: unparseable price", page_url);
            page.dropped = 1;
            return page;
        }
    };

    let url = canonicalize_url(page_url.as_str())
        .map(|url| url.to_string())
        .unwrap_or_else(|_| page_url.to_string());
    let category = resolve_category(&breadcrumb_trail(root), Some(&title));

    page.items.push(ItemRecord::new(
        title,
        price,
        availability(main),
        rating(main),
        category,
        url,
    ));
    page
}

/// Resolves an item's category from the ordered breadcrumb trail
///
/// The leaf (the item's own title) is dropped when it is the last crumb,
/// then `Home`; the last remaining crumb is the category. An empty
/// remainder yields `"Unknown"`.
pub fn resolve_category(trail: &[String], leaf: Option<&str>) -> String {
    let mut crumbs: Vec<&str> = trail
        .iter()
        .map(|crumb| crumb.trim())
        .filter(|crumb| !crumb.is_empty())
        .collect();

    if let (Some(leaf), Some(last)) = (leaf, crumbs.last()) {
        if *last == leaf.trim() {
            crumbs.pop();
        }
    }

    crumbs
        .into_iter()
        .filter(|crumb| !crumb.eq_ignore_ascii_case("home"))
        .last()
        .map(str::to_string)
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Parses a price, ignoring everything but digits and `.`
///
/// `"£51.77"` and a mis-decoded `"Â£51.77"` both give `51.77`.
pub fn parse_price(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    cleaned.parse::<f64>().ok().filter(|price| price.is_finite())
}

/// Maps a `star-rating <Word>` class list to 1..=5, 0 when unknown
pub fn parse_rating(class_attr: &str) -> u8 {
    class_attr
        .split_whitespace()
        .find_map(|token| match token {
            "One" => Some(1),
            "Two" => Some(2),
            "Three" => Some(3),
            "Four" => Some(4),
            "Five" => Some(5),
            _ => None,
        })
        .unwrap_or(0)
}

fn rating(scope: ElementRef<'_>) -> u8 {
    select_first(scope, "p.star-rating")
        .and_then(|el| el.value().attr("class"))
        .map(parse_rating)
        .unwrap_or(0)
}

fn availability(scope: ElementRef<'_>) -> String {
    select_first(scope, "p.availability")
        .map(element_text)
        .unwrap_or_default()
}

fn breadcrumb_trail(root: ElementRef<'_>) -> Vec<String> {
    select_all(root, "ul.breadcrumb li")
        .into_iter()
        .map(element_text)
        .collect()
}

fn select_all<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => scope.select(&selector).collect(),
        Err(e) => {
            tracing::error!("Invalid selector '{}': {:?}", css, e);
            Vec::new()
        }
    }
}

fn select_first<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    select_all(scope, css).into_iter().next()
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
