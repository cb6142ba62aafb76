use lazy_static::lazy_static;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

lazy_static! {
    static ref SEL_TITLE: Selector = Selector::parse("title").expect("valid selector");
    static ref SEL_BODY: Selector = Selector::parse("body").expect("valid selector");
    static ref SEL_A: Selector = Selector::parse("a[href]").expect("valid selector");
}

#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub title: String,
    pub body: String,
    /// Absolute http(s) links without fragments, first occurrence order.
    pub links: Vec<Url>,
}

pub fn parse_page(html: &str, base: &Url) -> ParsedPage {
    let doc = Html::parse_document(html);
    let title = doc
        .select(&SEL_TITLE)
        .next()
        .map(|n| n.text().collect::<String>())
        .unwrap_or_default();
    let body = doc
        .select(&SEL_BODY)
        .next()
        .map(|n| n.text().map(str::trim).filter(|t| !t.is_empty()).collect::<Vec<_>>().join(" "))
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for a in doc.select(&SEL_A) {
        let Some(href) = a.value().attr("href") else { continue };
        let Ok(u) = base.join(href.trim()) else { continue };
        if !matches!(u.scheme(), "http" | "https") {
            continue;
        }
        let u = normalize(&u);
        if seen.insert(u.as_str().to_string()) {
            links.push(u);
        }
    }
    ParsedPage { title: title.trim().to_string(), body, links }
}

pub fn normalize(u: &Url) -> Url {
    let mut s = u.clone();
    s.set_fragment(None);
    s
}
