//! Icon link discovery in homepage markup.

use scraper::{Html, Selector};
use url::Url;

/// `rel` tokens that mark a usable icon. `shortcut icon` matches through its
/// `icon` token; `mask-icon` is a monochrome Safari pin and is left out.
const ICON_RELS: [&str; 3] = ["icon", "apple-touch-icon", "apple-touch-icon-precomposed"];

/// Whether a `rel` attribute value declares an icon.
pub fn is_icon_rel(rel: &str) -> bool {
    rel.split_ascii_whitespace()
        .any(|token| ICON_RELS.iter().any(|r| token.eq_ignore_ascii_case(r)))
}

/// Absolute icon URLs declared by `<link>` tags, in document order.
///
/// Relative `href`s resolve against `<base href>` when the page has one,
/// otherwise against `page_url` (the final URL after redirects). Only HTTP(S)
/// results are kept and duplicates are dropped. Markup is parsed leniently:
/// broken HTML yields whatever links the parser could recover, possibly none.
pub fn icon_links(html: &str, page_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let base = base_url(&document, page_url).unwrap_or_else(|| page_url.clone());

    let Ok(selector) = Selector::parse("link[rel][href]") else {
        return Vec::new();
    };

    let mut links: Vec<Url> = Vec::new();
    for element in document.select(&selector) {
        let attrs = element.value();
        let rel = attrs.attr("rel").unwrap_or_default();
        if !is_icon_rel(rel) {
            continue;
        }
        let href = attrs.attr("href").unwrap_or_default().trim();
        if href.is_empty() {
            continue;
        }
        let Ok(url) = base.join(href) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        if !links.contains(&url) {
            links.push(url);
        }
    }
    links
}

fn base_url(document: &Html, page_url: &Url) -> Option<Url> {
    let selector = Selector::parse("base[href]").ok()?;
    let href = document.select(&selector).next()?.value().attr("href")?;
    page_url.join(href.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://example.org/about/").unwrap()
    }

    fn links(html: &str) -> Vec<String> {
        icon_links(html, &page()).into_iter().map(String::from).collect()
    }

    #[test]
    fn rel_matching() {
        assert!(is_icon_rel("icon"));
        assert!(is_icon_rel("shortcut icon"));
        assert!(is_icon_rel("Apple-Touch-Icon"));
        assert!(is_icon_rel("apple-touch-icon-precomposed"));
        assert!(!is_icon_rel("stylesheet"));
        assert!(!is_icon_rel("mask-icon"));
        assert!(!is_icon_rel(""));
    }

    #[test]
    fn finds_icons_in_document_order() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="/style.css">
            <link rel="apple-touch-icon" href="/touch.png">
            <link rel="shortcut icon" href="/favicon.ico">
        </head></html>"#;
        assert_eq!(
            links(html),
            vec![
                "https://example.org/touch.png",
                "https://example.org/favicon.ico",
            ]
        );
    }

    #[test]
    fn resolves_relative_against_page() {
        let html = r#"<link rel="icon" href="img/icon.png">"#;
        assert_eq!(links(html), vec!["https://example.org/about/img/icon.png"]);
    }

    #[test]
    fn resolves_protocol_relative_and_absolute() {
        let html = r#"
            <link rel="icon" href="//cdn.example.net/i.png">
            <link rel="icon" href="https://static.example.com/fav.ico">
        "#;
        assert_eq!(
            links(html),
            vec![
                "https://cdn.example.net/i.png",
                "https://static.example.com/fav.ico",
            ]
        );
    }

    #[test]
    fn honours_base_href() {
        let html = r#"<head><base href="https://assets.example.org/v2/">
            <link rel="icon" href="favicon.png"></head>"#;
        assert_eq!(links(html), vec!["https://assets.example.org/v2/favicon.png"]);
    }

    #[test]
    fn skips_data_uris_and_empty_hrefs() {
        let html = r#"
            <link rel="icon" href="data:image/png;base64,iVBORw0KGgo=">
            <link rel="icon" href="  ">
            <link rel="icon" href="/real.png">
        "#;
        assert_eq!(links(html), vec!["https://example.org/real.png"]);
    }

    #[test]
    fn drops_duplicates() {
        let html = r#"
            <link rel="icon" href="/favicon.ico">
            <link rel="shortcut icon" href="https://example.org/favicon.ico">
        "#;
        assert_eq!(links(html), vec!["https://example.org/favicon.ico"]);
    }

    #[test]
    fn tolerates_malformed_markup() {
        let html = r#"<html><head><link rel="icon" href="/ok.png"<div><<<>>> </head"#;
        // Whatever the parser recovers, it must not panic and must only
        // return http(s) URLs.
        for url in icon_links(html, &page()) {
            assert!(url.scheme() == "https");
        }
    }

    #[test]
    fn no_links_in_plain_text() {
        assert!(links("this is not html at all").is_empty());
    }
}
