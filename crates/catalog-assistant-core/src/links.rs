//! Product deep links and reply annotation.
//!
//! Deep links follow the catalog search URL template
//! `<catalog-base-url>?ara=<url-encoded product name>`. A product's own
//! `url` takes precedence when the catalog carries one.
//!
//! [`annotate_links`] wraps product-name mentions in generated replies
//! with anchor tags. Text that is already inside an `<a>` element, or
//! inside any other tag, is left untouched, so annotation never
//! double-wraps.

use regex::{Regex, RegexBuilder};

use crate::models::Product;

/// Link for a product: its own URL, else the search template.
pub fn product_link(product: &Product, catalog_base_url: Option<&str>) -> Option<String> {
    if let Some(url) = product.url.as_deref().filter(|u| !u.trim().is_empty()) {
        return Some(url.trim().to_string());
    }
    catalog_base_url
        .filter(|base| !base.trim().is_empty())
        .map(|base| search_link(base.trim(), &product.name))
}

/// `<base>?ara=<encoded name>`, or `&ara=` when `base` already has a query.
pub fn search_link(base: &str, product_name: &str) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{}{}ara={}", base, sep, urlencoding::encode(product_name))
}

/// Anchor tag for `label` pointing at `href`.
pub fn anchor(href: &str, label: &str) -> String {
    format!(
        r#"<a href="{}" target="_blank">{}</a>"#,
        href.replace('"', "&quot;"),
        label
    )
}

fn protected_spans() -> Regex {
    RegexBuilder::new(r"<a\b[^>]*>.*?</a\s*>|<[^>]*>")
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .expect("protected span pattern is valid")
}

/// Escaped `name` with word boundaries on any end that is a word character,
/// so "Silver" does not match inside "Silverware" while "TiO2 (Anatase)"
/// still matches before a space.
fn mention_pattern(name: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let boundary = |c: Option<char>| if c.is_some_and(is_word) { r"\b" } else { "" };
    let start = boundary(name.chars().next());
    let end = boundary(name.chars().last());
    format!("{}{}{}", start, regex::escape(name), end)
}

/// Wrap every mention of each `(name, href)` in `text` with an anchor.
///
/// Names are applied longest first so that a short name never splits a
/// longer one that contains it. Matching is case-insensitive and keeps the
/// original casing of the mention.
pub fn annotate_links(text: &str, links: &[(String, String)]) -> String {
    let mut ordered: Vec<&(String, String)> = links
        .iter()
        .filter(|(name, _)| !name.trim().is_empty())
        .collect();
    ordered.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

    let protected = protected_spans();
    let mut out = text.to_string();

    for (name, href) in ordered {
        let pattern = match RegexBuilder::new(&mention_pattern(name.trim()))
            .case_insensitive(true)
            .build()
        {
            Ok(p) => p,
            Err(_) => continue,
        };

        let mut next = String::with_capacity(out.len());
        let mut cursor = 0;
        for span in protected.find_iter(&out) {
            let plain = &out[cursor..span.start()];
            next.push_str(&pattern.replace_all(plain, |caps: &regex::Captures| {
                anchor(href, &caps[0])
            }));
            next.push_str(span.as_str());
            cursor = span.end();
        }
        let tail = &out[cursor..];
        next.push_str(&pattern.replace_all(tail, |caps: &regex::Captures| {
            anchor(href, &caps[0])
        }));
        out = next;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.example.com/arama";

    #[test]
    fn test_search_link_encodes_name() {
        assert_eq!(
            search_link(BASE, "Nano Gümüş Tozu %99"),
            "https://www.example.com/arama?ara=Nano%20G%C3%BCm%C3%BC%C5%9F%20Tozu%20%2599"
        );
        assert_eq!(
            search_link("https://x.test/s?lang=tr", "TiO2"),
            "https://x.test/s?lang=tr&ara=TiO2"
        );
    }

    #[test]
    fn test_product_link_prefers_own_url() {
        let mut p = Product::named("Graphene Oxide");
        assert_eq!(
            product_link(&p, Some(BASE)).as_deref(),
            Some("https://www.example.com/arama?ara=Graphene%20Oxide")
        );
        assert_eq!(product_link(&p, None), None);
        p.url = Some("https://www.example.com/p/go".into());
        assert_eq!(
            product_link(&p, Some(BASE)).as_deref(),
            Some("https://www.example.com/p/go")
        );
    }

    #[test]
    fn test_annotate_wraps_mentions_case_insensitively() {
        let links = vec![("Nano Silver Powder".to_string(), "https://x/1".to_string())];
        let out = annotate_links("We stock nano silver powder in 50 g packs.", &links);
        assert_eq!(
            out,
            r#"We stock <a href="https://x/1" target="_blank">nano silver powder</a> in 50 g packs."#
        );
    }

    #[test]
    fn test_annotate_respects_word_boundaries() {
        let links = vec![
            ("Silver".to_string(), "https://x/ag".to_string()),
            ("TiO2 (Anatase)".to_string(), "https://x/ti".to_string()),
        ];
        let out = annotate_links("Silverware is not Silver. TiO2 (Anatase) is.", &links);
        assert_eq!(
            out,
            r#"Silverware is not <a href="https://x/ag" target="_blank">Silver</a>. <a href="https://x/ti" target="_blank">TiO2 (Anatase)</a> is."#
        );
        let links = vec![("Gümüş".to_string(), "https://x/g".to_string())];
        let out = annotate_links("Gümüşlü ürün, Gümüş değil", &links);
        assert_eq!(
            out,
            r#"Gümüşlü ürün, <a href="https://x/g" target="_blank">Gümüş</a> değil"#
        );
    }

    #[test]
    fn test_annotate_does_not_double_wrap() {
        let links = vec![("Nano Silver Powder".to_string(), "https://x/1".to_string())];
        let once = annotate_links("Nano Silver Powder is in stock.", &links);
        let twice = annotate_links(&once, &links);
        assert_eq!(once, twice);

        let pre = r#"See <a href="https://x/1" target="_blank">Nano Silver Powder</a>."#;
        assert_eq!(annotate_links(pre, &links), pre);
    }

    #[test]
    fn test_annotate_longest_name_first() {
        let links = vec![
            ("Silver".to_string(), "https://x/s".to_string()),
            ("Nano Silver Powder".to_string(), "https://x/n".to_string()),
        ];
        let out = annotate_links("Nano Silver Powder and Silver flakes", &links);
        assert_eq!(
            out,
            r#"<a href="https://x/n" target="_blank">Nano Silver Powder</a> and <a href="https://x/s" target="_blank">Silver</a> flakes"#
        );
    }

    #[test]
    fn test_annotate_skips_tag_attributes() {
        let links = vec![("Graphene".to_string(), "https://x/g".to_string())];
        let out = annotate_links(r#"<img alt="Graphene"> Graphene"#, &links);
        assert_eq!(
            out,
            r#"<img alt="Graphene"> <a href="https://x/g" target="_blank">Graphene</a>"#
        );
    }
}
