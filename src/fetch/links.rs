//! Link extraction from HTML pages.

use url::Url;

use crate::fetch::normalize_url;

/// Absolute, normalized http(s) links of `html`, in document order and
/// without duplicates. Relative hrefs resolve against `base`.
pub fn extract_links(
    html: &str,
    base: &Url,
) -> Vec<Url>
{
    let mut out: Vec<Url> = Vec::new();

    for href in hrefs(html)
    {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#')
        {
            continue;
        }

        let Ok(joined) = base.join(href)
        else
        {
            continue;
        };
        // mailto:, javascript: and friends fall out here
        let Ok(url) = normalize_url(joined.as_str())
        else
        {
            continue;
        };

        if !out.contains(&url)
        {
            out.push(url);
        }
    }

    out
}

#[cfg(feature = "html")]
fn hrefs(html: &str) -> Vec<String>
{
    use scraper::{Html, Selector};

    let document = Html::parse_document(html);
    let Some(selector) = Selector::parse("a[href]").ok()
    else
    {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|el| {
            el.value()
                .attr("href")
        })
        .map(str::to_string)
        .collect()
}

#[cfg(not(feature = "html"))]
fn hrefs(html: &str) -> Vec<String>
{
    use std::sync::LazyLock;

    use regex::Regex;

    static HREF: LazyLock<Option<Regex>> =
        LazyLock::new(|| Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).ok());

    let Some(re) = HREF.as_ref()
    else
    {
        return Vec::new();
    };

    re.captures_iter(html)
        .filter_map(|c| {
            c.get(1)
                .or_else(|| c.get(2))
                .or_else(|| c.get(3))
        })
        .map(|m| {
            m.as_str()
                .replace("&amp;", "&")
        })
        .collect()
}
