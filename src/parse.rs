use scraper::{Html, Selector};
use serde::Deserialize;
use tokio::task::spawn_blocking;

use crate::model::Sku;
use crate::{Error, Result};

/// Page title the store serves when no bundle is selected.
pub const NOT_FOUND_TITLE: &str = "My Call of Duty® Bundles";
/// Page title served when the store refuses the client.
pub const ACCESS_DENIED_TITLE: &str = "Access Denied";
/// Appended by the store to every bundle page title.
pub const TITLE_SUFFIX: &str = " | My Call of Duty® Bundles";

/// The fields of a detail page a bundle is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailPage {
    pub title: String,
    pub url: Option<String>,
}

/// Parses the detail page off the runtime threads.
pub async fn parse_detail(sku: Sku, html: String) -> Result<DetailPage> {
    spawn_blocking(move || extract_page(sku, &html)).await?
}

/// Extracts `<title>` and the `og:url` meta tag.
pub fn extract_page(sku: Sku, html: &str) -> Result<DetailPage> {
    let doc = Html::parse_document(html);

    let title_selector = create_selector("title")?;
    let url_selector = create_selector(r#"meta[property="og:url"]"#)?;

    let title = doc
        .select(&title_selector)
        .next()
        .map(|t| t.text().collect::<String>())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(Error::ParseMissingField { sku, field: "title" })?;

    let url = doc
        .select(&url_selector)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());

    Ok(DetailPage { title, url })
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}

// TODO: match a stable marker element instead of the localized title text.
//
/// Decides from the page title whether a bundle exists.
/// Returns the display name with the store suffix stripped, or `None` for the
/// landing and access denied pages. Any other title counts as a bundle.
pub fn classify_title(title: &str) -> Option<String> {
    let title = title.trim();
    if title == NOT_FOUND_TITLE || title == ACCESS_DENIED_TITLE {
        return None;
    }
    let name = title.strip_suffix(TITLE_SUFFIX).unwrap_or(title).trim();
    Some(name.to_string())
}

#[derive(Debug, Deserialize)]
struct InventoryPayload {
    status: String,
    #[serde(default)]
    data: Option<InventoryData>,
}

#[derive(Debug, Deserialize)]
struct InventoryData {
    #[serde(default)]
    cost: Option<serde_json::Value>,
}

/// Reads the price from an inventory payload: `{"status": "success", "data": {"cost": 2400}}`.
/// Anything but a success status with an integer cost means the price is unknown.
pub fn parse_inventory(body: &str) -> Result<Option<u64>> {
    let payload: InventoryPayload = serde_json::from_str(body)?;
    if payload.status != "success" {
        return Ok(None);
    }
    let cost = payload
        .data
        .and_then(|d| d.cost)
        .and_then(|c| c.as_u64().or_else(|| c.as_str().and_then(|s| s.trim().parse().ok())));
    Ok(cost)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUNDLE_PAGE: &str = r#"<!DOCTYPE html><html><head>
        <title>Vintage Parka | My Call of Duty® Bundles</title>
        <meta property="og:url" content="https://my.callofduty.com/store/sku/33954450/title/vg">
        </head><body><div class="bundle"></div></body></html>"#;

    #[test]
    fn extracts_title_and_url() {
        let page = extract_page(33954450, BUNDLE_PAGE).unwrap();
        assert_eq!(page.title, "Vintage Parka | My Call of Duty® Bundles");
        assert_eq!(
            page.url.as_deref(),
            Some("https://my.callofduty.com/store/sku/33954450/title/vg")
        );
    }

    #[test]
    fn page_without_title_is_a_parse_error() {
        let err = extract_page(1, "<html><body>nothing</body></html>").unwrap_err();
        assert!(matches!(err, Error::ParseMissingField { sku: 1, field: "title" }));
        assert_eq!(err.kind(), "parse");
    }

    #[test]
    fn sentinel_titles_are_not_bundles() {
        assert_eq!(classify_title(NOT_FOUND_TITLE), None);
        assert_eq!(classify_title("  Access Denied\n"), None);
    }

    #[test]
    fn bundle_title_loses_store_suffix() {
        assert_eq!(
            classify_title("Vintage Parka | My Call of Duty® Bundles").as_deref(),
            Some("Vintage Parka")
        );
        // Unrecognised pages default to found.
        assert_eq!(classify_title("Maintenance").as_deref(), Some("Maintenance"));
    }

    #[test]
    fn inventory_cost_needs_success_status() {
        assert_eq!(parse_inventory(r#"{"status":"success","data":{"cost":2400}}"#).unwrap(), Some(2400));
        assert_eq!(parse_inventory(r#"{"status":"success","data":{"cost":"1200"}}"#).unwrap(), Some(1200));
        assert_eq!(parse_inventory(r#"{"status":"error","data":{"cost":2400}}"#).unwrap(), None);
        assert_eq!(parse_inventory(r#"{"status":"success","data":{}}"#).unwrap(), None);
        assert_eq!(parse_inventory(r#"{"status":"success"}"#).unwrap(), None);
        assert!(parse_inventory("<html>").is_err());
    }
}
