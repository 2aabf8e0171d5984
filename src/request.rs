use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT},
    redirect::Policy,
    Client, StatusCode,
};
use tracing::trace;

use crate::config::{self, Config};
use crate::model::Sku;
use crate::Result;

/// The two storefront endpoints a probe talks to.
#[async_trait]
pub trait Storefront: Send + Sync {
    /// Bundle detail page HTML, or `None` when the store answers with anything
    /// but a plain 200 (unknown skus are redirected to the catalog).
    async fn detail_page(&self, sku: Sku, game: &str) -> Result<Option<String>>;

    /// Raw inventory payload carrying the bundle price.
    async fn inventory(&self, sku: Sku, game: &str) -> Result<String>;

    /// Address of the detail page, also recorded as the bundle url when the page lacks one.
    fn detail_url(&self, sku: Sku, game: &str) -> String;
}

/// `Storefront` backed by the live site.
#[derive(Debug, Clone)]
pub struct HttpStorefront {
    // Client uses Arc so we can clone cheaply
    client: Client,
    storefront_host: String,
    api_host: String,
    locale: String,
}

impl HttpStorefront {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(config::USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/json;q=0.9,*/*;q=0.8"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            client,
            storefront_host: config.storefront_host.clone(),
            api_host: config.api_host.clone(),
            locale: config.locale.clone(),
        })
    }

    pub fn inventory_url(&self, sku: Sku, game: &str) -> String {
        format!(
            "{}/inventory/v1/title/{game}/bundle/{sku}/{}",
            self.api_host, self.locale
        )
    }
}

#[async_trait]
impl Storefront for HttpStorefront {
    async fn detail_page(&self, sku: Sku, game: &str) -> Result<Option<String>> {
        let res = self.client.get(self.detail_url(sku, game)).send().await?;
        if res.status() != StatusCode::OK {
            trace!(sku, game, status = %res.status(), "detail page not served");
            return Ok(None);
        }
        let html = res.text().await?;
        Ok(Some(html))
    }

    async fn inventory(&self, sku: Sku, game: &str) -> Result<String> {
        let res = self
            .client
            .get(self.inventory_url(sku, game))
            .send()
            .await?
            .error_for_status()?;
        Ok(res.text().await?)
    }

    fn detail_url(&self, sku: Sku, game: &str) -> String {
        format!("{}/store/sku/{sku}/title/{game}", self.storefront_host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_both_endpoints() {
        let mut config = Config::new("vg", 1, 2, "data");
        config.storefront_host = "http://store.test".into();
        config.api_host = "http://api.test".into();
        config.locale = "fr".into();
        let store = HttpStorefront::new(&config).unwrap();

        assert_eq!(store.detail_url(33954450, "vg"), "http://store.test/store/sku/33954450/title/vg");
        assert_eq!(
            store.inventory_url(33954450, "vg"),
            "http://api.test/inventory/v1/title/vg/bundle/33954450/fr"
        );
    }
}
