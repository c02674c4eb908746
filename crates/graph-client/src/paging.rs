//! Pagination over `@odata.nextLink`
//!
//! Collection endpoints return one page per response. The walker follows the
//! continuation link (opaque, used verbatim) until a page omits it. A failure
//! on any page aborts the walk and discards what was collected so far.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Result;
use crate::{GraphClient, decode, metrics};

/// One page of a collection response.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
    #[serde(rename = "@odata.context", default)]
    pub context: Option<String>,
}

impl<T> Page<T> {
    /// Continuation link, treating an empty string as absent.
    pub fn next(&self) -> Option<&str> {
        self.next_link.as_deref().filter(|link| !link.is_empty())
    }
}

impl GraphClient {
    /// Initial URL for a collection, projecting `select` when non-empty.
    pub fn list_url(&self, path: &str, select: &[&str]) -> Result<Url> {
        if select.is_empty() {
            return self.url(path, &[]);
        }
        let select = select.join(",");
        self.url(path, &[("$select", select.as_str())])
    }

    /// Fetch a single page.
    pub async fn page<T: DeserializeOwned>(&self, url: &str) -> Result<Page<T>> {
        let body = self.get_url(url).await?;
        let page = decode(&body)?;
        metrics::record_page();
        Ok(page)
    }

    /// Walk every page starting at `initial_url` and return all items in
    /// server order.
    pub async fn list_all<T: DeserializeOwned>(&self, initial_url: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut pages = 0usize;
        let mut next = Some(initial_url.to_string());

        while let Some(url) = next.take() {
            let page: Page<T> = self.page(&url).await?;
            pages += 1;
            next = page.next().map(str::to_string);
            items.extend(page.value);
        }

        debug!(pages, items = items.len(), "collection walk complete");
        Ok(items)
    }
}
