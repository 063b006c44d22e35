use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{ApiError, AskRequest, AskResponse, Health, SalesPage};

/// HTTP client for the sales API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base = parse_base(base_url)?;
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("brewtab/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Fetch one page of sales, newest first
    pub async fn fetch_sales(&self, offset: u64, limit: u64) -> Result<SalesPage, ApiError> {
        let url = self.endpoint("sales")?;
        tracing::debug!(%url, offset, limit, "fetching sales page");

        let response = self
            .http
            .get(url)
            .query(&[("offset", offset), ("limit", limit)])
            .send()
            .await?;

        let page: SalesPage = read_json(response).await?;
        page.validate(offset, limit)?;

        tracing::debug!(
            rows = page.data.len(),
            count = page.count,
            offset = page.offset,
            "sales page received"
        );
        Ok(page)
    }

    /// Ask a free-text question about the sales table
    pub async fn ask(&self, question: &str) -> Result<AskResponse, ApiError> {
        let url = self.endpoint("ask")?;
        tracing::debug!(%url, len = question.len(), "asking question");

        let response = self
            .http
            .post(url)
            .json(&AskRequest { q: question })
            .send()
            .await?;

        let answer: AskResponse = read_json(response).await?;
        tracing::debug!(message = %answer.message, "answer received");
        Ok(answer)
    }

    /// Liveness probe; the route sits at the server root, not under the API prefix
    pub async fn health(&self) -> Result<Health, ApiError> {
        let url = self
            .base
            .join("/health")
            .map_err(|_| ApiError::Address(self.base.to_string()))?;
        let response = self.http.get(url).send().await?;
        read_json(response).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|_| ApiError::Address(self.base.to_string()))
    }
}

/// Parse the base address and make sure relative joins append to it
fn parse_base(raw: &str) -> Result<Url, ApiError> {
    let trimmed = raw.trim();
    let mut base = Url::parse(trimmed).map_err(|_| ApiError::Address(trimmed.to_string()))?;

    if !matches!(base.scheme(), "http" | "https") {
        return Err(ApiError::Address(trimmed.to_string()));
    }

    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.set_query(None);
    base.set_fragment(None);

    Ok(base)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        tracing::warn!(%status, "API request failed");
        return Err(ApiError::status(status, &body));
    }

    Ok(serde_json::from_str(&body)?)
}
