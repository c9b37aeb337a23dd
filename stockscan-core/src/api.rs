use reqwest::{Client, ClientBuilder};
use tracing::{info, warn};
use url::Url;

use crate::config::ScanConfig;
use crate::error::ApiError;
use crate::models::{BarcodeStockIn, StockInResponse};

const USER_AGENT: &str = "stockscan/0.1";

/// REST calls made by the scan workflow.
#[derive(Debug, Clone)]
pub struct StockApi {
    client: Client,
    base: String,
}

impl StockApi {
    pub fn new(config: &ScanConfig) -> Result<Self, ApiError> {
        let client = ClientBuilder::new()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()?;
        Self::with_client(client, &config.api_base_url)
    }

    pub fn with_client(client: Client, base: &str) -> Result<Self, ApiError> {
        Url::parse(base)?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(Url::parse(&format!("{}/{}", self.base, path))?)
    }

    /// Registers one unit of stock for a scanned barcode.
    pub async fn stock_in(&self, request: &BarcodeStockIn) -> Result<StockInResponse, ApiError> {
        let url = self.endpoint("stock/in")?;
        info!(barcode = %request.barcode, "posting stock-in");

        let response = self.client.post(url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(_) => "<response body unavailable>".to_string(),
            };
            warn!(status = status.as_u16(), barcode = %request.barcode, "stock-in rejected");
            return Err(ApiError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let result: StockInResponse = serde_json::from_slice(&bytes)?;
        info!(barcode = %result.barcode, quantity = result.quantity, is_new = result.is_new, "stock-in accepted");
        Ok(result)
    }
}
