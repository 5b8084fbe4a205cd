//! Evidence store adapters.
//!
//! Every backend is a keyed read: `Ok(Some(record))` when found, `Ok(None)`
//! when the service answers 404, and `Err` when the service cannot be
//! reached, times out, or answers any other error status.

use crate::records::{Invoice, InventoryItem, Order, Policy};
use async_trait::async_trait;
use grounded_core::config::BackendsConfig;
use grounded_core::{AppError, AppResult};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Keyed fetch from one backend source.
#[async_trait]
pub trait Lookup<K, R>: Send + Sync
where
    K: ?Sized + Sync,
    R: Send,
{
    /// Name recorded in `tools_used` and logs.
    fn source_name(&self) -> &str;

    /// Fetch the record for `key`; `None` means the source has no such record.
    async fn fetch(&self, key: &K) -> AppResult<Option<R>>;
}

/// JSON-over-HTTP client for one backend base URL.
#[derive(Debug, Clone)]
pub struct HttpSource {
    name: &'static str,
    base_url: Url,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(name: &'static str, base_url: &str, client: reqwest::Client) -> AppResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("Invalid {} URL '{}': {}", name, base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "Invalid {} URL '{}': not a base URL",
                name, base_url
            )));
        }

        Ok(Self {
            name,
            base_url,
            client,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn url(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("{} URL cannot take a path", self.name)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET `base/segments...` and decode the body; 404 is `None`.
    pub async fn get_json<R: DeserializeOwned>(&self, segments: &[&str]) -> AppResult<Option<R>> {
        let url = self.url(segments)?;
        tracing::debug!(source = self.name, %url, "Fetching record");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(format!("{} request", self.name))
            } else {
                AppError::Source(format!("{} unreachable: {}", self.name, e))
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AppError::Source(format!(
                "{} returned status {}",
                self.name, status
            )));
        }

        let record = response.json::<R>().await.map_err(|e| {
            AppError::Source(format!("{} returned a malformed record: {}", self.name, e))
        })?;
        Ok(Some(record))
    }
}

/// Orders service, keyed by order id.
#[derive(Debug, Clone)]
pub struct OrdersApi(HttpSource);

/// Billing service, keyed by the order an invoice belongs to.
#[derive(Debug, Clone)]
pub struct BillingApi(HttpSource);

/// Inventory service, keyed by SKU.
#[derive(Debug, Clone)]
pub struct InventoryApi(HttpSource);

/// Policy text service, keyed by policy key.
#[derive(Debug, Clone)]
pub struct PolicyApi(HttpSource);

impl OrdersApi {
    pub fn new(base_url: &str, client: reqwest::Client) -> AppResult<Self> {
        HttpSource::new("orders-api", base_url, client).map(Self)
    }
}

impl BillingApi {
    pub fn new(base_url: &str, client: reqwest::Client) -> AppResult<Self> {
        HttpSource::new("billing-api", base_url, client).map(Self)
    }
}

impl InventoryApi {
    pub fn new(base_url: &str, client: reqwest::Client) -> AppResult<Self> {
        HttpSource::new("inventory-api", base_url, client).map(Self)
    }
}

impl PolicyApi {
    pub fn new(base_url: &str, client: reqwest::Client) -> AppResult<Self> {
        HttpSource::new("policy-api", base_url, client).map(Self)
    }
}

#[async_trait]
impl Lookup<i64, Order> for OrdersApi {
    fn source_name(&self) -> &str {
        self.0.name()
    }

    async fn fetch(&self, id: &i64) -> AppResult<Option<Order>> {
        self.0.get_json(&["orders", &id.to_string()]).await
    }
}

#[async_trait]
impl Lookup<i64, Invoice> for BillingApi {
    fn source_name(&self) -> &str {
        self.0.name()
    }

    async fn fetch(&self, order_id: &i64) -> AppResult<Option<Invoice>> {
        self.0
            .get_json(&["invoices", "by-order", &order_id.to_string()])
            .await
    }
}

#[async_trait]
impl Lookup<str, InventoryItem> for InventoryApi {
    fn source_name(&self) -> &str {
        self.0.name()
    }

    async fn fetch(&self, sku: &str) -> AppResult<Option<InventoryItem>> {
        self.0.get_json(&["inventory", sku]).await
    }
}

#[async_trait]
impl Lookup<str, Policy> for PolicyApi {
    fn source_name(&self) -> &str {
        self.0.name()
    }

    async fn fetch(&self, key: &str) -> AppResult<Option<Policy>> {
        self.0.get_json(&["policy", key]).await
    }
}

/// The four backend sources the orchestrator consults.
#[derive(Clone)]
pub struct Sources {
    pub orders: Arc<dyn Lookup<i64, Order>>,
    pub invoices: Arc<dyn Lookup<i64, Invoice>>,
    pub inventory: Arc<dyn Lookup<str, InventoryItem>>,
    pub policies: Arc<dyn Lookup<str, Policy>>,
}

impl Sources {
    /// HTTP adapters sharing one connection pool with the backend timeout.
    pub fn from_config(config: &BackendsConfig) -> AppResult<Self> {
        let client = http_client(config.timeout())?;

        Ok(Self {
            orders: Arc::new(OrdersApi::new(&config.orders_url, client.clone())?),
            invoices: Arc::new(BillingApi::new(&config.billing_url, client.clone())?),
            inventory: Arc::new(InventoryApi::new(&config.inventory_url, client.clone())?),
            policies: Arc::new(PolicyApi::new(&config.policy_url, client)?),
        })
    }
}

fn http_client(timeout: Duration) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))
}
