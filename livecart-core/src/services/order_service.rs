// File: src/services/order_service.rs

use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use livecart_common::models::{CreateOrderRequest, Order, Product};
use crate::Error;

/// The external order/catalog service, reduced to the two calls the
/// pipeline makes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Catalog lookup by product code. `Ok(None)` when the code is unknown.
    async fn find_product(&self, product_code: &str) -> Result<Option<Product>, Error>;

    /// Creates one order linked to the live session.
    async fn create_order(&self, live_session_id: &str, request: &CreateOrderRequest) -> Result<Order, Error>;
}

pub struct HttpOrderService {
    http: Client,
    base_url: String,
}

impl HttpOrderService {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: &str) -> Result<Self, Error> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl OrderService for HttpOrderService {
    async fn find_product(&self, product_code: &str) -> Result<Option<Product>, Error> {
        let url = format!("{}/api/products/code/{}", self.base_url, product_code);
        let resp = self.http.get(&url).send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(%product_code, "Catalog has no such product.");
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Error::Upstream(format!(
                "product lookup for {} returned {}",
                product_code,
                resp.status()
            )));
        }
        Ok(Some(resp.json::<Product>().await?))
    }

    async fn create_order(&self, live_session_id: &str, request: &CreateOrderRequest) -> Result<Order, Error> {
        let url = format!("{}/api/orders/", self.base_url);
        let resp = self
            .http
            .post(&url)
            .query(&[("live_session_id", live_session_id)])
            .json(request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!("order creation returned {}: {}", status, body)));
        }
        Ok(resp.json::<Order>().await?)
    }
}
