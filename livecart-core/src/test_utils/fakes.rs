// File: livecart-core/src/test_utils/fakes.rs
//
// In-memory collaborators for exercising the pipeline without Postgres
// or the order service.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use async_trait::async_trait;

use livecart_common::models::{Comment, CreateOrderRequest, Order, Product};
use livecart_common::traits::repository_traits::CommentRepository;
use crate::Error;
use crate::services::order_service::OrderService;

#[derive(Default)]
pub struct MemoryCommentRepository {
    rows: Mutex<Vec<Comment>>,
    failing: AtomicBool,
}

impl MemoryCommentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent insert fail, as if the store went away.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<Comment> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CommentRepository for MemoryCommentRepository {
    async fn insert_comment(&self, comment: &Comment) -> Result<(), Error> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Database(sqlx::Error::PoolTimedOut));
        }
        self.rows
            .lock()
            .map_err(|_| Error::from("comment store poisoned"))?
            .push(comment.clone());
        Ok(())
    }

    async fn list_session_comments(&self, live_session_id: &str, limit: i64) -> Result<Vec<Comment>, Error> {
        let mut rows: Vec<Comment> = self
            .all()
            .into_iter()
            .filter(|c| c.live_session_id == live_session_id)
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}

/// Catalog plus order endpoint that records every create call.
#[derive(Default)]
pub struct RecordingOrderService {
    catalog: Mutex<HashMap<String, Product>>,
    calls: Mutex<Vec<(String, CreateOrderRequest)>>,
    next_id: AtomicU64,
    fail_orders: AtomicBool,
    /// Simulated latency of the create call.
    latency: Mutex<Option<Duration>>,
}

impl RecordingOrderService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(codes: &[&str]) -> Self {
        let svc = Self::default();
        for code in codes {
            svc.add_product(code, 1000.0);
        }
        svc
    }

    pub fn add_product(&self, code: &str, price: f64) {
        if let Ok(mut catalog) = self.catalog.lock() {
            catalog.insert(code.to_string(), Product {
                id: format!("prod-{}", code.to_lowercase()),
                product_code: code.to_string(),
                price: Some(price),
                stock_quantity: Some(1),
            });
        }
    }

    pub fn set_fail_orders(&self, fail: bool) {
        self.fail_orders.store(fail, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut l) = self.latency.lock() {
            *l = Some(latency);
        }
    }

    pub fn calls(&self) -> Vec<(String, CreateOrderRequest)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl OrderService for RecordingOrderService {
    async fn find_product(&self, product_code: &str) -> Result<Option<Product>, Error> {
        Ok(self
            .catalog
            .lock()
            .map_err(|_| Error::from("catalog poisoned"))?
            .get(product_code)
            .cloned())
    }

    async fn create_order(&self, live_session_id: &str, request: &CreateOrderRequest) -> Result<Order, Error> {
        self.calls
            .lock()
            .map_err(|_| Error::from("call log poisoned"))?
            .push((live_session_id.to_string(), request.clone()));

        let latency = self.latency.lock().ok().and_then(|l| *l);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail_orders.load(Ordering::SeqCst) {
            return Err(Error::Upstream("order service returned 500".into()));
        }

        let price = self
            .catalog
            .lock()
            .ok()
            .and_then(|c| c.get(&request.product_code).and_then(|p| p.price))
            .unwrap_or_default();
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Order {
            order_id: format!("ORD-TEST-{:04}", n),
            product_code: request.product_code.clone(),
            amount: price,
            extra: serde_json::Map::new(),
        })
    }
}
