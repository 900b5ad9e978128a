// File: src/services/order_orchestrator.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use livecart_common::models::{CreateOrderRequest, Order};
use crate::Error;
use crate::hub::BroadcastScope;
use crate::lock::{pending_token, ReservationLock, DEFAULT_LOCK_TTL};
use crate::services::keyword_detector::KeywordMatch;
use crate::services::order_service::OrderService;

/// Tunables for the per-comment pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub lock_ttl: Duration,
    /// Upper bound on a single lock backend round trip before the
    /// orchestrator treats the backend as unavailable.
    pub lock_op_timeout: Duration,
    pub broadcast_scope: BroadcastScope,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lock_ttl: DEFAULT_LOCK_TTL,
            lock_op_timeout: Duration::from_millis(500),
            broadcast_scope: BroadcastScope::Session,
        }
    }
}

/// Terminal state of one keyword match.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    Confirmed(Order),
    ProductNotFound,
    LockDenied,
    /// The catalog could not be consulted at all.
    LookupFailed(String),
    OrderRequestFailed(String),
}

impl OrderOutcome {
    pub fn order(&self) -> Option<&Order> {
        match self {
            OrderOutcome::Confirmed(order) => Some(order),
            _ => None,
        }
    }
}

/// Counters over every match the orchestrator has handled.
#[derive(Debug, Default)]
pub struct OrchestratorStats {
    matches: AtomicU64,
    confirmed: AtomicU64,
    product_not_found: AtomicU64,
    lock_denied: AtomicU64,
    lookup_failed: AtomicU64,
    order_failed: AtomicU64,
    lock_degraded: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub matches: u64,
    pub confirmed: u64,
    pub product_not_found: u64,
    pub lock_denied: u64,
    pub lookup_failed: u64,
    pub order_failed: u64,
    /// Orders attempted while the lock backend was unreachable.
    pub lock_degraded: u64,
}

impl OrchestratorStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            matches: self.matches.load(Ordering::Relaxed),
            confirmed: self.confirmed.load(Ordering::Relaxed),
            product_not_found: self.product_not_found.load(Ordering::Relaxed),
            lock_denied: self.lock_denied.load(Ordering::Relaxed),
            lookup_failed: self.lookup_failed.load(Ordering::Relaxed),
            order_failed: self.order_failed.load(Ordering::Relaxed),
            lock_degraded: self.lock_degraded.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// What the lock attempt left us holding.
enum LockState {
    Held(String),
    Degraded,
}

/// Drives one keyword match through lookup, reservation and order
/// creation. The lock is taken before the order call and released if the
/// call fails, so two concurrent matches for one product cannot both reach
/// the order service.
pub struct OrderOrchestrator {
    orders: Arc<dyn OrderService>,
    lock: Arc<dyn ReservationLock>,
    config: PipelineConfig,
    stats: OrchestratorStats,
}

impl OrderOrchestrator {
    pub fn new(
        orders: Arc<dyn OrderService>,
        lock: Arc<dyn ReservationLock>,
        config: PipelineConfig,
    ) -> Self {
        info!("OrderOrchestrator using '{}' reservation lock, ttl {:?}", lock.backend(), config.lock_ttl);
        Self {
            orders,
            lock,
            config,
            stats: OrchestratorStats::default(),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn handle_match(
        &self,
        live_session_id: &str,
        customer_name: &str,
        keyword: &KeywordMatch,
    ) -> OrderOutcome {
        OrchestratorStats::bump(&self.stats.matches);
        let code = keyword.product_code.as_str();

        let product = match self.orders.find_product(code).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                debug!(session_id = %live_session_id, product_code = %code, "Unknown product code; ignoring.");
                OrchestratorStats::bump(&self.stats.product_not_found);
                return OrderOutcome::ProductNotFound;
            }
            Err(e) => {
                error!(session_id = %live_session_id, product_code = %code, "Catalog lookup failed: {}", e);
                OrchestratorStats::bump(&self.stats.lookup_failed);
                return OrderOutcome::LookupFailed(e.to_string());
            }
        };

        let token = pending_token();
        let attempt = timeout(
            self.config.lock_op_timeout,
            self.lock.acquire(&product.id, &token, self.config.lock_ttl),
        )
        .await
        .map_err(Error::from)
        .and_then(|r| r);
        let state = match attempt {
            Ok(true) => LockState::Held(token),
            Ok(false) => {
                debug!(session_id = %live_session_id, product_code = %code, "Product already reserved.");
                OrchestratorStats::bump(&self.stats.lock_denied);
                return OrderOutcome::LockDenied;
            }
            Err(e) => {
                warn!(degraded = true, backend = self.lock.backend(), product_code = %code,
                    "Reservation lock unavailable, ordering without duplicate suppression: {}", e);
                OrchestratorStats::bump(&self.stats.lock_degraded);
                LockState::Degraded
            }
        };

        let request = CreateOrderRequest::from_comment(&product.product_code, customer_name);
        match self.orders.create_order(live_session_id, &request).await {
            Ok(order) => {
                if let LockState::Held(token) = &state {
                    match self.lock.confirm(&product.id, token, &order.order_id).await {
                        Ok(true) => {}
                        Ok(false) => warn!(product_code = %code, order_id = %order.order_id,
                            "Reservation expired before the order was confirmed."),
                        Err(e) => warn!(product_code = %code, order_id = %order.order_id,
                            "Could not record order id on reservation: {}", e),
                    }
                }
                info!(session_id = %live_session_id, product_code = %code, order_id = %order.order_id,
                    customer = %customer_name, "Order created from live comment.");
                OrchestratorStats::bump(&self.stats.confirmed);
                OrderOutcome::Confirmed(order)
            }
            Err(e) => {
                error!(session_id = %live_session_id, product_code = %code, "Order creation failed: {}", e);
                if let LockState::Held(token) = &state {
                    if let Err(e) = self.lock.release(&product.id, token).await {
                        warn!(product_code = %code, "Failed to release reservation after order failure: {}", e);
                    }
                }
                OrchestratorStats::bump(&self.stats.order_failed);
                OrderOutcome::OrderRequestFailed(e.to_string())
            }
        }
    }
}
