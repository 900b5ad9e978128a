// File: livecart-common/src/models/mod.rs
pub mod platform;
pub mod comment;
pub mod order;

pub use platform::Platform;
pub use comment::{Comment, RawComment};
pub use order::{CreateOrderRequest, Order, PaymentMethod, Product};
