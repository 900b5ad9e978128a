// src/lib.rs

pub mod db;
pub mod repositories;
pub mod platforms;
pub mod lock;
pub mod hub;
pub mod services;
pub mod tasks;
pub mod test_utils;

pub use db::Database;
pub use livecart_common::error::Error;
