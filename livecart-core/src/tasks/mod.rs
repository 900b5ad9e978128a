// File: src/tasks/mod.rs

pub mod lock_maintenance;
