// src/repositories/postgres/mod.rs

pub mod comments;

pub use comments::PostgresCommentRepository;
