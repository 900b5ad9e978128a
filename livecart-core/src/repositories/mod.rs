// src/repositories/mod.rs

pub mod postgres;

pub use livecart_common::traits::repository_traits::CommentRepository;
pub use postgres::comments::PostgresCommentRepository;
