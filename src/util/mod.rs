//! Small shared utilities: article id generation and URL hashing.

mod ids;

pub use ids::{generate_article_id, hash_url};
