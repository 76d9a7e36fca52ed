mod articles;
mod digests;
mod kv;
mod logs;
mod schema;
mod types;

pub use schema::Database;
pub use types::{
    Article, ArticleQuery, ArticleSort, ArticleStatus, CollectLog, DatabaseError, Digest, Edition,
    FeedCategory, NewArticle, SourceCount,
};
