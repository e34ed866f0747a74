//! Fuzzy post search over a store that only offers exact array membership.
//!
//! Posts carry a precomputed `search_queries` index ([`tokenizer::expand_post`]);
//! a query pulls a bounded candidate set (recent posts plus index hits) and
//! [`scoring::score_post`] ranks it in memory.

mod dto;
pub mod engine;
pub mod handlers;
pub mod scoring;
pub mod tokenizer;

pub use engine::{rank, search, SearchCandidate};

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::search_routes()
}
