use std::{cmp::Ordering, collections::HashSet, time::Duration};

use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::{scoring::score_post, tokenizer::tokenize};
use crate::{
    error::{with_deadline, AppResult},
    posts::repo_types::Post,
    store::{DocumentStore, MAX_MATCH_TERMS},
};

/// Candidates fetched per requested result, from each source.
const CANDIDATE_FACTOR: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct SearchCandidate {
    pub post: Post,
    pub score: f64,
}

/// Scores `candidates`, drops non-matches and keeps the best `limit`.
/// Equal scores keep retrieval order.
pub fn rank(candidates: Vec<Post>, query: &str, tokens: &[String], limit: usize) -> Vec<SearchCandidate> {
    let mut scored: Vec<SearchCandidate> = candidates
        .into_iter()
        .map(|post| {
            let score = score_post(&post, query, tokens);
            SearchCandidate { post, score }
        })
        .filter(|c| c.score > 0.0)
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(limit);
    scored
}

async fn run(store: &dyn DocumentStore, query: &str, limit: usize, timeout: Duration) -> AppResult<Vec<Post>> {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return with_deadline("store recent posts", timeout, store.recent_published_posts(limit)).await;
    }

    let pool = limit.saturating_mul(CANDIDATE_FACTOR);
    let mut candidates =
        with_deadline("store recent posts", timeout, store.recent_published_posts(pool)).await?;
    let terms: Vec<String> = tokens.iter().take(MAX_MATCH_TERMS).cloned().collect();
    let hits = with_deadline(
        "store posts matching terms",
        timeout,
        store.posts_matching_any(&terms, pool),
    )
    .await?;

    let mut seen: HashSet<_> = candidates.iter().map(|p| p.id).collect();
    candidates.extend(hits.into_iter().filter(|p| seen.insert(p.id)));
    debug!(candidates = candidates.len(), tokens = tokens.len(), "scoring candidates");

    Ok(rank(candidates, query, &tokens, limit)
        .into_iter()
        .map(|c| c.post)
        .collect())
}

/// Ranked published posts for `query`. An empty query lists recent posts.
/// Store failures degrade to an empty list.
#[instrument(skip(store, timeout))]
pub async fn search(store: &dyn DocumentStore, query: &str, limit: usize, timeout: Duration) -> Vec<Post> {
    match run(store, query.trim(), limit, timeout).await {
        Ok(posts) => posts,
        Err(e) => {
            warn!(query, error = %e, "search failed, returning no results");
            Vec::new()
        }
    }
}
