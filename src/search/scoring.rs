use crate::posts::repo_types::Post;

use super::tokenizer::strip_html;

const TITLE_EXACT: f64 = 100.0;
const TITLE_CONTAINS_QUERY: f64 = 75.0;
const INDEX_HIT: f64 = 15.0;
/// Partial bonuses only apply to tokens longer than this.
const PARTIAL_MIN_CHARS: usize = 3;
/// The 70% window rule only applies from this length on.
const WINDOW_MIN_CHARS: usize = 5;

struct FieldWeights {
    present: f64,
    partial: f64,
}

const TITLE: FieldWeights = FieldWeights { present: 50.0, partial: 20.0 };
const EXCERPT: FieldWeights = FieldWeights { present: 30.0, partial: 10.0 };
const CONTENT: FieldWeights = FieldWeights { present: 20.0, partial: 5.0 };

/// Levenshtein distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j]
            } else {
                1 + prev[j].min(prev[j + 1]).min(cur[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

fn window_match(word: &[char], token: &str, needed: usize) -> bool {
    word.len() >= needed
        && word
            .windows(needed)
            .any(|w| token.contains(w.iter().collect::<String>().as_str()))
}

/// Best partial-match ratio of `token` against the words of `text`:
/// 0.9 word starts with token, 0.8 token starts with a word of 3+ chars,
/// 0.7 a word shares 70% of the token. Falls back to 0.6 for a word within
/// edit distance `len / 3`, else 0.
pub fn partial_ratio(text: &str, token: &str) -> f64 {
    if text.is_empty() || token.is_empty() {
        return 0.0;
    }
    let token_len = token.chars().count();
    let needed = (token_len * 7).div_ceil(10);

    let mut best: f64 = 0.0;
    for word in text.split_whitespace() {
        if word.starts_with(token) {
            return 0.9;
        }
        let chars: Vec<char> = word.chars().collect();
        if chars.len() >= 3 && token.starts_with(word) {
            best = best.max(0.8);
        } else if token_len >= WINDOW_MIN_CHARS && window_match(&chars, token, needed) {
            best = best.max(0.7);
        }
    }
    if best > 0.0 {
        return best;
    }

    let max_errors = token_len / 3;
    if max_errors == 0 {
        return 0.0;
    }
    let fuzzy = text.split_whitespace().any(|word| {
        let len = word.chars().count();
        len + max_errors >= token_len
            && len <= token_len + max_errors
            && levenshtein(word, token) <= max_errors
    });
    if fuzzy {
        0.6
    } else {
        0.0
    }
}

fn field_score(field: &str, tokens: &[String], weights: &FieldWeights) -> f64 {
    tokens
        .iter()
        .map(|token| {
            let mut score = 0.0;
            if field.contains(token.as_str()) {
                score += weights.present;
            }
            if token.chars().count() > PARTIAL_MIN_CHARS {
                score += partial_ratio(field, token) * weights.partial;
            }
            score
        })
        .sum()
}

/// Relevance of `post` for the raw `query` and its `tokens`. Zero means no match.
pub fn score_post(post: &Post, query: &str, tokens: &[String]) -> f64 {
    let query = query.trim().to_lowercase();
    let title = post.title.to_lowercase();
    let excerpt = post.excerpt.to_lowercase();
    let content = strip_html(&post.content).to_lowercase();

    let mut score = 0.0;
    if title == query {
        score += TITLE_EXACT;
    }
    if !query.is_empty() && title.contains(&query) {
        score += TITLE_CONTAINS_QUERY;
    }
    score += field_score(&title, tokens, &TITLE);
    score += field_score(&excerpt, tokens, &EXCERPT);
    score += field_score(&content, tokens, &CONTENT);
    score += tokens
        .iter()
        .filter(|t| post.search_queries.contains(t))
        .count() as f64
        * INDEX_HIT;
    score
}
