use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::store::MAX_MATCH_TERMS;

pub const MIN_TOKEN_CHARS: usize = 3;
/// Tokens longer than this also index their prefixes.
const PREFIX_FROM_CHARS: usize = 4;
const DOUBLED_CONSONANTS: [char; 7] = ['l', 'r', 's', 't', 'p', 'n', 'm'];

lazy_static! {
    static ref TAG: Regex = Regex::new(r"<[^>]*>").expect("valid tag regex");
}

/// Replaces markup tags with spaces so adjacent words don't fuse.
pub fn strip_html(content: &str) -> String {
    TAG.replace_all(content, " ").into_owned()
}

fn push_unique(out: &mut Vec<String>, seen: &mut HashSet<String>, term: String) {
    if term.chars().count() >= MIN_TOKEN_CHARS && seen.insert(term.clone()) {
        out.push(term);
    }
}

/// Lowercase alphanumeric words of at least three characters, first-seen order.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for word in cleaned.split_whitespace() {
        push_unique(&mut out, &mut seen, word.to_string());
    }
    out
}

fn collapse_runs(term: &str) -> Option<String> {
    let mut out = String::with_capacity(term.len());
    let mut prev = None;
    let mut collapsed = false;
    for c in term.chars() {
        if prev == Some(c) {
            collapsed = true;
            continue;
        }
        out.push(c);
        prev = Some(c);
    }
    collapsed.then_some(out)
}

/// Spelling variants of one token: prefixes, collapsed doubles, first-letter
/// doubling and vowel swaps, in that order.
fn variants(term: &str) -> Vec<String> {
    let mut out = vec![term.to_string()];
    let chars: Vec<char> = term.chars().collect();

    if chars.len() > PREFIX_FROM_CHARS {
        for end in MIN_TOKEN_CHARS..chars.len() {
            out.push(chars[..end].iter().collect());
        }
    }
    if let Some(single) = collapse_runs(term) {
        out.push(single);
    }
    for letter in DOUBLED_CONSONANTS {
        if term.contains(letter) {
            out.push(term.replacen(letter, &format!("{letter}{letter}"), 1));
        }
    }
    if term.contains('a') {
        out.push(term.replace('a', "e"));
    }
    if term.contains('e') {
        out.push(term.replace('e', "a"));
    }
    if term.contains('i') {
        out.push(term.replace('i', "y"));
    }
    out
}

/// Index terms for `text`, at most [`MAX_MATCH_TERMS`]. Earlier words win the
/// cut, so callers put the title first.
pub fn expand_for_indexing(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for token in tokenize(text) {
        for variant in variants(&token) {
            push_unique(&mut out, &mut seen, variant);
        }
        if out.len() >= MAX_MATCH_TERMS {
            break;
        }
    }
    out.truncate(MAX_MATCH_TERMS);
    out
}

pub fn expand_post(title: &str, excerpt: &str, content: &str) -> Vec<String> {
    expand_for_indexing(&format!("{title} {excerpt} {}", strip_html(content)))
}
