use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

static HASHTAG_RE: Lazy<Regex> = Lazy::new(|| {
    // braced form first so `#{...}` wins at the same position
    Regex::new(
        r"#\{([^}]*)\}|#([a-zA-Z0-9_\-.@:\u{3040}-\u{309F}\u{30A0}-\u{30FF}\u{3400}-\u{4DBF}\u{4E00}-\u{9FAF}]+)",
    )
    .unwrap()
});

/// Hashtag names referenced by `text`, in order of first appearance.
///
/// Recognises `#name` and `#{multi word name}`. Text inside backtick code
/// spans and fences is ignored. Names come back exactly as written; repeats of
/// the same spelling collapse onto the first one, while different casings are
/// kept apart (case folding is the resolver's job).
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let scanned = mask_code_spans(text);
    let mut seen: HashSet<&str> = HashSet::new();
    let mut names: Vec<String> = Vec::new();

    for cap in HASHTAG_RE.captures_iter(&scanned) {
        let Some(whole) = cap.get(0) else { continue };
        if !opens_hashtag(&scanned, whole.start()) {
            continue;
        }
        let name = match (cap.get(1), cap.get(2)) {
            (Some(braced), _) => braced.as_str().trim(),
            (None, Some(bare)) => bare.as_str(),
            (None, None) => continue,
        };
        if name.is_empty() {
            continue;
        }
        if seen.insert(name) {
            names.push(name.to_string());
        }
    }
    names
}

// `page#anchor` is a fragment, not a tag. Extra `#` (heading noise) is fine.
fn opens_hashtag(text: &str, hash_at: usize) -> bool {
    match text[..hash_at].chars().next_back() {
        Some(c) => !(c.is_ascii_alphanumeric() || c == '_'),
        None => true,
    }
}

/// Replaces every backtick-delimited span (inline code or fenced block) with a
/// single space. A run of N backticks closes only on another run of exactly N;
/// unmatched runs stay as literal text.
fn mask_code_spans(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('`') {
        out.push_str(&rest[..pos]);
        let opening = &rest[pos..];
        let run = backtick_run(opening);
        let body = &opening[run..];
        match find_closing_run(body, run) {
            Some(close) => {
                out.push(' ');
                rest = &body[close + run..];
            }
            None => {
                out.push_str(&opening[..run]);
                rest = body;
            }
        }
    }
    out.push_str(rest);
    out
}

fn backtick_run(s: &str) -> usize {
    s.bytes().take_while(|b| *b == b'`').count()
}

fn find_closing_run(body: &str, run: usize) -> Option<usize> {
    let mut offset = 0;
    while let Some(p) = body[offset..].find('`') {
        let start = offset + p;
        let len = backtick_run(&body[start..]);
        if len == run {
            return Some(start);
        }
        offset = start + len;
    }
    None
}
