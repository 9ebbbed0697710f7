const STOPWORDS: &[&str] = &[
    "a", "an", "and", "at", "for", "in", "my", "of", "on", "the", "to", "with",
];

/// Lowercased words of `text`, without stopwords and single characters.
fn tokens(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|token| token.chars().count() > 1 && !STOPWORDS.contains(&token.as_str()))
        .collect()
}

fn overlap_score(query: &[String], candidate: &str) -> usize {
    let candidate_tokens = tokens(candidate);
    query
        .iter()
        .filter(|token| {
            candidate_tokens
                .iter()
                .any(|other| other.contains(token.as_str()) || token.contains(other.as_str()))
        })
        .count()
}

/// Index of the candidate sharing the most tokens with `target`.
///
/// A query token counts when it is contained in, or contains, some candidate token.
/// Stopwords and single characters are ignored on both sides.
/// Ties go to the earliest candidate; no overlap at all yields `None`.
pub fn best_match<S: AsRef<str>>(target: &str, candidates: &[S]) -> Option<usize> {
    let query = tokens(target);
    if query.is_empty() {
        return None;
    }

    let mut best: Option<(usize, usize)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let score = overlap_score(&query, candidate.as_ref());
        if score == 0 {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((index, score)),
        }
    }

    best.map(|(index, _)| index)
}
