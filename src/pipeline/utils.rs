//! String normalization and similarity used for record matching.

/// Normalize a listing title for fingerprinting and comparison:
/// lowercase, punctuation stripped, whitespace collapsed.
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity ratio in [0.0, 1.0] based on Levenshtein distance over chars.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a == 0 || len_b == 0 {
        return 0.0;
    }
    let distance = levenshtein(a, b);
    1.0 - (distance as f64 / len_a.max(len_b) as f64)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    // Two-row rolling DP
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (prev[j + 1] + 1)
                .min(current[j] + 1)
                .min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(
            normalize_title("  Ciment PORTLAND, 50kg (CEM II)  "),
            "ciment portland 50kg cem ii"
        );
    }

    #[test]
    fn identical_strings_have_similarity_one() {
        assert_eq!(similarity("ciment portland", "ciment portland"), 1.0);
    }

    #[test]
    fn empty_string_has_similarity_zero() {
        assert_eq!(similarity("", "ciment"), 0.0);
    }

    #[test]
    fn close_variants_score_high() {
        let score = similarity("ciment portland 50kg", "ciment portland 50 kg");
        assert!(score > 0.9, "score was {score}");
    }

    #[test]
    fn unrelated_titles_score_low() {
        let score = similarity("ciment portland", "villa hammamet");
        assert!(score < 0.5, "score was {score}");
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("chat", "chats"), 1);
        assert_eq!(levenshtein("carrelage", "carrelage"), 0);
        assert_eq!(levenshtein("abc", "xyz"), 3);
    }
}
