//! Trigram similarity
//!
//! Same measure as PostgreSQL's `pg_trgm`: every alphanumeric word is
//! lowercased and padded with two leading blanks and one trailing blank,
//! split into overlapping 3-character windows, and two strings are compared
//! by the Jaccard index of their trigram sets.
//!
//! ```text
//! "word"  ->  "  w" " wo" "wor" "ord" "rd "
//! ```

use std::collections::HashSet;

/// Set of trigrams of `text`
pub fn trigrams(text: &str) -> HashSet<[char; 3]> {
    let mut set = HashSet::new();

    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }

        let padded: Vec<char> = "  "
            .chars()
            .chain(word.chars().flat_map(char::to_lowercase))
            .chain(std::iter::once(' '))
            .collect();

        for window in padded.windows(3) {
            set.insert([window[0], window[1], window[2]]);
        }
    }

    set
}

/// Similarity in `[0, 1]`; 0 when either side has no trigrams
pub fn similarity(a: &str, b: &str) -> f64 {
    let left = trigrams(a);
    let right = trigrams(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let shared = left.intersection(&right).count();
    let union = left.len() + right.len() - shared;
    shared as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_trigram_extraction() {
        let set = trigrams("word");
        assert_eq!(set.len(), 5);
        assert!(set.contains(&[' ', ' ', 'w']));
        assert!(set.contains(&['r', 'd', ' ']));
    }

    #[test]
    fn test_reference_pairs() {
        // Values reported by pg_trgm's similarity()
        assert!(approx(similarity("word", "two words"), 4.0 / 11.0));
        assert!(approx(similarity("hello", "hello"), 1.0));
        assert!(approx(similarity("Dune", "dune"), 1.0));
    }

    #[test]
    fn test_threshold_behaviour() {
        assert!(similarity("Frank Herbert", "Frank Herbet") >= 0.5);
        assert!(similarity("Frank Herbert", "Ursula Le Guin") < 0.1);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(similarity("", ""), 0.0);
        assert_eq!(similarity("dune", "   "), 0.0);
        assert_eq!(similarity("--", "dune"), 0.0);
    }
}
