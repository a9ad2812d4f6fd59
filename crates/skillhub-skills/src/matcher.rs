//! Keyword tokenizer and relevance scorer

use std::collections::HashSet;

/// Weight of one priority unit; far below the smallest gap between base scores
pub const PRIORITY_WEIGHT: f64 = 0.001;

/// Below this length, tokens and keywords only match exactly
const MIN_FUZZY_LEN: usize = 3;

/// English and French function words ignored when tokenizing
const STOP_WORDS: &[&str] = &[
    // English
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "shall", "should", "may", "might", "must", "can",
    "could", "of", "to", "in", "for", "on", "with", "at", "by", "from", "as", "into", "about",
    "it", "its", "this", "that", "and", "or", "not", "no", "but", "if", "so", "my", "me", "i",
    "we", "you", "he", "she", "they",
    // French
    "le", "la", "les", "un", "une", "des", "du", "de", "et", "ou", "en", "dans", "sur", "par",
    "pour", "avec", "ce", "cette", "ces", "je", "tu", "il", "elle", "nous", "vous", "ils",
    "elles", "est", "sont", "ai", "au", "aux",
];

/// Result of scoring one keyword list against a context
#[derive(Debug, Clone, PartialEq)]
pub struct MatchScore {
    /// Matched fraction of keywords plus the priority bonus
    pub score: f64,
    /// Matched keywords, lowercased, in declaration order
    pub matched_keywords: Vec<String>,
    /// Tokens extracted from the context
    pub context_tokens: HashSet<String>,
}

/// Split free text into a set of lowercase, punctuation-free, non-stop-word tokens
#[must_use]
pub fn tokenize(text: &str) -> HashSet<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Score a context against a keyword list
///
/// A keyword matches when some token equals it, or, when both are at least
/// three characters long, when either contains the other.
#[must_use]
pub fn score(context: &str, keywords: &[String], priority: f64) -> MatchScore {
    let context_tokens = tokenize(context);
    if context_tokens.is_empty() || keywords.is_empty() {
        return MatchScore {
            score: 0.0,
            matched_keywords: Vec::new(),
            context_tokens,
        };
    }

    let matched_keywords: Vec<String> = keywords
        .iter()
        .map(|kw| kw.to_lowercase())
        .filter(|kw| context_tokens.iter().any(|token| token_matches(token, kw)))
        .collect();

    // Priority only breaks ties between skills that matched something
    let score = if matched_keywords.is_empty() {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let base = matched_keywords.len() as f64 / keywords.len() as f64;
        base + priority * PRIORITY_WEIGHT
    };

    MatchScore {
        score,
        matched_keywords,
        context_tokens,
    }
}

fn token_matches(token: &str, keyword: &str) -> bool {
    if token == keyword {
        return true;
    }
    if token.chars().count() < MIN_FUZZY_LEN || keyword.chars().count() < MIN_FUZZY_LEN {
        return false;
    }
    token.contains(keyword) || keyword.contains(token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn kws(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| (*w).to_string()).collect()
    }

    #[test]
    fn test_tokenize_lowercases_and_strips_stop_words() {
        let tokens = tokenize("Create a React component for the authentication");
        assert!(tokens.contains("create"));
        assert!(tokens.contains("react"));
        assert!(tokens.contains("authentication"));
        assert!(!tokens.contains("a"));
        assert!(!tokens.contains("the"));
        assert!(!tokens.contains("for"));
    }

    #[test]
    fn test_tokenize_keeps_hyphens() {
        let tokens = tokenize("react-testing-library, vitest!");
        assert!(tokens.contains("react-testing-library"));
        assert!(tokens.contains("vitest"));
    }

    #[test]
    fn test_tokenize_only_stop_words() {
        assert!(tokenize("the a an is").is_empty());
        assert!(tokenize("je suis dans la maison").contains("maison"));
        assert!(tokenize("le la les et ou").is_empty());
    }

    #[test]
    fn test_tokenize_is_idempotent() {
        let once = tokenize("Set up OAuth2 login (with Keycloak) -- please!");
        let joined: Vec<_> = once.iter().cloned().collect();
        let twice = tokenize(&joined.join(" "));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_exact_matches() {
        let result = score("react component", &kws(&["react", "component", "hook"]), 0.0);
        assert!((result.score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(result.matched_keywords, vec!["react", "component"]);
    }

    #[test]
    fn test_fuzzy_containment_both_directions() {
        let result = score("authentication", &kws(&["auth"]), 0.0);
        assert_eq!(result.matched_keywords, vec!["auth"]);

        let result = score("auth", &kws(&["authentication"]), 0.0);
        assert_eq!(result.matched_keywords, vec!["authentication"]);
    }

    #[test]
    fn test_short_tokens_need_exact_match() {
        assert_eq!(score("ui", &kws(&["ux"]), 0.0).score, 0.0);
        assert_eq!(score("db", &kws(&["dbs"]), 0.0).score, 0.0);
        assert!((score("ui", &kws(&["ui"]), 0.0).score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_priority_is_an_exact_offset() {
        let low = score("react component", &kws(&["react", "component"]), 0.0);
        let high = score("react component", &kws(&["react", "component"]), 7.0);
        assert!((high.score - low.score - 7.0 * PRIORITY_WEIGHT).abs() < 1e-9);
    }

    #[test]
    fn test_zero_when_nothing_matches() {
        let result = score("database migration", &kws(&["react", "testing"]), 0.0);
        assert_eq!(result.score, 0.0);
        assert!(result.matched_keywords.is_empty());
        assert_eq!(score("", &kws(&["react"]), 0.0).score, 0.0);
        assert_eq!(score("react", &[], 0.0).score, 0.0);
    }

    #[test]
    fn test_priority_never_rescues_a_non_match() {
        let result = score("database", &kws(&["react"]), 500.0);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_keywords_are_case_folded() {
        let result = score("graphql schema", &kws(&["GraphQL"]), 0.0);
        assert_eq!(result.matched_keywords, vec!["graphql"]);
    }
}
