use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static DOLLAR_SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([a-zA-Z0-9]{2,10})").expect("invalid symbol pattern"));

static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s-]").expect("invalid punctuation pattern"));

static WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-zA-Z0-9-]{2,20}\b").expect("invalid word pattern"));

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
        "because", "been", "but", "by", "can", "compare", "could", "did", "do", "does", "doing",
        "for", "from", "further", "had", "has", "have", "having", "he", "her", "how", "i", "if",
        "in", "into", "is", "it", "its", "just", "latest", "me", "more", "my", "no", "not", "now",
        "of", "on", "or", "our", "price", "risk", "risky", "safe", "should", "so", "some", "tell",
        "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "to",
        "today", "tomorrow", "up", "us", "versus", "vs", "was", "we", "were", "what", "when",
        "where", "which", "who", "why", "will", "with", "would", "yesterday", "you", "your",
        "ytd", "tmr", "tmrw",
        // contractions collapse to these once apostrophes are stripped
        "hows", "whats", "wheres", "whens", "whys", "whos",
    ]
    .into_iter()
    .collect()
});

/// Extracts token names and symbols from free-form chat text.
///
/// `$SYMBOL` forms are collected first and removed so they are not counted
/// twice, then remaining words are filtered against the stop-word list.
/// The result is lowercase, deduplicated and in order of first appearance.
pub fn extract_tokens(input: &str) -> Vec<String> {
    if input.trim().is_empty() {
        return Vec::new();
    }

    let normalized = input.to_lowercase();

    let dollar_symbols: Vec<String> = DOLLAR_SYMBOL
        .captures_iter(&normalized)
        .map(|c| c[1].to_string())
        .collect();
    let without_symbols = DOLLAR_SYMBOL.replace_all(&normalized, "");

    // Strip punctuation aggressively, apostrophes included, so "how's"
    // becomes "hows" and lands in the stop-word list.
    let stripped = PUNCTUATION.replace_all(&without_symbols, "");

    let words = WORD
        .find_iter(&stripped)
        .map(|m| m.as_str())
        .filter(|w| !STOP_WORDS.contains(w) && !w.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string);

    let mut seen = HashSet::new();
    let tokens: Vec<String> = dollar_symbols
        .into_iter()
        .chain(words)
        .filter(|t| seen.insert(t.clone()))
        .collect();

    log::debug!("extracted tokens {:?} from query {:?}", tokens, input);
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollar_symbols_come_first_in_order() {
        assert_eq!(extract_tokens("what about $ETH vs $SOL"), vec!["eth", "sol"]);
    }

    #[test]
    fn plain_words_survive_stop_word_filter() {
        assert_eq!(
            extract_tokens("should I buy bitcoin today?"),
            vec!["buy", "bitcoin"]
        );
    }

    #[test]
    fn contractions_are_neutralized() {
        assert_eq!(extract_tokens("how's eth doing?"), vec!["eth"]);
    }

    #[test]
    fn duplicates_are_removed_preserving_order() {
        assert_eq!(
            extract_tokens("$eth or eth or maybe $sol"),
            vec!["eth", "maybe", "sol"]
        );
    }

    #[test]
    fn pure_numbers_are_dropped() {
        assert_eq!(
            extract_tokens("is 10000 too much for btc"),
            vec!["too", "much", "btc"]
        );
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert!(extract_tokens("").is_empty());
        assert!(extract_tokens("   ").is_empty());
    }

    #[test]
    fn one_character_words_are_ignored() {
        assert_eq!(extract_tokens("x $b eth"), vec!["eth"]);
    }
}
