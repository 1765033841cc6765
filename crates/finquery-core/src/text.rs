//! Text folding and tokenization shared by the resolvers.
//!
//! Every folding function maps one input `char` to exactly one output `char`,
//! so character offsets computed on folded text index straight back into the
//! original text. Resolvers rely on this to report original-case fragments.

/// Lowercases a single char, keeping the char count stable.
#[must_use]
pub fn fold_char(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Lowercases text char-by-char.
#[must_use]
pub fn fold_case(s: &str) -> String {
    s.chars().map(fold_char).collect()
}

/// Folds text for whole-word matching.
///
/// Alphanumerics are lowercased, `&` is kept (`at&t`, `j&j`), and every other
/// char becomes a space.
#[must_use]
pub fn fold_for_match(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                fold_char(c)
            } else if c == '&' {
                c
            } else {
                ' '
            }
        })
        .collect()
}

/// Normalizes a table phrase (alias, override) into its canonical spaced form.
#[must_use]
pub fn normalize_phrase(s: &str) -> String {
    fold_for_match(s).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapses runs of whitespace into single spaces and trims the ends.
#[must_use]
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A word of folded text with its character span.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    /// Folded token text.
    pub text: String,
    /// Character offset of the first char.
    pub start: usize,
    /// Character offset one past the last char.
    pub end: usize,
}

/// Splits text into folded words with character spans.
#[must_use]
pub fn tokenize(s: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut start = 0;

    for (i, c) in fold_for_match(s).chars().enumerate() {
        if c == ' ' {
            if !current.is_empty() {
                tokens.push(Token {
                    text: std::mem::take(&mut current),
                    start,
                    end: i,
                });
            }
        } else {
            if current.is_empty() {
                start = i;
            }
            current.push(c);
        }
    }

    if !current.is_empty() {
        let end = start + current.chars().count();
        tokens.push(Token {
            text: current,
            start,
            end,
        });
    }

    tokens
}

/// Returns the chars of `s` in the character span `start..end`.
#[must_use]
pub fn char_slice(s: &str, start: usize, end: usize) -> String {
    s.chars().skip(start).take(end.saturating_sub(start)).collect()
}

/// Converts a byte offset into a character offset.
#[must_use]
pub fn char_offset(s: &str, byte: usize) -> usize {
    s.get(..byte).map_or_else(|| s.chars().count(), |prefix| prefix.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_keeps_char_count() {
        let s = "İSTANBUL Straße ÅB";
        assert_eq!(fold_case(s).chars().count(), s.chars().count());
        assert_eq!(fold_for_match(s).chars().count(), s.chars().count());
    }

    #[test]
    fn test_fold_for_match() {
        assert_eq!(fold_for_match("Apple's P/E"), "apple s p e");
        assert_eq!(fold_for_match("AT&T"), "at&t");
    }

    #[test]
    fn test_normalize_phrase() {
        assert_eq!(normalize_phrase("  Apple,  Inc. "), "apple inc");
        assert_eq!(normalize_phrase("McDonald's"), "mcdonald s");
        assert_eq!(normalize_phrase("Johnson & Johnson"), "johnson & johnson");
    }

    #[test]
    fn test_tokenize_spans() {
        let tokens = tokenize("Compare Apple, Microsoft");
        let words: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(words, vec!["compare", "apple", "microsoft"]);
        assert_eq!((tokens[1].start, tokens[1].end), (8, 13));
        assert_eq!((tokens[2].start, tokens[2].end), (15, 24));
    }

    #[test]
    fn test_tokenize_empty_and_punctuation() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("?!... --").is_empty());
    }

    #[test]
    fn test_char_helpers() {
        let s = "Ünïcode revenue";
        assert_eq!(char_slice(s, 8, 15), "revenue");
        let byte = s.find("revenue").unwrap();
        assert_eq!(char_offset(s, byte), 8);
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \t b\n\nc "), "a b c");
    }
}
