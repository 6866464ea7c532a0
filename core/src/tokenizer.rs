use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref RE: Regex = Regex::new(r"\w+").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &["the", "of", "to", "and", "a", "in", "is", "it"];
        words.iter().copied().collect()
    };
}

/// True for the fixed set of words that are never indexed.
pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Tokenize text into lowercase (term, position) pairs.
///
/// Positions count every word run, stop words included, so the gaps left by
/// dropped stop words stay visible to proximity scoring. The iterator is lazy
/// and borrows `text`.
pub fn tokenize(text: &str) -> impl Iterator<Item = (String, usize)> + '_ {
    RE.find_iter(text)
        .enumerate()
        .map(|(pos, mat)| (mat.as_str().to_lowercase(), pos))
        .filter(|(token, _)| !is_stopword(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t: Vec<_> = tokenize("Honda civic, honda FIT!").collect();
        assert_eq!(
            t,
            vec![("honda".to_string(), 0), ("civic".to_string(), 1), ("honda".to_string(), 2), ("fit".to_string(), 3)]
        );
    }

    #[test]
    fn stopwords_keep_their_slot() {
        let t: Vec<_> = tokenize("the car of dreams").collect();
        assert_eq!(t, vec![("car".to_string(), 1), ("dreams".to_string(), 3)]);
    }
}
