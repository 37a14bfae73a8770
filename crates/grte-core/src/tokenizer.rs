//! # Tokenizers
//!
//! Tokenization with character offsets, so that annotated character spans
//! can be mapped onto token spans and decoded token spans back onto text.
//! Every encoding starts with a `[CLS]` sentinel and ends with a `[SEP]`
//! sentinel; both carry the empty offset `(0, 0)`.

use std::path::Path;

use regex::Regex;
use tokenizers::Tokenizer as HfInner;

use crate::error::{GrteError, Result};
use crate::types::TokenSpan;
use crate::vocab::Vocab;

pub const CLS_TOKEN: &str = "[CLS]";
pub const SEP_TOKEN: &str = "[SEP]";

/// Shortest encoding: the two sentinels.
pub const MIN_LEN: usize = 2;

/// A token with its character offsets in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The token text content
    pub text: String,
    /// Start character offset in the original string
    pub start: usize,
    /// End character offset (exclusive) in the original string
    pub end: usize,
    /// Token index in the sequence
    pub index: usize,
    /// Whether this is a sentinel with no source text
    pub special: bool,
}

/// Token ids and tokens of one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    pub ids: Vec<u32>,
    pub tokens: Vec<Token>,
}

impl Encoding {
    /// Number of tokens including sentinels.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Map a character span `[start, end)` onto the tokens it covers.
    ///
    /// The span must start at the start of its first token and end at the
    /// end of its last one. Fails when the span is empty, cuts through a
    /// token, or no non-special token overlaps it (the mention was truncated
    /// away).
    pub fn resolve_span(&self, start: usize, end: usize) -> Result<TokenSpan> {
        let failure = |reason: String| GrteError::SpanResolution { start, end, reason };
        if start >= end {
            return Err(failure("empty character span".into()));
        }

        let mut covered = self
            .tokens
            .iter()
            .filter(|t| !t.special && t.start < end && t.end > start);

        let first = covered.next().ok_or_else(|| {
            failure(format!("no token overlaps the span among {} tokens", self.len()))
        })?;
        let last = covered.last().unwrap_or(first);
        if first.start != start || last.end != end {
            return Err(failure(format!(
                "span does not align with token boundaries [{}, {})",
                first.start, last.end
            )));
        }
        Ok(TokenSpan::new(first.index, last.index))
    }

    /// Character range `[start, end)` covered by a token span.
    pub fn char_range(&self, span: TokenSpan) -> Option<(usize, usize)> {
        let first = self.tokens.get(span.start)?;
        let last = self.tokens.get(span.end)?;
        if first.special || last.special || first.start >= last.end {
            return None;
        }
        Some((first.start, last.end))
    }
}

/// A tokenizer that keeps character offsets.
pub trait SpanTokenizer {
    /// Tokenize `text`, truncating to at most `max_len` tokens including the
    /// sentinels. The trailing `[SEP]` is kept when truncating, and a
    /// `max_len` below [`MIN_LEN`] is raised to it.
    fn encode(&self, text: &str, max_len: usize) -> Result<Encoding>;
}

fn truncate(encoding: &mut Encoding, max_len: usize) {
    let max_len = max_len.max(MIN_LEN);
    if encoding.len() <= max_len {
        return;
    }
    let last_id = encoding.ids.pop();
    let last_token = encoding.tokens.pop();
    encoding.ids.truncate(max_len - 1);
    encoding.tokens.truncate(max_len - 1);
    if let (Some(id), Some(mut token)) = (last_id, last_token) {
        token.index = encoding.tokens.len();
        encoding.ids.push(id);
        encoding.tokens.push(token);
    }
}

/// Word-level tokenizer: runs of word characters and single punctuation
/// marks, mapped to ids through a [`Vocab`]. Han characters are split one
/// per token, as there are no spaces between Chinese words.
#[derive(Debug, Clone)]
pub struct WordTokenizer {
    pattern: Regex,
    vocab: Vocab,
    lowercase: bool,
}

impl WordTokenizer {
    /// Create a lowercasing tokenizer over `vocab`.
    pub fn new(vocab: Vocab) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(r"\p{Han}|[\w--\p{Han}]+|[^\w\s]")?,
            vocab,
            lowercase: true,
        })
    }

    /// Keep the original casing of words.
    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    fn normalize(&self, word: &str) -> String {
        if self.lowercase {
            word.to_lowercase()
        } else {
            word.to_string()
        }
    }

    /// Normalized words of `text`, without sentinels.
    pub fn words(&self, text: &str) -> Vec<String> {
        self.pattern
            .find_iter(text)
            .map(|m| self.normalize(m.as_str()))
            .collect()
    }

    fn sentinel(&self, text: &str, index: usize) -> (u32, Token) {
        let id = self.vocab.id(text).unwrap_or(crate::vocab::UNK_ID);
        let token = Token {
            text: text.to_string(),
            start: 0,
            end: 0,
            index,
            special: true,
        };
        (id, token)
    }
}

impl SpanTokenizer for WordTokenizer {
    fn encode(&self, text: &str, max_len: usize) -> Result<Encoding> {
        let (cls_id, cls) = self.sentinel(CLS_TOKEN, 0);
        let mut tokens = vec![cls];

        // Regex offsets are bytes; walk forward once to turn them into chars.
        let mut byte_pos = 0;
        let mut char_pos = 0;
        for m in self.pattern.find_iter(text) {
            char_pos += text[byte_pos..m.start()].chars().count();
            let start = char_pos;
            char_pos += m.as_str().chars().count();
            byte_pos = m.end();

            tokens.push(Token {
                text: self.normalize(m.as_str()),
                start,
                end: char_pos,
                index: tokens.len(),
                special: false,
            });
        }

        let (sep_id, sep) = self.sentinel(SEP_TOKEN, tokens.len());
        tokens.push(sep);

        let mut ids = Vec::with_capacity(tokens.len());
        ids.push(cls_id);
        ids.extend(self.vocab.map(
            &tokens[1..tokens.len() - 1]
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>(),
        ));
        ids.push(sep_id);

        let mut encoding = Encoding { ids, tokens };
        truncate(&mut encoding, max_len);
        Ok(encoding)
    }
}

/// Subword tokenizer backed by a Hugging Face `tokenizer.json`.
pub struct HfTokenizer {
    inner: HfInner,
}

impl HfTokenizer {
    /// Load from a `tokenizer.json` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let inner = HfInner::from_file(path.as_ref())
            .map_err(|e| GrteError::Tokenizer(e.to_string()))?;
        Ok(Self { inner })
    }

    pub fn from_tokenizer(inner: HfInner) -> Self {
        Self { inner }
    }
}

impl SpanTokenizer for HfTokenizer {
    fn encode(&self, text: &str, max_len: usize) -> Result<Encoding> {
        let encoded = self
            .inner
            .encode_char_offsets(text, true)
            .map_err(|e| GrteError::Tokenizer(format!("Tokenize error: {e}")))?;

        let special = encoded.get_special_tokens_mask();
        let tokens = encoded
            .get_tokens()
            .iter()
            .zip(encoded.get_offsets())
            .enumerate()
            .map(|(index, (text, &(start, end)))| {
                let is_special = special.get(index).copied().unwrap_or(0) == 1;
                Token {
                    text: text.clone(),
                    start: if is_special { 0 } else { start },
                    end: if is_special { 0 } else { end },
                    index,
                    special: is_special,
                }
            })
            .collect();

        let mut encoding = Encoding {
            ids: encoded.get_ids().to_vec(),
            tokens,
        };
        truncate(&mut encoding, max_len);
        Ok(encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokenizers::models::wordlevel::WordLevel;
    use tokenizers::pre_tokenizers::whitespace::Whitespace;
    use tokenizers::processors::bert::BertProcessing;

    fn tokenizer() -> WordTokenizer {
        let counter: HashMap<String, usize> = [("alice", 2), ("paris", 1), ("[CLS]", 1)]
            .iter()
            .map(|(w, c)| (w.to_string(), *c))
            .collect();
        WordTokenizer::new(Vocab::from_counter(&counter, 0)).unwrap()
    }

    /// Whitespace word-level tokenizer with BERT sentinels.
    fn hf_tokenizer() -> HfTokenizer {
        let words = ["[PAD]", "[UNK]", "[CLS]", "[SEP]", "Alice", "lives", "in"];
        let vocab: HashMap<String, u32> = words
            .iter()
            .enumerate()
            .map(|(id, w)| (w.to_string(), id as u32))
            .collect();
        let model = WordLevel::builder()
            .vocab(vocab)
            .unk_token("[UNK]".into())
            .build()
            .unwrap();

        let processor = BertProcessing::new(("[SEP]".into(), 3), ("[CLS]".into(), 2));
        let mut inner = HfInner::new(model);
        inner
            .with_pre_tokenizer(Whitespace)
            .with_post_processor(processor);
        HfTokenizer::from_tokenizer(inner)
    }

    fn texts(enc: &Encoding) -> Vec<&str> {
        enc.tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_encode_adds_sentinels() {
        let enc = tokenizer().encode("Alice lives in Paris.", 64).unwrap();
        assert_eq!(
            texts(&enc),
            vec!["[CLS]", "alice", "lives", "in", "paris", ".", "[SEP]"]
        );
        assert!(enc.tokens[0].special);
        assert!(enc.tokens[6].special);
        assert_eq!(enc.ids.len(), enc.tokens.len());
        assert_eq!(enc.tokens[4].start, 15);
        assert_eq!(enc.tokens[4].end, 20);
        assert_eq!(enc.ids[2], crate::vocab::UNK_ID);
    }

    #[test]
    fn test_offsets_are_chars() {
        let enc = tokenizer().encode("Émile à Paris", 64).unwrap();
        assert_eq!(enc.tokens[3].text, "paris");
        assert_eq!(enc.tokens[3].start, 8);
        assert_eq!(enc.tokens[3].end, 13);
    }

    #[test]
    fn test_han_characters_are_split() {
        let enc = tokenizer().encode("张三出生于北京", 64).unwrap();
        assert_eq!(enc.len(), 9);
        assert_eq!(enc.resolve_span(0, 2).unwrap(), TokenSpan::new(1, 2));
        assert_eq!(enc.resolve_span(5, 7).unwrap(), TokenSpan::new(6, 7));

        // Latin words inside Chinese text stay whole.
        let enc = tokenizer().encode("他住在Paris市", 64).unwrap();
        assert_eq!(
            texts(&enc),
            vec!["[CLS]", "他", "住", "在", "paris", "市", "[SEP]"]
        );
    }

    #[test]
    fn test_resolve_span() {
        let text = "Alice lives in New York City";
        let enc = tokenizer().encode(text, 64).unwrap();
        assert_eq!(enc.resolve_span(0, 5).unwrap(), TokenSpan::single(1));
        assert_eq!(enc.resolve_span(15, 28).unwrap(), TokenSpan::new(4, 6));
        assert_eq!(enc.char_range(TokenSpan::new(4, 6)), Some((15, 28)));
        assert_eq!(enc.char_range(TokenSpan::single(0)), None);
    }

    #[test]
    fn test_resolve_span_failures() {
        let enc = tokenizer().encode("Alice lives", 64).unwrap();
        assert!(matches!(
            enc.resolve_span(3, 3),
            Err(GrteError::SpanResolution { .. })
        ));
        assert!(matches!(
            enc.resolve_span(40, 45),
            Err(GrteError::SpanResolution { .. })
        ));
    }

    #[test]
    fn test_span_inside_a_token_is_rejected() {
        let enc = tokenizer().encode("Yorkshire pudding", 64).unwrap();
        assert!(matches!(
            enc.resolve_span(0, 4),
            Err(GrteError::SpanResolution { end: 4, .. })
        ));
        assert!(enc.resolve_span(4, 17).is_err());
        assert_eq!(enc.resolve_span(0, 9).unwrap(), TokenSpan::single(1));
        assert_eq!(enc.resolve_span(0, 17).unwrap(), TokenSpan::new(1, 2));
    }

    #[test]
    fn test_truncation_keeps_sep() {
        let enc = tokenizer().encode("one two three four five", 4).unwrap();
        assert_eq!(texts(&enc), vec!["[CLS]", "one", "two", "[SEP]"]);
        assert_eq!(enc.tokens[3].index, 3);
        assert_eq!(enc.ids.len(), 4);
        // "four" was cut off.
        assert!(enc.resolve_span(14, 18).is_err());
        // "two three" lost its last word.
        assert!(enc.resolve_span(4, 13).is_err());
    }

    #[test]
    fn test_max_len_keeps_both_sentinels() {
        for max_len in [0, 1, MIN_LEN] {
            let enc = tokenizer().encode("a b c d", max_len).unwrap();
            assert_eq!(texts(&enc), vec!["[CLS]", "[SEP]"]);
            assert_eq!(enc.tokens[1].index, 1);
        }
    }

    #[test]
    fn test_words_and_casing() {
        let tok = tokenizer();
        assert_eq!(tok.words("Hi, Bob"), vec!["hi", ",", "bob"]);
        let tok = tok.with_lowercase(false);
        assert_eq!(tok.words("Hi"), vec!["Hi"]);
    }

    #[test]
    fn test_hf_encode_marks_sentinels() {
        let enc = hf_tokenizer().encode("Alice lives in Paris", 64).unwrap();
        assert_eq!(
            texts(&enc),
            vec!["[CLS]", "Alice", "lives", "in", "[UNK]", "[SEP]"]
        );
        assert_eq!(enc.ids, vec![2, 4, 5, 6, 1, 3]);

        let specials: Vec<bool> = enc.tokens.iter().map(|t| t.special).collect();
        assert_eq!(specials, vec![true, false, false, false, false, true]);
        assert_eq!((enc.tokens[0].start, enc.tokens[0].end), (0, 0));
        assert_eq!((enc.tokens[5].start, enc.tokens[5].end), (0, 0));
        assert_eq!((enc.tokens[4].start, enc.tokens[4].end), (15, 20));
    }

    #[test]
    fn test_hf_resolve_span() {
        let enc = hf_tokenizer().encode("Alice lives in Paris", 64).unwrap();
        assert_eq!(enc.resolve_span(15, 20).unwrap(), TokenSpan::single(4));
        assert_eq!(enc.resolve_span(0, 11).unwrap(), TokenSpan::new(1, 2));
        assert!(enc.resolve_span(0, 3).is_err());
        assert_eq!(enc.char_range(TokenSpan::new(1, 2)), Some((0, 11)));
    }

    #[test]
    fn test_hf_truncation_keeps_sep() {
        let enc = hf_tokenizer().encode("Alice lives in Paris", 4).unwrap();
        assert_eq!(texts(&enc), vec!["[CLS]", "Alice", "lives", "[SEP]"]);
        assert_eq!(enc.ids, vec![2, 4, 5, 3]);
        assert!(enc.tokens[3].special);
        assert_eq!(enc.tokens[3].index, 3);
        assert!(enc.resolve_span(15, 20).is_err());
    }
}
