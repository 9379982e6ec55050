//! Token-budget truncation.
//!
//! Encoders are built lazily once per family and shared. Truncation keeps the
//! most recent tokens, since the continuation depends on the end of the text.

use crate::error::{CompletionError, CompletionResult};
use std::sync::LazyLock;
use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// Chat-era models (`gpt-3.5*`, `gpt-4*`, `*-002` base models).
    Cl100k,
    /// Code-completion family and `text-davinci-002/003`.
    P50k,
    R50k,
}

impl ModelFamily {
    pub fn for_model(name: &str) -> Self {
        let name = name.rsplit('/').next().unwrap_or(name);
        if name.starts_with("gpt-3.5")
            || name.starts_with("gpt-4")
            || name.starts_with("gpt-35")
            || name == "davinci-002"
            || name == "babbage-002"
        {
            ModelFamily::Cl100k
        } else if name.starts_with("code-") || name.starts_with("text-davinci-00") {
            ModelFamily::P50k
        } else {
            ModelFamily::R50k
        }
    }

    fn encoder(self) -> CompletionResult<&'static CoreBPE> {
        let slot = match self {
            ModelFamily::Cl100k => &*CL100K,
            ModelFamily::P50k => &*P50K,
            ModelFamily::R50k => &*R50K,
        };
        slot.as_ref()
            .map_err(|e| CompletionError::Tokenizer(e.clone()))
    }
}

static CL100K: LazyLock<Result<CoreBPE, String>> =
    LazyLock::new(|| tiktoken_rs::cl100k_base().map_err(|e| e.to_string()));
static P50K: LazyLock<Result<CoreBPE, String>> =
    LazyLock::new(|| tiktoken_rs::p50k_base().map_err(|e| e.to_string()));
static R50K: LazyLock<Result<CoreBPE, String>> =
    LazyLock::new(|| tiktoken_rs::r50k_base().map_err(|e| e.to_string()));

/// Decoding a token slice can fail when the cut lands inside a multi-byte
/// character; each retry drops one more leading token.
const DECODE_RETRIES: usize = 4;

/// Keep at most `budget` trailing tokens of `text`.
pub fn truncate(family: ModelFamily, text: &str, budget: usize) -> CompletionResult<String> {
    let bpe = family.encoder()?;
    let tokens = bpe.encode_with_special_tokens(text);
    if tokens.len() <= budget {
        return Ok(text.to_string());
    }
    let mut start = tokens.len() - budget;
    for _ in 0..=DECODE_RETRIES {
        match bpe.decode(tokens[start..].to_vec()) {
            Ok(kept) => {
                debug!(target: "provider.tokenizer", ?family, total = tokens.len(), kept = tokens.len() - start, "truncated");
                return Ok(kept);
            }
            Err(e) => {
                warn!(target: "provider.tokenizer", ?family, start, error = %e, "decode_retry");
                start += 1;
                if start >= tokens.len() {
                    break;
                }
            }
        }
    }
    Err(CompletionError::Tokenizer(format!(
        "could not decode the last {budget} tokens"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn family_selection() {
        assert_eq!(ModelFamily::for_model("gpt-4o-mini"), ModelFamily::Cl100k);
        assert_eq!(ModelFamily::for_model("openai/gpt-3.5-turbo"), ModelFamily::Cl100k);
        assert_eq!(ModelFamily::for_model("davinci-002"), ModelFamily::Cl100k);
        assert_eq!(ModelFamily::for_model("code-davinci-002"), ModelFamily::P50k);
        assert_eq!(ModelFamily::for_model("text-davinci-003"), ModelFamily::P50k);
        assert_eq!(ModelFamily::for_model("mistral-7b"), ModelFamily::R50k);
    }

    #[test]
    fn short_text_is_untouched() {
        let text = "Once upon a time";
        assert_eq!(truncate(ModelFamily::R50k, text, 100).unwrap(), text);
    }

    #[test]
    fn long_text_keeps_the_tail() {
        let text = "one two three four five six seven eight nine ten";
        let out = truncate(ModelFamily::Cl100k, text, 3).unwrap();
        assert!(text.ends_with(&out), "{out:?} is not a suffix");
        assert!(out.len() < text.len());
        let kept = ModelFamily::Cl100k
            .encoder()
            .unwrap()
            .encode_with_special_tokens(&out);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn special_sentinel_survives_a_one_token_budget() {
        assert_eq!(
            truncate(ModelFamily::Cl100k, "story<|endoftext|>", 1).unwrap(),
            "<|endoftext|>"
        );
    }
}
