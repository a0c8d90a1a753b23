//! Incremental tokenizer.
//!
//! Tokens before the checkpoint are settled and reused verbatim. Each call
//! re-lexes the buffer from the checkpoint offset with a fresh lexer, which
//! produces the same tokens a from-scratch run would, because a settled
//! token's extent never depends on text after it.

use serde::Serialize;

use crate::block::BlockLexer;
use crate::error::Diagnostics;
use crate::extension::ExtensionRegistry;
use crate::inline::InlineLexer;
use crate::token::Token;

/// Position before which every token is settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    offset: usize,
    settled: usize,
    /// An open fence starting at `offset` has been scanned up to here
    /// without finding its closing line
    #[serde(skip_serializing_if = "Option::is_none")]
    fence_scanned: Option<usize>,
}

impl Checkpoint {
    #[cfg(test)]
    pub(crate) fn at(offset: usize, settled: usize) -> Self {
        Self {
            offset,
            settled,
            fence_scanned: None,
        }
    }

    /// Byte offset into the buffer where re-lexing starts.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of settled top-level tokens.
    pub fn settled(&self) -> usize {
        self.settled
    }

    pub fn fence_scanned(&self) -> Option<usize> {
        self.fence_scanned
    }
}

pub(crate) struct Tokenizer<'a> {
    registry: &'a ExtensionRegistry,
    diag: &'a Diagnostics,
}

impl<'a> Tokenizer<'a> {
    pub(crate) fn new(registry: &'a ExtensionRegistry, diag: &'a Diagnostics) -> Self {
        Self { registry, diag }
    }

    /// Re-tokenize `buffer` from `previous`.
    ///
    /// `tokens` must be the token list produced together with `previous`;
    /// its settled prefix is kept and everything after is replaced. With
    /// `eof` set the input is treated as finished, so every token settles.
    pub fn tokenize(
        &self,
        buffer: &str,
        previous: &Checkpoint,
        tokens: &mut Vec<Token>,
        eof: bool,
    ) -> Checkpoint {
        tokens.truncate(previous.settled);

        let tail = &buffer[previous.offset..];
        let resume = previous
            .fence_scanned
            .map(|scanned| scanned - previous.offset);
        let mut lexer = BlockLexer::new(tail, eof, self.registry, self.diag).resume_fence(resume);
        let blocks = lexer.lex();

        let mut checkpoint = Checkpoint {
            offset: previous.offset,
            settled: previous.settled,
            fence_scanned: None,
        };
        let mut settling = true;
        for block in blocks {
            let mut token = block.token;
            InlineLexer::new(self.registry, self.diag, block.closed || eof).expand(&mut token);
            if settling && block.closed {
                checkpoint.offset += token.raw.len();
                checkpoint.settled += 1;
            } else {
                settling = false;
            }
            tokens.push(token);
        }

        if let Some((start, scanned)) = lexer.open_fence() {
            if previous.offset + start == checkpoint.offset {
                checkpoint.fence_scanned = Some(previous.offset + scanned);
            }
        }

        debug_assert!(checkpoint.offset >= previous.offset);
        tracing::trace!(
            offset = checkpoint.offset,
            settled = checkpoint.settled,
            tail = tokens.len() - checkpoint.settled,
            "tokenized"
        );
        checkpoint
    }

    /// Tokenize `buffer` in one shot.
    #[cfg(test)]
    pub fn tokenize_all(&self, buffer: &str, eof: bool) -> Vec<Token> {
        let mut tokens = Vec::new();
        self.tokenize(buffer, &Checkpoint::default(), &mut tokens, eof);
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn feed(chunks: &[&str]) -> (Vec<Token>, Checkpoint) {
        let registry = ExtensionRegistry::default();
        let diag = Diagnostics::default();
        let tokenizer = Tokenizer::new(&registry, &diag);
        let mut buffer = String::new();
        let mut tokens = Vec::new();
        let mut checkpoint = Checkpoint::default();
        for chunk in chunks {
            buffer.push_str(chunk);
            checkpoint = tokenizer.tokenize(&buffer, &checkpoint, &mut tokens, false);
        }
        (tokens, checkpoint)
    }

    #[test]
    fn checkpoint_advances_over_closed_blocks() {
        let (tokens, checkpoint) = feed(&["# Tit", "le\n\nBo", "dy"]);
        assert_eq!(tokens.len(), 3);
        assert_eq!(checkpoint.settled(), 2);
        assert_eq!(checkpoint.offset(), "# Title\n\n".len());
    }

    #[test]
    fn open_fence_scan_resumes() {
        let (tokens, checkpoint) = feed(&["text\n\n```js\n", "a\n", "b"]);
        assert_eq!(checkpoint.settled(), 2);
        assert_eq!(checkpoint.fence_scanned(), Some("text\n\n```js\na\n".len()));
        assert_eq!(tokens[2].text, "a\nb");

        let (tokens, checkpoint) = feed(&["```js\na\n", "```\n", "after"]);
        assert_eq!(checkpoint.settled(), 1);
        assert_eq!(checkpoint.fence_scanned(), None);
        assert_eq!(tokens[0].text, "a\n");
    }

    #[test]
    fn matches_one_shot_at_eof() {
        let registry = ExtensionRegistry::default();
        let diag = Diagnostics::default();
        let tokenizer = Tokenizer::new(&registry, &diag);
        let src = "# A\n\npara *em*\n\n- x\n- y\n\n```\ncode\n";
        let (mut tokens, checkpoint) = feed(&["# A\n\npara *e", "m*\n\n- x\n- y", "\n\n```\ncode\n"]);
        tokenizer.tokenize(src, &checkpoint, &mut tokens, true);
        assert_eq!(tokens, tokenizer.tokenize_all(src, true));
    }
}
