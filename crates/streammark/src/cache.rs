//! Stable token identities and the render cache.

use std::rc::Rc;

use hashbrown::HashMap;
use serde::Serialize;

use crate::render::Node;
use crate::token::{Construct, Token, TokenId};
use crate::tokenizer::Checkpoint;

/// Assigns each top-level token a [`TokenId`] from a monotonic counter.
///
/// Settled tokens keep their id forever. A re-lexed tail token inherits the
/// id of the previous tail token that started at the same offset with the
/// same construct, so a growing paragraph is one entity across chunks.
#[derive(Debug, Default)]
pub(crate) struct IdentityMap {
    next_id: u64,
    ids: Vec<TokenId>,
    /// Re-lexed tokens of the last update: (start offset, construct, id)
    recent: Vec<(usize, Construct, TokenId)>,
}

impl IdentityMap {
    pub fn ids(&self) -> &[TokenId] {
        &self.ids
    }

    /// Assign ids after a tokenize pass that kept `tokens[..previous.settled]`
    /// and re-lexed the rest from `previous.offset`.
    pub fn update(&mut self, tokens: &[Token], previous: &Checkpoint) {
        self.ids.truncate(previous.settled());

        let mut start = previous.offset();
        let mut recent = Vec::with_capacity(tokens.len() - self.ids.len());
        for token in &tokens[previous.settled()..] {
            let construct = token.construct();
            let reused = self
                .recent
                .iter()
                .find(|(s, c, _)| *s == start && *c == construct)
                .map(|(_, _, id)| *id);
            let id = match reused {
                Some(id) => id,
                None => self.fresh(),
            };
            self.ids.push(id);
            recent.push((start, construct, id));
            start += token.raw.len();
        }
        self.recent = recent;
    }

    fn fresh(&mut self) -> TokenId {
        let id = TokenId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.recent.clear();
    }
}

/// Render counts for the last chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderStats {
    /// Top-level tokens rendered from scratch
    pub rendered: usize,
    /// Top-level tokens served from the cache
    pub cache_hits: usize,
    /// Renderer invocations, children included
    pub renderer_calls: usize,
}

#[derive(Debug)]
struct CacheEntry {
    node: Rc<Node>,
    /// Walked token the node was rendered from, kept only when a walk hook
    /// can mutate tokens between chunks
    token: Option<Token>,
}

/// Rendered nodes of settled tokens, keyed by id.
#[derive(Debug, Default)]
pub(crate) struct RenderCache {
    entries: HashMap<TokenId, CacheEntry>,
    stats: RenderStats,
}

impl RenderCache {
    pub fn begin(&mut self) {
        self.stats = RenderStats::default();
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn record_calls(&mut self, calls: usize) {
        self.stats.renderer_calls = calls;
    }

    /// Cached node for a settled token, or a fresh render.
    ///
    /// Provisional tokens are rendered every time and never stored. With
    /// `verify` set a hit also requires the token to equal the one the
    /// entry was rendered from.
    pub fn get_or_render(
        &mut self,
        id: TokenId,
        token: &Token,
        settled: bool,
        verify: bool,
        render: impl FnOnce(&Token) -> Node,
    ) -> Rc<Node> {
        if !settled {
            self.entries.remove(&id);
            self.stats.rendered += 1;
            return Rc::new(render(token));
        }

        if let Some(entry) = self.entries.get(&id) {
            let unchanged = !verify || entry.token.as_ref() == Some(token);
            if unchanged {
                self.stats.cache_hits += 1;
                return Rc::clone(&entry.node);
            }
            tracing::trace!(id = id.0, "walk hook changed a settled token");
        }

        self.stats.rendered += 1;
        let node = Rc::new(render(token));
        self.entries.insert(
            id,
            CacheEntry {
                node: Rc::clone(&node),
                token: verify.then(|| token.clone()),
            },
        );
        node
    }

    #[cfg(test)]
    pub fn contains(&self, id: TokenId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats = RenderStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;
    use pretty_assertions::assert_eq;

    fn para(raw: &str) -> Token {
        Token::new(TokenKind::Paragraph, raw, raw.trim())
    }

    fn checkpoint(tokens: &[Token], settled: usize) -> Checkpoint {
        let offset = tokens[..settled].iter().map(|t| t.raw.len()).sum();
        Checkpoint::at(offset, settled)
    }

    #[test]
    fn growing_tail_keeps_its_id() {
        let mut ids = IdentityMap::default();
        let first = vec![para("ab")];
        ids.update(&first, &Checkpoint::default());
        let grown = vec![para("abcd\n"), Token::new(TokenKind::Space, "\n", "")];
        ids.update(&grown, &Checkpoint::default());
        assert_eq!(ids.ids(), &[TokenId(0), TokenId(1)]);

        // the paragraph settles, a new one starts after it
        let next = vec![
            para("abcd\n"),
            Token::new(TokenKind::Space, "\n", ""),
            para("x"),
        ];
        ids.update(&next, &checkpoint(&grown, 0));
        let settled = checkpoint(&next, 2);
        let more = vec![next[0].clone(), next[1].clone(), para("xy")];
        ids.update(&more, &settled);
        assert_eq!(ids.ids(), &[TokenId(0), TokenId(1), TokenId(2)]);
    }

    #[test]
    fn changed_construct_gets_a_new_id() {
        let mut ids = IdentityMap::default();
        ids.update(&[para("Title")], &Checkpoint::default());
        let heading = Token::new(TokenKind::Heading { depth: 1 }, "Title\n===\n", "Title");
        ids.update(&[heading], &Checkpoint::default());
        assert_eq!(ids.ids(), &[TokenId(1)]);
    }

    #[test]
    fn settled_hits_and_provisional_misses() {
        let mut cache = RenderCache::default();
        let token = para("a");
        let mut renders = 0;
        let mut render = |t: &Token| {
            renders += 1;
            Node::text(t.text.as_str())
        };

        cache.get_or_render(TokenId(0), &token, false, false, &mut render);
        cache.get_or_render(TokenId(0), &token, false, false, &mut render);
        assert!(!cache.contains(TokenId(0)));

        cache.get_or_render(TokenId(0), &token, true, false, &mut render);
        cache.get_or_render(TokenId(0), &token, true, false, &mut render);
        assert_eq!(renders, 3);
        assert_eq!(cache.stats().cache_hits, 1);
    }

    #[test]
    fn verified_entry_rerenders_on_change() {
        let mut cache = RenderCache::default();
        let mut renders = 0;
        let mut render = |t: &Token| {
            renders += 1;
            Node::text(t.text.as_str())
        };
        cache.get_or_render(TokenId(0), &para("a"), true, true, &mut render);
        cache.get_or_render(TokenId(0), &para("a"), true, true, &mut render);
        let node = cache.get_or_render(TokenId(0), &para("b"), true, true, &mut render);
        assert_eq!(renders, 2);
        assert_eq!(*node, Node::text("b"));
    }
}
