//! A render session: one growing document, from chunks to render items.

use std::rc::Rc;

use hashbrown::HashSet;
use serde::Serialize;
use tracing::{debug, trace};

use crate::animation::{RevealState, Scheduler, TimerHandle};
use crate::cache::{IdentityMap, RenderCache, RenderStats};
use crate::config::{ErrorFn, SessionConfig, StreamingConfig};
use crate::error::{Diagnostics, Error};
use crate::extension::ExtensionRegistry;
use crate::partial::{Detector, IncompleteMap};
use crate::render::{Node, Renderer};
use crate::token::{Token, TokenId, TokenKind};
use crate::tokenizer::{Checkpoint, Tokenizer};

/// One top-level block ready to mount.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderItem {
    pub id: TokenId,
    pub node: Rc<Node>,
    pub reveal: RevealState,
    /// The block may still change shape
    pub provisional: bool,
}

/// Ordered render list for the whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RenderResult {
    pub items: Vec<RenderItem>,
}

impl RenderResult {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderItem> {
        self.items.iter()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.items.iter().map(|item| item.node.as_ref())
    }

    pub fn to_html(&self) -> String {
        self.nodes().map(Node::to_html).collect()
    }

    /// Visible text of every item, ignoring reveal state.
    pub fn text_content(&self) -> String {
        self.nodes().map(Node::text_content).collect()
    }
}

/// Streaming markdown session.
///
/// Owns the document buffer, the token list with its checkpoint, the render
/// cache and the animation scheduler. Every call runs to completion before
/// returning, so ticks and appends never interleave.
pub struct Session {
    registry: ExtensionRegistry,
    placeholders: IncompleteMap,
    on_error: Option<ErrorFn>,
    streaming: StreamingConfig,

    buffer: String,
    tokens: Vec<Token>,
    checkpoint: Checkpoint,
    /// Checkpoint from before the stream was finalized; re-lexing restarts
    /// here until streaming resumes
    resume: Option<Checkpoint>,

    ids: IdentityMap,
    cache: RenderCache,
    scheduler: Scheduler,
    last: Vec<RenderItem>,
    diag: Diagnostics,
}

impl Session {
    /// Validate `config` and create an empty session.
    pub fn new(config: SessionConfig) -> Result<Self, Error> {
        let SessionConfig {
            extensions,
            overrides,
            walk,
            on_error,
            options,
        } = config;

        options.streaming.animation.validate()?;
        options.incomplete.validate()?;

        let mut registry = ExtensionRegistry::new(extensions)?;
        for (type_name, f) in overrides {
            registry.set_override(type_name, f);
        }
        if let Some(walk) = walk {
            registry.set_walk_hook(walk);
        }

        debug!(
            ?registry,
            placeholders = ?options.incomplete,
            streaming = ?options.streaming,
            "session created"
        );

        let scheduler = Scheduler::new(
            options.streaming.animation.clone(),
            options.streaming.enable_animation,
        );

        Ok(Self {
            registry,
            placeholders: options.incomplete,
            on_error,
            streaming: options.streaming,
            buffer: String::new(),
            tokens: Vec::new(),
            checkpoint: Checkpoint::default(),
            resume: None,
            ids: IdentityMap::default(),
            cache: RenderCache::default(),
            scheduler,
            last: Vec::new(),
            diag: Diagnostics::default(),
        })
    }

    /// Append a chunk and return the updated render list.
    pub fn append(&mut self, chunk: &str) -> RenderResult {
        if chunk.is_empty() {
            return self.result();
        }
        self.buffer.push_str(chunk);
        trace!(len = chunk.len(), total = self.buffer.len(), "append");
        self.process()
    }

    /// Discard the buffer, tokens, cache and any live timer. Ids handed out
    /// before the reset are never reused.
    pub fn reset(&mut self) {
        debug!(len = self.buffer.len(), "session reset");
        self.buffer.clear();
        self.tokens.clear();
        self.checkpoint = Checkpoint::default();
        self.resume = None;
        self.ids.clear();
        self.cache.clear();
        self.scheduler.reset();
        self.last.clear();
        self.diag.take();
    }

    /// Tell the session whether more chunks may follow.
    ///
    /// Going to `false` finalizes the tail with end-of-input semantics: open
    /// constructs close at the end of the buffer. Going back to `true`
    /// reopens the tail that finalization settled.
    pub fn set_streaming_state(&mut self, has_next_chunk: bool) -> RenderResult {
        if has_next_chunk == self.streaming.has_next_chunk {
            return self.result();
        }
        self.streaming.has_next_chunk = has_next_chunk;

        if has_next_chunk {
            if let Some(resume) = self.resume.take() {
                self.checkpoint = resume;
            }
            debug!(offset = self.checkpoint.offset(), "stream resumed");
        } else {
            self.resume = Some(self.checkpoint);
            debug!(len = self.buffer.len(), "finalizing stream");
        }
        self.process()
    }

    pub fn has_next_chunk(&self) -> bool {
        self.streaming.has_next_chunk
    }

    /// Timer the host should drive with [`Session::tick`], if anything is
    /// animating.
    pub fn timer(&mut self) -> Option<TimerHandle> {
        self.scheduler.timer()
    }

    /// Advance the animation one step. Returns `None` for a cancelled or
    /// stale handle.
    pub fn tick(&mut self, handle: &TimerHandle) -> Option<RenderResult> {
        if !self.scheduler.is_live(handle) {
            return None;
        }
        self.scheduler.tick(self.streaming.has_next_chunk);
        for item in &mut self.last {
            item.reveal = self.scheduler.state(item.id);
        }
        Some(self.result())
    }

    /// The render list from the last append, state change or tick.
    pub fn result(&self) -> RenderResult {
        RenderResult {
            items: self.last.clone(),
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn render_stats(&self) -> RenderStats {
        self.cache.stats()
    }

    fn process(&mut self) -> RenderResult {
        let previous = self.resume.unwrap_or(self.checkpoint);
        let eof = !self.streaming.has_next_chunk;

        let tokenizer = Tokenizer::new(&self.registry, &self.diag);
        let checkpoint = tokenizer.tokenize(&self.buffer, &previous, &mut self.tokens, eof);
        self.ids.update(&self.tokens, &previous);
        Detector::new(&self.placeholders).mark(&mut self.tokens, &checkpoint, &self.buffer, eof);
        self.checkpoint = checkpoint;

        self.render();
        self.report_errors();
        self.result()
    }

    fn render(&mut self) {
        self.cache.begin();
        let renderer = Renderer::new(&self.registry, &self.placeholders, &self.diag);
        let walk = self.registry.has_walk_hook();
        let animate = self.streaming.enable_animation;

        let mut items = Vec::with_capacity(self.tokens.len());
        for (token, &id) in self.tokens.iter().zip(self.ids.ids()) {
            if matches!(token.kind, TokenKind::Space) {
                continue;
            }
            let settled = !token.provisional;

            let walked;
            let token = if walk {
                let mut copy = token.clone();
                self.registry.run_walk_hook(&mut copy, &self.diag);
                walked = copy;
                &walked
            } else {
                token
            };

            let node = self
                .cache
                .get_or_render(id, token, settled, walk, |t| renderer.render(t));
            let reveal = if animate {
                self.scheduler.observe(id, &node.text_content(), settled)
            } else {
                RevealState::Steady
            };
            items.push(RenderItem {
                id,
                node,
                reveal,
                provisional: !settled,
            });
        }
        self.cache.record_calls(renderer.calls());

        let live: HashSet<TokenId> = items.iter().map(|item| item.id).collect();
        self.scheduler.retain(|id| live.contains(&id));

        let stats = self.cache.stats();
        trace!(
            offset = self.checkpoint.offset(),
            settled = self.checkpoint.settled(),
            items = items.len(),
            rendered = stats.rendered,
            hits = stats.cache_hits,
            "rendered"
        );
        self.last = items;
    }

    fn report_errors(&self) {
        for err in self.diag.take() {
            if let Some(on_error) = &self.on_error {
                on_error(&err);
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("registry", &self.registry)
            .field("streaming", &self.streaming)
            .field("buffer_len", &self.buffer.len())
            .field("tokens", &self.tokens.len())
            .field("checkpoint", &self.checkpoint)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnimationConfig;
    use crate::error::ConfigError;
    use crate::extension::Extension;
    use pretty_assertions::assert_eq;

    #[test]
    fn duplicate_extension_fails_at_creation() {
        let ext = || Extension::inline("mention").renderer(|_, _| Ok(None));
        let config = SessionConfig::new().extension(ext()).extension(ext());
        let err = Session::new(config).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::DuplicateExtension(name)) if name == "mention"
        ));
    }

    #[test]
    fn zero_step_fails_at_creation() {
        let config = SessionConfig::new().animation(AnimationConfig {
            step: 0,
            ..AnimationConfig::default()
        });
        assert!(matches!(
            Session::new(config),
            Err(Error::Config(ConfigError::InvalidAnimation("step")))
        ));
    }

    #[test]
    fn empty_chunk_is_a_no_op() {
        let mut session = Session::new(SessionConfig::new()).unwrap();
        let first = session.append("hello");
        let again = session.append("");
        assert_eq!(first, again);
        assert_eq!(session.buffer(), "hello");
    }

    #[test]
    fn space_tokens_are_not_rendered() {
        let mut session = Session::new(SessionConfig::new()).unwrap();
        let result = session.append("a\n\nb");
        assert_eq!(session.tokens().len(), 3);
        assert_eq!(result.len(), 2);
        assert_eq!(result.to_html(), "<p>a</p><p>b</p>");
    }

    #[test]
    fn reset_clears_state_and_keeps_ids_fresh() {
        let mut session = Session::new(SessionConfig::new()).unwrap();
        let before = session.append("# one\n\ntwo");
        session.reset();
        assert!(session.tokens().is_empty());
        assert_eq!(session.buffer(), "");
        assert_eq!(*session.checkpoint(), Checkpoint::default());
        assert!(session.result().is_empty());

        let after = session.append("# one\n\ntwo");
        let old: Vec<_> = before.iter().map(|i| i.id).collect();
        assert!(after.iter().all(|i| !old.contains(&i.id)));
    }

    #[test]
    fn setting_the_same_state_does_not_reprocess() {
        let mut session = Session::new(SessionConfig::new()).unwrap();
        session.append("text");
        session.set_streaming_state(true);
        assert_eq!(session.render_stats().rendered, 1);
        assert!(session.has_next_chunk());
    }
}
