//! Incremental markdown engine for streaming LLM output.
//!
//! Text arrives in arbitrary chunks. A [`Session`] re-tokenizes only the
//! unsettled tail of the document on each chunk, marks constructs that may
//! still change as provisional, renders settled blocks once and reuses them,
//! and optionally paces how new content is revealed.

mod animation;
pub(crate) mod block;
mod cache;
mod config;
mod error;
mod extension;
mod html;
pub(crate) mod inline;
mod partial;
mod render;
mod session;
mod token;
mod tokenizer;

pub use animation::{CancelToken, RevealState, TimerHandle};
pub use cache::RenderStats;
pub use config::{AnimationConfig, Effect, ErrorFn, SessionConfig, SessionOptions, StreamingConfig};
pub use error::{ConfigError, Error, ExtensionError};
pub use extension::{
    Extension, ExtensionRegistry, ExtensionToken, Level, RenderFn, StartFn, TokenizerFn, WalkFn,
};
pub use partial::IncompleteMap;
pub use render::{Component, Node, Renderer};
pub use session::{RenderItem, RenderResult, Session};
pub use token::{Align, Construct, Token, TokenId, TokenKind};
pub use tokenizer::Checkpoint;
