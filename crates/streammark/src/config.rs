use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ExtensionError};
use crate::extension::{Extension, RenderFn, WalkFn};
use crate::partial::IncompleteMap;
use crate::render::{Node, Renderer};
use crate::token::{Construct, Token};

pub type ErrorFn = Box<dyn Fn(&ExtensionError)>;

/// How newly revealed content enters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Effect {
    /// One-shot transition per node
    #[default]
    FadeIn,
    /// Reveal `step` characters per tick
    Typing,
    /// Host-defined one-shot effect
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub effect: Effect,
    /// Milliseconds between ticks
    pub interval_ms: u64,
    /// Characters revealed per tick for typing effects
    pub step: usize,
    /// Resume from the first differing character when content is replaced
    pub keep_prefix: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            effect: Effect::FadeIn,
            interval_ms: 30,
            step: 1,
            keep_prefix: false,
        }
    }
}

impl AnimationConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::InvalidAnimation("interval"));
        }
        if self.step == 0 {
            return Err(ConfigError::InvalidAnimation("step"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// More chunks may follow; the tail is treated as incomplete
    pub has_next_chunk: bool,
    pub enable_animation: bool,
    pub animation: AnimationConfig,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            has_next_chunk: true,
            enable_animation: false,
            animation: AnimationConfig::default(),
        }
    }
}

/// The serializable part of a session configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub streaming: StreamingConfig,
    /// Placeholder component per construct kind
    pub incomplete: IncompleteMap,
}

/// Everything a session is created with. Validated by `Session::new`.
#[derive(Default)]
pub struct SessionConfig {
    pub(crate) extensions: Vec<Extension>,
    pub(crate) overrides: Vec<(String, RenderFn)>,
    pub(crate) walk: Option<WalkFn>,
    pub(crate) on_error: Option<ErrorFn>,
    pub(crate) options: SessionOptions,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(options: SessionOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn extension(mut self, extension: Extension) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Replace the built-in renderer for a token type. Returning `Ok(None)`
    /// defers to the built-in renderer.
    pub fn render_override(
        mut self,
        type_name: impl Into<String>,
        f: impl Fn(&Token, &Renderer<'_>) -> Result<Option<Node>, ExtensionError> + 'static,
    ) -> Self {
        self.overrides.push((type_name.into(), Box::new(f)));
        self
    }

    /// Hook run over every token, pre-order, before each render.
    pub fn walk_tokens(
        mut self,
        f: impl Fn(&mut Token) -> Result<(), ExtensionError> + 'static,
    ) -> Self {
        self.walk = Some(Box::new(f));
        self
    }

    pub fn placeholder(mut self, construct: Construct, component: impl Into<String>) -> Self {
        self.options.incomplete.insert(construct, component);
        self
    }

    pub fn on_error(mut self, f: impl Fn(&ExtensionError) + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn streaming(mut self, streaming: StreamingConfig) -> Self {
        self.options.streaming = streaming;
        self
    }

    pub fn animation(mut self, animation: AnimationConfig) -> Self {
        self.options.streaming.enable_animation = true;
        self.options.streaming.animation = animation;
        self
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("extensions", &self.extensions)
            .field(
                "overrides",
                &self.overrides.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field("walk", &self.walk.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let streaming = StreamingConfig::default();
        assert!(streaming.has_next_chunk);
        assert!(!streaming.enable_animation);
        assert_eq!(streaming.animation.interval(), Duration::from_millis(30));
        assert_eq!(streaming.animation.step, 1);
    }

    #[test]
    fn options_from_partial_json() {
        let options: SessionOptions = serde_json::from_str(
            r#"{
                "streaming": { "enable_animation": true, "animation": { "effect": "typing", "step": 3 } },
                "incomplete": { "link": "link-skeleton" }
            }"#,
        )
        .unwrap();
        assert!(options.streaming.has_next_chunk);
        assert_eq!(options.streaming.animation.effect, Effect::Typing);
        assert_eq!(options.streaming.animation.step, 3);
        assert_eq!(options.streaming.animation.interval_ms, 30);
        assert_eq!(options.incomplete.get(Construct::Link), Some("link-skeleton"));
    }

    #[test]
    fn zero_interval_is_invalid() {
        let animation = AnimationConfig {
            interval_ms: 0,
            ..AnimationConfig::default()
        };
        assert_eq!(
            animation.validate(),
            Err(ConfigError::InvalidAnimation("interval"))
        );
    }
}
