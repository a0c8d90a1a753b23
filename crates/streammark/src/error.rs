use std::cell::RefCell;

/// Engine errors. Extension failures at runtime never surface here; they go
/// to the session's error callback.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Invalid session configuration. Raised by `Session::new`, before any
/// chunk is processed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("extension name is empty")]
    EmptyExtensionName,

    #[error("duplicate extension name '{0}'")]
    DuplicateExtension(String),

    /// An extension must carry a tokenizer, a renderer, or both
    #[error("extension '{0}' has neither a tokenizer nor a renderer")]
    EmptyExtension(String),

    #[error("animation {0} must be greater than zero")]
    InvalidAnimation(&'static str),

    #[error("placeholder for '{0}' has an empty component id")]
    EmptyPlaceholder(String),
}

/// A failure inside caller-supplied code. Always isolated to the span or
/// token it happened on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtensionError {
    #[error("{name}: {message}")]
    Failed { name: String, message: String },

    #[error("{name}: matched text that is not a prefix of its input")]
    InvalidMatch { name: String },

    #[error("walk hook failed on {token_type}: {message}")]
    Walk { token_type: String, message: String },

    #[error("renderer for {token_type} failed: {message}")]
    Render { token_type: String, message: String },
}

impl ExtensionError {
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        ExtensionError::Failed {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Collects isolated extension failures during one chunk so the session
/// can hand them to the caller's error channel.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics(RefCell<Vec<ExtensionError>>);

impl Diagnostics {
    pub fn report(&self, err: ExtensionError) {
        tracing::warn!("{err}");
        self.0.borrow_mut().push(err);
    }

    pub fn take(&self) -> Vec<ExtensionError> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}
