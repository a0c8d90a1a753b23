//! Pluggable tokenizer, renderer and walk hooks.

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::error::{ConfigError, Diagnostics, ExtensionError};
use crate::render::{Node, Renderer};
use crate::token::{Token, TokenKind};

/// Where an extension tokenizer is tried relative to the built-in rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Block,
    Inline,
}

pub type StartFn = Box<dyn Fn(&str) -> Option<usize>>;
pub type TokenizerFn = Box<dyn Fn(&str) -> Result<Option<ExtensionToken>, ExtensionError>>;
pub type RenderFn = Box<dyn Fn(&Token, &Renderer<'_>) -> Result<Option<Node>, ExtensionError>>;
pub type WalkFn = Box<dyn Fn(&mut Token) -> Result<(), ExtensionError>>;

/// What an extension tokenizer returns for a matched prefix.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtensionToken {
    /// Exact prefix of the input that was consumed
    pub raw: String,
    pub text: String,
    pub attrs: BTreeMap<String, String>,
    /// Lex `text` as inline content into the token's children
    pub inline: bool,
    /// False while the construct's closing marker has not arrived
    pub complete: bool,
}

impl ExtensionToken {
    pub fn new(raw: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            text: text.into(),
            attrs: BTreeMap::new(),
            inline: false,
            complete: true,
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn inline_content(mut self) -> Self {
        self.inline = true;
        self
    }

    pub fn incomplete(mut self) -> Self {
        self.complete = false;
        self
    }
}

/// A named custom syntax and/or renderer.
///
/// ```
/// use streammark::{Extension, ExtensionToken};
///
/// let mention = Extension::inline("mention")
///     .start(|src| src.find('@'))
///     .tokenizer(|src| {
///         let Some(rest) = src.strip_prefix('@') else {
///             return Ok(None);
///         };
///         let len = rest
///             .find(|c: char| !c.is_alphanumeric())
///             .unwrap_or(rest.len());
///         if len == 0 {
///             return Ok(None);
///         }
///         Ok(Some(ExtensionToken::new(&src[..len + 1], &rest[..len])))
///     });
/// assert_eq!(mention.name(), "mention");
/// ```
pub struct Extension {
    name: String,
    level: Level,
    start: Option<StartFn>,
    tokenizer: Option<TokenizerFn>,
    renderer: Option<RenderFn>,
}

impl Extension {
    pub fn new(name: impl Into<String>, level: Level) -> Self {
        Self {
            name: name.into(),
            level,
            start: None,
            tokenizer: None,
            renderer: None,
        }
    }

    pub fn block(name: impl Into<String>) -> Self {
        Self::new(name, Level::Block)
    }

    pub fn inline(name: impl Into<String>) -> Self {
        Self::new(name, Level::Inline)
    }

    /// Hint for where in the remaining text this extension could start.
    /// Plain text runs stop there so the tokenizer gets a chance.
    pub fn start(mut self, f: impl Fn(&str) -> Option<usize> + 'static) -> Self {
        self.start = Some(Box::new(f));
        self
    }

    pub fn tokenizer(
        mut self,
        f: impl Fn(&str) -> Result<Option<ExtensionToken>, ExtensionError> + 'static,
    ) -> Self {
        self.tokenizer = Some(Box::new(f));
        self
    }

    pub fn renderer(
        mut self,
        f: impl Fn(&Token, &Renderer<'_>) -> Result<Option<Node>, ExtensionError> + 'static,
    ) -> Self {
        self.renderer = Some(Box::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Offset of the next position where this extension could match. An
    /// extension without a start hint could match anywhere.
    pub fn start_hint(&self, remaining: &str) -> Option<usize> {
        self.start.as_ref().map_or(Some(0), |f| f(remaining))
    }

    /// Run the tokenizer on `remaining`, isolating failures.
    ///
    /// A failing tokenizer or one that returns text it did not consume is
    /// reported and treated as no match.
    pub(crate) fn try_tokenize(&self, remaining: &str, diag: &Diagnostics) -> Option<Token> {
        let tokenizer = self.tokenizer.as_ref()?;
        let matched = match tokenizer(remaining) {
            Ok(Some(m)) => m,
            Ok(None) => return None,
            Err(err) => {
                diag.report(err);
                return None;
            }
        };

        if matched.raw.is_empty() || !remaining.starts_with(&matched.raw) {
            diag.report(ExtensionError::InvalidMatch {
                name: self.name.clone(),
            });
            return None;
        }

        let mut token = Token::new(
            TokenKind::Extension {
                name: self.name.clone(),
                attrs: matched.attrs,
                inline: matched.inline,
            },
            matched.raw,
            matched.text,
        );
        token.provisional = !matched.complete;
        Some(token)
    }
}

impl std::fmt::Debug for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("start", &self.start.is_some())
            .field("tokenizer", &self.tokenizer.is_some())
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}

/// Validated, immutable set of extensions plus renderer overrides and the
/// walk hook for one session.
#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: Vec<Extension>,
    overrides: HashMap<String, RenderFn>,
    walk: Option<WalkFn>,
}

impl ExtensionRegistry {
    pub fn new(extensions: Vec<Extension>) -> Result<Self, ConfigError> {
        let mut registry = Self::default();
        for ext in extensions {
            registry.register(ext)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, extension: Extension) -> Result<(), ConfigError> {
        if extension.name.trim().is_empty() {
            return Err(ConfigError::EmptyExtensionName);
        }
        if extension.tokenizer.is_none() && extension.renderer.is_none() {
            return Err(ConfigError::EmptyExtension(extension.name));
        }
        if self.extensions.iter().any(|e| e.name == extension.name) {
            return Err(ConfigError::DuplicateExtension(extension.name));
        }
        self.extensions.push(extension);
        Ok(())
    }

    /// Replace the built-in renderer for a token type.
    pub fn set_override(&mut self, type_name: impl Into<String>, f: RenderFn) {
        self.overrides.insert(type_name.into(), f);
    }

    pub fn set_walk_hook(&mut self, f: WalkFn) {
        self.walk = Some(f);
    }

    pub fn has_walk_hook(&self) -> bool {
        self.walk.is_some()
    }

    /// Block-level tokenizers in registration order.
    pub fn block_rules(&self) -> impl Iterator<Item = &Extension> {
        self.rules(Level::Block)
    }

    /// Inline-level tokenizers in registration order.
    pub fn inline_rules(&self) -> impl Iterator<Item = &Extension> {
        self.rules(Level::Inline)
    }

    fn rules(&self, level: Level) -> impl Iterator<Item = &Extension> {
        self.extensions
            .iter()
            .filter(move |e| e.level == level && e.tokenizer.is_some())
    }

    pub fn has_inline_rules(&self) -> bool {
        self.inline_rules().next().is_some()
    }

    /// Renderer for a token type: an extension renderer wins over a
    /// renderer override. `None` means the built-in renderer applies.
    pub fn renderer(&self, type_name: &str) -> Option<&RenderFn> {
        self.extensions
            .iter()
            .find(|e| e.name == type_name)
            .and_then(|e| e.renderer.as_ref())
            .or_else(|| self.overrides.get(type_name))
    }

    /// Run the walk hook over `token` and its descendants, pre-order.
    ///
    /// A failing hook leaves that token as it was before the call.
    pub(crate) fn run_walk_hook(&self, token: &mut Token, diag: &Diagnostics) {
        let Some(walk) = &self.walk else {
            return;
        };
        walk_token(walk, token, diag);
    }
}

fn walk_token(walk: &WalkFn, token: &mut Token, diag: &Diagnostics) {
    let before = token.clone();
    if let Err(err) = walk(token) {
        *token = before;
        let err = if matches!(err, ExtensionError::Walk { .. }) {
            err
        } else {
            ExtensionError::Walk {
                token_type: token.type_name().to_string(),
                message: err.to_string(),
            }
        };
        diag.report(err);
    }
    for child in &mut token.children {
        walk_token(walk, child, diag);
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("extensions", &self.extensions)
            .field("overrides", &self.overrides.keys().collect::<Vec<_>>())
            .field("walk", &self.walk.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Extension {
        Extension::block("noop").tokenizer(|_| Ok(None))
    }

    #[test]
    fn duplicate_names_fail_fast() {
        let err = ExtensionRegistry::new(vec![noop(), noop()]).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateExtension("noop".to_string()));
    }

    #[test]
    fn empty_extension_is_rejected() {
        let err = ExtensionRegistry::new(vec![Extension::inline("bare")]).unwrap_err();
        assert_eq!(err, ConfigError::EmptyExtension("bare".to_string()));

        let err = ExtensionRegistry::new(vec![Extension::inline(" ").tokenizer(|_| Ok(None))])
            .unwrap_err();
        assert_eq!(err, ConfigError::EmptyExtensionName);
    }

    #[test]
    fn rules_keep_registration_order() {
        let registry = ExtensionRegistry::new(vec![
            Extension::block("b1").tokenizer(|_| Ok(None)),
            Extension::inline("i1").tokenizer(|_| Ok(None)),
            Extension::block("b2").tokenizer(|_| Ok(None)),
        ])
        .unwrap();
        let names: Vec<_> = registry.block_rules().map(|e| e.name()).collect();
        assert_eq!(names, vec!["b1", "b2"]);
        assert!(registry.has_inline_rules());
    }

    #[test]
    fn match_that_invents_text_is_rejected() {
        let ext = Extension::inline("liar").tokenizer(|_| Ok(Some(ExtensionToken::new("xyz", ""))));
        let diag = Diagnostics::default();
        assert!(ext.try_tokenize("abc", &diag).is_none());
        assert_eq!(
            diag.take(),
            vec![ExtensionError::InvalidMatch {
                name: "liar".to_string()
            }]
        );
    }

    #[test]
    fn failing_walk_hook_restores_token() {
        let mut registry = ExtensionRegistry::default();
        registry.set_walk_hook(Box::new(|token: &mut Token| {
            token.text.push('!');
            if token.text.starts_with("bad") {
                return Err(ExtensionError::failed("walk", "nope"));
            }
            Ok(())
        }));

        let diag = Diagnostics::default();
        let mut token = Token::new(TokenKind::Paragraph, "bad", "bad")
            .with_children(vec![Token::text("good")]);
        registry.run_walk_hook(&mut token, &diag);

        assert_eq!(token.text, "bad");
        assert_eq!(token.children[0].text, "good!");
        assert_eq!(diag.take().len(), 1);
    }
}
