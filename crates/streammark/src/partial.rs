//! Incomplete-construct detection.
//!
//! Decides which tokens are provisional after a tokenize pass and which
//! placeholder component, if any, stands in for them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::token::{Construct, Token, TokenKind};
use crate::tokenizer::Checkpoint;

/// Placeholder components shown instead of a construct while it is
/// provisional, keyed by construct kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncompleteMap(BTreeMap<Construct, String>);

impl IncompleteMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, construct: Construct, component: impl Into<String>) {
        self.0.insert(construct, component.into());
    }

    pub fn get(&self, construct: Construct) -> Option<&str> {
        self.0.get(&construct).map(String::as_str)
    }

    pub fn contains(&self, construct: Construct) -> bool {
        self.0.contains_key(&construct)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match self.0.iter().find(|(_, id)| id.trim().is_empty()) {
            Some((construct, _)) => Err(ConfigError::EmptyPlaceholder(construct.name().to_string())),
            None => Ok(()),
        }
    }

    /// Placeholder for `token`, if it is provisional and its kind is mapped.
    pub fn placeholder_for(&self, token: &Token) -> Option<&str> {
        if !token.provisional {
            return None;
        }
        self.get(token.construct())
    }
}

pub(crate) struct Detector<'a> {
    placeholders: &'a IncompleteMap,
}

impl<'a> Detector<'a> {
    pub fn new(placeholders: &'a IncompleteMap) -> Self {
        Self { placeholders }
    }

    /// Flag provisional tokens. Everything before the checkpoint is settled;
    /// with `eof` nothing is provisional.
    pub fn mark(&self, tokens: &mut [Token], checkpoint: &Checkpoint, buffer: &str, eof: bool) {
        if eof {
            tokens.iter_mut().for_each(Token::settle);
            return;
        }

        let settled = checkpoint.settled().min(tokens.len());
        let (done, tail) = tokens.split_at_mut(settled);
        done.iter_mut().for_each(Token::settle);

        for token in tail.iter_mut() {
            token.provisional = true;
            propagate(token);
        }

        if let Some(last) = tail.last_mut() {
            if !buffer.ends_with(char::is_whitespace) {
                self.mark_open_tail(last);
            }
        }
    }

    /// Constructs that are complete so far but would still grow if the next
    /// chunk continues them, such as a bare URL at the very end of input.
    /// Only kinds with a placeholder configured are flagged.
    fn mark_open_tail(&self, token: &mut Token) -> bool {
        let grows = match token.children.last_mut() {
            Some(child) => self.mark_open_tail(child),
            None => false,
        };
        let open = is_bare_link(token) && self.placeholders.contains(token.construct());
        if grows || open {
            token.provisional = true;
        }
        grows || open
    }
}

/// A child that is provisional makes its parents provisional.
fn propagate(token: &mut Token) -> bool {
    let mut any = false;
    for child in &mut token.children {
        any |= propagate(child);
    }
    if any {
        token.provisional = true;
    }
    token.provisional
}

fn is_bare_link(token: &Token) -> bool {
    matches!(token.kind, TokenKind::Link { .. })
        && !token.raw.starts_with('[')
        && !token.raw.starts_with('<')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Diagnostics;
    use crate::extension::ExtensionRegistry;
    use crate::tokenizer::Tokenizer;

    fn marked(src: &str, placeholders: &IncompleteMap) -> Vec<Token> {
        let registry = ExtensionRegistry::default();
        let diag = Diagnostics::default();
        let mut tokens = Vec::new();
        let checkpoint =
            Tokenizer::new(&registry, &diag).tokenize(src, &Checkpoint::default(), &mut tokens, false);
        Detector::new(placeholders).mark(&mut tokens, &checkpoint, src, false);
        tokens
    }

    #[test]
    fn only_the_tail_is_provisional() {
        let tokens = marked("# Done\n\nstill go", &IncompleteMap::new());
        let flags: Vec<_> = tokens.iter().map(|t| t.provisional).collect();
        assert_eq!(flags, vec![false, false, true]);
    }

    #[test]
    fn bare_url_at_tail_is_open_when_mapped() {
        let mut map = IncompleteMap::new();
        let tokens = marked("see https://exa", &map);
        assert!(!tokens[0].children[1].provisional);

        map.insert(Construct::Link, "link-skeleton");
        let tokens = marked("see https://exa", &map);
        let link = &tokens[0].children[1];
        assert!(link.provisional);
        assert_eq!(map.placeholder_for(link), Some("link-skeleton"));

        // whitespace ends the url
        let tokens = marked("see https://exa ", &map);
        assert!(!tokens[0].children[1].provisional);
    }

    #[test]
    fn nested_unclosed_inline_marks_parents() {
        let tokens = marked("- item with `code", &IncompleteMap::new());
        let item = &tokens[0].children[0];
        assert!(item.provisional);
        assert!(item.children[0].provisional);
    }

    #[test]
    fn empty_placeholder_is_rejected() {
        let mut map = IncompleteMap::new();
        map.insert(Construct::Image, " ");
        assert_eq!(
            map.validate(),
            Err(ConfigError::EmptyPlaceholder("image".to_string()))
        );
    }

    #[test]
    fn map_deserializes_from_construct_names() {
        let map: IncompleteMap =
            serde_json::from_str(r#"{"link": "skeleton", "code-block": "spinner"}"#).unwrap();
        assert_eq!(map.get(Construct::CodeBlock), Some("spinner"));
    }
}
