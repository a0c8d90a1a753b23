//! Token to render-node conversion.

use std::cell::Cell;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Diagnostics, ExtensionError};
use crate::extension::ExtensionRegistry;
use crate::partial::IncompleteMap;
use crate::token::{Construct, Token, TokenKind};

/// What a node mounts as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "kebab-case")]
pub enum Component {
    /// Built-in component for a markdown construct
    Builtin(Construct),
    /// Extension component or custom html tag
    Custom(String),
    /// Caller-supplied stand-in for a provisional construct
    Placeholder(String),
}

/// Output tree handed to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Node {
    Text(String),
    Element {
        component: Component,
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        props: BTreeMap<String, String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        children: Vec<Node>,
    },
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn element(component: Component) -> Self {
        Node::Element {
            component,
            props: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn builtin(construct: Construct) -> Self {
        Self::element(Component::Builtin(construct))
    }

    pub fn custom(name: impl Into<String>) -> Self {
        Self::element(Component::Custom(name.into()))
    }

    pub fn prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Node::Element { props, .. } = &mut self {
            props.insert(key.into(), value.into());
        }
        self
    }

    pub fn with_children(mut self, nodes: Vec<Node>) -> Self {
        if let Node::Element { children, .. } = &mut self {
            *children = nodes;
        }
        self
    }

    pub fn component(&self) -> Option<&Component> {
        match self {
            Node::Text(_) => None,
            Node::Element { component, .. } => Some(component),
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Text(_) => &[],
            Node::Element { children, .. } => children,
        }
    }

    /// Concatenated text of all text leaves.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Element { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }
}

/// Renders tokens, resolving extension renderers, overrides and
/// placeholders. Custom renderers receive it to render child tokens.
pub struct Renderer<'a> {
    registry: &'a ExtensionRegistry,
    placeholders: &'a IncompleteMap,
    diag: &'a Diagnostics,
    calls: Cell<usize>,
}

impl<'a> Renderer<'a> {
    pub(crate) fn new(
        registry: &'a ExtensionRegistry,
        placeholders: &'a IncompleteMap,
        diag: &'a Diagnostics,
    ) -> Self {
        Self {
            registry,
            placeholders,
            diag,
            calls: Cell::new(0),
        }
    }

    /// Number of tokens rendered so far, children included.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn children(&self, token: &Token) -> Vec<Node> {
        token.children.iter().map(|t| self.render(t)).collect()
    }

    pub fn render(&self, token: &Token) -> Node {
        self.calls.set(self.calls.get() + 1);

        if let Some(id) = self.placeholders.placeholder_for(token) {
            return Node::element(Component::Placeholder(id.to_string()))
                .prop("kind", token.type_name())
                .prop("raw", token.raw.as_str());
        }
        if token.provisional && token.construct().is_inline() {
            // never show a half-formed construct
            return Node::text(token.raw.as_str());
        }

        if let Some(render) = self.registry.renderer(token.type_name()) {
            match render(token, self) {
                Ok(Some(node)) => return node,
                Ok(None) => {}
                Err(err) => {
                    let err = if matches!(err, ExtensionError::Render { .. }) {
                        err
                    } else {
                        ExtensionError::Render {
                            token_type: token.type_name().to_string(),
                            message: err.to_string(),
                        }
                    };
                    self.diag.report(err);
                    return Node::text(token.raw.as_str());
                }
            }
        }

        self.builtin(token)
    }

    fn builtin(&self, token: &Token) -> Node {
        let construct = token.construct();
        let node = Node::builtin(construct);
        match &token.kind {
            TokenKind::Text | TokenKind::Escape => Node::text(token.text.as_str()),
            TokenKind::Heading { depth } => node
                .prop("depth", depth.to_string())
                .with_children(self.children(token)),
            TokenKind::Link { href, title } => with_title(node.prop("href", href.as_str()), title)
                .with_children(self.children(token)),
            TokenKind::Image { href, title } => {
                with_title(node.prop("src", href.as_str()), title).prop("alt", token.text.as_str())
            }
            TokenKind::CodeSpan => node.with_children(vec![Node::text(token.text.as_str())]),
            TokenKind::CodeBlock { lang, .. } => {
                let node = match lang {
                    Some(lang) => node.prop("lang", lang.as_str()),
                    None => node,
                };
                node.with_children(vec![Node::text(token.text.as_str())])
            }
            TokenKind::List {
                ordered,
                start,
                loose,
                ..
            } => {
                let mut node = node.prop("ordered", ordered.to_string());
                if *ordered && *start != 1 {
                    node = node.prop("start", start.to_string());
                }
                if *loose {
                    node = node.prop("loose", "true");
                }
                node.with_children(self.children(token))
            }
            TokenKind::ListItem { task } => {
                let node = match task {
                    Some(checked) => node.prop("checked", checked.to_string()),
                    None => node,
                };
                node.with_children(self.children(token))
            }
            TokenKind::TableRow { header } if *header => {
                node.prop("header", "true").with_children(self.children(token))
            }
            TokenKind::TableCell { header, align } => {
                let mut node = node;
                if *header {
                    node = node.prop("header", "true");
                }
                if *align != crate::token::Align::None {
                    node = node.prop("align", align.as_str());
                }
                node.with_children(self.children(token))
            }
            TokenKind::Html { tag, .. } => match tag {
                // a tag with parsed inner content mounts as its own component
                Some(tag) if !token.children.is_empty() => {
                    Node::custom(tag.as_str()).with_children(self.children(token))
                }
                _ => node.prop("raw", token.raw.as_str()),
            },
            TokenKind::FootnoteRef { label } => node.prop("label", label.as_str()),
            TokenKind::Footnote { label } => node
                .prop("label", label.as_str())
                .with_children(self.children(token)),
            TokenKind::Extension { name, attrs, .. } => {
                let mut node = Node::custom(name.as_str());
                for (key, value) in attrs {
                    node = node.prop(key.as_str(), value.as_str());
                }
                if token.children.is_empty() {
                    node.with_children(vec![Node::text(token.text.as_str())])
                } else {
                    node.with_children(self.children(token))
                }
            }
            TokenKind::LineBreak | TokenKind::ThematicBreak | TokenKind::Space => node,
            _ => node.with_children(self.children(token)),
        }
    }
}

fn with_title(node: Node, title: &Option<String>) -> Node {
    match title {
        Some(title) => node.prop("title", title.as_str()),
        None => node,
    }
}
