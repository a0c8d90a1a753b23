//! Tokens - the output of the incremental tokenizer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, IntoStaticStr};

/// Stable identity of a top-level token across chunks.
///
/// Assigned from a monotonically increasing sequence when a token is first
/// seen, never derived from its byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TokenId(pub u64);

/// Column alignment from a table delimiter row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Align {
    #[default]
    None,
    Left,
    Center,
    Right,
}

impl Align {
    pub fn as_str(&self) -> &'static str {
        match self {
            Align::None => "none",
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
        }
    }
}

/// The structural kind of a token, without its attributes.
///
/// This is the key used by placeholder maps and renderer overrides.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Construct {
    Text,
    Paragraph,
    Heading,
    Emphasis,
    Strong,
    Strikethrough,
    Link,
    Image,
    CodeSpan,
    CodeBlock,
    List,
    ListItem,
    Table,
    TableRow,
    TableCell,
    Html,
    #[strum(serialize = "blockquote")]
    #[serde(rename = "blockquote")]
    BlockQuote,
    ThematicBreak,
    FootnoteRef,
    Footnote,
    LineBreak,
    Space,
    Escape,
    Extension,
}

impl Construct {
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Construct::iter().find(|c| c.name() == name)
    }

    /// Inline constructs live inside a block's text content.
    pub fn is_inline(self) -> bool {
        matches!(
            self,
            Construct::Text
                | Construct::Emphasis
                | Construct::Strong
                | Construct::Strikethrough
                | Construct::Link
                | Construct::Image
                | Construct::CodeSpan
                | Construct::FootnoteRef
                | Construct::LineBreak
                | Construct::Escape
        )
    }
}

/// Token kind with its kind-specific attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TokenKind {
    /// Plain text run
    Text,

    Paragraph,

    /// ATX or setext heading with depth 1-6
    Heading { depth: u8 },

    Emphasis,
    Strong,
    Strikethrough,

    Link {
        href: String,
        title: Option<String>,
    },

    /// Image; `text` carries the alt text
    Image {
        href: String,
        title: Option<String>,
    },

    /// Inline code (`code`)
    CodeSpan,

    /// Fenced code block. `closed` is false when the closing fence has not
    /// arrived (or never did, for a finalized stream).
    CodeBlock { lang: Option<String>, closed: bool },

    /// Start number and delimiter are fixed by the first item.
    List {
        ordered: bool,
        start: u32,
        delimiter: char,
        loose: bool,
    },

    /// `task` is `Some(checked)` for `- [ ]` / `- [x]` items
    ListItem { task: Option<bool> },

    /// Column count and alignment are fixed by the header row.
    Table { align: Vec<Align> },

    TableRow { header: bool },

    TableCell { header: bool, align: Align },

    /// Raw HTML or a custom tag. Block-level tags that span lines carry
    /// their inner content as block children.
    Html { tag: Option<String>, block: bool },

    #[serde(rename = "blockquote")]
    BlockQuote,

    ThematicBreak,

    FootnoteRef { label: String },

    /// Footnote definition `[^label]: ...`
    Footnote { label: String },

    /// Hard line break
    LineBreak,

    /// Blank lines between blocks
    Space,

    /// Backslash escape; `text` is the escaped character
    Escape,

    /// Produced by a registered extension tokenizer
    Extension {
        name: String,
        attrs: BTreeMap<String, String>,
        #[serde(skip)]
        inline: bool,
    },
}

impl TokenKind {
    pub fn construct(&self) -> Construct {
        match self {
            TokenKind::Text => Construct::Text,
            TokenKind::Paragraph => Construct::Paragraph,
            TokenKind::Heading { .. } => Construct::Heading,
            TokenKind::Emphasis => Construct::Emphasis,
            TokenKind::Strong => Construct::Strong,
            TokenKind::Strikethrough => Construct::Strikethrough,
            TokenKind::Link { .. } => Construct::Link,
            TokenKind::Image { .. } => Construct::Image,
            TokenKind::CodeSpan => Construct::CodeSpan,
            TokenKind::CodeBlock { .. } => Construct::CodeBlock,
            TokenKind::List { .. } => Construct::List,
            TokenKind::ListItem { .. } => Construct::ListItem,
            TokenKind::Table { .. } => Construct::Table,
            TokenKind::TableRow { .. } => Construct::TableRow,
            TokenKind::TableCell { .. } => Construct::TableCell,
            TokenKind::Html { .. } => Construct::Html,
            TokenKind::BlockQuote => Construct::BlockQuote,
            TokenKind::ThematicBreak => Construct::ThematicBreak,
            TokenKind::FootnoteRef { .. } => Construct::FootnoteRef,
            TokenKind::Footnote { .. } => Construct::Footnote,
            TokenKind::LineBreak => Construct::LineBreak,
            TokenKind::Space => Construct::Space,
            TokenKind::Escape => Construct::Escape,
            TokenKind::Extension { .. } => Construct::Extension,
        }
    }
}

/// A node of the token tree.
///
/// `raw` is the exact source consumed. Concatenating the `raw` of all
/// top-level tokens reproduces a prefix of the document buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    #[serde(flatten)]
    pub kind: TokenKind,
    pub raw: String,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Token>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub provisional: bool,
}

impl Token {
    pub fn new(kind: TokenKind, raw: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind,
            raw: raw.into(),
            text: text.into(),
            children: Vec::new(),
            provisional: false,
        }
    }

    /// Plain text token whose text is its raw source.
    pub fn text(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self::new(TokenKind::Text, raw.clone(), raw)
    }

    pub fn with_children(mut self, children: Vec<Token>) -> Self {
        self.children = children;
        self
    }

    pub fn construct(&self) -> Construct {
        self.kind.construct()
    }

    /// Name used for renderer lookup: the extension name for extension
    /// tokens, the construct name otherwise.
    pub fn type_name(&self) -> &str {
        match &self.kind {
            TokenKind::Extension { name, .. } => name,
            kind => kind.construct().name(),
        }
    }

    /// True if this token or any descendant is provisional.
    pub fn any_provisional(&self) -> bool {
        self.provisional || self.children.iter().any(Token::any_provisional)
    }

    /// Clear provisional flags on this token and all descendants.
    pub fn settle(&mut self) {
        self.provisional = false;
        for child in &mut self.children {
            child.settle();
        }
    }

    /// Visit this token and its descendants in pre-order.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Token)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_names_are_kebab_case() {
        assert_eq!(Construct::CodeBlock.name(), "code-block");
        assert_eq!(Construct::BlockQuote.name(), "blockquote");
        assert_eq!(Construct::from_name("thematic-break"), Some(Construct::ThematicBreak));
        assert_eq!(Construct::from_name("nope"), None);
    }

    #[test]
    fn extension_type_name_is_its_name() {
        let token = Token::new(
            TokenKind::Extension {
                name: "mention".to_string(),
                attrs: BTreeMap::new(),
                inline: false,
            },
            "@bob",
            "bob",
        );
        assert_eq!(token.type_name(), "mention");
        assert_eq!(Token::text("hi").type_name(), "text");
    }

    #[test]
    fn settle_clears_nested_flags() {
        let mut child = Token::text("x");
        child.provisional = true;
        let mut parent = Token::new(TokenKind::Paragraph, "x", "x").with_children(vec![child]);
        assert!(parent.any_provisional());
        parent.settle();
        assert!(!parent.any_provisional());
    }
}
