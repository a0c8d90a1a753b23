//! Inline lexing for emphasis, code, links, html and friends.
//!
//! Runs over the text content of a block. While the block may still grow
//! (`eof == false`), an opener with no closer yet becomes a *provisional*
//! token spanning the rest of the text instead of being committed as
//! literal text.

use crate::error::Diagnostics;
use crate::extension::ExtensionRegistry;
use crate::token::{Token, TokenKind};

type Lexed = (Vec<Token>, usize);

pub(crate) struct InlineLexer<'a> {
    registry: &'a ExtensionRegistry,
    diag: &'a Diagnostics,
    eof: bool,
}

enum LinkParse {
    Complete {
        label: String,
        href: String,
        title: Option<String>,
        len: usize,
    },
    /// Opened but the closing `]` or `)` has not arrived
    Incomplete { label: String },
    NotLink,
}

impl<'a> InlineLexer<'a> {
    pub fn new(registry: &'a ExtensionRegistry, diag: &'a Diagnostics, eof: bool) -> Self {
        Self {
            registry,
            diag,
            eof,
        }
    }

    /// Lexer for content enclosed by a matched pair, where nothing can be
    /// waiting for more input.
    fn closed(&self) -> InlineLexer<'a> {
        InlineLexer::new(self.registry, self.diag, true)
    }

    /// Lex inline content of every block in `token`'s tree.
    pub fn expand(&self, token: &mut Token) {
        match &token.kind {
            TokenKind::Paragraph | TokenKind::Heading { .. } | TokenKind::TableCell { .. } => {
                token.children = self.lex(&token.text);
            }
            TokenKind::Extension { inline: true, .. } => {
                token.children = self.lex(&token.text);
            }
            TokenKind::CodeBlock { .. } | TokenKind::Space | TokenKind::ThematicBreak => {}
            _ => {
                for child in &mut token.children {
                    self.expand(child);
                }
            }
        }
    }

    pub fn lex(&self, text: &str) -> Vec<Token> {
        let mut result = Vec::new();
        let mut hints: Vec<Option<usize>> = vec![None; self.registry.inline_rules().count()];
        let mut plain_start = 0;
        let mut i = 0;

        while i < text.len() {
            let found = self
                .lex_extension(text, i, &mut hints)
                .or_else(|| self.lex_builtin(text, i));

            if let Some((tokens, end)) = found {
                if i > plain_start {
                    result.push(Token::text(&text[plain_start..i]));
                }
                result.extend(tokens);
                i = end;
                plain_start = end;
                continue;
            }

            if text[i..].starts_with('\n') {
                // two trailing spaces make a hard break
                let line = &text[plain_start..i];
                let trimmed = line.trim_end_matches(' ');
                if line.len() - trimmed.len() >= 2 {
                    let text_end = plain_start + trimmed.len();
                    if text_end > plain_start {
                        result.push(Token::text(&text[plain_start..text_end]));
                    }
                    result.push(Token::new(TokenKind::LineBreak, &text[text_end..=i], ""));
                    i += 1;
                    plain_start = i;
                    continue;
                }
            }

            i += text[i..].chars().next().map_or(1, char::len_utf8);
        }

        if plain_start < text.len() {
            result.push(Token::text(&text[plain_start..]));
        }

        collapse_text_tokens(&mut result);
        result
    }

    fn lex_extension(&self, text: &str, i: usize, hints: &mut [Option<usize>]) -> Option<Lexed> {
        let rest = &text[i..];
        for (ext, hint) in self.registry.inline_rules().zip(hints.iter_mut()) {
            let next = match *hint {
                Some(at) if at >= i => at,
                _ => {
                    let at = ext.start_hint(rest).map_or(usize::MAX, |o| i + o);
                    *hint = Some(at);
                    at
                }
            };
            if next != i {
                continue;
            }
            if let Some(mut token) = ext.try_tokenize(rest, self.diag) {
                let end = i + token.raw.len();
                let complete = !token.provisional;
                token.provisional = !complete && !self.eof;
                if let TokenKind::Extension { inline: true, .. } = token.kind {
                    let content = if complete || self.eof { self.closed() } else { self.same() };
                    token.children = content.lex(&token.text);
                }
                return Some((vec![token], end));
            }
        }
        None
    }

    fn same(&self) -> InlineLexer<'a> {
        InlineLexer::new(self.registry, self.diag, self.eof)
    }

    fn lex_builtin(&self, text: &str, i: usize) -> Option<Lexed> {
        let rest = &text[i..];
        match rest.chars().next()? {
            '\\' => lex_escape(rest).map(|token| (vec![token], i + 2)),
            '`' => Some(self.lex_code_span(text, i)),
            '*' | '_' => Some(self.lex_emphasis(text, i)),
            '~' => Some(self.lex_strikethrough(text, i)),
            '[' => {
                if let Some((token, len)) = lex_footnote_ref(rest) {
                    return Some((vec![token], i + len));
                }
                self.lex_link(text, i, false)
            }
            '!' if rest[1..].starts_with('[') => self.lex_link(text, i, true),
            '<' => self.lex_angle(text, i),
            'h' | 'H' | 'w' | 'W' => lex_bare_url(text, i).map(|(token, len)| (vec![token], i + len)),
            _ => None,
        }
    }

    /// Rest of the text as one provisional token of `kind`, or `None` once
    /// no more input can arrive.
    fn unclosed(&self, text: &str, i: usize, kind: TokenKind, content: &str) -> Option<Lexed> {
        if self.eof {
            return None;
        }
        let mut token = Token::new(kind, &text[i..], content);
        token.provisional = true;
        Some((vec![token], text.len()))
    }

    fn lex_code_span(&self, text: &str, i: usize) -> Lexed {
        let count = run_length(&text[i..], '`');
        let start = i + count;

        if let Some(end) = find_closing_backticks(&text[start..], count) {
            let content = text[start..start + end].replace('\n', " ");
            // Strip a single leading/trailing space if both are present
            let trimmed = if content.starts_with(' ')
                && content.ends_with(' ')
                && !content.trim().is_empty()
            {
                content[1..content.len() - 1].to_string()
            } else {
                content
            };
            let close = start + end + count;
            let token = Token::new(TokenKind::CodeSpan, &text[i..close], trimmed);
            return (vec![token], close);
        }

        self.unclosed(text, i, TokenKind::CodeSpan, &text[start..])
            .unwrap_or_else(|| literal(text, i, start))
    }

    fn lex_emphasis(&self, text: &str, i: usize) -> Lexed {
        let marker = text[i..].chars().next().unwrap_or('*');
        let count = run_length(&text[i..], marker);
        let open = Delimiter::at(text, i, count, marker);
        let content_start = i + count;

        if !open.can_open {
            return literal(text, i, content_start);
        }

        let Some((close_at, close_count)) =
            find_closing_emphasis(text, content_start, marker, &open, count)
        else {
            let kind = if count >= 2 {
                TokenKind::Strong
            } else {
                TokenKind::Emphasis
            };
            return self
                .unclosed(text, i, kind, &text[content_start..])
                .unwrap_or_else(|| literal(text, i, content_start));
        };

        let used = match (count, close_count) {
            (o, c) if o >= 3 && c >= 3 => 3,
            (o, c) if o >= 2 && c >= 2 => 2,
            _ => 1,
        };
        let content = &text[content_start..close_at];
        let children = self.closed().lex(content);
        let outer_start = content_start - used;
        let end = close_at + used;

        let token = match used {
            1 => Token::new(TokenKind::Emphasis, &text[outer_start..end], content)
                .with_children(children),
            2 => Token::new(TokenKind::Strong, &text[outer_start..end], content)
                .with_children(children),
            _ => {
                let strong = Token::new(TokenKind::Strong, &text[outer_start + 1..end - 1], content)
                    .with_children(children);
                Token::new(TokenKind::Emphasis, &text[outer_start..end], content)
                    .with_children(vec![strong])
            }
        };

        let mut tokens = Vec::with_capacity(2);
        if outer_start > i {
            tokens.push(Token::text(&text[i..outer_start]));
        }
        tokens.push(token);
        (tokens, end)
    }

    fn lex_strikethrough(&self, text: &str, i: usize) -> Lexed {
        let count = run_length(&text[i..], '~');
        let content_start = i + count;
        let opens = count == 2
            && text[content_start..]
                .chars()
                .next()
                .is_some_and(|c| !c.is_whitespace());
        if !opens {
            return literal(text, i, content_start);
        }

        let mut j = content_start;
        while j < text.len() {
            let rest = &text[j..];
            if rest.starts_with('~') {
                let run = run_length(rest, '~');
                let after_space = text[..j].chars().next_back().is_some_and(char::is_whitespace);
                if run == 2 && j > content_start && !after_space {
                    let content = &text[content_start..j];
                    let token = Token::new(TokenKind::Strikethrough, &text[i..j + 2], content)
                        .with_children(self.closed().lex(content));
                    return (vec![token], j + 2);
                }
                j += run;
            } else {
                j += rest.chars().next().map_or(1, char::len_utf8);
            }
        }

        self.unclosed(text, i, TokenKind::Strikethrough, &text[content_start..])
            .unwrap_or_else(|| literal(text, i, content_start))
    }

    fn lex_link(&self, text: &str, i: usize, image: bool) -> Option<Lexed> {
        let bracket = if image { i + 1 } else { i };
        match parse_link(&text[bracket..]) {
            LinkParse::Complete {
                label,
                href,
                title,
                len,
            } => {
                let end = bracket + len;
                let token = if image {
                    Token::new(TokenKind::Image { href, title }, &text[i..end], label)
                } else {
                    let children = self.closed().lex(&label);
                    Token::new(TokenKind::Link { href, title }, &text[i..end], label)
                        .with_children(children)
                };
                Some((vec![token], end))
            }
            LinkParse::Incomplete { label } => {
                let kind = if image {
                    TokenKind::Image {
                        href: String::new(),
                        title: None,
                    }
                } else {
                    TokenKind::Link {
                        href: String::new(),
                        title: None,
                    }
                };
                self.unclosed(text, i, kind, &label)
            }
            LinkParse::NotLink => None,
        }
    }

    /// `<scheme:...>` autolinks and inline html / custom tags.
    fn lex_angle(&self, text: &str, i: usize) -> Option<Lexed> {
        let rest = &text[i..];
        if let Some(len) = autolink_len(rest) {
            let url = &rest[1..len - 1];
            let href = if !url.contains(':') && url.contains('@') {
                format!("mailto:{url}")
            } else {
                url.to_string()
            };
            let token = Token::new(
                TokenKind::Link { href, title: None },
                &rest[..len],
                url,
            )
            .with_children(vec![Token::text(url)]);
            return Some((vec![token], i + len));
        }

        if rest.starts_with("<!--") {
            return match rest.find("-->") {
                Some(end) => {
                    let raw = &rest[..end + 3];
                    let kind = TokenKind::Html {
                        tag: None,
                        block: false,
                    };
                    Some((vec![Token::new(kind, raw, raw)], i + end + 3))
                }
                None => {
                    let kind = TokenKind::Html {
                        tag: None,
                        block: false,
                    };
                    self.unclosed(text, i, kind, rest)
                }
            };
        }

        let tag = html_tag_name(rest)?;
        let kind = TokenKind::Html {
            tag: Some(tag),
            block: false,
        };
        match rest[1..].find(['>', '<']).map(|p| p + 1) {
            Some(end) if rest[end..].starts_with('>') => {
                let raw = &rest[..=end];
                Some((vec![Token::new(kind, raw, raw)], i + end + 1))
            }
            Some(_) => None,
            None => self.unclosed(text, i, kind, rest),
        }
    }
}

/// Literal text for `text[i..end]`.
fn literal(text: &str, i: usize, end: usize) -> Lexed {
    (vec![Token::text(&text[i..end])], end)
}

fn run_length(text: &str, c: char) -> usize {
    text.chars().take_while(|&x| x == c).count() * c.len_utf8()
}

fn lex_escape(rest: &str) -> Option<Token> {
    let next = rest[1..].chars().next()?;
    if next == '\n' {
        return Some(Token::new(TokenKind::LineBreak, &rest[..2], ""));
    }
    next.is_ascii_punctuation()
        .then(|| Token::new(TokenKind::Escape, &rest[..2], &rest[1..2]))
}

fn lex_footnote_ref(rest: &str) -> Option<(Token, usize)> {
    let body = rest.strip_prefix("[^")?;
    let close = body.find(']')?;
    let label = &body[..close];
    if label.is_empty() || label.contains(char::is_whitespace) {
        return None;
    }
    let len = close + 3;
    let token = Token::new(
        TokenKind::FootnoteRef {
            label: label.to_string(),
        },
        &rest[..len],
        label,
    );
    Some((token, len))
}

/// Flanking classification of a delimiter run.
struct Delimiter {
    can_open: bool,
    can_close: bool,
}

impl Delimiter {
    fn at(text: &str, i: usize, len: usize, marker: char) -> Self {
        let before = text[..i].chars().next_back();
        let after = text[i + len..].chars().next();
        let ws = |c: Option<char>| c.map_or(true, char::is_whitespace);
        let punct = |c: Option<char>| c.is_some_and(|c| c.is_ascii_punctuation());

        let left = !ws(after) && (!punct(after) || ws(before) || punct(before));
        let right = !ws(before) && (!punct(before) || ws(after) || punct(after));

        if marker == '_' {
            Self {
                can_open: left && (!right || punct(before)),
                can_close: right && (!left || punct(after)),
            }
        } else {
            Self {
                can_open: left,
                can_close: right,
            }
        }
    }

    fn both(&self) -> bool {
        self.can_open && self.can_close
    }
}

/// Find the first delimiter run that closes `open`, skipping code spans and
/// escapes. Returns the closer's offset and run length.
fn find_closing_emphasis(
    text: &str,
    from: usize,
    marker: char,
    open: &Delimiter,
    open_len: usize,
) -> Option<(usize, usize)> {
    let mut j = from;
    while j < text.len() {
        let rest = &text[j..];
        let c = rest.chars().next()?;
        if c == '\\' {
            j += 1 + rest[1..].chars().next().map_or(0, char::len_utf8);
            continue;
        }
        if c == '`' {
            let run = run_length(rest, '`');
            j += find_closing_backticks(&rest[run..], run).map_or(run, |end| run + end + run);
            continue;
        }
        if c == marker {
            let run = run_length(rest, marker);
            let close = Delimiter::at(text, j, run, marker);
            let multiple_of_three = (open.both() || close.both())
                && (open_len + run) % 3 == 0
                && !(open_len % 3 == 0 && run % 3 == 0);
            if close.can_close && j > from && !multiple_of_three {
                return Some((j, run));
            }
            j += run;
            continue;
        }
        j += c.len_utf8();
    }
    None
}

/// Find closing backticks matching the opening count.
fn find_closing_backticks(text: &str, count: usize) -> Option<usize> {
    let mut i = 0;
    while i < text.len() {
        if text[i..].starts_with('`') {
            let run = run_length(&text[i..], '`');
            if run == count {
                return Some(i);
            }
            i += run;
        } else {
            i += text[i..].chars().next().map_or(1, char::len_utf8);
        }
    }
    None
}

/// Parse a link starting with `[`.
fn parse_link(text: &str) -> LinkParse {
    let mut depth = 0;
    let mut bracket_end = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    bracket_end = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }

    let Some(bracket_end) = bracket_end else {
        return LinkParse::Incomplete {
            label: text[1..].to_string(),
        };
    };
    let label = text[1..bracket_end].to_string();

    let rest = &text[bracket_end + 1..];
    if rest.is_empty() {
        // `[label]` at the end could still grow a destination
        return LinkParse::Incomplete { label };
    }
    if !rest.starts_with('(') {
        return LinkParse::NotLink;
    }

    let mut depth = 0;
    let mut paren_end = None;
    let mut escaped = false;
    for (i, c) in rest.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    paren_end = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }

    let Some(paren_end) = paren_end else {
        return LinkParse::Incomplete { label };
    };

    let Some((href, title)) = parse_destination(&rest[1..paren_end]) else {
        return LinkParse::NotLink;
    };

    LinkParse::Complete {
        label,
        href,
        title,
        len: bracket_end + 1 + paren_end + 1,
    }
}

/// Split `dest "title"` inside a link's parentheses.
fn parse_destination(inner: &str) -> Option<(String, Option<String>)> {
    let inner = inner.trim();
    let (href, rest) = if let Some(body) = inner.strip_prefix('<') {
        let close = body.find('>')?;
        (&body[..close], &body[close + 1..])
    } else {
        let end = inner.find(char::is_whitespace).unwrap_or(inner.len());
        (&inner[..end], &inner[end..])
    };

    let rest = rest.trim();
    if rest.is_empty() {
        return Some((href.to_string(), None));
    }
    let quoted = [('"', '"'), ('\'', '\''), ('(', ')')]
        .iter()
        .find_map(|&(open, close)| rest.strip_prefix(open)?.strip_suffix(close))?;
    Some((href.to_string(), Some(quoted.to_string())))
}

/// Length of a `<scheme:...>` or `<user@host>` autolink.
fn autolink_len(rest: &str) -> Option<usize> {
    let body = rest.strip_prefix('<')?;
    let end = body.find(|c: char| c == '>' || c == '<' || c.is_whitespace())?;
    if !body[end..].starts_with('>') {
        return None;
    }
    let url = &body[..end];

    if let Some(colon) = url.find(':') {
        let scheme = &url[..colon];
        let valid = (2..=32).contains(&scheme.len())
            && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'));
        return valid.then_some(end + 2);
    }

    let (user, host) = url.split_once('@')?;
    let valid = !user.is_empty() && host.contains('.') && !host.starts_with('.');
    valid.then_some(end + 2)
}

/// Tag name of an opening or closing html tag at the start of `rest`.
fn html_tag_name(rest: &str) -> Option<String> {
    let body = rest.strip_prefix('<')?;
    let body = body.strip_prefix('/').unwrap_or(body);
    if !body.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    let len = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(body.len());
    let after = &body[len..];
    let valid = after.is_empty()
        || after.starts_with(char::is_whitespace)
        || after.starts_with('>')
        || after.starts_with('/');
    valid.then(|| body[..len].to_ascii_lowercase())
}

/// Bare `http://`, `https://` or `www.` literal.
fn lex_bare_url(text: &str, i: usize) -> Option<(Token, usize)> {
    if text[..i]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || matches!(c, '@' | '/' | ':' | '.'))
    {
        return None;
    }
    let rest = &text[i..];
    let lower: String = rest.chars().take(8).collect::<String>().to_ascii_lowercase();
    let prefix = ["https://", "http://", "www."]
        .into_iter()
        .find(|p| lower.starts_with(p))?;

    let mut len = rest
        .find(|c: char| c.is_whitespace() || c == '<')
        .unwrap_or(rest.len());
    loop {
        let url = &rest[..len];
        match url.chars().next_back() {
            Some('?' | '!' | '.' | ',' | ':' | '*' | '_' | '~' | '\'' | '"') => len -= 1,
            Some(')') if url.matches('(').count() < url.matches(')').count() => len -= 1,
            _ => break,
        }
    }
    let url = &rest[..len];
    if url.len() <= prefix.len() {
        return None;
    }

    let href = if prefix == "www." {
        format!("http://{url}")
    } else {
        url.to_string()
    };
    let token = Token::new(TokenKind::Link { href, title: None }, url, url)
        .with_children(vec![Token::text(url)]);
    Some((token, len))
}

/// Collapse adjacent plain text tokens into one.
fn collapse_text_tokens(tokens: &mut Vec<Token>) {
    let mut merged: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens.drain(..) {
        match merged.last_mut() {
            Some(last)
                if last.kind == TokenKind::Text
                    && token.kind == TokenKind::Text
                    && !last.provisional
                    && !token.provisional =>
            {
                last.raw.push_str(&token.raw);
                last.text.push_str(&token.text);
            }
            _ => merged.push(token),
        }
    }
    *tokens = merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::{Extension, ExtensionToken};
    use crate::token::Construct;
    use pretty_assertions::assert_eq;

    fn lex(text: &str, eof: bool) -> Vec<Token> {
        let registry = ExtensionRegistry::default();
        let diag = Diagnostics::default();
        InlineLexer::new(&registry, &diag, eof).lex(text)
    }

    fn constructs(tokens: &[Token]) -> Vec<Construct> {
        tokens.iter().map(Token::construct).collect()
    }

    #[test]
    fn test_inline_code() {
        let result = lex("some `code` here", true);
        assert_eq!(
            constructs(&result),
            vec![Construct::Text, Construct::CodeSpan, Construct::Text]
        );
        assert_eq!(result[1].text, "code");
    }

    #[test]
    fn test_bold_and_italic() {
        let result = lex("**bold** and *italic*", true);
        assert_eq!(result[0].kind, TokenKind::Strong);
        assert_eq!(result[0].text, "bold");
        assert_eq!(result[2].kind, TokenKind::Emphasis);
        assert_eq!(result[2].children, vec![Token::text("italic")]);
    }

    #[test]
    fn test_bold_italic_nests() {
        let result = lex("***both***", true);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].kind, TokenKind::Emphasis);
        assert_eq!(result[0].children[0].kind, TokenKind::Strong);
        assert_eq!(result[0].children[0].children, vec![Token::text("both")]);
    }

    #[test]
    fn intraword_underscore_is_literal() {
        let result = lex("snake_case_name", true);
        assert_eq!(result, vec![Token::text("snake_case_name")]);
    }

    #[test]
    fn spaced_asterisk_is_literal() {
        let result = lex("2 * 3 = 6", false);
        assert_eq!(result, vec![Token::text("2 * 3 = 6")]);
    }

    #[test]
    fn unclosed_strong_is_provisional_until_eof() {
        let result = lex("Hello **wor", false);
        assert_eq!(result.len(), 2);
        assert_eq!(result[1].kind, TokenKind::Strong);
        assert!(result[1].provisional);
        assert_eq!(result[1].raw, "**wor");

        let result = lex("Hello **wor", true);
        assert_eq!(result, vec![Token::text("Hello **wor")]);
    }

    #[test]
    fn test_link() {
        let result = lex("check [this](https://example.com \"Title\") out", true);
        assert_eq!(
            result[1].kind,
            TokenKind::Link {
                href: "https://example.com".to_string(),
                title: Some("Title".to_string())
            }
        );
        assert_eq!(result[1].text, "this");
    }

    #[test]
    fn incomplete_link_is_provisional() {
        let result = lex("[text](http://a.com", false);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].construct(), Construct::Link);
        assert!(result[0].provisional);
        assert_eq!(result[0].text, "text");

        let result = lex("[text](http://a.com", true);
        assert_eq!(result, vec![Token::text("[text](http://a.com")]);
    }

    #[test]
    fn bracket_without_destination_is_text() {
        let result = lex("[a] b", false);
        assert_eq!(result, vec![Token::text("[a] b")]);
    }

    #[test]
    fn test_image() {
        let result = lex("see ![alt](img.png) here", true);
        assert_eq!(
            result[1].kind,
            TokenKind::Image {
                href: "img.png".to_string(),
                title: None
            }
        );
        assert_eq!(result[1].text, "alt");
    }

    #[test]
    fn test_strikethrough() {
        let result = lex("some ~~deleted~~ text", true);
        assert_eq!(result[1].kind, TokenKind::Strikethrough);
        assert_eq!(result[1].text, "deleted");
    }

    #[test]
    fn autolinks() {
        let result = lex("<https://a.b/c> and www.example.com.", true);
        assert_eq!(
            result[0].kind,
            TokenKind::Link {
                href: "https://a.b/c".to_string(),
                title: None
            }
        );
        assert_eq!(
            result[2].kind,
            TokenKind::Link {
                href: "http://www.example.com".to_string(),
                title: None
            }
        );
        assert_eq!(result[3], Token::text("."));
    }

    #[test]
    fn inline_html_and_custom_tags() {
        let result = lex("a <span class=\"x\">b</span>", true);
        assert_eq!(
            constructs(&result),
            vec![
                Construct::Text,
                Construct::Html,
                Construct::Text,
                Construct::Html
            ]
        );
        assert_eq!(result[1].raw, "<span class=\"x\">");

        let result = lex("a <custom attr", false);
        assert!(result[1].provisional);
    }

    #[test]
    fn hard_breaks() {
        let result = lex("a  \nb\\\nc", true);
        assert_eq!(
            constructs(&result),
            vec![
                Construct::Text,
                Construct::LineBreak,
                Construct::Text,
                Construct::LineBreak,
                Construct::Text
            ]
        );
        let raw: String = result.iter().map(|t| t.raw.as_str()).collect();
        assert_eq!(raw, "a  \nb\\\nc");
    }

    #[test]
    fn escapes_and_footnote_refs() {
        let result = lex("\\*not\\* see[^1]", true);
        assert_eq!(result[0].kind, TokenKind::Escape);
        assert_eq!(result[0].text, "*");
        assert_eq!(
            result.last().map(|t| t.kind.clone()),
            Some(TokenKind::FootnoteRef {
                label: "1".to_string()
            })
        );
    }

    #[test]
    fn extension_wins_over_builtin() {
        let registry = ExtensionRegistry::new(vec![Extension::inline("star")
            .start(|src| src.find('*'))
            .tokenizer(|src| {
                Ok(src
                    .strip_prefix("**")
                    .map(|_| ExtensionToken::new("**", "star")))
            })])
        .unwrap();
        let diag = Diagnostics::default();
        let result = InlineLexer::new(&registry, &diag, true).lex("a **b**");
        assert_eq!(result[1].type_name(), "star");
        assert_eq!(result[3].type_name(), "star");
    }

    #[test]
    fn raw_round_trips() {
        let text = "x *a* **b** `c` [d](e) ~~f~~ <g> h\\_ www.i.com";
        let raw: String = lex(text, true).iter().map(|t| t.raw.as_str()).collect();
        assert_eq!(raw, text);
    }
}
