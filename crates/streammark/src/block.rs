//! Block-level lexing.
//!
//! Splits text into top-level block tokens, line by line. Every block also
//! reports whether it is *closed*: its end was decided by a complete line
//! (or by end of input), so no amount of appended text can change it. The
//! incremental tokenizer only settles a prefix of closed blocks.
//!
//! An incomplete last line is still lexed, so the provisional tail renders
//! something sensible, but a decision that depends on it never closes a
//! block.

use crate::error::Diagnostics;
use crate::extension::ExtensionRegistry;
use crate::token::{Align, Token, TokenKind};

/// A block token plus whether its extent is final.
#[derive(Debug, Clone)]
pub(crate) struct LexedBlock {
    pub token: Token,
    pub closed: bool,
}

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    start: usize,
    next: usize,
    /// Line content without the trailing newline
    text: &'a str,
    newline: bool,
    /// Ends with a newline, or is the last line of finished input
    complete: bool,
}

impl Line<'_> {
    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone)]
struct Fence {
    ch: char,
    len: usize,
    indent: usize,
    lang: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerKind {
    Bullet(char),
    Ordered { start: u32, delimiter: char },
}

#[derive(Debug, Clone, Copy)]
struct ListMarker<'a> {
    kind: MarkerKind,
    content_indent: usize,
    content: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HtmlEnd {
    Comment,
    CloseTag(String),
    BlankLine,
}

pub(crate) struct BlockLexer<'a> {
    src: &'a str,
    eof: bool,
    registry: &'a ExtensionRegistry,
    diag: &'a Diagnostics,
    /// Offset up to which an open fence at offset 0 is known to have no
    /// closing line
    fence_resume: Option<usize>,
    open_fence: Option<(usize, usize)>,
}

impl<'a> BlockLexer<'a> {
    pub fn new(
        src: &'a str,
        eof: bool,
        registry: &'a ExtensionRegistry,
        diag: &'a Diagnostics,
    ) -> Self {
        Self {
            src,
            eof,
            registry,
            diag,
            fence_resume: None,
            open_fence: None,
        }
    }

    pub fn resume_fence(mut self, scanned: Option<usize>) -> Self {
        self.fence_resume = scanned;
        self
    }

    /// Start of a trailing fenced code block that is still open, and the
    /// offset up to which it has been scanned for a closing fence.
    pub fn open_fence(&self) -> Option<(usize, usize)> {
        self.open_fence
    }

    pub fn lex(&mut self) -> Vec<LexedBlock> {
        let mut blocks = Vec::new();
        let mut pos = 0;
        while pos < self.src.len() {
            let (block, next) = self.lex_block(pos);
            debug_assert!(next > pos, "block lexer must make progress");
            pos = next;
            blocks.push(block);
        }
        blocks
    }

    /// Lex a container's inner content. Closure of inner blocks does not
    /// matter; the container decides.
    fn nested(&self, text: &str, eof: bool) -> Vec<Token> {
        BlockLexer::new(text, eof, self.registry, self.diag)
            .lex()
            .into_iter()
            .map(|b| b.token)
            .collect()
    }

    fn line_at(&self, pos: usize) -> Option<Line<'a>> {
        if pos >= self.src.len() {
            return None;
        }
        let rest = &self.src[pos..];
        let (text, next, newline) = match rest.find('\n') {
            Some(nl) => (&rest[..nl], pos + nl + 1, true),
            None => (rest, self.src.len(), false),
        };
        Some(Line {
            start: pos,
            next,
            text: text.strip_suffix('\r').unwrap_or(text),
            newline,
            complete: newline || self.eof,
        })
    }

    fn block(&self, kind: TokenKind, start: usize, end: usize, text: impl Into<String>) -> Token {
        Token::new(kind, &self.src[start..end], text)
    }

    fn lex_block(&mut self, pos: usize) -> (LexedBlock, usize) {
        if let Some(found) = self.lex_extension(pos) {
            return found;
        }

        let Some(line) = self.line_at(pos) else {
            unreachable!("lex_block called past end of input");
        };

        if line.is_blank() {
            return self.lex_space(pos);
        }
        if is_thematic_break(line.text) {
            let token = self.block(TokenKind::ThematicBreak, pos, line.next, "");
            return (closed(token, line.complete), line.next);
        }
        if let Some((depth, content)) = atx_heading(line.text) {
            let token = self.block(TokenKind::Heading { depth }, pos, line.next, content);
            return (closed(token, line.complete), line.next);
        }
        if let Some(fence) = fence_open(line.text) {
            return self.lex_fence(pos, line, fence);
        }
        if quote_strip(line.text).is_some() {
            return self.lex_blockquote(pos);
        }
        if let Some(marker) = list_marker(line.text) {
            return self.lex_list(pos, marker.kind);
        }
        if let Some((tag, end)) = html_start(line.text) {
            return self.lex_html(pos, line, tag, end);
        }
        if let Some((label, rest)) = footnote_def(line.text) {
            return self.lex_footnote(pos, line, label, rest);
        }
        if let Some(align) = self.table_start(line) {
            return self.lex_table(pos, line, align);
        }
        self.lex_paragraph(pos, line)
    }

    fn lex_extension(&self, pos: usize) -> Option<(LexedBlock, usize)> {
        let remaining = &self.src[pos..];
        for ext in self.registry.block_rules() {
            if let Some(mut token) = ext.try_tokenize(remaining, self.diag) {
                let end = pos + token.raw.len();
                let closed = self.eof || (!token.provisional && end < self.src.len());
                token.provisional = false;
                return Some((LexedBlock { token, closed }, end));
            }
        }
        None
    }

    fn lex_space(&self, pos: usize) -> (LexedBlock, usize) {
        let mut end = pos;
        let mut is_closed = self.eof;
        while let Some(line) = self.line_at(end) {
            if !line.is_blank() {
                // a non-blank line can never become blank again
                is_closed = true;
                break;
            }
            end = line.next;
        }
        let token = self.block(TokenKind::Space, pos, end, "");
        (closed(token, is_closed), end)
    }

    fn lex_fence(&mut self, pos: usize, open: Line<'a>, fence: Fence) -> (LexedBlock, usize) {
        let resume = if pos == 0 { self.fence_resume } else { None };
        let mut content = String::new();
        let mut cursor = open.next;
        let mut scanned = open.next;
        let mut end = self.src.len();
        let mut found_close = false;

        while let Some(line) = self.line_at(cursor) {
            let skip_check = resume.is_some_and(|r| line.start < r);
            if line.complete && !skip_check && is_fence_close(line.text, &fence) {
                end = line.next;
                found_close = true;
                break;
            }
            content.push_str(strip_indent(line.text, fence.indent));
            if line.newline {
                content.push('\n');
                scanned = line.next;
            }
            cursor = line.next;
        }

        if !found_close && open.newline {
            self.open_fence = Some((pos, scanned));
        }

        let token = self.block(
            TokenKind::CodeBlock {
                lang: fence.lang,
                closed: found_close,
            },
            pos,
            end,
            content,
        );
        (closed(token, found_close || self.eof), end)
    }

    fn lex_blockquote(&self, pos: usize) -> (LexedBlock, usize) {
        let mut inner = String::new();
        let mut end = pos;
        let mut is_closed = self.eof;
        let mut lazy_ok = false;

        while let Some(line) = self.line_at(end) {
            if let Some(rest) = quote_strip(line.text) {
                inner.push_str(rest);
                lazy_ok = !rest.trim().is_empty() && fence_open(rest).is_none();
            } else if lazy_ok && !line.is_blank() && !self.starts_block(line.text) {
                inner.push_str(line.text.trim_start());
            } else {
                is_closed = line.complete;
                break;
            }
            if line.newline {
                inner.push('\n');
            }
            end = line.next;
        }

        let children = self.nested(&inner, is_closed);
        let token = self
            .block(TokenKind::BlockQuote, pos, end, inner)
            .with_children(children);
        (closed(token, is_closed), end)
    }

    /// Collect the body of a list item or footnote definition: lines
    /// indented past `content_indent`, plus lazy paragraph continuations.
    ///
    /// Returns the de-indented body, the end offset (trailing blank lines
    /// excluded) and whether a blank line separated two parts of the body.
    fn collect_container(
        &self,
        first: Line<'a>,
        first_content: &str,
        content_indent: usize,
    ) -> (String, usize, bool) {
        let mut body = String::from(first_content);
        if first.newline {
            body.push('\n');
        }
        let mut end = first.next;
        let mut scan = end;
        let mut blanks = String::new();
        let mut inner_blank = false;
        let mut lazy_ok = !first_content.trim().is_empty();
        let mut has_content = lazy_ok;

        while let Some(line) = self.line_at(scan) {
            if line.is_blank() {
                if !has_content {
                    // an item may not start with more than one blank line
                    break;
                }
                blanks.push('\n');
                scan = line.next;
                lazy_ok = false;
                continue;
            }
            if indent(line.text) >= content_indent {
                if !blanks.is_empty() {
                    inner_blank = true;
                    body.push_str(&blanks);
                    blanks.clear();
                }
                let stripped = strip_indent(line.text, content_indent);
                body.push_str(stripped);
                lazy_ok = fence_open(stripped).is_none();
                has_content = true;
            } else if blanks.is_empty() && lazy_ok && !self.starts_block(line.text) {
                body.push_str(line.text.trim_start());
            } else {
                break;
            }
            if line.newline {
                body.push('\n');
            }
            end = line.next;
            scan = end;
        }
        (body, end, inner_blank)
    }

    /// The line after `end`, skipping blank lines. Returns the offset of
    /// that line (or end of input) and the line itself.
    fn next_content_line(&self, end: usize) -> (usize, Option<Line<'a>>) {
        let mut look = end;
        while let Some(line) = self.line_at(look) {
            if !line.is_blank() {
                return (look, Some(line));
            }
            look = line.next;
        }
        (look, None)
    }

    fn lex_list(&self, pos: usize, kind: MarkerKind) -> (LexedBlock, usize) {
        let mut items: Vec<Token> = Vec::new();
        let mut loose = false;
        let mut cursor = pos;
        let (end, is_closed) = loop {
            let Some(line) = self.line_at(cursor) else {
                break (cursor, self.eof);
            };
            let Some(marker) = list_marker(line.text) else {
                break (cursor, line.complete);
            };
            let (body, item_end, inner_blank) =
                self.collect_container(line, marker.content, marker.content_indent);
            loose |= inner_blank;

            let (task, body) = task_marker(&body);
            let item = self
                .block(TokenKind::ListItem { task }, cursor, item_end, body)
                .with_children(Vec::new());
            items.push(item);

            let (look, next) = self.next_content_line(item_end);
            let Some(next) = next else {
                break (item_end, self.eof);
            };
            let continues = !is_thematic_break(next.text)
                && list_marker(next.text).is_some_and(|m| m.kind.same_list(kind));
            if !continues {
                break (item_end, next.complete);
            }
            if look > item_end {
                loose = true;
                if let Some(last) = items.last_mut() {
                    last.raw.push_str(&self.src[item_end..look]);
                }
            }
            cursor = look;
        };

        for item in &mut items {
            item.children = self.nested(&item.text, is_closed);
        }
        let (ordered, start, delimiter) = match kind {
            MarkerKind::Bullet(ch) => (false, 1, ch),
            MarkerKind::Ordered { start, delimiter } => (true, start, delimiter),
        };
        let token = self
            .block(
                TokenKind::List {
                    ordered,
                    start,
                    delimiter,
                    loose,
                },
                pos,
                end,
                "",
            )
            .with_children(items);
        (closed(token, is_closed), end)
    }

    fn lex_footnote(
        &self,
        pos: usize,
        line: Line<'a>,
        label: String,
        rest: &str,
    ) -> (LexedBlock, usize) {
        let (body, end, _) = self.collect_container(line, rest, 4);
        let (_, next) = self.next_content_line(end);
        let is_closed = next.map_or(self.eof, |l| l.complete);
        let children = self.nested(&body, is_closed);
        let token = self
            .block(TokenKind::Footnote { label }, pos, end, body)
            .with_children(children);
        (closed(token, is_closed), end)
    }

    fn lex_html(
        &self,
        pos: usize,
        first: Line<'a>,
        tag: Option<String>,
        html_end: HtmlEnd,
    ) -> (LexedBlock, usize) {
        let mut end = self.src.len();
        let mut is_closed = self.eof;
        let mut inner_range = None;

        match &html_end {
            HtmlEnd::BlankLine => {
                let mut cursor = first.next;
                while let Some(line) = self.line_at(cursor) {
                    if line.is_blank() {
                        end = cursor;
                        is_closed = line.complete;
                        break;
                    }
                    cursor = line.next;
                }
            }
            HtmlEnd::Comment | HtmlEnd::CloseTag(_) => {
                let needle = match &html_end {
                    HtmlEnd::CloseTag(name) => format!("</{name}"),
                    _ => "-->".to_string(),
                };
                let open_end = match &html_end {
                    HtmlEnd::CloseTag(_) => first.text.find('>').map_or(first.next, |i| pos + i + 1),
                    _ => first.text.find("<!--").map_or(first.next, |i| pos + i + 4),
                };
                let mut cursor = pos;
                let mut close_at = None;
                while let Some(line) = self.line_at(cursor) {
                    let from = open_end.saturating_sub(line.start).min(line.text.len());
                    let hay = line.text.to_ascii_lowercase();
                    if let Some(idx) = hay.get(from..).and_then(|h| h.find(&needle)) {
                        if line.complete {
                            end = line.next;
                            is_closed = true;
                            close_at = Some(line.start + from + idx);
                        }
                        break;
                    }
                    cursor = line.next;
                }
                if let HtmlEnd::CloseTag(_) = html_end {
                    let inner_end = close_at.unwrap_or(end).max(open_end);
                    inner_range = Some(open_end.min(inner_end)..inner_end);
                }
            }
        }

        let raw = &self.src[pos..end];
        let mut token = Token::new(
            TokenKind::Html {
                tag,
                block: true,
            },
            raw,
            raw,
        );
        if let Some(range) = inner_range {
            let inner = self.src.get(range).unwrap_or("");
            if !inner.trim().is_empty() {
                token.children = self.nested(inner.trim_start_matches('\n'), is_closed);
            }
        }
        (closed(token, is_closed), end)
    }

    /// A table starts at a line with pipes followed by a delimiter row with
    /// the same number of cells.
    fn table_start(&self, header: Line<'a>) -> Option<Vec<Align>> {
        let cells = split_cells(header.text)?;
        let delim = self.line_at(header.next)?;
        let align = delimiter_row(delim.text)?;
        (align.len() == cells.len()).then_some(align)
    }

    fn lex_table(&self, pos: usize, header: Line<'a>, align: Vec<Align>) -> (LexedBlock, usize) {
        let columns = align.len();
        let mut rows = vec![table_row(header.text, &align, true)];
        let Some(delim) = self.line_at(header.next) else {
            unreachable!("table_start checked the delimiter row");
        };

        let mut end = delim.next;
        let mut is_closed = self.eof;
        while let Some(line) = self.line_at(end) {
            if line.is_blank() || !line.text.contains('|') || self.starts_block(line.text) {
                is_closed = line.complete;
                break;
            }
            rows.push(table_row(line.text, &align, false));
            end = line.next;
        }
        if !delim.complete {
            is_closed = false;
        }

        debug_assert!(rows.iter().all(|r| r.children.len() == columns));
        let token = self
            .block(TokenKind::Table { align }, pos, end, "")
            .with_children(rows);
        (closed(token, is_closed), end)
    }

    fn lex_paragraph(&self, pos: usize, first: Line<'a>) -> (LexedBlock, usize) {
        let mut lines = vec![first.text.trim_start()];
        let mut end = first.next;
        let mut is_closed = self.eof;

        while let Some(line) = self.line_at(end) {
            if line.is_blank() {
                is_closed = line.complete;
                break;
            }
            if let Some(depth) = setext_underline(line.text) {
                let text = lines.join("\n").trim().to_string();
                let token = self.block(TokenKind::Heading { depth }, pos, line.next, text);
                return (closed(token, line.complete), line.next);
            }
            if self.interrupts_paragraph(line) {
                is_closed = line.complete;
                break;
            }
            lines.push(line.text.trim_start());
            end = line.next;
        }

        let text = lines.join("\n").trim_end().to_string();
        let token = self.block(TokenKind::Paragraph, pos, end, text);
        (closed(token, is_closed), end)
    }

    /// Block starts that end a paragraph (or a lazy continuation).
    fn starts_block(&self, text: &str) -> bool {
        is_thematic_break(text)
            || atx_heading(text).is_some()
            || fence_open(text).is_some()
            || quote_strip(text).is_some()
            || list_marker(text).is_some()
            || footnote_def(text).is_some()
            || html_start(text).is_some_and(|(_, end)| end != HtmlEnd::BlankLine)
    }

    fn interrupts_paragraph(&self, line: Line<'a>) -> bool {
        let text = line.text;
        if is_thematic_break(text)
            || atx_heading(text).is_some()
            || fence_open(text).is_some()
            || quote_strip(text).is_some()
            || footnote_def(text).is_some()
            || html_start(text).is_some_and(|(_, end)| end != HtmlEnd::BlankLine)
        {
            return true;
        }
        if let Some(marker) = list_marker(text) {
            let starts_at_one = match marker.kind {
                MarkerKind::Bullet(_) => true,
                MarkerKind::Ordered { start, .. } => start == 1,
            };
            if starts_at_one && !marker.content.trim().is_empty() {
                return true;
            }
        }
        // the delimiter row must be complete, a growing row may stop matching
        if self
            .line_at(line.next)
            .is_some_and(|delim| delim.complete && self.table_start(line).is_some())
        {
            return true;
        }
        let remaining = &self.src[line.start..];
        self.registry
            .block_rules()
            .any(|ext| ext.try_tokenize(remaining, self.diag).is_some())
    }
}

impl MarkerKind {
    fn same_list(self, other: MarkerKind) -> bool {
        match (self, other) {
            (MarkerKind::Bullet(a), MarkerKind::Bullet(b)) => a == b,
            (
                MarkerKind::Ordered { delimiter: a, .. },
                MarkerKind::Ordered { delimiter: b, .. },
            ) => a == b,
            _ => false,
        }
    }
}

fn closed(token: Token, closed: bool) -> LexedBlock {
    LexedBlock { token, closed }
}

/// Leading indentation in columns, tabs counting as four.
fn indent(text: &str) -> usize {
    let mut cols = 0;
    for c in text.chars() {
        match c {
            ' ' => cols += 1,
            '\t' => cols += 4 - cols % 4,
            _ => break,
        }
    }
    cols
}

/// Remove up to `cols` columns of leading whitespace.
fn strip_indent(text: &str, cols: usize) -> &str {
    let mut seen = 0;
    for (i, c) in text.char_indices() {
        let width = match c {
            ' ' => 1,
            '\t' => 4 - seen % 4,
            _ => return &text[i..],
        };
        if seen + width > cols {
            return &text[i..];
        }
        seen += width;
    }
    &text[text.len()..]
}

fn is_thematic_break(text: &str) -> bool {
    if indent(text) > 3 {
        return false;
    }
    let mut marks = text.chars().filter(|c| !c.is_whitespace());
    let Some(first) = marks.next() else {
        return false;
    };
    if !matches!(first, '-' | '*' | '_') {
        return false;
    }
    let mut count = 1;
    for c in marks {
        if c != first {
            return false;
        }
        count += 1;
    }
    count >= 3
}

fn atx_heading(text: &str) -> Option<(u8, String)> {
    if indent(text) > 3 {
        return None;
    }
    let trimmed = text.trim_start();
    let level = trimmed.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !(rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t')) {
        return None;
    }

    let content = rest.trim();
    let without_closing = content.trim_end_matches('#');
    let content = if without_closing.is_empty() {
        ""
    } else if without_closing.len() < content.len()
        && (without_closing.ends_with(' ') || without_closing.ends_with('\t'))
    {
        without_closing.trim_end()
    } else {
        content
    };
    Some((level as u8, content.to_string()))
}

fn setext_underline(text: &str) -> Option<u8> {
    if indent(text) > 3 {
        return None;
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.chars().all(|c| c == '=') {
        Some(1)
    } else if trimmed.chars().all(|c| c == '-') {
        Some(2)
    } else {
        None
    }
}

fn fence_open(text: &str) -> Option<Fence> {
    let ind = indent(text);
    if ind > 3 {
        return None;
    }
    let trimmed = text.trim_start();
    let ch = trimmed.chars().next()?;
    if ch != '`' && ch != '~' {
        return None;
    }
    let len = trimmed.chars().take_while(|&c| c == ch).count();
    if len < 3 {
        return None;
    }
    let info = trimmed[len..].trim();
    if ch == '`' && info.contains('`') {
        return None;
    }
    Some(Fence {
        ch,
        len,
        indent: ind,
        lang: info.split_whitespace().next().map(str::to_string),
    })
}

fn is_fence_close(text: &str, fence: &Fence) -> bool {
    if indent(text) > 3 {
        return false;
    }
    let trimmed = text.trim_start();
    let len = trimmed.chars().take_while(|&c| c == fence.ch).count();
    len >= fence.len && trimmed[len..].trim().is_empty()
}

fn quote_strip(text: &str) -> Option<&str> {
    if indent(text) > 3 {
        return None;
    }
    let rest = text.trim_start().strip_prefix('>')?;
    Some(
        rest.strip_prefix(' ')
            .or_else(|| rest.strip_prefix('\t'))
            .unwrap_or(rest),
    )
}

fn list_marker(text: &str) -> Option<ListMarker<'_>> {
    let ind = indent(text);
    if ind > 3 {
        return None;
    }
    let trimmed = text.trim_start();

    let (kind, marker_len) = match trimmed.chars().next()? {
        c @ ('-' | '+' | '*') => (MarkerKind::Bullet(c), 1),
        c if c.is_ascii_digit() => {
            let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
            if digits > 9 {
                return None;
            }
            let delimiter = trimmed[digits..].chars().next()?;
            if delimiter != '.' && delimiter != ')' {
                return None;
            }
            let start = trimmed[..digits].parse().ok()?;
            (MarkerKind::Ordered { start, delimiter }, digits + 1)
        }
        _ => return None,
    };

    let rest = &trimmed[marker_len..];
    if !(rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t')) {
        return None;
    }
    let spaces = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    let content = rest.trim_start_matches([' ', '\t']);
    let gap = if content.is_empty() || spaces > 4 { 1 } else { spaces };
    let content = if spaces > 4 { &rest[1..] } else { content };

    Some(ListMarker {
        kind,
        content_indent: ind + marker_len + gap,
        content,
    })
}

/// Split a leading `[ ]` / `[x]` off a list item body.
fn task_marker(body: &str) -> (Option<bool>, String) {
    for (marker, checked) in [("[ ]", false), ("[x]", true), ("[X]", true)] {
        if let Some(rest) = body.strip_prefix(marker) {
            if rest.is_empty() || rest.starts_with([' ', '\t', '\n']) {
                return (Some(checked), rest.trim_start_matches([' ', '\t']).to_string());
            }
        }
    }
    (None, body.to_string())
}

/// Recognize the start of an HTML block: the lower-cased tag name (if any)
/// and what ends the block.
fn html_start(text: &str) -> Option<(Option<String>, HtmlEnd)> {
    if indent(text) > 3 {
        return None;
    }
    let trimmed = text.trim_start();
    if trimmed.starts_with("<!--") {
        return Some((None, HtmlEnd::Comment));
    }
    let (closing, body) = if let Some(body) = trimmed.strip_prefix("</") {
        (true, body)
    } else {
        (false, trimmed.strip_prefix('<')?)
    };

    if !body.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    let name_len = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(body.len());
    let after = &body[name_len..];
    if !(after.is_empty()
        || after.starts_with(char::is_whitespace)
        || after.starts_with('>')
        || after.starts_with('/'))
    {
        return None;
    }

    let tag = body[..name_len].to_ascii_lowercase();
    let lower = trimmed.to_ascii_lowercase();
    let end = if closing
        || VOID_TAGS.contains(&tag.as_str())
        || lower.contains("/>")
        || lower.contains(&format!("</{tag}"))
    {
        HtmlEnd::BlankLine
    } else {
        HtmlEnd::CloseTag(tag.clone())
    };
    Some((Some(tag), end))
}

fn footnote_def(text: &str) -> Option<(String, &str)> {
    if indent(text) > 3 {
        return None;
    }
    let rest = text.trim_start().strip_prefix("[^")?;
    let close = rest.find(']')?;
    let label = &rest[..close];
    if label.is_empty() || label.contains(char::is_whitespace) {
        return None;
    }
    let body = rest[close + 1..].strip_prefix(':')?;
    Some((label.to_string(), body.trim_start()))
}

/// Split a table row into trimmed cells. `None` if the line has no pipe.
fn split_cells(text: &str) -> Option<Vec<&str>> {
    if !text.contains('|') {
        return None;
    }
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = match trimmed.strip_suffix('|') {
        Some(t) if !t.ends_with('\\') => t,
        _ => trimmed,
    };

    let mut cells = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in trimmed.char_indices() {
        match c {
            '\\' => escaped = !escaped,
            '|' if !escaped => {
                cells.push(trimmed[start..i].trim());
                start = i + 1;
            }
            _ => escaped = false,
        }
    }
    cells.push(trimmed[start..].trim());
    Some(cells)
}

fn delimiter_row(text: &str) -> Option<Vec<Align>> {
    split_cells(text)?
        .into_iter()
        .map(|cell| {
            let left = cell.starts_with(':');
            let right = cell.ends_with(':') && cell.len() > 1;
            let dashes = cell.trim_start_matches(':').trim_end_matches(':');
            if dashes.is_empty() || !dashes.chars().all(|c| c == '-') {
                return None;
            }
            Some(match (left, right) {
                (true, true) => Align::Center,
                (true, false) => Align::Left,
                (false, true) => Align::Right,
                (false, false) => Align::None,
            })
        })
        .collect()
}

/// A table row padded or truncated to the header's column count.
fn table_row(text: &str, align: &[Align], header: bool) -> Token {
    let cells = split_cells(text).unwrap_or_default();
    let children = align
        .iter()
        .enumerate()
        .map(|(i, &align)| {
            let cell = cells.get(i).copied().unwrap_or("");
            Token::new(TokenKind::TableCell { header, align }, cell, cell)
        })
        .collect();
    Token::new(TokenKind::TableRow { header }, text, "").with_children(children)
}
