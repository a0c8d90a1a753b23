//! HTML serialization of render trees.

use std::fmt;

use pulldown_cmark_escape::{escape_href, escape_html, escape_html_body_text, FmtWriter, StrWrite};

use crate::render::{Component, Node};
use crate::token::Construct;

const NO_ATTRS: [(&str, &str); 0] = [];

impl Node {
    pub fn to_html(&self) -> String {
        self.to_string()
    }

    /// Write this node as HTML into any [`StrWrite`] sink.
    pub fn write_html<W: StrWrite>(&self, writer: &mut W) -> Result<(), W::Error> {
        write_node(self, writer)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_html(&mut FmtWriter(f))
    }
}

fn write_node<W: StrWrite>(node: &Node, w: &mut W) -> Result<(), W::Error> {
    let Node::Element {
        component,
        props,
        children,
    } = node
    else {
        if let Node::Text(text) = node {
            escape_html_body_text(&mut *w, text)?;
        }
        return Ok(());
    };

    let prop = |key: &str| props.get(key).map(String::as_str);
    let construct = match component {
        Component::Builtin(construct) => *construct,
        Component::Custom(name) => return write_element(name, props.iter(), children, w),
        Component::Placeholder(id) => {
            let attrs = props
                .iter()
                .map(|(k, v)| (format!("data-{k}"), v.clone()))
                .collect::<Vec<_>>();
            return write_element(id, attrs.iter().map(|(k, v)| (k, v)), &[], w);
        }
    };

    match construct {
        Construct::Paragraph => write_element("p", NO_ATTRS, children, w)?,
        Construct::Heading => {
            let tag = format!("h{}", prop("depth").unwrap_or("1"));
            write_element(&tag, NO_ATTRS, children, w)?;
        }
        Construct::Emphasis => write_element("em", NO_ATTRS, children, w)?,
        Construct::Strong => write_element("strong", NO_ATTRS, children, w)?,
        Construct::Strikethrough => write_element("del", NO_ATTRS, children, w)?,
        Construct::Link => {
            let attrs = [("href", prop("href")), ("title", prop("title"))];
            write_element("a", present(&attrs), children, w)?;
        }
        Construct::Image => {
            let attrs = [("src", prop("src")), ("alt", prop("alt")), ("title", prop("title"))];
            open_tag("img", present(&attrs), w)?;
        }
        Construct::CodeSpan => write_element("code", NO_ATTRS, children, w)?,
        Construct::CodeBlock => {
            w.write_str("<pre>")?;
            let class = prop("lang").map(|lang| format!("language-{lang}"));
            let attrs = [("class", class.as_deref())];
            write_element("code", present(&attrs), children, w)?;
            w.write_str("</pre>\n")?;
        }
        Construct::List => {
            let tag = if prop("ordered") == Some("true") { "ol" } else { "ul" };
            let attrs = [("start", prop("start"))];
            write_element(tag, present(&attrs), children, w)?;
        }
        Construct::ListItem => {
            w.write_str("<li>")?;
            if let Some(checked) = prop("checked") {
                let attrs = [("type", Some("checkbox")), ("disabled", Some(""))];
                let mut attrs = present(&attrs).collect::<Vec<_>>();
                if checked == "true" {
                    attrs.push(("checked", ""));
                }
                open_tag("input", attrs, w)?;
                w.write_str(" ")?;
            }
            write_children(children, w)?;
            w.write_str("</li>")?;
        }
        Construct::Table => write_element("table", NO_ATTRS, children, w)?,
        Construct::TableRow => write_element("tr", NO_ATTRS, children, w)?,
        Construct::TableCell => {
            let tag = if prop("header") == Some("true") { "th" } else { "td" };
            let style = prop("align").map(|align| format!("text-align: {align}"));
            let attrs = [("style", style.as_deref())];
            write_element(tag, present(&attrs), children, w)?;
        }
        // raw html passes through untouched
        Construct::Html => w.write_str(prop("raw").unwrap_or(""))?,
        Construct::BlockQuote => write_element("blockquote", NO_ATTRS, children, w)?,
        Construct::ThematicBreak => w.write_str("<hr>")?,
        Construct::LineBreak => w.write_str("<br>\n")?,
        Construct::FootnoteRef => {
            let label = prop("label").unwrap_or("");
            let href = format!("#fn-{label}");
            w.write_str("<sup>")?;
            write_element("a", [("href", href.as_str())], &[Node::text(label)], w)?;
            w.write_str("</sup>")?;
        }
        Construct::Footnote => {
            let id = format!("fn-{}", prop("label").unwrap_or(""));
            write_element("div", [("id", id.as_str())], children, w)?;
        }
        Construct::Text
        | Construct::Escape
        | Construct::Space
        | Construct::Extension => write_children(children, w)?,
    }
    Ok(())
}

fn present<'a>(attrs: &'a [(&'a str, Option<&'a str>)]) -> impl Iterator<Item = (&'a str, &'a str)> {
    attrs.iter().filter_map(|(k, v)| v.map(|v| (*k, v)))
}

fn open_tag<K, V, W>(tag: &str, attrs: impl IntoIterator<Item = (K, V)>, w: &mut W) -> Result<(), W::Error>
where
    K: AsRef<str>,
    V: AsRef<str>,
    W: StrWrite,
{
    w.write_str("<")?;
    w.write_str(tag)?;
    for (key, value) in attrs {
        let (key, value) = (key.as_ref(), value.as_ref());
        w.write_str(" ")?;
        escape_html(&mut *w, key)?;
        if value.is_empty() {
            continue;
        }
        w.write_str("=\"")?;
        // urls are percent-encoded, everything else entity-escaped
        if matches!(key, "href" | "src") {
            escape_href(&mut *w, value)?;
        } else {
            escape_html(&mut *w, value)?;
        }
        w.write_str("\"")?;
    }
    w.write_str(">")
}

fn write_element<K, V, W>(
    tag: &str,
    attrs: impl IntoIterator<Item = (K, V)>,
    children: &[Node],
    w: &mut W,
) -> Result<(), W::Error>
where
    K: AsRef<str>,
    V: AsRef<str>,
    W: StrWrite,
{
    open_tag(tag, attrs, w)?;
    write_children(children, w)?;
    w.write_str("</")?;
    w.write_str(tag)?;
    w.write_str(">")
}

fn write_children<W: StrWrite>(children: &[Node], w: &mut W) -> Result<(), W::Error> {
    for child in children {
        write_node(child, w)?;
    }
    Ok(())
}
