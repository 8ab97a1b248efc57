//! Best-effort textual names for expressions.
//!
//! Callees, base classes and decorators are flattened to dotted paths over a
//! small closed set of shapes: identifiers, attribute access, calls (their
//! callee) and subscripts (their base). Every other shape flattens to an empty
//! string.

use std::borrow::Cow;
use tree_sitter::Node;

/// Flatten an expression to a dotted name, or `""` if its shape is unsupported.
pub fn dotted_name(node: &Node, source: &[u8]) -> String {
    match node.kind() {
        "identifier" => node_text(node, source).to_string(),
        "attribute" => {
            let attr = node
                .child_by_field_name("attribute")
                .map(|n| node_text(&n, source))
                .unwrap_or_default();
            let object = node
                .child_by_field_name("object")
                .map(|n| dotted_name(&n, source))
                .unwrap_or_default();
            if object.is_empty() {
                attr.to_string()
            } else {
                format!("{object}.{attr}")
            }
        }
        "call" => node
            .child_by_field_name("function")
            .map(|n| dotted_name(&n, source))
            .unwrap_or_default(),
        "subscript" => node
            .child_by_field_name("value")
            .map(|n| dotted_name(&n, source))
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Name of a decorator: `@app.route("/")` → `app.route`.
pub fn decorator_name(decorator: &Node, source: &[u8]) -> String {
    let mut cursor = decorator.walk();
    let expression = decorator
        .named_children(&mut cursor)
        .find(|c| c.kind() != "comment");
    expression
        .map(|e| dotted_name(&e, source))
        .unwrap_or_default()
}

/// Text of a type annotation.
///
/// Plain and dotted names keep their name, generic forms collapse to their base
/// (`Optional[int]` → `Optional`), anything else keeps its source text.
pub fn annotation_text(node: &Node, source: &[u8]) -> String {
    match node.kind() {
        "type" => {
            let mut cursor = node.walk();
            let inner = node.named_children(&mut cursor).next();
            match inner {
                Some(inner) => annotation_text(&inner, source),
                None => node_text(node, source).to_string(),
            }
        }
        "generic_type" => {
            let mut cursor = node.walk();
            let base = node.named_children(&mut cursor).next();
            match base {
                Some(base) => annotation_text(&base, source),
                None => node_text(node, source).to_string(),
            }
        }
        "identifier" | "attribute" | "subscript" => {
            let name = dotted_name(node, source);
            if name.is_empty() {
                node_text(node, source).to_string()
            } else {
                name
            }
        }
        _ => node_text(node, source).to_string(),
    }
}

/// Docstring of a class or function body, cleaned like `inspect.cleandoc`.
pub fn docstring(body: &Node, source: &[u8]) -> Option<String> {
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|c| c.kind() != "comment")?;
    if first.kind() != "expression_statement" || first.named_child_count() != 1 {
        return None;
    }
    let literal = first.named_child(0)?;
    if literal.kind() != "string" {
        return None;
    }
    let raw = string_literal_body(node_text(&literal, source))?;
    Some(clean_docstring(&raw))
}

/// Contents of a plain string literal without prefix and quotes, with escape
/// sequences decoded unless the literal is raw.
/// f-strings and bytes literals are not docstrings and yield `None`.
fn string_literal_body(literal: &str) -> Option<Cow<'_, str>> {
    let quote_at = literal.find(['"', '\''])?;
    let prefix = literal[..quote_at].to_ascii_lowercase();
    if prefix.contains('f') || prefix.contains('b') {
        return None;
    }
    let quoted = &literal[quote_at..];
    let body = ["\"\"\"", "'''", "\"", "'"].iter().find_map(|quote| {
        (quoted.len() >= 2 * quote.len() && quoted.starts_with(quote) && quoted.ends_with(quote))
            .then(|| &quoted[quote.len()..quoted.len() - quote.len()])
    })?;
    if prefix.contains('r') || !body.contains('\\') {
        Some(Cow::Borrowed(body))
    } else {
        Some(Cow::Owned(decode_escapes(body)))
    }
}

/// Decode Python string escapes. Unknown escapes and `\N{...}` are kept as
/// written; a backslash before a newline joins the lines.
fn decode_escapes(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let Some(esc) = chars.next() else {
            out.push('\\');
            break;
        };
        match esc {
            '\n' => {}
            '\\' | '\'' | '"' => out.push(esc),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            '0'..='7' => {
                let mut code = esc.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(code));
            }
            'x' | 'u' | 'U' => {
                let width = match esc {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars.clone().take(width).collect();
                match (digits.len() == width)
                    .then(|| u32::from_str_radix(&digits, 16).ok())
                    .flatten()
                    .and_then(char::from_u32)
                {
                    Some(decoded) => {
                        out.push(decoded);
                        for _ in 0..width {
                            chars.next();
                        }
                    }
                    None => {
                        out.push('\\');
                        out.push(esc);
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

/// Strip the first line's leading whitespace and the common indentation of the
/// rest, then drop blank lines at both ends.
pub fn clean_docstring(doc: &str) -> String {
    let expanded: Vec<String> = doc.split('\n').map(expand_tabs).collect();

    let margin = expanded
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut lines: Vec<&str> = Vec::with_capacity(expanded.len());
    for (i, line) in expanded.iter().enumerate() {
        if i == 0 || line.trim().is_empty() {
            lines.push(line.trim_start());
        } else {
            lines.push(line.get(margin..).unwrap_or(line.trim_start()).trim_end());
        }
    }

    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    let start = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(lines.len());
    lines[start..].join("\n")
}

fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for ch in line.chars() {
        if ch == '\t' {
            let pad = 8 - out.chars().count() % 8;
            out.extend(std::iter::repeat(' ').take(pad));
        } else {
            out.push(ch);
        }
    }
    out
}

pub(crate) fn node_text<'a>(node: &Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or_default()
}
