//! Minimal HTML scanning: just enough to pull table cells and text out of
//! the schedule page.
//!
//! Not a conforming HTML parser. It tokenizes tags and text, skips comments,
//! doctypes and raw-text elements, and tolerates unclosed cells and rows.

/// A lexical piece of markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Token<'a> {
    /// `<name attrs>` or `<name attrs/>`. Name is lowercased.
    Open { name: String, attrs: &'a str },
    /// `</name>`. Name is lowercased.
    Close { name: String },
    Text(&'a str),
}

/// Iterator over the tokens of a markup string.
pub(super) struct Tokens<'a> {
    src: &'a str,
    pos: usize,
}

pub(super) fn tokens(src: &str) -> Tokens<'_> {
    Tokens { src, pos: 0 }
}

impl Tokens<'_> {
    /// Skip past the closing tag of a raw-text element such as `<script>`.
    fn skip_raw_text(&mut self, name: &str) {
        let closing = format!("</{name}");
        let rest = &self.src[self.pos..];
        self.pos = find_ci(rest, &closing).map_or(self.src.len(), |i| self.pos + i);
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        loop {
            let rest = self.src.get(self.pos..)?;
            if rest.is_empty() {
                return None;
            }

            if !rest.starts_with('<') {
                let end = rest.find('<').unwrap_or(rest.len());
                self.pos += end;
                return Some(Token::Text(&rest[..end]));
            }

            if let Some(body) = rest.strip_prefix("<!--") {
                self.pos += 4 + body.find("-->").map_or(body.len(), |i| i + 3);
                continue;
            }

            // A lone '<' that does not start a tag is text.
            let starts_tag = rest[1..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!' || c == '?');
            if !starts_tag {
                self.pos += 1;
                return Some(Token::Text(&rest[..1]));
            }

            let Some(close) = tag_end(rest) else {
                self.pos = self.src.len();
                return None;
            };
            let inner = &rest[1..close];
            self.pos += close + 1;

            if inner.starts_with('!') || inner.starts_with('?') {
                continue;
            }

            if let Some(name) = inner.strip_prefix('/') {
                return Some(Token::Close {
                    name: name.trim().to_ascii_lowercase(),
                });
            }

            let inner = inner.strip_suffix('/').unwrap_or(inner);
            let name_end = inner
                .find(|c: char| c.is_ascii_whitespace())
                .unwrap_or(inner.len());
            let name = inner[..name_end].to_ascii_lowercase();
            let attrs = &inner[name_end..];

            if matches!(name.as_str(), "script" | "style") {
                self.skip_raw_text(&name);
            }

            return Some(Token::Open { name, attrs });
        }
    }
}

/// Value of an attribute, if present. Quoted and bare values are accepted.
pub(super) fn attr(attrs: &str, wanted: &str) -> Option<String> {
    let mut rest = attrs.trim_start();
    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| c == '=' || c.is_ascii_whitespace())
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        rest = rest[name_end..].trim_start();

        let value = if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            let (value, remaining) =
                if let Some(q @ ('"' | '\'')) = after_eq.chars().next() {
                    let body = &after_eq[1..];
                    let end = body.find(q).unwrap_or(body.len());
                    (&body[..end], body.get(end + 1..).unwrap_or(""))
                } else {
                    let end = after_eq
                        .find(|c: char| c.is_ascii_whitespace())
                        .unwrap_or(after_eq.len());
                    (&after_eq[..end], &after_eq[end..])
                };
            rest = remaining.trim_start();
            Some(value)
        } else {
            None
        };

        if name.eq_ignore_ascii_case(wanted) {
            return Some(decode_entities(value.unwrap_or("")));
        }
    }
    None
}

/// Whether the attribute string's `class` list contains `class`.
pub(super) fn has_class(attrs: &str, class: &str) -> bool {
    attr(attrs, "class").is_some_and(|v| v.split_whitespace().any(|c| c == class))
}

/// Decode the handful of entities the source page uses.
pub(super) fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.find(';').filter(|&i| i <= 10) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let decoded = match &rest[1..semi] {
            "nbsp" => Some(' '),
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            e => e
                .strip_prefix('#')
                .and_then(|n| match n.strip_prefix(['x', 'X']) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => n.parse().ok(),
                })
                .and_then(char::from_u32),
        };
        if let Some(c) = decoded {
            out.push(c);
            rest = &rest[semi + 1..];
        } else {
            out.push('&');
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Collapse runs of whitespace into single spaces and trim.
pub(super) fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Offset of the `>` that ends the tag starting at `tag[0]`.
///
/// A `>` inside a quoted attribute value does not end the tag. If a quote is
/// never closed, the first `>` is taken instead.
fn tag_end(tag: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in tag.char_indices() {
        match (quote, c) {
            (None, '>') => return Some(i),
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            _ => {}
        }
    }
    tag.find('>')
}

fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
}
