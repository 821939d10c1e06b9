//! Template parameter extraction from wiki markup
//!
//! File description pages embed platform review data as template
//! invocations (`{{FlickreviewR|...|sourceurl=https://...}}`). This module
//! locates those invocations and reads named or positional parameters.
//! It is a small purpose-built scanner, not a general wikitext parser:
//! it understands nested `{{ }}` and `[[ ]]` pairs well enough to split
//! parameters correctly and nothing more.

/// A single `{{...}}` invocation, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    name: String,
    params: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq)]
struct Param {
    /// Parameter name, or the 1-based position rendered as a string.
    key: String,
    value: String,
}

impl Template {
    /// Trimmed template name.
    pub fn name(&self) -> &str {
        self.name.trim()
    }

    /// Case-insensitive name comparison after trimming, so
    /// `{{ iNaturalistreview }}` matches the candidate `iNaturalistReview`.
    pub fn matches(&self, candidates: &[&str]) -> bool {
        let name = self.name.trim().to_ascii_lowercase();
        candidates
            .iter()
            .any(|c| c.trim().to_ascii_lowercase() == name)
    }

    /// Value of a parameter by name or 1-based position, trimmed.
    pub fn get(&self, param: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.key == param)
            .map(|p| p.value.trim())
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// All template invocations in `text`, nested ones included, ordered by
/// the position of their opening braces.
pub fn templates(text: &str) -> Vec<Template> {
    let bytes = text.as_bytes();
    let mut open: Vec<usize> = Vec::new();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{' && bytes.get(i + 1) == Some(&b'{') {
            open.push(i + 2);
            i += 2;
        } else if bytes[i] == b'}' && bytes.get(i + 1) == Some(&b'}') {
            if let Some(start) = open.pop() {
                spans.push((start, i));
            }
            i += 2;
        } else {
            i += 1;
        }
    }

    // Closing order is innermost-first; restore document order.
    spans.sort_unstable_by_key(|span| span.0);

    spans
        .iter()
        .filter_map(|&(start, end)| parse_invocation(&text[start..end]))
        .collect()
}

/// Return the first present parameter (in `params` order) of the first
/// invocation whose name matches any of `names`. `None` means no matching
/// invocation or no present parameter; the caller decides what that
/// implies for the record. Returned values are always trimmed.
///
/// When several invocations match, only the first is consulted. This is a
/// deliberate simplification: review templates appear once per page in
/// practice, and downstream behavior depends on first-match semantics.
pub fn first_template_value(text: &str, names: &[&str], params: &[&str]) -> Option<String> {
    let all = templates(text);
    let template = all.iter().find(|t| t.matches(names))?;

    for param in params {
        if let Some(value) = template.get(param) {
            tracing::debug!(
                template = template.name(),
                param,
                value,
                "Extracted template parameter"
            );
            return Some(value.to_string());
        }
    }

    None
}

/// Bare and bracketed external links (`http://` / `https://`) in `text`.
pub fn external_links(text: &str) -> Vec<String> {
    let mut links = Vec::new();
    let mut last_end = 0;

    for (idx, _) in text.match_indices("http") {
        if idx < last_end {
            continue;
        }

        let rest = &text[idx..];
        if !rest.starts_with("http://") && !rest.starts_with("https://") {
            continue;
        }

        let end = rest
            .find(|c: char| {
                c.is_whitespace() || matches!(c, '[' | ']' | '|' | '<' | '>' | '"' | '{' | '}')
            })
            .unwrap_or(rest.len());

        links.push(rest[..end].to_string());
        last_end = idx + end;
    }

    links
}

fn parse_invocation(content: &str) -> Option<Template> {
    let mut segments = split_top_level(content, '|').into_iter();

    let name = segments.next()?;
    if name.trim().is_empty() {
        return None;
    }

    let mut params = Vec::new();
    let mut position = 0usize;

    for segment in segments {
        match split_param(&segment) {
            Some((key, value)) => params.push(Param {
                key: key.trim().to_string(),
                value,
            }),
            None => {
                position += 1;
                params.push(Param {
                    key: position.to_string(),
                    value: segment,
                });
            }
        }
    }

    Some(Template { name, params })
}

/// Split on `separator` at nesting depth zero, tracking `{{ }}` and
/// `[[ ]]` pairs so pipes inside nested templates and links are kept.
fn split_top_level(content: &str, separator: char) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut template_depth = 0u32;
    let mut link_depth = 0u32;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                template_depth += 1;
                current.push_str("{{");
            }
            '}' if chars.peek() == Some(&'}') && template_depth > 0 => {
                chars.next();
                template_depth -= 1;
                current.push_str("}}");
            }
            '[' if chars.peek() == Some(&'[') => {
                chars.next();
                link_depth += 1;
                current.push_str("[[");
            }
            ']' if chars.peek() == Some(&']') && link_depth > 0 => {
                chars.next();
                link_depth -= 1;
                current.push_str("]]");
            }
            c if c == separator && template_depth == 0 && link_depth == 0 => {
                segments.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }

    segments.push(current);
    segments
}

/// Split a parameter segment at the first top-level `=`. `None` means the
/// parameter is positional.
fn split_param(segment: &str) -> Option<(String, String)> {
    let mut template_depth = 0u32;
    let mut link_depth = 0u32;
    let mut chars = segment.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                template_depth += 1;
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) && template_depth > 0 => {
                chars.next();
                template_depth -= 1;
            }
            '[' if matches!(chars.peek(), Some((_, '['))) => {
                chars.next();
                link_depth += 1;
            }
            ']' if matches!(chars.peek(), Some((_, ']'))) && link_depth > 0 => {
                chars.next();
                link_depth -= 1;
            }
            '=' if template_depth == 0 && link_depth == 0 => {
                return Some((segment[..idx].to_string(), segment[idx + 1..].to_string()));
            }
            _ => {}
        }
    }

    None
}

// ============================================================================
// Tests
// ============================================================================
