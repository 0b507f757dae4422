//! URI template engine (§4.1): parses `{name}`/`{name:regex}` expressions
//! into literal/expression chunks and expands them against a variable map
//! with RFC 6570 §3.2.2-flavored, fragment-aware percent-encoding.

use crate::error::Error;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static EXPRESSION_GRAMMAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w[-\w.\[\]]*)(?::(.+))?$").expect("static regex is valid"));

/// Which RFC 3986 reserved set applies to an expanded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentType {
    /// `decode_slash` mirrors the request template's `decodeSlash` flag
    /// (default true, §3): when true, a literal `/` inside an expanded
    /// path-segment value is left unescaped.
    PathSegment { decode_slash: bool },
    Query,
    /// No percent-encoding at all: header and body value templates resolve
    /// against a variable map too, but their values are not URL fragments.
    Raw,
}

impl FragmentType {
    #[must_use]
    pub const fn path_segment() -> Self {
        Self::PathSegment { decode_slash: true }
    }

    #[must_use]
    pub const fn path_segment_with(decode_slash: bool) -> Self {
        Self::PathSegment { decode_slash }
    }
}

/// What to do with an expression whose variable has no bound value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// Keep the `{name}` literal in the output.
    AllowUnresolved,
    /// Drop the value entirely (signaled to the caller as `Undef`).
    Required,
}

/// A bound variable's value: either one scalar or an ordered collection.
#[derive(Debug, Clone)]
pub enum TemplateValue {
    Scalar(String),
    Iterable(Vec<String>),
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl<T: Into<String>> FromIterator<T> for TemplateValue {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::Iterable(iter.into_iter().map(Into::into).collect())
    }
}

pub type VariableMap = HashMap<String, TemplateValue>;

/// Reserved delimiter the engine joins iterable elements with, so a query
/// template can re-split and apply its own collection format (§4.1).
pub const ITERABLE_JOIN_DELIMITER: char = ';';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Chunk {
    Literal(String),
    Expression {
        name: String,
        constraint: Option<String>,
    },
}

/// Outcome of rendering a whole template against a variable map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// Fully or partially rendered text (literals always render; missing
    /// expressions under `AllowUnresolved` render as `{name}`).
    Text(String),
    /// At least one expression was missing under `Required`: the whole
    /// value is dropped by the caller (§4.2 step 2).
    Undef,
}

/// A parsed `{name}`/`{name:regex}` template, e.g. a URI path or a single
/// query value template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    chunks: Vec<Chunk>,
}

impl UriTemplate {
    #[must_use]
    pub fn parse(input: &str) -> Self {
        Self {
            chunks: parse_chunks(input),
        }
    }

    /// Names of every `{name}` expression in this template, in order.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().filter_map(|c| match c {
            Chunk::Expression { name, .. } => Some(name.as_str()),
            Chunk::Literal(_) => None,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Renders the template against `vars`. Under `Required`, if any
    /// expression has no bound value the whole result is `Rendered::Undef`.
    pub fn render(
        &self,
        vars: &VariableMap,
        fragment: FragmentType,
        policy: ResolutionPolicy,
    ) -> Result<Rendered, Error> {
        let mut buf = String::new();
        let mut undef = false;

        for chunk in &self.chunks {
            match chunk {
                Chunk::Literal(text) => buf.push_str(text),
                Chunk::Expression { name, constraint } => match vars.get(name) {
                    None => match policy {
                        ResolutionPolicy::AllowUnresolved => {
                            buf.push('{');
                            buf.push_str(name);
                            buf.push('}');
                        }
                        ResolutionPolicy::Required => undef = true,
                    },
                    Some(value) => {
                        let rendered = render_value(name, value, constraint.as_deref(), fragment)?;
                        buf.push_str(&rendered);
                    }
                },
            }
        }

        Ok(if undef {
            Rendered::Undef
        } else {
            Rendered::Text(buf)
        })
    }

    /// Convenience for the common path-template case: missing variables
    /// stay visible as `{name}` literals.
    pub fn expand(&self, vars: &VariableMap, fragment: FragmentType) -> Result<String, Error> {
        match self.render(vars, fragment, ResolutionPolicy::AllowUnresolved)? {
            Rendered::Text(s) => Ok(s),
            Rendered::Undef => unreachable!("AllowUnresolved never produces Undef"),
        }
    }
}

fn render_value(
    name: &str,
    value: &TemplateValue,
    constraint: Option<&str>,
    fragment: FragmentType,
) -> Result<String, Error> {
    match value {
        TemplateValue::Scalar(s) => {
            check_constraint(name, s, constraint)?;
            Ok(percent_encode(s, fragment))
        }
        TemplateValue::Iterable(items) => {
            for item in items {
                check_constraint(name, item, constraint)?;
            }
            Ok(items
                .iter()
                .map(|item| percent_encode(item, fragment))
                .collect::<Vec<_>>()
                .join(&ITERABLE_JOIN_DELIMITER.to_string()))
        }
    }
}

fn check_constraint(name: &str, value: &str, constraint: Option<&str>) -> Result<(), Error> {
    let Some(pattern) = constraint else {
        return Ok(());
    };
    let re = Regex::new(pattern)
        .map_err(|e| Error::invalid_regex_constraint(name, value, format!("{pattern}: {e}")))?;
    if re.is_match(value) {
        Ok(())
    } else {
        Err(Error::invalid_regex_constraint(name, value, pattern))
    }
}

/// Percent-encodes `s` for the given fragment type (RFC 3986 §3.3/§3.4):
/// path segments leave sub-delims plus `:@` unescaped, query values
/// additionally escape `&`, `=`, `+`.
#[must_use]
pub fn percent_encode(s: &str, fragment: FragmentType) -> String {
    if fragment == FragmentType::Raw {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        if is_unreserved_for(byte, fragment) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn is_unreserved_for(byte: u8, fragment: FragmentType) -> bool {
    let c = byte as char;
    if c.is_ascii_alphanumeric() {
        return true;
    }
    match fragment {
        FragmentType::PathSegment { decode_slash } => {
            if c == '/' {
                return decode_slash;
            }
            matches!(
                c,
                '-' | '.' | '_' | '~' | '!' | '$' | '&' | '\'' | '(' | ')' | '*' | '+' | ',' | ';'
                    | '=' | ':' | '@'
            )
        }
        FragmentType::Query => matches!(
            c,
            '-' | '.' | '_' | '~' | '!' | '$' | '\'' | '(' | ')' | '*' | ',' | ';' | ':' | '@'
        ),
        FragmentType::Raw => true,
    }
}

fn parse_chunks(input: &str) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut literal = String::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '{' {
            literal.push(chars[i]);
            i += 1;
            continue;
        }

        if let Some((inner, next_i)) = find_matching_brace(&chars, i) {
            if let Some(caps) = EXPRESSION_GRAMMAR.captures(&inner) {
                if !literal.is_empty() {
                    chunks.push(Chunk::Literal(std::mem::take(&mut literal)));
                }
                let name = caps.get(1).expect("grammar requires group 1").as_str().to_string();
                let constraint = caps.get(2).map(|m| m.as_str().to_string());
                chunks.push(Chunk::Expression { name, constraint });
                i = next_i;
                continue;
            }
        }

        // Unterminated or malformed brace: passes through as a literal.
        literal.push('{');
        i += 1;
    }

    if !literal.is_empty() {
        chunks.push(Chunk::Literal(literal));
    }
    chunks
}

/// Finds the outermost matching `}` for the `{` at `open_idx`, treating any
/// nested `{...}` as literal content of the outer expression. Returns the
/// inner text and the index just past the closing brace.
fn find_matching_brace(chars: &[char], open_idx: usize) -> Option<(String, usize)> {
    let mut depth = 1;
    let mut j = open_idx + 1;
    while j < chars.len() {
        match chars[j] {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let inner: String = chars[open_idx + 1..j].iter().collect();
                    return Some((inner, j + 1));
                }
            }
            _ => {}
        }
        j += 1;
    }
    None
}
