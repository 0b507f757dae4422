//! Request template (§3 data model, §4.2 query template, §4.3 resolution):
//! the mutable, per-invocation object the template builder and interceptor
//! chain fill in before it is resolved into an immutable request.

use crate::error::Error;
use crate::uri_template::{FragmentType, Rendered, ResolutionPolicy, UriTemplate, VariableMap};
use indexmap::IndexMap;
use std::fmt;

/// How a query template with more than one value template joins them (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionFormat {
    #[default]
    Exploded,
    Csv,
    Ssv,
    Tsv,
    Pipes,
}

impl CollectionFormat {
    fn separator(self) -> &'static str {
        match self {
            Self::Exploded => "&",
            Self::Csv => ",",
            Self::Ssv => " ",
            Self::Tsv => "\t",
            Self::Pipes => "|",
        }
    }
}

/// A single query parameter: name (itself a template, since parameter names
/// may contain expressions), its value templates, and a collection format.
#[derive(Debug, Clone)]
pub struct QueryTemplate {
    name_source: String,
    name: UriTemplate,
    value_sources: Vec<String>,
    values: Vec<UriTemplate>,
    collection_format: CollectionFormat,
}

impl fmt::Display for QueryTemplate {
    /// Unresolved diagnostic form: `name={v1};{v2}` (§4.2).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value_sources.is_empty() {
            write!(f, "{}", self.name_source)
        } else {
            write!(f, "{}={}", self.name_source, self.value_sources.join(";"))
        }
    }
}

impl QueryTemplate {
    /// A "pure" query template with no value templates yet: `expand` emits
    /// just the bare name once a value is appended from an empty iterable,
    /// or omits the parameter entirely if never given a value.
    #[must_use]
    pub fn new(name: impl Into<String>, collection_format: CollectionFormat) -> Self {
        let name_source = name.into();
        Self {
            name: UriTemplate::parse(&name_source),
            name_source,
            value_sources: Vec::new(),
            values: Vec::new(),
            collection_format,
        }
    }

    /// Appends a value template. Per §4.2, appending more values to an
    /// existing parameter concatenates; it never replaces prior values.
    pub fn append_value(&mut self, value_template: impl Into<String>) {
        let source = value_template.into();
        self.values.push(UriTemplate::parse(&source));
        self.value_sources.push(source);
    }

    #[must_use]
    pub fn is_pure(&self) -> bool {
        self.value_sources.is_empty()
    }

    /// §4.2 `expand(vars)`.
    pub fn expand(&self, vars: &VariableMap) -> Result<Option<String>, Error> {
        let rendered_name = match self.name.render(vars, FragmentType::Query, ResolutionPolicy::Required)? {
            Rendered::Undef => return Ok(None),
            Rendered::Text(s) => s,
        };

        if self.values.is_empty() {
            return Ok(Some(rendered_name));
        }

        let mut items = Vec::new();
        for value in &self.values {
            if let Rendered::Text(s) = value.render(vars, FragmentType::Query, ResolutionPolicy::Required)? {
                items.extend(s.split(crate::uri_template::ITERABLE_JOIN_DELIMITER).map(str::to_string));
            }
        }

        if items.is_empty() {
            return Ok(None);
        }

        match self.collection_format {
            CollectionFormat::Exploded => Ok(Some(
                items
                    .iter()
                    .map(|v| format!("{rendered_name}={v}"))
                    .collect::<Vec<_>>()
                    .join("&"),
            )),
            other => Ok(Some(format!("{rendered_name}={}", items.join(other.separator())))),
        }
    }
}

/// A header's ordered list of value templates; more than one template under
/// the same name produces repeated header lines.
#[derive(Debug, Clone, Default)]
pub struct HeaderTemplate {
    values: Vec<UriTemplate>,
}

impl HeaderTemplate {
    pub fn append_value(&mut self, value_template: impl AsRef<str>) {
        self.values.push(UriTemplate::parse(value_template.as_ref()));
    }

    /// Empty results (no templates, or every template unresolved) drop the
    /// header entirely (§4.3 step 3).
    pub fn expand(&self, vars: &VariableMap) -> Result<Vec<String>, Error> {
        let mut out = Vec::with_capacity(self.values.len());
        for value in &self.values {
            if let Rendered::Text(s) = value.render(vars, FragmentType::Raw, ResolutionPolicy::Required)? {
                if !s.is_empty() {
                    out.push(s);
                }
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone)]
enum Body {
    None,
    Literal { bytes: Vec<u8>, charset: Option<String> },
    Template { source: String, template: UriTemplate },
}

/// The fully expanded, immutable result of `RequestTemplate::resolve` (§4.3
/// step 5) plus `request()` (§9: separate from resolution so callers can
/// resolve once and build the transport-level request later).
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub headers: IndexMap<String, Vec<String>>,
    pub body: Option<Vec<u8>>,
}

/// Mutable until `resolve()`, then frozen (§3).
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    target: String,
    uri_source: String,
    uri_template: UriTemplate,
    queries: IndexMap<String, QueryTemplate>,
    // keyed by lowercased header name; value keeps the display name that was
    // first used for it, per §3 "case-insensitively-keyed ordered mapping".
    headers: IndexMap<String, (String, HeaderTemplate)>,
    body: Body,
    method: String,
    charset: Option<String>,
    decode_slash: bool,
    default_collection_format: CollectionFormat,
    resolved: bool,
    resolved_request: Option<Request>,
}

impl RequestTemplate {
    #[must_use]
    pub fn new(method: impl Into<String>, uri_template: impl Into<String>) -> Self {
        let source = uri_template.into();
        Self {
            target: String::new(),
            uri_template: UriTemplate::parse(&source),
            uri_source: source,
            queries: IndexMap::new(),
            headers: IndexMap::new(),
            body: Body::None,
            method: method.into(),
            charset: None,
            decode_slash: true,
            default_collection_format: CollectionFormat::default(),
            resolved: false,
            resolved_request: None,
        }
    }

    #[must_use]
    pub fn with_decode_slash(mut self, decode_slash: bool) -> Self {
        self.decode_slash = decode_slash;
        self
    }

    #[must_use]
    pub fn with_collection_format(mut self, format: CollectionFormat) -> Self {
        self.default_collection_format = format;
        self
    }

    #[must_use]
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    fn guard_mutation(&self) -> Result<(), Error> {
        if self.resolved {
            Err(Error::mutate_after_resolve())
        } else {
            Ok(())
        }
    }

    /// Target application (§4.8) mutates `target` before resolution; it
    /// must be absolute.
    pub fn set_target(&mut self, absolute_url: impl Into<String>) -> Result<(), Error> {
        self.guard_mutation()?;
        let url = absolute_url.into();
        if !looks_absolute(&url) {
            return Err(Error::target_requires_absolute_url(&url));
        }
        self.target = url;
        Ok(())
    }

    /// Relative URI setters reject absolute inputs (§4.3).
    pub fn set_uri_template(&mut self, path: impl Into<String>) -> Result<(), Error> {
        self.guard_mutation()?;
        let path = path.into();
        if looks_absolute(&path) {
            return Err(Error::absolute_url_rejected(&path));
        }
        self.uri_template = UriTemplate::parse(&path);
        self.uri_source = path;
        Ok(())
    }

    /// Appends a value to a query parameter, creating it (pure) first if
    /// this is its first mention.
    pub fn append_query_value(
        &mut self,
        name: impl Into<String>,
        value_template: impl Into<String>,
    ) -> Result<(), Error> {
        self.guard_mutation()?;
        let name = name.into();
        let default_format = self.default_collection_format;
        let entry = self
            .queries
            .entry(name.clone())
            .or_insert_with(|| QueryTemplate::new(name, default_format));
        entry.append_value(value_template);
        Ok(())
    }

    /// Registers a query parameter with no values yet (a "pure" flag, e.g.
    /// `?active`).
    pub fn insert_pure_query(&mut self, name: impl Into<String>) -> Result<(), Error> {
        self.guard_mutation()?;
        let name = name.into();
        let format = self.default_collection_format;
        self.queries.entry(name.clone()).or_insert_with(|| QueryTemplate::new(name, format));
        Ok(())
    }

    /// Setting values to empty removes the parameter (§4.2).
    pub fn remove_query(&mut self, name: &str) -> Result<(), Error> {
        self.guard_mutation()?;
        self.queries.shift_remove(name);
        Ok(())
    }

    pub fn append_header_value(
        &mut self,
        name: impl Into<String>,
        value_template: impl AsRef<str>,
    ) -> Result<(), Error> {
        self.guard_mutation()?;
        let display_name = name.into();
        let key = display_name.to_lowercase();
        let entry = self
            .headers
            .entry(key)
            .or_insert_with(|| (display_name, HeaderTemplate::default()));
        entry.1.append_value(value_template);
        Ok(())
    }

    /// Replaces a header's whole template with a single value.
    pub fn set_header(&mut self, name: impl Into<String>, value_template: impl AsRef<str>) -> Result<(), Error> {
        self.guard_mutation()?;
        let display_name = name.into();
        let key = display_name.to_lowercase();
        let mut template = HeaderTemplate::default();
        template.append_value(value_template);
        self.headers.insert(key, (display_name, template));
        Ok(())
    }

    pub fn remove_header(&mut self, name: &str) -> Result<(), Error> {
        self.guard_mutation()?;
        self.headers.shift_remove(&name.to_lowercase());
        Ok(())
    }

    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_lowercase())
    }

    pub fn set_body_literal(&mut self, bytes: Vec<u8>, charset: Option<String>) -> Result<(), Error> {
        self.guard_mutation()?;
        self.body = Body::Literal { bytes, charset };
        Ok(())
    }

    pub fn set_body_template(&mut self, source: impl Into<String>) -> Result<(), Error> {
        self.guard_mutation()?;
        let source = source.into();
        self.body = Body::Template { template: UriTemplate::parse(&source), source };
        Ok(())
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The path template's raw source, before variable expansion. A target
    /// strategy checks this to decide whether to inject a base URL (§4.8).
    #[must_use]
    pub fn uri_source(&self) -> &str {
        &self.uri_source
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// §4.3 `resolve(vars)`: expands every template and freezes the
    /// request template in place. Does not yet build the transport-level
    /// `Request`; call `request()` for that.
    pub fn resolve(&mut self, vars: &VariableMap) -> Result<(), Error> {
        self.guard_mutation()?;

        // Step 1: expand the URI template.
        let mut url = self.target.clone();
        url.push_str(&self.uri_template.expand(vars, FragmentType::path_segment_with(self.decode_slash))?);

        // Step 2: expand queries, concatenate with `&`, then attach with
        // `?` or `&` depending on whether the URI already has a literal
        // query string (a `?` not preceded by `{`, i.e. not inside an
        // unresolved expression).
        let mut query_parts = Vec::new();
        for query in self.queries.values() {
            if let Some(part) = query.expand(vars)? {
                query_parts.push(part);
            }
        }
        if !query_parts.is_empty() {
            let joined = query_parts.join("&");
            let separator = if uri_has_literal_query_string(&url) { '&' } else { '?' };
            url.push(separator);
            url.push_str(&joined);
        }

        // Step 3: clone headers, expand, drop empties.
        let mut resolved_headers = IndexMap::new();
        for (display_name, template) in self.headers.values() {
            let values = template.expand(vars)?;
            if !values.is_empty() {
                resolved_headers.insert(display_name.clone(), values);
            }
        }

        // Step 4: expand the body template, if present.
        let body = match &self.body {
            Body::None => None,
            Body::Literal { bytes, .. } => Some(bytes.clone()),
            Body::Template { template, .. } => match template.render(vars, FragmentType::Raw, ResolutionPolicy::AllowUnresolved)? {
                Rendered::Text(s) => Some(s.into_bytes()),
                Rendered::Undef => None,
            },
        };

        self.resolved_request = Some(Request {
            method: self.method.clone(),
            url,
            headers: resolved_headers,
            body,
        });
        // Step 5: mark resolved.
        self.resolved = true;
        Ok(())
    }

    /// `request()` on an unresolved template fails with `resolve_before_request`.
    pub fn request(&self) -> Result<Request, Error> {
        self.resolved_request
            .clone()
            .ok_or_else(|| Error::resolve_before_request("request template has not been resolved"))
    }
}

fn looks_absolute(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn uri_has_literal_query_string(url: &str) -> bool {
    let bytes = url.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'?' && (i == 0 || bytes[i - 1] != b'{') {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uri_template::TemplateValue;

    fn vars(pairs: &[(&str, &str)]) -> VariableMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), TemplateValue::Scalar((*v).to_string())))
            .collect()
    }

    #[test]
    fn query_template_display_is_unresolved_diagnostic_form() {
        let mut q = QueryTemplate::new("tag", CollectionFormat::Csv);
        q.append_value("{a}");
        q.append_value("{b}");
        assert_eq!(q.to_string(), "tag={a};{b}");
    }

    #[test]
    fn pure_query_template_emits_bare_name() {
        let q = QueryTemplate::new("active", CollectionFormat::Exploded);
        let rendered = q.expand(&VariableMap::new()).unwrap();
        assert_eq!(rendered, Some("active".to_string()));
    }

    #[test]
    fn query_template_omits_parameter_when_all_values_unresolved() {
        let mut q = QueryTemplate::new("q", CollectionFormat::Exploded);
        q.append_value("{missing}");
        let rendered = q.expand(&VariableMap::new()).unwrap();
        assert_eq!(rendered, None);
    }

    #[test]
    fn exploded_collection_format_repeats_the_key() {
        let mut q = QueryTemplate::new("tag", CollectionFormat::Exploded);
        q.append_value("{tags}");
        let mut v = VariableMap::new();
        v.insert("tags".to_string(), TemplateValue::Iterable(vec!["a".into(), "b".into()]));
        assert_eq!(q.expand(&v).unwrap(), Some("tag=a&tag=b".to_string()));
    }

    #[test]
    fn csv_collection_format_joins_with_commas() {
        let mut q = QueryTemplate::new("tag", CollectionFormat::Csv);
        q.append_value("{tags}");
        let mut v = VariableMap::new();
        v.insert("tags".to_string(), TemplateValue::Iterable(vec!["a".into(), "b".into()]));
        assert_eq!(q.expand(&v).unwrap(), Some("tag=a,b".to_string()));
    }

    #[test]
    fn header_template_is_case_insensitively_keyed() {
        let mut rt = RequestTemplate::new("GET", "/x");
        rt.set_header("X-Request-Id", "abc").unwrap();
        rt.append_header_value("x-request-id", "def").unwrap();
        assert!(rt.has_header("X-REQUEST-ID"));
        // append_header_value found the existing lowercase key, so both
        // values ended up under the same entry.
        assert_eq!(rt.headers.get("x-request-id").unwrap().1.values.len(), 2);
    }

    #[test]
    fn resolve_then_request_basic_get() {
        let mut rt = RequestTemplate::new("GET", "/repos/{owner}/{repo}/contributors");
        rt.set_target("https://api.github.com").unwrap();
        rt.resolve(&vars(&[("owner", "netflix"), ("repo", "feign")])).unwrap();
        let req = rt.request().unwrap();
        assert_eq!(req.url, "https://api.github.com/repos/netflix/feign/contributors");
        assert_eq!(req.method, "GET");
    }

    #[test]
    fn request_before_resolve_fails() {
        let rt = RequestTemplate::new("GET", "/x");
        assert!(rt.request().is_err());
    }

    #[test]
    fn mutation_after_resolve_fails() {
        let mut rt = RequestTemplate::new("GET", "/x");
        rt.set_target("https://example.com").unwrap();
        rt.resolve(&VariableMap::new()).unwrap();
        assert!(rt.set_header("X", "y").is_err());
        assert!(rt.append_query_value("q", "1").is_err());
        assert!(rt.set_uri_template("/y").is_err());
    }

    #[test]
    fn query_string_attaches_with_question_mark_when_uri_has_none() {
        let mut rt = RequestTemplate::new("GET", "/search");
        rt.append_query_value("q", "{term}").unwrap();
        rt.resolve(&vars(&[("term", "rust")])).unwrap();
        assert_eq!(rt.request().unwrap().url, "/search?q=rust");
    }

    #[test]
    fn query_string_attaches_with_ampersand_when_uri_already_has_literal_query() {
        let mut rt = RequestTemplate::new("GET", "/search?sort=asc");
        rt.append_query_value("q", "{term}").unwrap();
        rt.resolve(&vars(&[("term", "rust")])).unwrap();
        assert_eq!(rt.request().unwrap().url, "/search?sort=asc&q=rust");
    }

    #[test]
    fn empty_header_value_drops_the_header() {
        let mut rt = RequestTemplate::new("GET", "/x");
        rt.set_header("X-Optional", "{missing}").unwrap();
        rt.resolve(&VariableMap::new()).unwrap();
        assert!(!rt.request().unwrap().headers.contains_key("X-Optional"));
    }

    #[test]
    fn set_target_rejects_relative_url() {
        let mut rt = RequestTemplate::new("GET", "/x");
        assert!(rt.set_target("not-absolute").is_err());
    }

    #[test]
    fn set_uri_template_rejects_absolute_url() {
        let mut rt = RequestTemplate::new("GET", "/x");
        assert!(rt.set_uri_template("https://evil.example.com/x").is_err());
    }
}
