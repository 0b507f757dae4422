//! Template builder (§4.5): turns an operation's metadata plus a concrete
//! argument vector into a resolved [`Request`]. Three variants share one
//! algorithm and differ only in how the trailing arguments are encoded.

use crate::contract::{BodyKind, OperationMetadata};
use crate::error::Error;
use crate::request_template::{CollectionFormat, Request, RequestTemplate};
use crate::uri_template::{TemplateValue, VariableMap};
use indexmap::IndexMap;

/// One call's concrete arguments, indexed the same way metadata's
/// `indexToName`/`indexToExpander`/body/query-map/header-map indices are.
#[derive(Debug, Clone, Default)]
pub struct Argv {
    values: IndexMap<usize, ArgValue>,
}

#[derive(Debug, Clone)]
pub enum ArgValue {
    Scalar(String),
    Iterable(Vec<String>),
    /// A `map<string, any>` argument (query-map or header-map).
    Map(IndexMap<String, String>),
    /// Raw bytes for a body argument an external encoder has already
    /// serialized (form-encoded and body-encoded variants, §4.5).
    Bytes(Vec<u8>),
    /// A dedicated options argument overriding the operation's default
    /// timeouts and redirect policy for this one call (§4.7 step 1).
    Options(crate::config::RequestOptions),
}

impl Argv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, index: usize, value: ArgValue) -> Self {
        self.values.insert(index, value);
        self
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ArgValue> {
        self.values.get(&index)
    }
}

/// Registry of custom stringifiers referenced by `indexToExpander` (§3).
/// Looked up by name at build time; falls back to the scalar's own text if
/// unregistered for a `Scalar`, and to each element's text for `Iterable`.
pub type ExpanderFn = dyn Fn(&str) -> String + Send + Sync;

#[derive(Default)]
pub struct ExpanderRegistry {
    expanders: IndexMap<String, Box<ExpanderFn>>,
}

impl ExpanderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, expander: impl Fn(&str) -> String + Send + Sync + 'static) {
        self.expanders.insert(name.into(), Box::new(expander));
    }

    fn apply(&self, name: Option<&str>, value: &str) -> String {
        match name.and_then(|n| self.expanders.get(n)) {
            Some(expander) => expander(value),
            None => value.to_string(),
        }
    }
}

/// Shared algorithm (§4.5 steps 1-6), run once per invocation.
pub fn build_request(
    metadata: &OperationMetadata,
    argv: &Argv,
    expanders: &ExpanderRegistry,
) -> Result<Request, Error> {
    let (template, vars) = prepare_template(metadata, argv, expanders)?;
    finalize_request(template, &vars, metadata, argv)
}

/// §4.5 steps 1-3 plus the form/body-encoded variants: builds the template
/// and its variable bindings but stops short of resolving, so a caller
/// (the executor's retry loop, §4.7) can clone the template per attempt
/// and run interceptors and the target strategy against it first.
pub fn prepare_template(
    metadata: &OperationMetadata,
    argv: &Argv,
    expanders: &ExpanderRegistry,
) -> Result<(RequestTemplate, VariableMap), Error> {
    let mut template = RequestTemplate::new(&metadata.method, &metadata.uri_template)
        .with_decode_slash(metadata.decode_slash)
        .with_collection_format(metadata.collection_format);

    // Step 2: URI argument replaces target.
    if let Some(idx) = metadata.uri_arg_index {
        if let Some(ArgValue::Scalar(url)) = argv.get(idx) {
            template.set_target(url.clone())?;
        }
    }

    // Declared query templates from the request line become query
    // parameters before any indexToName values are bound, so that a
    // dynamic query-map argument can still override them later (step 5).
    for (name, value) in &metadata.query_templates {
        if value.is_empty() {
            template.insert_pure_query(name.clone())?;
        } else {
            template.append_query_value(name.clone(), value.clone())?;
        }
    }
    for (display_name, values) in metadata.header_templates.values() {
        for value in values {
            template.append_header_value(display_name.clone(), value)?;
        }
    }
    if let BodyKind::Template(source) = &metadata.body {
        template.set_body_template(source.clone())?;
    }

    // Step 3: build vars from indexToName, applying registered expanders
    // and splitting iterables into value lists bound to each name.
    let mut vars = VariableMap::new();
    for (idx, names) in &metadata.index_to_name {
        let expander_name = metadata.index_to_expander.get(idx).map(String::as_str);
        let value = match argv.get(*idx) {
            Some(ArgValue::Scalar(s)) => TemplateValue::Scalar(expanders.apply(expander_name, s)),
            Some(ArgValue::Iterable(items)) => {
                TemplateValue::Iterable(items.iter().map(|i| expanders.apply(expander_name, i)).collect())
            }
            _ => continue,
        };
        for name in names {
            vars.insert(name.clone(), value.clone());
        }
    }

    // Form-encoded variant: named parameters that matched no `{var}`
    // anywhere become form body fields instead of URI/query bindings.
    if !metadata.form_params.is_empty() {
        let mut form = String::new();
        for name in &metadata.form_params {
            if let Some(TemplateValue::Scalar(value)) = vars.get(name) {
                if !form.is_empty() {
                    form.push('&');
                }
                form.push_str(&crate::uri_template::percent_encode(
                    name,
                    crate::uri_template::FragmentType::Query,
                ));
                form.push('=');
                form.push_str(&crate::uri_template::percent_encode(
                    value,
                    crate::uri_template::FragmentType::Query,
                ));
            }
        }
        template.set_body_literal(form.into_bytes(), None)?;
        if !template.has_header(crate::constants::HEADER_CONTENT_TYPE) {
            template.set_header(crate::constants::HEADER_CONTENT_TYPE, crate::constants::CONTENT_TYPE_FORM)?;
        }
    }

    // Body-encoded variant: a designated body argument, already serialized
    // by an external encoder into raw bytes.
    if let BodyKind::ArgIndex(idx) = metadata.body {
        if let Some(ArgValue::Bytes(bytes)) = argv.get(idx) {
            template.set_body_literal(bytes.clone(), None)?;
        }
    }

    Ok((template, vars))
}

/// §4.5 steps 4-6: resolves a prepared template (after interceptors and the
/// target strategy have had their turn, §4.7) against the variable bindings
/// `prepare_template` computed, and merges any map-typed arguments in last
/// so they win over declared defaults.
pub fn finalize_request(
    mut template: RequestTemplate,
    vars: &VariableMap,
    metadata: &OperationMetadata,
    argv: &Argv,
) -> Result<Request, Error> {
    // Step 4: resolve the template.
    template.resolve(vars)?;

    // Step 5: merge a query-map argument in after resolution, so its
    // entries win over declared defaults.
    let mut request = template.request()?;
    if let Some((idx, encoded)) = metadata.query_map_index {
        if let Some(ArgValue::Map(map)) = argv.get(idx) {
            merge_query_map(&mut request.url, map, encoded);
        }
    }

    // Step 6: merge a header-map argument in similarly.
    if let Some(idx) = metadata.header_map_index {
        if let Some(ArgValue::Map(map)) = argv.get(idx) {
            for (name, value) in map {
                request.headers.entry(name.clone()).or_default().push(value.clone());
            }
        }
    }

    Ok(request)
}

fn merge_query_map(url: &mut String, map: &IndexMap<String, String>, encoded: bool) {
    if map.is_empty() {
        return;
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    url.push(separator);
    let parts: Vec<String> = map
        .iter()
        .map(|(k, v)| {
            if encoded {
                format!("{k}={v}")
            } else {
                format!(
                    "{}={}",
                    crate::uri_template::percent_encode(k, crate::uri_template::FragmentType::Query),
                    crate::uri_template::percent_encode(v, crate::uri_template::FragmentType::Query)
                )
            }
        })
        .collect();
    url.push_str(&parts.join("&"));
}
