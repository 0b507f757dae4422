//! Operation metadata (§3): the immutable, per-operation record the
//! contract parser produces once and the template builder consumes on
//! every invocation.

use crate::request_template::CollectionFormat;
use indexmap::IndexMap;

#[derive(Debug, Clone)]
pub enum BodyKind {
    None,
    /// A body template string with embedded expressions.
    Template(String),
    /// Index of the argument supplying the body, plus whatever static type
    /// hint the declaration carried (opaque here; the template builder's
    /// caller supplies the actual encoder).
    ArgIndex(usize),
}

/// One per declared operation, cached after parse and immutable thereafter.
#[derive(Debug, Clone)]
pub struct OperationMetadata {
    /// Class simple name + method signature, e.g. `"GitHub#contributors"`.
    pub identity: String,
    pub method: String,
    /// Path portion of the URI template (may contain `{var}`s).
    pub uri_template: String,
    /// Literal query-string fragments parsed out of the request line, kept
    /// as `(name_template, value_template)` pairs in declaration order.
    pub query_templates: Vec<(String, String)>,
    /// name → ordered value templates, case-insensitively keyed by caller
    /// convention (headers are merged class-then-method before this point).
    pub header_templates: IndexMap<String, (String, Vec<String>)>,
    pub body: BodyKind,
    pub uri_arg_index: Option<usize>,
    pub options_arg_index: Option<usize>,
    /// Query-map argument index and whether its values are pre-encoded.
    pub query_map_index: Option<(usize, bool)>,
    pub header_map_index: Option<usize>,
    /// Argument index → template variable names it supplies (one argument
    /// may feed multiple `{var}`s).
    pub index_to_name: IndexMap<usize, Vec<String>>,
    /// Argument index → name of a registered custom stringifier.
    pub index_to_expander: IndexMap<usize, String>,
    /// Named arguments that matched no `{var}` anywhere in the URI or
    /// query templates: these become form-encoded body fields (§4.5).
    pub form_params: Vec<String>,
    pub decode_slash: bool,
    pub collection_format: CollectionFormat,
}

impl OperationMetadata {
    #[must_use]
    pub fn is_form_encoded(&self) -> bool {
        !self.form_params.is_empty()
    }

    #[must_use]
    pub fn is_body_encoded(&self) -> bool {
        matches!(self.body, BodyKind::ArgIndex(_))
    }
}
