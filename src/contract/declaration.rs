//! The operation declaration surface (§6): what the contract parser
//! consumes. Call sites build these by hand or generate them from a macro;
//! either way they describe an interface's operations in the abstract form
//! the parser expects, with no dependency on any particular wire format.

/// One `Name: value` header entry; the value may contain `{var}` expressions.
#[derive(Debug, Clone)]
pub struct HeaderDecl {
    pub name: String,
    pub value_template: String,
}

impl HeaderDecl {
    pub fn new(name: impl Into<String>, value_template: impl Into<String>) -> Self {
        Self { name: name.into(), value_template: value_template.into() }
    }
}

/// How a single operation argument is tagged (§6).
#[derive(Debug, Clone)]
pub enum ParamRole {
    /// A named template variable. `expander` names a registered custom
    /// stringifier; `encoded` means the value is already percent-encoded.
    Named { name: String, expander: Option<String>, encoded: bool },
    /// A `map<string, any>` merged into the query string after resolution.
    QueryMap { encoded: bool },
    /// A `map<string, any>` merged into headers after resolution.
    HeaderMap,
    /// Supplies the absolute base URI for this call.
    Uri,
    /// Carries per-call options (timeouts, redirect policy).
    Options,
    /// Explicitly the request body.
    Body,
    /// No tag at all: classified by the parser (§4.4) as the body argument
    /// if no other argument has claimed that role.
    Untagged,
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub index: usize,
    pub role: ParamRole,
}

impl ParamDecl {
    #[must_use]
    pub const fn new(index: usize, role: ParamRole) -> Self {
        Self { index, role }
    }
}

/// One operation as declared on an interface (§6).
#[derive(Debug, Clone, Default)]
pub struct OperationDecl {
    pub name: String,
    /// Request line, e.g. `"GET /repos/{owner}/{repo}?sort={sort}"`. `None`
    /// marks this as a static or default operation, skipped by the parser.
    pub request_line: Option<String>,
    pub headers: Vec<HeaderDecl>,
    pub body_template: Option<String>,
    pub params: Vec<ParamDecl>,
    pub decode_slash: bool,
    pub collection_format: crate::request_template::CollectionFormat,
    /// Default operations carry their own implementation and are routed
    /// around the HTTP pipeline entirely (§4.6); the parser skips them.
    pub is_default: bool,
    /// Static operations are never dispatched through the proxy.
    pub is_static: bool,
}

impl OperationDecl {
    #[must_use]
    pub fn new(name: impl Into<String>, request_line: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            request_line: Some(request_line.into()),
            decode_slash: true,
            collection_format: crate::request_template::CollectionFormat::Exploded,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn default_operation(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_default: true, ..Default::default() }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value_template: impl Into<String>) -> Self {
        self.headers.push(HeaderDecl::new(name, value_template));
        self
    }

    #[must_use]
    pub fn with_body(mut self, template: impl Into<String>) -> Self {
        self.body_template = Some(template.into());
        self
    }

    #[must_use]
    pub fn with_param(mut self, index: usize, role: ParamRole) -> Self {
        self.params.push(ParamDecl::new(index, role));
        self
    }
}

/// An interface-like type with operations (§6). At most one superinterface,
/// itself with none, and the interface itself carries no generic parameters.
#[derive(Debug, Clone, Default)]
pub struct InterfaceDecl {
    pub name: String,
    pub generic_params: Vec<String>,
    pub config_key: Option<String>,
    pub superinterface: Option<Box<InterfaceDecl>>,
    pub class_headers: Vec<HeaderDecl>,
    pub operations: Vec<OperationDecl>,
}

impl InterfaceDecl {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    #[must_use]
    pub fn with_class_header(mut self, name: impl Into<String>, value_template: impl Into<String>) -> Self {
        self.class_headers.push(HeaderDecl::new(name, value_template));
        self
    }

    #[must_use]
    pub fn with_operation(mut self, op: OperationDecl) -> Self {
        self.operations.push(op);
        self
    }

    #[must_use]
    pub fn with_superinterface(mut self, parent: InterfaceDecl) -> Self {
        self.superinterface = Some(Box::new(parent));
        self
    }
}
