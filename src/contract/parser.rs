//! Contract parser (§4.4): turns an [`InterfaceDecl`] into a list of
//! [`OperationMetadata`] records, enforcing the data-model invariants (§3).

use crate::contract::declaration::{HeaderDecl, InterfaceDecl, OperationDecl, ParamRole};
use crate::contract::metadata::{BodyKind, OperationMetadata};
use crate::error::Error;
use crate::uri_template::UriTemplate;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

static REQUEST_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]+)\s*(.*)$").expect("static regex is valid"));

/// Parses every non-static, non-default operation on `decl` into metadata.
pub fn parse_interface(decl: &InterfaceDecl) -> Result<Vec<OperationMetadata>, Error> {
    if !decl.generic_params.is_empty() {
        return Err(Error::contract_generic_interface(&decl.name));
    }
    if let Some(parent) = &decl.superinterface {
        if parent.superinterface.is_some() {
            return Err(Error::contract_too_many_superinterfaces(&decl.name));
        }
        if let (Some(child_key), Some(parent_key)) = (&decl.config_key, &parent.config_key) {
            if child_key == parent_key {
                return Err(Error::contract_duplicate_config_key(child_key));
            }
        }
    }

    let class_headers = match &decl.superinterface {
        Some(parent) => merge_headers(&parent.class_headers, &decl.class_headers),
        None => headers_to_map(&decl.class_headers),
    };

    let mut metadata = Vec::new();
    for op in &decl.operations {
        if op.is_static || op.is_default {
            continue;
        }
        metadata.push(parse_operation(op, &class_headers)?);
    }
    Ok(metadata)
}

fn headers_to_map(headers: &[HeaderDecl]) -> IndexMap<String, (String, Vec<String>)> {
    let mut map = IndexMap::new();
    for h in headers {
        map.entry(h.name.to_lowercase())
            .or_insert_with(|| (h.name.clone(), Vec::new()))
            .1
            .push(h.value_template.clone());
    }
    map
}

/// Later overrides earlier by header name, case-insensitively (§4.4 pass 1,
/// and the method-level merge in pass 2): the override replaces the whole
/// value list rather than appending to it.
fn merge_headers(
    base: &[HeaderDecl],
    overrides: &[HeaderDecl],
) -> IndexMap<String, (String, Vec<String>)> {
    let mut map = headers_to_map(base);
    for h in overrides {
        map.insert(h.name.to_lowercase(), (h.name.clone(), vec![h.value_template.clone()]));
    }
    map
}

fn parse_operation(
    op: &OperationDecl,
    class_headers: &IndexMap<String, (String, Vec<String>)>,
) -> Result<OperationMetadata, Error> {
    let request_line = op
        .request_line
        .as_deref()
        .ok_or_else(|| Error::contract_missing_method(&op.name))?;
    let caps = REQUEST_LINE
        .captures(request_line)
        .ok_or_else(|| Error::contract_missing_method(&op.name))?;
    let method = caps.get(1).expect("grammar requires group 1").as_str().to_string();
    if !crate::constants::is_known_http_method(&method) {
        return Err(Error::contract_unknown_method(&op.name, &method));
    }
    let uri_and_query = caps.get(2).map_or("", |m| m.as_str());
    let (uri_template, query_templates) = split_request_uri(uri_and_query);

    let header_templates = merge_headers(
        &class_headers
            .values()
            .flat_map(|(name, values)| values.iter().map(move |v| HeaderDecl::new(name.clone(), v.clone())))
            .collect::<Vec<_>>(),
        &op.headers,
    );

    let mut body = op
        .body_template
        .as_ref()
        .map_or(BodyKind::None, |t| BodyKind::Template(t.clone()));

    let mut uri_arg_index = None;
    let mut options_arg_index = None;
    let mut query_map_index = None;
    let mut header_map_index = None;
    let mut index_to_name: IndexMap<usize, Vec<String>> = IndexMap::new();
    let mut index_to_expander = IndexMap::new();

    for param in &op.params {
        match &param.role {
            ParamRole::Named { name, expander, encoded: _ } => {
                index_to_name.entry(param.index).or_default().push(name.clone());
                if let Some(expander) = expander {
                    index_to_expander.insert(param.index, expander.clone());
                }
            }
            ParamRole::QueryMap { encoded } => {
                if query_map_index.is_some() {
                    return Err(Error::contract_duplicate_query_map(&op.name));
                }
                query_map_index = Some((param.index, *encoded));
            }
            ParamRole::HeaderMap => {
                if header_map_index.is_some() {
                    return Err(Error::contract_duplicate_header_map(&op.name));
                }
                header_map_index = Some(param.index);
            }
            ParamRole::Uri => uri_arg_index = Some(param.index),
            ParamRole::Options => options_arg_index = Some(param.index),
            ParamRole::Body => {
                if !matches!(body, BodyKind::None) {
                    return Err(Error::contract_duplicate_body(&op.name));
                }
                body = BodyKind::ArgIndex(param.index);
            }
            ParamRole::Untagged => {
                if matches!(body, BodyKind::None) {
                    body = BodyKind::ArgIndex(param.index);
                }
            }
        }
    }

    // Every named argument whose variable doesn't show up in the path or
    // any query template becomes a form parameter (§4.5); the rest are URI
    // bindings. Either way, §3 requires every `{var}` to be covered by some
    // `indexToName` entry or a map-typed argument.
    let path_vars: Vec<String> = UriTemplate::parse(&uri_template).variable_names().map(str::to_string).collect();
    let query_vars: Vec<String> = query_templates
        .iter()
        .flat_map(|(name, value)| {
            UriTemplate::parse(name)
                .variable_names()
                .chain(UriTemplate::parse(value).variable_names())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();
    let template_vars: Vec<&str> = path_vars.iter().chain(query_vars.iter()).map(String::as_str).collect();

    let mut form_params = Vec::new();
    for names in index_to_name.values() {
        for name in names {
            if !template_vars.contains(&name.as_str()) {
                form_params.push(name.clone());
            }
        }
    }

    if !form_params.is_empty() && matches!(body, BodyKind::ArgIndex(_)) {
        return Err(Error::contract_duplicate_body(&op.name));
    }

    let covered: Vec<&str> = index_to_name.values().flatten().map(String::as_str).collect();
    let has_map_arg = query_map_index.is_some() || header_map_index.is_some();
    for var in path_vars.iter().chain(query_vars.iter()) {
        if !covered.contains(&var.as_str()) && !has_map_arg {
            return Err(Error::contract_unresolvable_variable(&op.name, var));
        }
    }

    Ok(OperationMetadata {
        identity: format!("{}#{}", op.name, request_line),
        method,
        uri_template,
        query_templates,
        header_templates,
        body,
        uri_arg_index,
        options_arg_index,
        query_map_index,
        header_map_index,
        index_to_name,
        index_to_expander,
        form_params,
        decode_slash: op.decode_slash,
        collection_format: op.collection_format,
    })
}

/// Splits `"/path/{x}?a={b}&c={d}"` into the path template and an ordered
/// list of `(name_template, value_template)` query pairs. A `?` preceded by
/// `{` is inside an unresolved expression, not a real query separator
/// (mirrors the detection rule used on the resolved side in §4.3).
fn split_request_uri(input: &str) -> (String, Vec<(String, String)>) {
    let bytes = input.as_bytes();
    let mut split_at = None;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'?' && (i == 0 || bytes[i - 1] != b'{') {
            split_at = Some(i);
            break;
        }
    }
    let Some(i) = split_at else {
        return (input.to_string(), Vec::new());
    };
    let path = input[..i].to_string();
    let query = &input[i + 1..];
    let pairs = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => (name.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect();
    (path, pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::declaration::OperationDecl;

    #[test]
    fn rejects_generic_interface() {
        let decl = InterfaceDecl { generic_params: vec!["T".to_string()], ..InterfaceDecl::new("Api") };
        assert!(parse_interface(&decl).is_err());
    }

    #[test]
    fn rejects_grandparent_superinterface() {
        let grandparent = InterfaceDecl::new("Root").with_superinterface(InterfaceDecl::new("Deeper"));
        let decl = InterfaceDecl::new("Api").with_superinterface(grandparent);
        assert!(parse_interface(&decl).is_err());
    }

    #[test]
    fn parses_basic_get_operation() {
        let decl = InterfaceDecl::new("GitHub").with_operation(
            OperationDecl::new("contributors", "GET /repos/{owner}/{repo}/contributors")
                .with_param(0, ParamRole::Named { name: "owner".into(), expander: None, encoded: false })
                .with_param(1, ParamRole::Named { name: "repo".into(), expander: None, encoded: false }),
        );
        let metadata = parse_interface(&decl).unwrap();
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata[0].method, "GET");
        assert_eq!(metadata[0].uri_template, "/repos/{owner}/{repo}/contributors");
    }

    #[test]
    fn unknown_method_is_rejected() {
        let decl = InterfaceDecl::new("Api").with_operation(OperationDecl::new("op", "FETCH /x"));
        assert!(parse_interface(&decl).is_err());
    }

    #[test]
    fn unresolvable_path_variable_is_rejected() {
        let decl = InterfaceDecl::new("Api").with_operation(OperationDecl::new("op", "GET /x/{id}"));
        assert!(parse_interface(&decl).is_err());
    }

    #[test]
    fn unnamed_argument_with_no_body_becomes_the_body() {
        let decl = InterfaceDecl::new("Api").with_operation(
            OperationDecl::new("create", "POST /things").with_param(0, ParamRole::Untagged),
        );
        let metadata = parse_interface(&decl).unwrap();
        assert!(matches!(metadata[0].body, BodyKind::ArgIndex(0)));
    }

    #[test]
    fn unmatched_named_argument_becomes_a_form_param() {
        let decl = InterfaceDecl::new("Api").with_operation(
            OperationDecl::new("create", "POST /things")
                .with_param(0, ParamRole::Named { name: "title".into(), expander: None, encoded: false }),
        );
        let metadata = parse_interface(&decl).unwrap();
        assert_eq!(metadata[0].form_params, vec!["title".to_string()]);
    }

    #[test]
    fn form_params_and_body_argument_are_mutually_exclusive() {
        let decl = InterfaceDecl::new("Api").with_operation(
            OperationDecl::new("create", "POST /things")
                .with_param(0, ParamRole::Named { name: "title".into(), expander: None, encoded: false })
                .with_param(1, ParamRole::Body),
        );
        assert!(parse_interface(&decl).is_err());
    }

    #[test]
    fn duplicate_query_map_is_rejected() {
        let decl = InterfaceDecl::new("Api").with_operation(
            OperationDecl::new("search", "GET /search")
                .with_param(0, ParamRole::QueryMap { encoded: false })
                .with_param(1, ParamRole::QueryMap { encoded: false }),
        );
        assert!(parse_interface(&decl).is_err());
    }

    #[test]
    fn method_headers_override_class_headers_by_name() {
        let decl = InterfaceDecl::new("Api")
            .with_class_header("Accept", "application/json")
            .with_operation(
                OperationDecl::new("op", "GET /x").with_header("accept", "text/plain"),
            );
        let metadata = parse_interface(&decl).unwrap();
        let (display, values) = metadata[0].header_templates.get("accept").unwrap();
        assert_eq!(display, "accept");
        assert_eq!(values, &vec!["text/plain".to_string()]);
    }

    #[test]
    fn query_string_variables_satisfy_the_coverage_rule() {
        let decl = InterfaceDecl::new("Api").with_operation(
            OperationDecl::new("search", "GET /search?q={term}")
                .with_param(0, ParamRole::Named { name: "term".into(), expander: None, encoded: false }),
        );
        let metadata = parse_interface(&decl).unwrap();
        assert_eq!(metadata[0].query_templates, vec![("q".to_string(), "{term}".to_string())]);
    }
}
