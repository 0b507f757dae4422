//! Declarative contract surface (§4.4): declaration types in, operation
//! metadata out.

pub mod declaration;
pub mod metadata;
pub mod parser;

pub use declaration::{HeaderDecl, InterfaceDecl, OperationDecl, ParamDecl, ParamRole};
pub use metadata::{BodyKind, OperationMetadata};
pub use parser::parse_interface;
