//! Cross-target emission: generic method descriptions to target shapes.
//!
//! Every emit target has a type table that is total over the generic
//! vocabulary (`string`, `number`, `integer`, `boolean`, `void`, `bytes`, a
//! `T[]` list suffix, and uppercase domain type names). A lowercase token
//! outside the vocabulary is an [`DomainError::UnmappedType`] for the task
//! that asked for it.
//!
//! Boundary targets (JNI, IPC) additionally attach an unmarshal expression to
//! every parameter and a marshal expression to the return value, so a
//! template only has to splice them in.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::capability::{LinkMetadata, MethodParam};
use crate::domain::error::DomainError;
use crate::domain::method::{CrudShape, Method};
use crate::domain::naming::{to_camel_case, to_pascal_case, to_snake_case};

// ── Targets ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmitTarget {
    /// Plain Rust, direct calls.
    Rust,
    /// Rust side of a JNI boundary.
    RustJni,
    /// Rust side of a JSON IPC boundary.
    RustIpc,
    Kotlin,
    Swift,
    TypeScript,
}

impl EmitTarget {
    pub const ALL: [EmitTarget; 6] = [
        Self::Rust,
        Self::RustJni,
        Self::RustIpc,
        Self::Kotlin,
        Self::Swift,
        Self::TypeScript,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::RustJni => "rust-jni",
            Self::RustIpc => "rust-ipc",
            Self::Kotlin => "kotlin",
            Self::Swift => "swift",
            Self::TypeScript => "typescript",
        }
    }

    /// Member naming convention for methods and parameters.
    pub fn member_name(&self, name: &str) -> String {
        match self {
            Self::Rust | Self::RustJni | Self::RustIpc => to_snake_case(name),
            Self::Kotlin | Self::Swift | Self::TypeScript => to_camel_case(name),
        }
    }

    pub fn type_name(&self, name: &str) -> String {
        to_pascal_case(name)
    }

    fn table(&self) -> &'static TypeTable {
        match self {
            Self::Rust | Self::RustIpc => &RUST,
            Self::RustJni => &JNI,
            Self::Kotlin => &KOTLIN,
            Self::Swift => &SWIFT,
            Self::TypeScript => &TYPESCRIPT,
        }
    }
}

impl fmt::Display for EmitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmitTarget {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rust" | "rs" => Ok(Self::Rust),
            "rust-jni" | "jni" => Ok(Self::RustJni),
            "rust-ipc" | "ipc" => Ok(Self::RustIpc),
            "kotlin" | "kt" => Ok(Self::Kotlin),
            "swift" => Ok(Self::Swift),
            "typescript" | "ts" => Ok(Self::TypeScript),
            other => Err(DomainError::UnknownTarget(other.to_string())),
        }
    }
}

// ── Type vocabulary ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    String,
    Number,
    Integer,
    Boolean,
    Void,
    Bytes,
}

/// A parsed generic type token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeToken {
    Primitive(Primitive),
    /// Domain type, passed through in PascalCase.
    Domain(String),
    List(Box<TypeToken>),
}

impl TypeToken {
    /// # Errors
    ///
    /// `UnmappedType` for a lowercase token outside the vocabulary.
    pub fn parse(raw: &str, target: EmitTarget) -> Result<Self, DomainError> {
        let token = raw.trim();
        if let Some(inner) = token.strip_suffix("[]") {
            return Ok(Self::List(Box::new(Self::parse(inner, target)?)));
        }
        let primitive = match token {
            "string" => Primitive::String,
            "number" => Primitive::Number,
            "integer" => Primitive::Integer,
            "boolean" => Primitive::Boolean,
            "void" => Primitive::Void,
            "bytes" => Primitive::Bytes,
            _ if token.starts_with(|c: char| c.is_ascii_uppercase()) => {
                return Ok(Self::Domain(to_pascal_case(token)));
            }
            _ => {
                return Err(DomainError::UnmappedType {
                    token: raw.to_string(),
                    target: target.to_string(),
                });
            }
        };
        Ok(Self::Primitive(primitive))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Primitive(Primitive::Void))
    }
}

struct TypeTable {
    string: &'static str,
    number: &'static str,
    integer: &'static str,
    boolean: &'static str,
    void: &'static str,
    bytes: &'static str,
    /// Type used for anything that crosses the boundary as JSON text.
    json: Option<&'static str>,
    list: fn(&str) -> String,
    optional: fn(&str) -> String,
}

fn rust_list(t: &str) -> String {
    format!("Vec<{t}>")
}

fn rust_optional(t: &str) -> String {
    format!("Option<{t}>")
}

fn jni_json(_: &str) -> String {
    "JString".to_string()
}

fn kotlin_list(t: &str) -> String {
    format!("List<{t}>")
}

fn swift_list(t: &str) -> String {
    format!("[{t}]")
}

fn ts_list(t: &str) -> String {
    format!("{t}[]")
}

fn ts_optional(t: &str) -> String {
    format!("{t} | undefined")
}

fn nullable(t: &str) -> String {
    format!("{t}?")
}

static RUST: TypeTable = TypeTable {
    string: "String",
    number: "f64",
    integer: "i64",
    boolean: "bool",
    void: "()",
    bytes: "Vec<u8>",
    json: None,
    list: rust_list,
    optional: rust_optional,
};

static JNI: TypeTable = TypeTable {
    string: "JString",
    number: "jdouble",
    integer: "jlong",
    boolean: "jboolean",
    void: "()",
    bytes: "JByteArray",
    json: Some("JString"),
    list: jni_json,
    optional: jni_json,
};

static KOTLIN: TypeTable = TypeTable {
    string: "String",
    number: "Double",
    integer: "Long",
    boolean: "Boolean",
    void: "Unit",
    bytes: "ByteArray",
    json: None,
    list: kotlin_list,
    optional: nullable,
};

static SWIFT: TypeTable = TypeTable {
    string: "String",
    number: "Double",
    integer: "Int64",
    boolean: "Bool",
    void: "Void",
    bytes: "Data",
    json: None,
    list: swift_list,
    optional: nullable,
};

static TYPESCRIPT: TypeTable = TypeTable {
    string: "string",
    number: "number",
    integer: "number",
    boolean: "boolean",
    void: "void",
    bytes: "Uint8Array",
    json: None,
    list: ts_list,
    optional: ts_optional,
};

impl TypeTable {
    fn render(&self, token: &TypeToken) -> String {
        match token {
            TypeToken::Primitive(p) => match p {
                Primitive::String => self.string,
                Primitive::Number => self.number,
                Primitive::Integer => self.integer,
                Primitive::Boolean => self.boolean,
                Primitive::Void => self.void,
                Primitive::Bytes => self.bytes,
            }
            .to_string(),
            TypeToken::Domain(name) => self.json.map_or_else(|| name.clone(), str::to_string),
            TypeToken::List(inner) => (self.list)(&self.render(inner)),
        }
    }
}

/// Map a generic type token to `target`.
pub fn map_type(token: &str, target: EmitTarget) -> Result<String, DomainError> {
    let parsed = TypeToken::parse(token, target)?;
    Ok(target.table().render(&parsed))
}

/// Map a token, wrapping it for a collection and/or optional position.
pub fn map_type_with(
    token: &str,
    target: EmitTarget,
    collection: bool,
    optional: bool,
) -> Result<String, DomainError> {
    let mut parsed = TypeToken::parse(token, target)?;
    if collection && !parsed.is_void() {
        parsed = TypeToken::List(Box::new(parsed));
    }
    let table = target.table();
    let rendered = table.render(&parsed);
    Ok(if optional {
        (table.optional)(&rendered)
    } else {
        rendered
    })
}

// ── Marshalling ──────────────────────────────────────────────────────────────

/// Expression turning a boundary value named `name` into the Rust value.
fn unmarshal(target: EmitTarget, token: &TypeToken, optional: bool, name: &str) -> Option<String> {
    match target {
        EmitTarget::RustJni => Some(if optional {
            format!("serde_json::from_str(&String::from(env.get_string(&{name})?))?")
        } else {
            match token {
                TypeToken::Primitive(Primitive::String) => format!("env.get_string(&{name})?.into()"),
                TypeToken::Primitive(Primitive::Number) => format!("{name} as f64"),
                TypeToken::Primitive(Primitive::Integer) => format!("{name} as i64"),
                TypeToken::Primitive(Primitive::Boolean) => format!("{name} != 0"),
                TypeToken::Primitive(Primitive::Bytes) => format!("env.convert_byte_array(&{name})?"),
                TypeToken::Primitive(Primitive::Void) => name.to_string(),
                TypeToken::Domain(_) | TypeToken::List(_) => {
                    format!("serde_json::from_str(&String::from(env.get_string(&{name})?))?")
                }
            }
        }),
        EmitTarget::RustIpc => Some(format!("serde_json::from_value({name})?")),
        _ => None,
    }
}

/// Expression turning a Rust value `value` into the boundary representation.
fn marshal(target: EmitTarget, token: &TypeToken, value: &str) -> Option<String> {
    match target {
        EmitTarget::RustJni => Some(match token {
            TypeToken::Primitive(Primitive::String) => format!("env.new_string({value})?"),
            TypeToken::Primitive(Primitive::Number) => format!("{value} as jdouble"),
            TypeToken::Primitive(Primitive::Integer) => format!("{value} as jlong"),
            TypeToken::Primitive(Primitive::Boolean) => format!("{value} as jboolean"),
            TypeToken::Primitive(Primitive::Bytes) => format!("env.byte_array_from_slice(&{value})?"),
            TypeToken::Primitive(Primitive::Void) => value.to_string(),
            TypeToken::Domain(_) | TypeToken::List(_) => {
                format!("env.new_string(serde_json::to_string(&{value})?)?")
            }
        }),
        EmitTarget::RustIpc => Some(format!("serde_json::to_value({value})?")),
        _ => None,
    }
}

// ── Emitted shapes ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmittedParam {
    /// Name in the target's member case.
    pub name: String,
    pub original_name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub generic_type: String,
    pub optional: bool,
    /// Boundary targets only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmarshal: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmittedMethod {
    /// Bind name in the target's member case.
    pub name: String,
    pub original_name: String,
    /// `PascalCase` of the original name, for type and class names.
    pub pascal_name: String,
    pub capability: String,
    pub capability_prefix: String,
    pub params: Vec<EmittedParam>,
    pub return_type: String,
    pub generic_return_type: String,
    pub is_void: bool,
    pub is_collection: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marshal_return: Option<String>,
    pub description: String,
    pub tags: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crud: Option<CrudShape>,
}

fn emit_param(param: &MethodParam, target: EmitTarget) -> Result<EmittedParam, DomainError> {
    let token = TypeToken::parse(&param.ty, target)?;
    let name = target.member_name(&param.name);
    Ok(EmittedParam {
        ty: map_type_with(&param.ty, target, false, param.optional)?,
        unmarshal: unmarshal(target, &token, param.optional, &name),
        generic_type: param.ty.clone(),
        original_name: param.name.clone(),
        optional: param.optional,
        name,
    })
}

/// Shape one pipeline method for `target`.
///
/// # Errors
///
/// `UnmappedType` if any parameter or the return type is outside the
/// vocabulary.
pub fn emit_method(method: &Method, target: EmitTarget) -> Result<EmittedMethod, DomainError> {
    let params = method
        .params
        .iter()
        .map(|p| emit_param(p, target))
        .collect::<Result<Vec<_>, _>>()?;

    let mut ret = TypeToken::parse(&method.return_type, target)?;
    let is_void = ret.is_void();
    if method.is_collection && !is_void {
        ret = TypeToken::List(Box::new(ret));
    }

    Ok(EmittedMethod {
        name: target.member_name(&method.name),
        original_name: method.original_name.clone(),
        pascal_name: to_pascal_case(&method.original_name),
        capability: method.capability.clone(),
        capability_prefix: method.capability_prefix.clone(),
        params,
        return_type: target.table().render(&ret),
        generic_return_type: method.return_type.clone(),
        is_void,
        is_collection: method.is_collection,
        marshal_return: if is_void {
            None
        } else {
            marshal(target, &ret, "result")
        },
        description: method.description.clone(),
        tags: method.tags.clone(),
        link: method.link.clone(),
        crud: method.crud.clone(),
    })
}

pub fn emit_methods(methods: &[Method], target: EmitTarget) -> Result<Vec<EmittedMethod>, DomainError> {
    methods.iter().map(|m| emit_method(m, target)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capability::{Capability, CapabilityMethod, Reach};

    fn method(declared: CapabilityMethod) -> Method {
        let cap = Capability::declare("BookmarkMgmt", Reach::Global, vec![declared.clone()]).unwrap();
        Method::from_declared(&cap, &declared)
    }

    #[test]
    fn vocabulary_is_total_for_every_target() {
        for target in EmitTarget::ALL {
            for token in ["string", "number", "integer", "boolean", "void", "bytes", "Bookmark", "string[]"] {
                assert!(map_type(token, target).is_ok(), "{token} on {target}");
            }
        }
    }

    #[test]
    fn type_tables() {
        assert_eq!(map_type("string[]", EmitTarget::Rust).unwrap(), "Vec<String>");
        assert_eq!(map_type("integer", EmitTarget::Kotlin).unwrap(), "Long");
        assert_eq!(map_type("Bookmark[]", EmitTarget::Swift).unwrap(), "[Bookmark]");
        assert_eq!(map_type("bytes", EmitTarget::TypeScript).unwrap(), "Uint8Array");
        assert_eq!(map_type("Bookmark", EmitTarget::RustJni).unwrap(), "JString");
        assert_eq!(
            map_type_with("number", EmitTarget::Rust, true, true).unwrap(),
            "Option<Vec<f64>>"
        );
    }

    #[test]
    fn unknown_lowercase_token_is_unmapped() {
        let err = map_type("uuid", EmitTarget::Kotlin).unwrap_err();
        assert_eq!(
            err,
            DomainError::UnmappedType {
                token: "uuid".into(),
                target: "kotlin".into()
            }
        );
    }

    #[test]
    fn jni_marshal_pairs() {
        let m = method(
            CapabilityMethod::new("setPinned")
                .param(MethodParam::new("bookmarkUrl", "string"))
                .param(MethodParam::new("pinned", "boolean"))
                .returns("boolean"),
        );
        let e = emit_method(&m, EmitTarget::RustJni).unwrap();

        assert_eq!(e.name, "set_pinned");
        assert_eq!(e.params[0].name, "bookmark_url");
        assert_eq!(
            e.params[0].unmarshal.as_deref(),
            Some("env.get_string(&bookmark_url)?.into()")
        );
        assert_eq!(e.params[1].unmarshal.as_deref(), Some("pinned != 0"));
        assert_eq!(e.marshal_return.as_deref(), Some("result as jboolean"));
    }

    #[test]
    fn ipc_uses_json_values() {
        let m = method(
            CapabilityMethod::new("list")
                .returns("Bookmark")
                .collection(),
        );
        let e = emit_method(&m, EmitTarget::RustIpc).unwrap();
        assert_eq!(e.return_type, "Vec<Bookmark>");
        assert_eq!(e.marshal_return.as_deref(), Some("serde_json::to_value(result)?"));
    }

    #[test]
    fn front_targets_use_camel_case() {
        let m = method(
            CapabilityMethod::new("delete_bookmark").param(MethodParam::optional("bookmark_id", "number")),
        );
        let e = emit_method(&m, EmitTarget::TypeScript).unwrap();
        assert_eq!(e.name, "deleteBookmark");
        assert_eq!(e.params[0].name, "bookmarkId");
        assert_eq!(e.params[0].ty, "number | undefined");
        assert!(e.is_void);
        assert_eq!(e.params[0].unmarshal, None);
        assert_eq!(e.marshal_return, None);
    }
}
