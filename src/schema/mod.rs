//! Schema AST: immutable declarations produced by the parser and consumed
//! by the skeleton builder and registry.
//!
//! The declaration set for one schema (plus everything merged in from its
//! includes) lives in a single `Schema`, arena-style: declarations are
//! stored in a `Vec` and referenced by index (`DeclId`) rather than by
//! owning pointer. This is what lets a Table refer to another Table that in
//! turn refers back to the first (A has a field of type B, B has a field of
//! type A) without needing `Rc`/`Weak` bookkeeping — the same arena/index
//! trick `no_proto_rs`'s prototype schema tree (`NP_Schem_Kind`) uses for
//! its own self-referential type graph.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod registry;

use crate::wire::{ScalarType, ScalarValue};
use std::collections::HashMap;

/// Index into a `Schema`'s declaration arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub usize);

/// A dotted namespace path, e.g. `my.game.sample`. Empty means the root
/// (unnamed) namespace.
pub type Namespace = String;

/// The type a field's value (or a vector's element) refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Scalar(ScalarType),
    String,
    Named(DeclId),
}

/// One member of an `Enum` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    /// Fully resolved value: for an ordinary enum this is the declared (or
    /// auto-incremented) value; for a `bit_flags` enum this is already
    /// `1 << position`, per the bit-position decision in SPEC_FULL.md.
    pub value: i64,
}

/// `enum Name : underlying (bit_flags) { A, B, ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub namespace: Namespace,
    pub name: String,
    pub underlying: ScalarType,
    pub bit_flags: bool,
    pub members: Vec<EnumMember>,
}

impl EnumDecl {
    pub fn member_value(&self, name: &str) -> Option<i64> {
        self.members.iter().find(|m| m.name == name).map(|m| m.value)
    }

    pub fn member_name(&self, value: i64) -> Option<&str> {
        self.members.iter().find(|m| m.value == value).map(|m| m.name.as_str())
    }
}

/// `union Name { MemberTable, ... }`. Every member must resolve to a Table
/// declaration (invariant 6 in spec.md §3).
#[derive(Debug, Clone, PartialEq)]
pub struct UnionDecl {
    pub namespace: Namespace,
    pub name: String,
    /// (member name as written in the schema, resolved Table decl)
    pub members: Vec<(String, DeclId)>,
}

impl UnionDecl {
    /// The discriminant value (1-based; 0 is reserved for "none") assigned
    /// to a member by declaration order, matching `flatc`'s union tag
    /// numbering.
    pub fn discriminant_of(&self, member_decl: DeclId) -> Option<u8> {
        self.members
            .iter()
            .position(|(_, id)| *id == member_decl)
            .map(|idx| (idx + 1) as u8)
    }

    pub fn member_by_discriminant(&self, tag: u8) -> Option<DeclId> {
        if tag == 0 {
            return None;
        }
        self.members.get(tag as usize - 1).map(|(_, id)| *id)
    }
}

/// One field of a Struct or Table declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    /// Declaration index; contiguous and monotonic per invariant 7,
    /// preserved across deprecation.
    pub index: usize,
    pub value_type: ValueType,
    pub is_vector: bool,
    /// Only ever `Some` for scalar/enum/bool fields; populated by the
    /// parser from the literal in `= value`, still unresolved against the
    /// declared type (that resolution happens in the skeleton builder).
    pub default: Option<DefaultLiteral>,
    pub deprecated: bool,
    /// `(key, value)` metadata pairs from the field's `(k: v, ...)` clause.
    pub attributes: Vec<(String, Option<String>)>,
}

impl FieldDecl {
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.iter().any(|(k, _)| k == key)
    }
}

/// A default value literal as written in the schema, before it's coerced
/// to the field's declared type. Coercion happens once, at skeleton-build
/// time (spec.md §9 "Default value coercion timing").
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultLiteral {
    Int(i64),
    Float(f64),
    Bool(bool),
    Ident(String),
}

/// `struct Name { field: type; ... }` — fixed-size, inline, no vtable.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub namespace: Namespace,
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

/// `table Name { field: type; ... }` — variable layout via a vtable.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDecl {
    pub namespace: Namespace,
    pub name: String,
    pub fields: Vec<FieldDecl>,
    /// Set for the declaration whose name matches the schema's
    /// `root_type`; it additionally carries the schema's file identifier.
    pub is_root: bool,
    pub file_identifier: Option<[u8; 4]>,
}

/// One declaration in the arena: exactly the four entity kinds spec.md §3
/// gives its own vtable/layout rules to.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Enum(EnumDecl),
    Union(UnionDecl),
    Struct(StructDecl),
    Table(TableDecl),
}

impl Decl {
    pub fn namespace(&self) -> &str {
        match self {
            Decl::Enum(d) => &d.namespace,
            Decl::Union(d) => &d.namespace,
            Decl::Struct(d) => &d.namespace,
            Decl::Table(d) => &d.namespace,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Decl::Enum(d) => &d.name,
            Decl::Union(d) => &d.name,
            Decl::Struct(d) => &d.name,
            Decl::Table(d) => &d.name,
        }
    }
}

/// The full declaration set for a schema file and everything pulled in
/// through its `include` statements whose namespace matches the current
/// schema's namespace (spec.md §4.C include-resolution rule).
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub namespace: Namespace,
    pub declarations: Vec<Decl>,
    pub root_type: Option<String>,
    pub file_identifier: Option<[u8; 4]>,
    pub file_extension: Option<String>,
    pub declared_attributes: std::collections::HashSet<String>,
    name_index: HashMap<(Namespace, String), DeclId>,
}

impl Schema {
    pub fn push(&mut self, decl: Decl) -> DeclId {
        let id = DeclId(self.declarations.len());
        self.name_index.insert((decl.namespace().to_owned(), decl.name().to_owned()), id);
        self.declarations.push(decl);
        id
    }

    pub fn get(&self, id: DeclId) -> &Decl {
        &self.declarations[id.0]
    }

    pub fn get_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.declarations[id.0]
    }

    pub fn lookup(&self, namespace: &str, name: &str) -> Option<DeclId> {
        self.name_index.get(&(namespace.to_owned(), name.to_owned())).copied()
    }

    /// Root declaration, if `root_type` was set and resolves.
    pub fn root(&self) -> Option<DeclId> {
        let root_name = self.root_type.as_ref()?;
        self.lookup(&self.namespace, root_name)
    }

    /// Used by the decoder to select a root type by file identifier when
    /// the caller didn't name one explicitly (spec.md §4.F, testable
    /// property 3).
    pub fn find_by_file_identifier(&self, id: &[u8; 4]) -> Option<DeclId> {
        self.declarations.iter().enumerate().find_map(|(i, d)| match d {
            Decl::Table(t) if t.file_identifier.as_ref() == Some(id) => Some(DeclId(i)),
            _ => None,
        })
    }
}

/// Coerce a literal default into the representation a scalar/enum field's
/// underlying wire type expects. Performed once, at skeleton-build time.
pub fn coerce_default(
    lit: &DefaultLiteral,
    ty: &ValueType,
    enum_lookup: impl Fn(DeclId) -> Option<EnumDecl>,
) -> Result<Option<ScalarValue>, crate::error::FbError> {
    use crate::error::FbError;

    match ty {
        ValueType::Scalar(ScalarType::Bool) => match lit {
            DefaultLiteral::Bool(b) => Ok(Some(ScalarValue::Bool(*b))),
            DefaultLiteral::Int(i) => Ok(Some(ScalarValue::Bool(*i != 0))),
            _ => Err(FbError::new("bool default must be true/false")),
        },
        ValueType::Scalar(st @ ScalarType::Int8)
        | ValueType::Scalar(st @ ScalarType::Int16)
        | ValueType::Scalar(st @ ScalarType::Int32)
        | ValueType::Scalar(st @ ScalarType::Int64)
        | ValueType::Scalar(st @ ScalarType::Uint8)
        | ValueType::Scalar(st @ ScalarType::Uint16)
        | ValueType::Scalar(st @ ScalarType::Uint32)
        | ValueType::Scalar(st @ ScalarType::Uint64) => match lit {
            DefaultLiteral::Int(i) => Ok(Some(coerce_int(*st, *i)?)),
            _ => Err(FbError::new("integer default must be an integer literal")),
        },
        ValueType::Scalar(ScalarType::Float32) => match lit {
            DefaultLiteral::Float(f) => Ok(Some(ScalarValue::Float32(*f as f32))),
            DefaultLiteral::Int(i) => Ok(Some(ScalarValue::Float32(*i as f32))),
            _ => Err(FbError::new("float default must be numeric")),
        },
        ValueType::Scalar(ScalarType::Float64) => match lit {
            DefaultLiteral::Float(f) => Ok(Some(ScalarValue::Float64(*f))),
            DefaultLiteral::Int(i) => Ok(Some(ScalarValue::Float64(*i as f64))),
            _ => Err(FbError::new("double default must be numeric")),
        },
        ValueType::Named(id) => {
            if let Some(e) = enum_lookup(*id) {
                match lit {
                    DefaultLiteral::Ident(name) => {
                        let v = e
                            .member_value(name)
                            .ok_or_else(|| FbError::new(format!("unknown enum member `{}`", name)))?;
                        Ok(Some(coerce_int(e.underlying, v)?))
                    }
                    DefaultLiteral::Int(i) => Ok(Some(coerce_int(e.underlying, *i)?)),
                    _ => Err(FbError::new("enum default must be a member name or integer")),
                }
            } else {
                // struct/table/union: no default per spec.md §3.
                Ok(None)
            }
        }
        ValueType::String => Ok(None),
    }
}

fn coerce_int(ty: ScalarType, v: i64) -> Result<ScalarValue, crate::error::FbError> {
    ScalarValue::from_i64(ty, v)
}
