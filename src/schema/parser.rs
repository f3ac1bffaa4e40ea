//! Grammar: IDL token stream → `Schema` AST, including forward-reference
//! resolution, include merging, and the post-parse normalization pass
//! (enum value fill-in, root-type/file-identifier wiring).
//!
//! Two passes over the declaration list: the first assigns a `DeclId` to
//! every declared name (so fields can reference types declared later in
//! the same file, or declared in a sibling file merged in via `include`),
//! the second actually builds each `Decl` using that name index to resolve
//! `ValueType::Named` references.

use super::ast::{TokKind, Token};
use super::lexer::{self, tokenize};
use super::{
    coerce_default, DeclId, DefaultLiteral, Decl, EnumDecl, EnumMember, FieldDecl, Namespace, Schema, StructDecl,
    TableDecl, UnionDecl, ValueType,
};
use crate::error::FbError;
use crate::wire::ScalarType;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
enum RawType {
    Scalar(ScalarType),
    String,
    Named(String),
}

#[derive(Debug, Clone)]
struct RawField {
    name: String,
    raw_type: RawType,
    is_vector: bool,
    default: Option<DefaultLiteral>,
    deprecated: bool,
    attributes: Vec<(String, Option<String>)>,
}

#[derive(Debug, Clone)]
enum RawDecl {
    Enum { name: String, underlying: ScalarType, bit_flags: bool, members: Vec<(String, Option<i64>)> },
    Union { name: String, members: Vec<String> },
    Struct { name: String, fields: Vec<RawField> },
    Table { name: String, fields: Vec<RawField> },
}

impl RawDecl {
    fn name(&self) -> &str {
        match self {
            RawDecl::Enum { name, .. } => name,
            RawDecl::Union { name, .. } => name,
            RawDecl::Struct { name, .. } => name,
            RawDecl::Table { name, .. } => name,
        }
    }
}

/// One schema file's own content, before include-merging.
#[derive(Debug, Clone, Default)]
struct ParsedFile {
    namespace: Namespace,
    decls: Vec<(Namespace, RawDecl)>,
    includes: Vec<String>,
    root_type: Option<String>,
    file_identifier: Option<[u8; 4]>,
    file_extension: Option<String>,
    declared_attributes: HashSet<String>,
}

struct TokenCursor<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'s> TokenCursor<'s> {
    fn new(source: &'s str) -> Result<Self, FbError> {
        let tokens = tokenize(source)?;
        Ok(Self { source, tokens, pos: 0 })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn text(&self, tok: &Token) -> &'s str {
        tok.text(self.source)
    }

    fn err_here(&self, message: impl Into<String>) -> FbError {
        let t = self.peek();
        FbError::SchemaSyntax { message: message.into(), at: lexer::source_context(self.source, t.line, t.column) }
    }

    fn expect(&mut self, kind: TokKind, what: &str) -> Result<Token, FbError> {
        if self.peek().kind == kind {
            Ok(self.bump())
        } else {
            Err(self.err_here(format!("expected {}", what)))
        }
    }

    fn expect_ident(&mut self) -> Result<String, FbError> {
        let t = self.expect(TokKind::Ident, "an identifier")?;
        Ok(self.text(&t).to_owned())
    }

    fn at_ident(&self, word: &str) -> bool {
        self.peek().kind == TokKind::Ident && self.text(self.peek()) == word
    }
}

fn parse_int_literal(text: &str) -> Result<i64, FbError> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map_err(|e| FbError::new(e.to_string()));
    }
    if let Some(hex) = text.strip_prefix("-0x").or_else(|| text.strip_prefix("-0X")) {
        return i64::from_str_radix(hex, 16).map(|v| -v).map_err(|e| FbError::new(e.to_string()));
    }
    text.parse::<i64>().map_err(FbError::from)
}

fn unescape_string(raw: &str) -> Result<String, FbError> {
    // raw includes the surrounding quotes
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('u') => {
                let hex: String = (0..4).filter_map(|_| chars.next()).collect();
                let code = u32::from_str_radix(&hex, 16).map_err(|e| FbError::new(e.to_string()))?;
                out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
            }
            Some(other) => out.push(other),
            None => return Err(FbError::new("dangling escape in string literal")),
        }
    }
    Ok(out)
}

fn parse_metadata(c: &mut TokenCursor) -> Result<Vec<(String, Option<String>)>, FbError> {
    let mut out = Vec::new();
    if c.peek().kind != TokKind::LParen {
        return Ok(out);
    }
    c.bump();
    loop {
        if c.peek().kind == TokKind::RParen {
            c.bump();
            break;
        }
        let key = c.expect_ident()?;
        let value = if c.peek().kind == TokKind::Colon {
            c.bump();
            Some(match c.peek().kind {
                TokKind::StrLit => {
                    let t = c.bump();
                    unescape_string(c.text(&t))?
                }
                TokKind::Ident => {
                    let t = c.bump();
                    c.text(&t).to_owned()
                }
                TokKind::IntLit | TokKind::FloatLit => {
                    let t = c.bump();
                    c.text(&t).to_owned()
                }
                _ => return Err(c.err_here("expected attribute value")),
            })
        } else {
            None
        };
        out.push((key, value));
        if c.peek().kind == TokKind::Comma {
            c.bump();
            continue;
        }
    }
    Ok(out)
}

fn parse_type(c: &mut TokenCursor) -> Result<(RawType, bool), FbError> {
    if c.peek().kind == TokKind::LBracket {
        c.bump();
        let inner_name = c.expect_ident()?;
        c.expect(TokKind::RBracket, "`]` to close vector type")?;
        let raw = match ScalarType::from_keyword(&inner_name) {
            Some(st) => RawType::Scalar(st),
            None if inner_name == "string" => RawType::String,
            None => RawType::Named(inner_name),
        };
        Ok((raw, true))
    } else {
        let name = c.expect_ident()?;
        let raw = match ScalarType::from_keyword(&name) {
            Some(st) => RawType::Scalar(st),
            None if name == "string" => RawType::String,
            None => RawType::Named(name),
        };
        Ok((raw, false))
    }
}

fn parse_default_literal(c: &mut TokenCursor) -> Result<DefaultLiteral, FbError> {
    match c.peek().kind {
        TokKind::IntLit => {
            let t = c.bump();
            Ok(DefaultLiteral::Int(parse_int_literal(c.text(&t))?))
        }
        TokKind::FloatLit => {
            let t = c.bump();
            Ok(DefaultLiteral::Float(c.text(&t).parse::<f64>().map_err(FbError::from)?))
        }
        TokKind::Ident => {
            let t = c.bump();
            match c.text(&t) {
                "true" => Ok(DefaultLiteral::Bool(true)),
                "false" => Ok(DefaultLiteral::Bool(false)),
                other => Ok(DefaultLiteral::Ident(other.to_owned())),
            }
        }
        _ => Err(c.err_here("expected a default value literal")),
    }
}

fn parse_field(c: &mut TokenCursor) -> Result<RawField, FbError> {
    let name = c.expect_ident()?;
    c.expect(TokKind::Colon, "`:` after field name")?;
    let (raw_type, is_vector) = parse_type(c)?;
    let default = if c.peek().kind == TokKind::Equals {
        c.bump();
        Some(parse_default_literal(c)?)
    } else {
        None
    };
    let attributes = parse_metadata(c)?;
    c.expect(TokKind::Semicolon, "`;` after field declaration")?;
    let deprecated = attributes.iter().any(|(k, _)| k == "deprecated");
    Ok(RawField { name, raw_type, is_vector, default, deprecated, attributes })
}

fn parse_enum_or_union(c: &mut TokenCursor, is_union: bool) -> Result<RawDecl, FbError> {
    let name = c.expect_ident()?;
    let underlying = if !is_union && c.peek().kind == TokKind::Colon {
        c.bump();
        let word = c.expect_ident()?;
        ScalarType::from_keyword(&word).ok_or_else(|| c.err_here(format!("`{}` is not a valid enum underlying type", word)))?
    } else {
        ScalarType::Int32
    };
    let attrs = parse_metadata(c)?;
    let bit_flags = attrs.iter().any(|(k, _)| k == "bit_flags");
    c.expect(TokKind::LBrace, "`{` to open enum/union body")?;

    if is_union {
        let mut members = Vec::new();
        loop {
            if c.peek().kind == TokKind::RBrace {
                c.bump();
                break;
            }
            members.push(c.expect_ident()?);
            if c.peek().kind == TokKind::Comma {
                c.bump();
            }
        }
        Ok(RawDecl::Union { name, members })
    } else {
        let mut members = Vec::new();
        loop {
            if c.peek().kind == TokKind::RBrace {
                c.bump();
                break;
            }
            let member_name = c.expect_ident()?;
            let explicit = if c.peek().kind == TokKind::Equals {
                c.bump();
                let t = c.expect(TokKind::IntLit, "an integer enum value")?;
                Some(parse_int_literal(c.text(&t))?)
            } else {
                None
            };
            members.push((member_name, explicit));
            if c.peek().kind == TokKind::Comma {
                c.bump();
            }
        }
        Ok(RawDecl::Enum { name, underlying, bit_flags, members })
    }
}

fn parse_struct_or_table(c: &mut TokenCursor, is_table: bool) -> Result<RawDecl, FbError> {
    let name = c.expect_ident()?;
    parse_metadata(c)?;
    c.expect(TokKind::LBrace, "`{` to open struct/table body")?;
    let mut fields = Vec::new();
    while c.peek().kind != TokKind::RBrace {
        fields.push(parse_field(c)?);
    }
    c.bump();
    if is_table {
        Ok(RawDecl::Table { name, fields })
    } else {
        Ok(RawDecl::Struct { name, fields })
    }
}

fn parse_file(source: &str) -> Result<ParsedFile, FbError> {
    let mut c = TokenCursor::new(source)?;
    let mut file = ParsedFile::default();

    while c.peek().kind != TokKind::Eof {
        if c.at_ident("include") {
            c.bump();
            let t = c.expect(TokKind::StrLit, "an include path string")?;
            let path = unescape_string(c.text(&t))?;
            c.expect(TokKind::Semicolon, "`;` after include")?;
            file.includes.push(path);
        } else if c.at_ident("namespace") {
            c.bump();
            let ns = c.expect_ident()?;
            c.expect(TokKind::Semicolon, "`;` after namespace")?;
            file.namespace = ns;
        } else if c.at_ident("attribute") {
            c.bump();
            let t = c.expect(TokKind::StrLit, "an attribute name string")?;
            let name = unescape_string(c.text(&t))?;
            c.expect(TokKind::Semicolon, "`;` after attribute")?;
            file.declared_attributes.insert(name);
        } else if c.at_ident("root_type") {
            c.bump();
            let name = c.expect_ident()?;
            c.expect(TokKind::Semicolon, "`;` after root_type")?;
            file.root_type = Some(name);
        } else if c.at_ident("file_identifier") {
            c.bump();
            let t = c.expect(TokKind::StrLit, "a 4-byte file identifier string")?;
            let id = unescape_string(c.text(&t))?;
            c.expect(TokKind::Semicolon, "`;` after file_identifier")?;
            if id.len() != 4 || !id.is_ascii() {
                return Err(FbError::SchemaSemantic { message: format!("file_identifier must be exactly 4 ASCII bytes, got `{}`", id) });
            }
            let mut arr = [0u8; 4];
            arr.copy_from_slice(id.as_bytes());
            file.file_identifier = Some(arr);
        } else if c.at_ident("file_extension") {
            c.bump();
            let t = c.expect(TokKind::StrLit, "a file extension string")?;
            file.file_extension = Some(unescape_string(c.text(&t))?);
            c.expect(TokKind::Semicolon, "`;` after file_extension")?;
        } else if c.at_ident("enum") {
            c.bump();
            let raw = parse_enum_or_union(&mut c, false)?;
            file.decls.push((file.namespace.clone(), raw));
        } else if c.at_ident("union") {
            c.bump();
            let raw = parse_enum_or_union(&mut c, true)?;
            file.decls.push((file.namespace.clone(), raw));
        } else if c.at_ident("struct") {
            c.bump();
            let raw = parse_struct_or_table(&mut c, false)?;
            file.decls.push((file.namespace.clone(), raw));
        } else if c.at_ident("table") {
            c.bump();
            let raw = parse_struct_or_table(&mut c, true)?;
            file.decls.push((file.namespace.clone(), raw));
        } else {
            return Err(c.err_here("expected a top-level declaration (include/namespace/attribute/enum/union/struct/table/root_type/file_identifier/file_extension)"));
        }
    }

    Ok(file)
}

/// Recursively resolve `path` and its includes against `loader`, merging
/// per the rule in spec.md §4.C: same-namespace declarations merge in,
/// attribute declarations merge unconditionally. `visited` dedupes by path
/// across the whole resolution tree so cycles terminate silently.
fn resolve(
    path: &str,
    loader: &dyn Fn(&str) -> Option<String>,
    visited: &mut HashSet<String>,
) -> Result<ParsedFile, FbError> {
    if visited.contains(path) {
        // Cycle or diamond include already processed; contribute nothing
        // further rather than erroring or looping.
        return Ok(ParsedFile::default());
    }
    visited.insert(path.to_owned());

    let source = loader(path).ok_or_else(|| FbError::new(format!("cannot resolve include `{}`", path)))?;
    let mut file = parse_file(&source)?;

    let includes = std::mem::take(&mut file.includes);
    for inc_path in includes {
        let included = resolve(&inc_path, loader, visited)?;
        file.declared_attributes.extend(included.declared_attributes);
        for (ns, decl) in included.decls {
            if ns == file.namespace {
                file.decls.push((ns, decl));
            }
        }
    }

    Ok(file)
}

fn raw_type_to_value_type(raw: &RawType, index: &HashMap<(Namespace, String), DeclId>, namespace: &str) -> Result<ValueType, FbError> {
    match raw {
        RawType::Scalar(st) => Ok(ValueType::Scalar(*st)),
        RawType::String => Ok(ValueType::String),
        RawType::Named(name) => {
            // bare names resolve in the current namespace first, then the
            // root (unnamed) namespace, matching flatc's lookup order.
            if let Some(id) = index.get(&(namespace.to_owned(), name.clone())) {
                return Ok(ValueType::Named(*id));
            }
            if let Some(id) = index.get(&(String::new(), name.clone())) {
                return Ok(ValueType::Named(*id));
            }
            Err(FbError::SchemaSemantic { message: format!("undefined type `{}`", name) })
        }
    }
}

fn build_field(raw: RawField, index: &HashMap<(Namespace, String), DeclId>, namespace: &str, decl_index: usize) -> Result<FieldDecl, FbError> {
    let value_type = raw_type_to_value_type(&raw.raw_type, index, namespace)?;
    Ok(FieldDecl {
        name: raw.name,
        index: decl_index,
        value_type,
        is_vector: raw.is_vector,
        default: raw.default,
        deprecated: raw.deprecated,
        attributes: raw.attributes,
    })
}

fn normalize_enum_members(raw: Vec<(String, Option<i64>)>, bit_flags: bool) -> Result<Vec<EnumMember>, FbError> {
    let mut members = Vec::new();
    let mut next_ordinal: i64 = 0;
    let mut last_ordinal: Option<i64> = None;
    for (name, explicit) in raw {
        let ordinal = explicit.unwrap_or(next_ordinal);
        if let Some(last) = last_ordinal {
            if ordinal < last {
                return Err(FbError::SchemaSemantic { message: format!("enum member `{}` value must be non-decreasing", name) });
            }
        }
        last_ordinal = Some(ordinal);
        next_ordinal = ordinal + 1;
        let value = if bit_flags { 1i64 << ordinal } else { ordinal };
        members.push(EnumMember { name, value });
    }

    if bit_flags {
        if !members.iter().any(|m| m.name == "NONE") {
            members.push(EnumMember { name: "NONE".to_owned(), value: 0 });
        }
        if !members.iter().any(|m| m.name == "ALL") {
            let all = members.iter().filter(|m| m.name != "NONE" && m.name != "ALL").fold(0i64, |acc, m| acc | m.value);
            members.push(EnumMember { name: "ALL".to_owned(), value: all });
        }
    }

    Ok(members)
}

/// Parse a schema and every include it transitively pulls in, producing a
/// single normalized `Schema`. `loader` maps an include path (as written in
/// the IDL) to source text; the core never touches the filesystem itself.
pub fn parse_schema(entry_path: &str, loader: &dyn Fn(&str) -> Option<String>) -> Result<Schema, FbError> {
    let mut visited = HashSet::new();
    let file = resolve(entry_path, loader, &mut visited)?;

    // Pass 1: assign DeclId to every declared name in source order.
    let mut index: HashMap<(Namespace, String), DeclId> = HashMap::new();
    for (i, (ns, raw)) in file.decls.iter().enumerate() {
        index.insert((ns.clone(), raw.name().to_owned()), DeclId(i));
    }

    // Pass 2: build real declarations, resolving named references.
    let mut schema = Schema {
        namespace: file.namespace.clone(),
        root_type: file.root_type.clone(),
        file_identifier: file.file_identifier,
        file_extension: file.file_extension.clone(),
        declared_attributes: file.declared_attributes,
        ..Schema::default()
    };

    for (ns, raw) in file.decls {
        let decl = match raw {
            RawDecl::Enum { name, underlying, bit_flags, members } => {
                let members = normalize_enum_members(members, bit_flags)?;
                Decl::Enum(EnumDecl { namespace: ns, name, underlying, bit_flags, members })
            }
            RawDecl::Union { name, members } => {
                let mut resolved = Vec::with_capacity(members.len());
                for member_name in members {
                    let id = index
                        .get(&(ns.clone(), member_name.clone()))
                        .or_else(|| index.get(&(String::new(), member_name.clone())))
                        .copied()
                        .ok_or_else(|| FbError::SchemaSemantic { message: format!("undefined union member `{}`", member_name) })?;
                    resolved.push((member_name, id));
                }
                Decl::Union(UnionDecl { namespace: ns, name, members: resolved })
            }
            RawDecl::Struct { name, fields } => {
                let mut built = Vec::with_capacity(fields.len());
                for (i, f) in fields.into_iter().enumerate() {
                    let field = build_field(f, &index, &ns, i)?;
                    if field.is_vector || matches!(field.value_type, ValueType::String) {
                        return Err(FbError::SchemaSemantic { message: format!("struct field `{}` cannot be a vector or string", field.name) });
                    }
                    built.push(field);
                }
                Decl::Struct(StructDecl { namespace: ns, name, fields: built })
            }
            RawDecl::Table { name, fields } => {
                let mut built = Vec::with_capacity(fields.len());
                for (i, f) in fields.into_iter().enumerate() {
                    built.push(build_field(f, &index, &ns, i)?);
                }
                Decl::Table(TableDecl { namespace: ns, name, fields: built, is_root: false, file_identifier: None })
            }
        };
        schema.push(decl);
    }

    // Validate union members resolve to Table declarations (invariant 6).
    for decl in &schema.declarations {
        if let Decl::Union(u) = decl {
            for (name, id) in &u.members {
                if !matches!(schema.get(*id), Decl::Table(_)) {
                    return Err(FbError::SchemaSemantic { message: format!("union member `{}` must be a table", name) });
                }
            }
        }
    }

    // Validate struct fields cannot reference tables/unions (invariant 5),
    // including transitively through named references.
    for decl in &schema.declarations {
        if let Decl::Struct(s) = decl {
            for f in &s.fields {
                if let ValueType::Named(id) = f.value_type {
                    match schema.get(id) {
                        Decl::Struct(_) | Decl::Enum(_) => {}
                        _ => {
                            return Err(FbError::SchemaSemantic {
                                message: format!("struct field `{}` must be a scalar, enum, or nested struct", f.name),
                            })
                        }
                    }
                }
            }
        }
    }

    // Wire up root_type -> is_root + file_identifier on the matching table.
    if let Some(root_name) = schema.root_type.clone() {
        let root_id = schema
            .lookup(&schema.namespace, &root_name)
            .ok_or_else(|| FbError::SchemaSemantic { message: format!("root_type `{}` does not resolve", root_name) })?;
        let file_id = schema.file_identifier;
        match schema.get_mut(root_id) {
            Decl::Table(t) => {
                t.is_root = true;
                t.file_identifier = file_id;
            }
            _ => return Err(FbError::SchemaSemantic { message: format!("root_type `{}` is not a table", root_name) }),
        }
    }

    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn loader_for(files: Map<&'static str, &'static str>) -> impl Fn(&str) -> Option<String> {
        move |p: &str| files.get(p).map(|s| s.to_string())
    }

    #[test]
    fn parses_scalars_table() {
        let src = r#"
            table T { i8:byte; u32:uint; f:float; b:bool; }
            root_type T;
            file_identifier "SCLR";
        "#;
        let loader = loader_for(Map::new());
        let schema = parse_schema("main", &|p| if p == "main" { Some(src.to_owned()) } else { loader(p) }).unwrap();
        let root = schema.root().expect("root resolves");
        match schema.get(root) {
            Decl::Table(t) => {
                assert_eq!(t.fields.len(), 4);
                assert!(t.is_root);
                assert_eq!(t.file_identifier, Some(*b"SCLR"));
            }
            _ => panic!("expected table"),
        }
    }

    #[test]
    fn bit_flags_enum_synthesizes_none_and_all() {
        let src = "enum F:ubyte (bit_flags) { Foo, Bar, Buz }";
        let schema = parse_schema("main", &|_| Some(src.to_owned())).unwrap();
        match &schema.declarations[0] {
            Decl::Enum(e) => {
                assert_eq!(e.member_value("Foo"), Some(1));
                assert_eq!(e.member_value("Bar"), Some(2));
                assert_eq!(e.member_value("Buz"), Some(4));
                assert_eq!(e.member_value("NONE"), Some(0));
                assert_eq!(e.member_value("ALL"), Some(7));
            }
            _ => panic!("expected enum"),
        }
    }

    #[test]
    fn forward_reference_resolves() {
        let src = "table A { b: B; } table B { x: int; }";
        let schema = parse_schema("main", &|_| Some(src.to_owned())).unwrap();
        let a = schema.lookup("", "A").unwrap();
        match schema.get(a) {
            Decl::Table(t) => assert!(matches!(t.fields[0].value_type, ValueType::Named(_))),
            _ => panic!(),
        }
    }

    #[test]
    fn struct_forbids_vector_fields() {
        let src = "struct S { a: ubyte; v: [int]; }";
        let err = parse_schema("main", &|_| Some(src.to_owned())).unwrap_err();
        assert_eq!(err.kind(), "SchemaSemantic");
    }

    #[test]
    fn union_members_must_be_tables() {
        let src = "struct S { a: ubyte; } union U { S }";
        let err = parse_schema("main", &|_| Some(src.to_owned())).unwrap_err();
        assert_eq!(err.kind(), "SchemaSemantic");
    }

    #[test]
    fn bad_file_identifier_length_fails() {
        let src = r#"table T { x: int; } root_type T; file_identifier "AB";"#;
        let err = parse_schema("main", &|_| Some(src.to_owned())).unwrap_err();
        assert_eq!(err.kind(), "SchemaSemantic");
    }

    #[test]
    fn include_merges_same_namespace_decls() {
        let mut files = Map::new();
        files.insert("base.fbs", "namespace ns; table Base { x: int; }");
        let main_src = r#"include "base.fbs"; namespace ns; table Main { b: Base; }"#;
        let loader = loader_for(files);
        let schema = parse_schema("main", &|p| if p == "main" { Some(main_src.to_owned()) } else { loader(p) }).unwrap();
        assert!(schema.lookup("ns", "Base").is_some());
        assert!(schema.lookup("ns", "Main").is_some());
    }

    #[test]
    fn include_cycle_terminates() {
        let mut files = Map::new();
        files.insert("a.fbs", r#"include "b.fbs"; table A { x: int; }"#);
        files.insert("b.fbs", r#"include "a.fbs"; table B { x: int; }"#);
        let loader = loader_for(files);
        let schema = parse_schema("a.fbs", &loader).unwrap();
        assert!(schema.lookup("", "A").is_some());
    }
}
