//! Native converter: recursively turns decoded views into plain,
//! insertion-ordered values, and serves as the value graph the encoder
//! accepts going the other way.
//!
//! `FbOrderedMap` is the teacher's `json_flex.rs` `JFMap` pattern — a
//! linear-scan `Vec<(String, T)>` instead of a `HashMap`, kept because field
//! counts per table are small and insertion order needs to survive (the
//! native converter's whole point is a JSON/YAML-friendly, order-preserving
//! map, which a `HashMap` can't give for free).
//!
//! The decode-side half of Component H (`table_to_native`/`struct_to_native`/
//! `vector_to_native`) walks a [`crate::decoder::TableView`] the same way
//! `only-cliches-NoProto`'s own `json_flex.rs` walks its `NP_JSON` tree when
//! stringifying a buffer: recursively, with enum values resolved to their
//! member names rather than left as bare integers (spec.md §4.H).

use std::convert::TryFrom;
use std::iter::FromIterator;
use std::rc::Rc;

use crate::decoder::{StructView, TableView, VectorElement, VectorView};
use crate::error::FbError;
use crate::schema::registry::Registry;
use crate::schema::{Decl, DeclId};
use crate::skeleton::{FieldSkeleton, ValueKind};
use crate::wire::ScalarValue;

/// An insertion-ordered string-keyed map. Lookup is linear, which is fine at
/// the field counts schemas actually have; re-inserting an existing key
/// overwrites in place rather than duplicating the entry.
#[derive(Debug, Clone, Default)]
pub struct FbOrderedMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> FbOrderedMap<T> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: T) {
        let key = key.into();
        for entry in &mut self.entries {
            if entry.0 == key {
                entry.1 = value;
                return;
            }
        }
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, T)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: PartialEq> PartialEq for FbOrderedMap<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<T> FromIterator<(String, T)> for FbOrderedMap<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// A plain value: the encoder's input graph, and the shape the native
/// converter produces from a decoded view. One type serves both directions
/// so the round-trip property in spec.md §8 (`decode(encode(v)) == v`) is
/// literally `NativeValue == NativeValue`.
///
/// `Shared` is never produced by the decoder; it's a hint the *caller*
/// writes into an encoder input graph to mark two field slots as
/// referencing the identical sub-value (spec.md §8 testable property 7).
/// The encoder deduplicates on `Rc` pointer identity, not structural
/// equality — two structurally-equal but independently-built maps still
/// encode as two copies.
#[derive(Debug, Clone)]
pub enum NativeValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Vector(Vec<NativeValue>),
    Map(FbOrderedMap<NativeValue>),
    Shared(Rc<NativeValue>),
}

impl NativeValue {
    /// Follow through any `Shared` wrapper to the value underneath.
    pub fn unwrap_shared(&self) -> &NativeValue {
        match self {
            NativeValue::Shared(inner) => inner.unwrap_shared(),
            other => other,
        }
    }

    pub fn as_map(&self) -> Option<&FbOrderedMap<NativeValue>> {
        match self.unwrap_shared() {
            NativeValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[NativeValue]> {
        match self.unwrap_shared() {
            NativeValue::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.unwrap_shared() {
            NativeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.unwrap_shared() {
            NativeValue::Int(v) => Some(*v),
            NativeValue::UInt(v) => i64::try_from(*v).ok(),
            NativeValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.unwrap_shared() {
            NativeValue::Float(v) => Some(*v),
            NativeValue::Int(v) => Some(*v as f64),
            NativeValue::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.unwrap_shared(), NativeValue::Null)
    }
}

impl PartialEq for NativeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self.unwrap_shared(), other.unwrap_shared()) {
            (NativeValue::Null, NativeValue::Null) => true,
            (NativeValue::Bool(a), NativeValue::Bool(b)) => a == b,
            (NativeValue::Int(a), NativeValue::Int(b)) => a == b,
            (NativeValue::UInt(a), NativeValue::UInt(b)) => a == b,
            (NativeValue::Int(a), NativeValue::UInt(b)) | (NativeValue::UInt(b), NativeValue::Int(a)) => {
                i64::try_from(*b).map(|b| b == *a).unwrap_or(false)
            }
            // float comparison is approximate per spec.md testable property 1
            (NativeValue::Float(a), NativeValue::Float(b)) => (a - b).abs() < 1e-6 || a == b,
            (NativeValue::Str(a), NativeValue::Str(b)) => a == b,
            (NativeValue::Vector(a), NativeValue::Vector(b)) => a == b,
            (NativeValue::Map(a), NativeValue::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for NativeValue {
    fn from(s: &str) -> Self {
        NativeValue::Str(s.to_owned())
    }
}

impl From<i64> for NativeValue {
    fn from(v: i64) -> Self {
        NativeValue::Int(v)
    }
}

impl From<bool> for NativeValue {
    fn from(v: bool) -> Self {
        NativeValue::Bool(v)
    }
}

impl From<f64> for NativeValue {
    fn from(v: f64) -> Self {
        NativeValue::Float(v)
    }
}

fn scalar_to_native(sv: ScalarValue) -> NativeValue {
    match sv {
        ScalarValue::Bool(b) => NativeValue::Bool(b),
        ScalarValue::Float32(f) => NativeValue::Float(f as f64),
        ScalarValue::Float64(f) => NativeValue::Float(f),
        ScalarValue::Uint64(u) => NativeValue::UInt(u),
        other => NativeValue::Int(other.as_i64().unwrap_or(0)),
    }
}

/// An enum-typed scalar converts to its member name when one is declared for
/// the stored value, and falls back to the bare integer otherwise (e.g. a
/// `bit_flags` combination that isn't exactly `NONE`/`ALL`/one flag).
fn enum_scalar_to_native(registry: &Registry, decl: DeclId, sv: ScalarValue) -> NativeValue {
    let value = sv.as_i64().unwrap_or(0);
    if let Decl::Enum(e) = registry.decl(decl) {
        if let Some(name) = e.member_name(value) {
            return NativeValue::Str(name.to_owned());
        }
    }
    NativeValue::Int(value)
}

fn field_to_native(view: &TableView, f: &FieldSkeleton) -> Result<NativeValue, FbError> {
    if f.is_vector {
        return match view.get_vector(&f.name)? {
            Some(vv) => vector_to_native(&vv),
            None => Ok(NativeValue::Null),
        };
    }
    match &f.kind {
        ValueKind::Scalar(_) => Ok(scalar_to_native(view.get_scalar(&f.name)?)),
        ValueKind::Enum { decl, .. } => Ok(enum_scalar_to_native(view.registry, *decl, view.get_scalar(&f.name)?)),
        ValueKind::String => Ok(view.get_string(&f.name)?.map(|s| NativeValue::Str(s.to_owned())).unwrap_or(NativeValue::Null)),
        ValueKind::Struct { .. } => match view.get_struct(&f.name)? {
            Some(sv) => struct_to_native(&sv),
            None => Ok(NativeValue::Null),
        },
        ValueKind::Table(_) => match view.get_table(&f.name)? {
            Some(tv) => table_to_native(&tv),
            None => Ok(NativeValue::Null),
        },
        ValueKind::Union(_) | ValueKind::UnionTag(_) => unreachable!("consumed by the union-tag branch in table_to_native"),
    }
}

/// Recursively convert a decoded table into an insertion-ordered
/// [`NativeValue::Map`]. A union field expands into two map entries, just
/// like its declared form: `{name}_type` holding the member name (or the
/// literal `"NONE"` when absent) and `{name}` holding the payload (or
/// [`NativeValue::Null`]) — matching spec.md §8 scenario S5.
pub fn table_to_native(view: &TableView) -> Result<NativeValue, FbError> {
    let skeleton = view.skeleton();
    let fields = &skeleton.fields;
    let mut map = FbOrderedMap::new();

    let mut i = 0;
    while i < fields.len() {
        let f = &fields[i];
        if let ValueKind::UnionTag(_) = &f.kind {
            let payload = &fields[i + 1];
            match view.get_union(&payload.name)? {
                Some((member_name, inner)) => {
                    map.insert(f.name.clone(), NativeValue::Str(member_name));
                    map.insert(payload.name.clone(), table_to_native(&inner)?);
                }
                None => {
                    map.insert(f.name.clone(), NativeValue::Str("NONE".to_owned()));
                    map.insert(payload.name.clone(), NativeValue::Null);
                }
            }
            i += 2;
            continue;
        }
        let value = field_to_native(view, f)?;
        map.insert(f.name.clone(), value);
        i += 1;
    }
    Ok(NativeValue::Map(map))
}

/// Recursively convert a decoded struct into a [`NativeValue::Map`]. Struct
/// fields are restricted to scalar, enum, and nested struct (invariant 5 in
/// spec.md §3), so no vector/union branch is needed here.
pub fn struct_to_native(view: &StructView) -> Result<NativeValue, FbError> {
    let mut map = FbOrderedMap::new();
    for sf in &view.skeleton.fields {
        let value = match &sf.field.kind {
            ValueKind::Scalar(_) => scalar_to_native(view.get_scalar(&sf.field.name)?),
            ValueKind::Enum { decl, .. } => enum_scalar_to_native(view.registry, *decl, view.get_scalar(&sf.field.name)?),
            ValueKind::Struct { .. } => struct_to_native(&view.get_struct(&sf.field.name)?)?,
            _ => unreachable!("struct fields are restricted to scalar, enum, or nested struct"),
        };
        map.insert(sf.field.name.clone(), value);
    }
    Ok(NativeValue::Map(map))
}

/// Recursively convert a decoded vector into a [`NativeValue::Vector`].
pub fn vector_to_native(vv: &VectorView) -> Result<NativeValue, FbError> {
    let mut items = Vec::with_capacity(vv.len());
    for i in 0..vv.len() {
        let item = match vv.get(i)? {
            VectorElement::Scalar(sv) => match &vv.kind {
                ValueKind::Enum { decl, .. } => enum_scalar_to_native(vv.registry, *decl, sv),
                _ => scalar_to_native(sv),
            },
            VectorElement::Str(s) => NativeValue::Str(s.to_owned()),
            VectorElement::Struct(sv) => struct_to_native(&sv)?,
            VectorElement::Table(tv) => table_to_native(&tv)?,
        };
        items.push(item);
    }
    Ok(NativeValue::Vector(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_map_preserves_insertion_order_and_overwrites() {
        let mut m = FbOrderedMap::new();
        m.insert("b", NativeValue::Int(1));
        m.insert("a", NativeValue::Int(2));
        m.insert("b", NativeValue::Int(3));
        let keys: Vec<&str> = m.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(m.get("b"), Some(&NativeValue::Int(3)));
    }

    #[test]
    fn shared_compares_equal_to_plain_equivalent() {
        let shared = NativeValue::Shared(Rc::new(NativeValue::Int(5)));
        assert_eq!(shared, NativeValue::Int(5));
    }

    #[test]
    fn float_equality_is_approximate() {
        assert_eq!(NativeValue::Float(1.0 / 3.0), NativeValue::Float(0.333_333_33));
    }

    fn map(pairs: Vec<(&str, NativeValue)>) -> NativeValue {
        let mut m = FbOrderedMap::new();
        for (k, v) in pairs {
            m.insert(k, v);
        }
        NativeValue::Map(m)
    }

    // Testable property 1: decode(encode(v)) == v once both sides are
    // compared as NativeValue, not just field-by-field accessor calls.
    #[test]
    fn round_trip_through_native_conversion() {
        let reg = Registry::from_source(
            r#"table T { i8:byte; u32:uint; f:float; b:bool; name:string; } root_type T;"#,
        )
        .unwrap();
        let id = reg.resolve("", "T").unwrap();
        let input = map(vec![
            ("i8", NativeValue::Int(-8)),
            ("u32", NativeValue::Int(323232)),
            ("f", NativeValue::Float(1.5)),
            ("b", NativeValue::Bool(true)),
            ("name", NativeValue::from("hi")),
        ]);
        let bytes = crate::encoder::encode(&reg, id, &input).unwrap();
        let view = crate::decoder::decode_root(&reg, &bytes, Some("T")).unwrap();
        let decoded = table_to_native(&view).unwrap();
        assert_eq!(decoded, input);
    }

    // Scenario S5: a union field decodes to two native map entries, the
    // tag as the member name and the payload as its own native map; an
    // absent union decodes to {v_type: "NONE", v: Null}.
    #[test]
    fn union_field_converts_to_tag_and_payload_entries() {
        let reg = Registry::from_source("table X{n:int;} table Y{s:int;} union XY{X,Y} table R{v:XY;} root_type R;").unwrap();
        let id = reg.resolve("", "R").unwrap();

        let present = map(vec![("v_type", NativeValue::from("Y")), ("v", map(vec![("s", NativeValue::Int(7))]))]);
        let bytes = crate::encoder::encode(&reg, id, &present).unwrap();
        let view = crate::decoder::decode_root(&reg, &bytes, Some("R")).unwrap();
        assert_eq!(table_to_native(&view).unwrap(), present);

        let absent = map(vec![]);
        let bytes = crate::encoder::encode(&reg, id, &absent).unwrap();
        let view = crate::decoder::decode_root(&reg, &bytes, Some("R")).unwrap();
        let decoded = table_to_native(&view).unwrap();
        assert_eq!(decoded, map(vec![("v_type", NativeValue::from("NONE")), ("v", NativeValue::Null)]));
    }

    // Enum fields convert to their member name, not the bare integer.
    #[test]
    fn enum_field_converts_to_member_name() {
        let reg = Registry::from_source("enum E:byte { Bar = 1, Buz = 2 } table T { e: E = Bar; } root_type T;").unwrap();
        let id = reg.resolve("", "T").unwrap();
        let bytes = crate::encoder::encode(&reg, id, &map(vec![("e", NativeValue::from("Buz"))])).unwrap();
        let view = crate::decoder::decode_root(&reg, &bytes, Some("T")).unwrap();
        let decoded = table_to_native(&view).unwrap();
        assert_eq!(decoded, map(vec![("e", NativeValue::from("Buz"))]));
    }

    // Vectors of tables convert recursively, preserving order.
    #[test]
    fn vector_of_tables_converts_recursively() {
        let reg = Registry::from_source("table Item { n: int; } table T { items: [Item]; } root_type T;").unwrap();
        let id = reg.resolve("", "T").unwrap();
        let items = NativeValue::Vector(vec![map(vec![("n", NativeValue::Int(1))]), map(vec![("n", NativeValue::Int(2))])]);
        let bytes = crate::encoder::encode(&reg, id, &map(vec![("items", items.clone())])).unwrap();
        let view = crate::decoder::decode_root(&reg, &bytes, Some("T")).unwrap();
        let decoded = table_to_native(&view).unwrap();
        assert_eq!(decoded, map(vec![("items", items)]));
    }
}
