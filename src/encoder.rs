//! Encoder: native value graph → a flat buffer.
//!
//! Builds a small arena of `Block`s (one per string, vector, struct-in-a-
//! vector-or-table, and table vtable/body) by walking the value graph
//! depth-first, children before parents — the same discipline the
//! teacher's prototype `buffer.rs` write path uses when growing its own
//! length-prefixed region list. Once every block exists, a single reverse
//! pass over the arena assigns each one a final byte offset — this is
//! the part with no teacher equivalent (the teacher has no vtable or
//! forward-offset indirection to resolve), grounded instead in the
//! offset/patch bookkeeping described by `original_source`'s
//! `serializers/fatboobs/builder.py`.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::FbError;
use crate::native::NativeValue;
use crate::schema::registry::Registry;
use crate::schema::{Decl, DeclId};
use crate::skeleton::{Skeleton, StructSkeleton, TableSkeleton, ValueKind};
use crate::wire::{self, align_up, ScalarType, ScalarValue};

const MAX_DEPTH: usize = 128;

/// A cross-block reference to resolve once every block has a final offset.
enum Patch {
    /// `uoffset` at `local_offset`: written value is `target_final - field_final`.
    Forward(usize, usize),
    /// `soffset` at `local_offset` (a table body's back-pointer to its
    /// vtable): written value is `field_final - target_final`.
    Backward(usize, usize),
}

struct Block {
    align: usize,
    bytes: Vec<u8>,
    patches: Vec<Patch>,
}

struct Encoder<'r> {
    registry: &'r Registry,
    blocks: Vec<Block>,
    shared_cache: HashMap<usize, usize>,
    depth: usize,
}

fn bad_value(field: &str, message: &str) -> FbError {
    FbError::BadValue { field: field.to_owned(), message: message.to_owned() }
}

fn is_absent(value: Option<&NativeValue>) -> bool {
    value.map(|v| v.unwrap_shared().is_null()).unwrap_or(true)
}

/// Coerce a native value into the wire representation of `ty`, shared by
/// struct, table, and vector field encoding.
fn coerce_scalar(ty: ScalarType, value: &NativeValue) -> Result<ScalarValue, FbError> {
    let v = value.unwrap_shared();
    match (ty, v) {
        (ScalarType::Bool, NativeValue::Bool(b)) => Ok(ScalarValue::Bool(*b)),
        (ScalarType::Bool, NativeValue::Int(i)) => Ok(ScalarValue::Bool(*i != 0)),
        (ScalarType::Float32, _) | (ScalarType::Float64, _) => {
            let f = v.as_f64().ok_or_else(|| FbError::new("expected a numeric value"))?;
            ScalarValue::from_f64(ty, f)
        }
        (_, NativeValue::Int(i)) => ScalarValue::from_i64(ty, *i),
        (_, NativeValue::UInt(u)) => ScalarValue::from_u64(ty, *u),
        (_, NativeValue::Bool(b)) => ScalarValue::from_i64(ty, *b as i64),
        _ => Err(FbError::new("expected a scalar-compatible value")),
    }
}

/// Coerce a native value into a scalar or enum field's wire representation.
/// A `Str` value against an enum-typed field resolves by member name, the
/// mirror image of `native::table_to_native`'s enum-to-name conversion —
/// together they make `decode(encode(v)) == v` hold when `v` names its enum
/// fields the same way the decoder reports them.
fn coerce_scalar_or_enum(registry: &Registry, kind: &ValueKind, value: &NativeValue) -> Result<ScalarValue, FbError> {
    match kind {
        ValueKind::Enum { decl, underlying } => {
            if let NativeValue::Str(name) = value.unwrap_shared() {
                let member = match registry.decl(*decl) {
                    Decl::Enum(e) => e.member_value(name).ok_or_else(|| FbError::new(format!("unknown enum member `{}`", name)))?,
                    _ => return Err(FbError::new("internal error: expected enum declaration")),
                };
                ScalarValue::from_i64(*underlying, member)
            } else {
                coerce_scalar(*underlying, value)
            }
        }
        ValueKind::Scalar(st) => coerce_scalar(*st, value),
        _ => Err(FbError::new("internal error: coerce_scalar_or_enum called on a non-scalar kind")),
    }
}

/// Encode a struct value directly into an inline byte buffer. Structs never
/// hold strings, tables, unions, or vectors (enforced at schema-build time),
/// so this never needs the block arena or a patch — nested structs are
/// copied in place.
fn encode_struct(registry: &Registry, skel: &StructSkeleton, value: &NativeValue) -> Result<Vec<u8>, FbError> {
    let map = value.unwrap_shared().as_map().ok_or_else(|| FbError::new("expected a struct value (map)"))?;
    let mut bytes = vec![0u8; skel.inline_size];
    for f in &skel.fields {
        let provided = map.get(&f.field.name);
        match &f.field.kind {
            ValueKind::Scalar(_) | ValueKind::Enum { .. } => {
                let sv = match provided {
                    Some(v) if !v.unwrap_shared().is_null() => coerce_scalar_or_enum(registry, &f.field.kind, v)?,
                    _ => f.field.default.expect("struct scalar/enum field always has a default"),
                };
                wire::write_scalar(&mut bytes, f.offset, sv);
            }
            ValueKind::Struct { decl, .. } => {
                let v = provided.filter(|v| !v.unwrap_shared().is_null()).ok_or_else(|| bad_value(&f.field.name, "nested struct field is required"))?;
                let nested_skel = match registry.skeleton(*decl)? {
                    Skeleton::Struct(s) => s,
                    _ => return Err(FbError::new("internal error: expected struct skeleton")),
                };
                let nested = encode_struct(registry, &nested_skel, v)?;
                bytes[f.offset..f.offset + nested.len()].copy_from_slice(&nested);
            }
            _ => unreachable!("struct fields are restricted to scalar, enum, or nested struct"),
        }
    }
    Ok(bytes)
}

enum FieldContent {
    Scalar(ScalarValue),
    Offset(usize),
    StructBytes(Vec<u8>),
}

struct PreparedField {
    slot: usize,
    align: usize,
    size: usize,
    content: FieldContent,
}

impl<'r> Encoder<'r> {
    fn push_block(&mut self, align: usize, bytes: Vec<u8>, patches: Vec<Patch>) -> usize {
        self.blocks.push(Block { align, bytes, patches });
        self.blocks.len() - 1
    }

    fn flatten_string(&mut self, s: &str) -> usize {
        let mut bytes = Vec::with_capacity(wire::UOFFSET_SIZE + s.len() + 1);
        bytes.extend_from_slice(&(s.len() as u32).to_le_bytes());
        bytes.extend_from_slice(s.as_bytes());
        bytes.push(0); // NUL terminator, matching flatc's string convention
        self.push_block(4, bytes, Vec::new())
    }

    fn flatten_vector(&mut self, kind: &ValueKind, items: &[NativeValue]) -> Result<usize, FbError> {
        let elem_align = kind.inline_align();
        let elements_start = align_up(wire::UOFFSET_SIZE, elem_align);
        let mut bytes = vec![0u8; elements_start];
        bytes[0..4].copy_from_slice(&(items.len() as u32).to_le_bytes());
        let mut patches = Vec::new();

        for item in items {
            let pos = bytes.len();
            match kind {
                ValueKind::Scalar(_) | ValueKind::Enum { .. } => {
                    let sv = coerce_scalar_or_enum(self.registry, kind, item)?;
                    bytes.resize(pos + kind.inline_size(), 0);
                    wire::write_scalar(&mut bytes, pos, sv);
                }
                ValueKind::String => {
                    let s = item.unwrap_shared().as_str().ok_or_else(|| FbError::new("vector element: expected a string"))?;
                    let child = self.flatten_string(s);
                    bytes.resize(pos + wire::UOFFSET_SIZE, 0);
                    patches.push(Patch::Forward(pos, child));
                }
                ValueKind::Table(decl) => {
                    let child = self.flatten_table(*decl, item)?;
                    bytes.resize(pos + wire::UOFFSET_SIZE, 0);
                    patches.push(Patch::Forward(pos, child));
                }
                ValueKind::Struct { decl, inline_size, .. } => {
                    let nested_skel = match self.registry.skeleton(*decl)? {
                        Skeleton::Struct(s) => s,
                        _ => return Err(FbError::new("internal error: expected struct skeleton")),
                    };
                    let sbytes = encode_struct(self.registry, &nested_skel, item)?;
                    bytes.resize(pos + inline_size, 0);
                    bytes[pos..pos + inline_size].copy_from_slice(&sbytes);
                }
                ValueKind::Union(_) | ValueKind::UnionTag(_) => return Err(FbError::new("vector-of-union is not supported")),
            }
        }

        let align = elem_align.max(4);
        Ok(self.push_block(align, bytes, patches))
    }

    fn shared_key(value: &NativeValue) -> Option<usize> {
        match value {
            NativeValue::Shared(rc) => Some(Rc::as_ptr(rc) as usize),
            _ => None,
        }
    }

    /// Flatten a table value into its vtable+body blocks and return the
    /// body block's id — that's the id callers patch a `uoffset` to, since
    /// a decoded "table" address always means the body (the soffset back
    /// to the vtable lives at the body's own offset 0).
    fn flatten_table(&mut self, decl: DeclId, value: &NativeValue) -> Result<usize, FbError> {
        if let Some(key) = Self::shared_key(value) {
            if let Some(&id) = self.shared_cache.get(&key) {
                return Ok(id);
            }
        }

        self.depth += 1;
        if self.depth > MAX_DEPTH {
            self.depth -= 1;
            return Err(FbError::RecursionLimit);
        }
        let skel = match self.registry.skeleton(decl)? {
            Skeleton::Table(t) => t,
            _ => return Err(FbError::new("internal error: expected table skeleton")),
        };
        let result = self.flatten_table_with_skeleton(&skel, value);
        self.depth -= 1;
        let id = result?;

        if let Some(key) = Self::shared_key(value) {
            self.shared_cache.insert(key, id);
        }
        Ok(id)
    }

    fn flatten_table_with_skeleton(&mut self, skel: &TableSkeleton, value: &NativeValue) -> Result<usize, FbError> {
        let map = value.unwrap_shared().as_map().ok_or_else(|| FbError::new("expected a table value (map)"))?;
        let mut prepared: Vec<PreparedField> = Vec::new();

        let mut i = 0;
        while i < skel.fields.len() {
            let f = &skel.fields[i];

            if let ValueKind::UnionTag(union_decl) = &f.kind {
                let payload_field = &skel.fields[i + 1];
                let tag_provided = map.get(&f.name);
                let payload_provided = map.get(&payload_field.name);
                match (is_absent(tag_provided), is_absent(payload_provided)) {
                    (true, true) => {}
                    (false, false) => {
                        let member_name = tag_provided
                            .unwrap()
                            .unwrap_shared()
                            .as_str()
                            .ok_or_else(|| FbError::BadDiscriminant { message: format!("union field `{}` tag must be a member-name string", f.name) })?;
                        let union_decl_obj = match self.registry.decl(*union_decl) {
                            Decl::Union(u) => u.clone(),
                            _ => return Err(FbError::new("internal error: expected union declaration")),
                        };
                        let member_idx = union_decl_obj
                            .members
                            .iter()
                            .position(|(n, _)| n == member_name)
                            .ok_or_else(|| FbError::BadDiscriminant { message: format!("unknown union member `{}`", member_name) })?;
                        let member_decl = union_decl_obj.members[member_idx].1;
                        let tag = (member_idx + 1) as u8;
                        let child = self.flatten_table(member_decl, payload_provided.unwrap())?;
                        prepared.push(PreparedField { slot: i, align: 1, size: 1, content: FieldContent::Scalar(ScalarValue::Uint8(tag)) });
                        prepared.push(PreparedField { slot: i + 1, align: 4, size: 4, content: FieldContent::Offset(child) });
                    }
                    _ => {
                        return Err(FbError::BadDiscriminant {
                            message: format!("union field `{}` needs both its tag and payload, or neither", f.name),
                        })
                    }
                }
                i += 2;
                continue;
            }

            let provided = map.get(&f.name);
            if f.is_vector {
                if !is_absent(provided) {
                    let items = provided.unwrap().unwrap_shared().as_vector().ok_or_else(|| bad_value(&f.name, "expected a vector"))?;
                    let block_id = self.flatten_vector(&f.kind, items)?;
                    prepared.push(PreparedField { slot: i, align: 4, size: 4, content: FieldContent::Offset(block_id) });
                }
            } else {
                match &f.kind {
                    ValueKind::Scalar(_) | ValueKind::Enum { .. } => {
                        if !is_absent(provided) {
                            let sv = coerce_scalar_or_enum(self.registry, &f.kind, provided.unwrap())?;
                            let default = f.default.expect("scalar/enum table field always has a default");
                            if sv != default {
                                prepared.push(PreparedField { slot: i, align: f.kind.inline_align(), size: f.kind.inline_size(), content: FieldContent::Scalar(sv) });
                            }
                        }
                    }
                    ValueKind::String => {
                        if !is_absent(provided) {
                            let s = provided.unwrap().unwrap_shared().as_str().ok_or_else(|| bad_value(&f.name, "expected a string"))?;
                            let block_id = self.flatten_string(s);
                            prepared.push(PreparedField { slot: i, align: 4, size: 4, content: FieldContent::Offset(block_id) });
                        }
                    }
                    ValueKind::Table(decl) => {
                        if !is_absent(provided) {
                            let block_id = self.flatten_table(*decl, provided.unwrap())?;
                            prepared.push(PreparedField { slot: i, align: 4, size: 4, content: FieldContent::Offset(block_id) });
                        }
                    }
                    ValueKind::Struct { decl, inline_size, inline_align } => {
                        if !is_absent(provided) {
                            let nested_skel = match self.registry.skeleton(*decl)? {
                                Skeleton::Struct(s) => s,
                                _ => return Err(FbError::new("internal error: expected struct skeleton")),
                            };
                            let bytes = encode_struct(self.registry, &nested_skel, provided.unwrap())?;
                            prepared.push(PreparedField { slot: i, align: *inline_align, size: *inline_size, content: FieldContent::StructBytes(bytes) });
                        }
                    }
                    ValueKind::Union(_) | ValueKind::UnionTag(_) => unreachable!("consumed by the union-tag branch above"),
                }
            }
            i += 1;
        }

        // Slot-packing: present fields ordered by descending (alignment,
        // size), ties broken by declaration order. This is a deliberate
        // simplification of spec.md's "pull a smaller field into the gap
        // before the first large slot" heuristic — see DESIGN.md.
        prepared.sort_by_key(|p| (Reverse(p.align), Reverse(p.size), p.slot));

        let mut cursor = wire::SOFFSET_SIZE; // body always opens with its own soffset
        let mut max_align = 4usize;
        let mut body_offsets = vec![0usize; prepared.len()];
        for (pi, p) in prepared.iter().enumerate() {
            cursor = align_up(cursor, p.align.max(1));
            body_offsets[pi] = cursor;
            cursor += p.size;
            max_align = max_align.max(p.align);
        }
        let body_len = align_up(cursor, max_align);

        let vtable_num_slots = prepared.iter().map(|p| p.slot + 1).max().unwrap_or(0);
        let vtable_len = 4 + 2 * vtable_num_slots;
        let mut vtable = vec![0u8; vtable_len];
        vtable[0..2].copy_from_slice(&(vtable_len as u16).to_le_bytes());
        vtable[2..4].copy_from_slice(&(body_len as u16).to_le_bytes());

        let mut body = vec![0u8; body_len];
        let mut patches = Vec::new();
        for (pi, p) in prepared.iter().enumerate() {
            let off = body_offsets[pi];
            let slot_pos = 4 + p.slot * 2;
            vtable[slot_pos..slot_pos + 2].copy_from_slice(&(off as u16).to_le_bytes());
            match &p.content {
                FieldContent::Scalar(sv) => wire::write_scalar(&mut body, off, *sv),
                FieldContent::Offset(child_id) => patches.push(Patch::Forward(off, *child_id)),
                FieldContent::StructBytes(bytes) => body[off..off + bytes.len()].copy_from_slice(bytes),
            }
        }

        let vtable_id = self.push_block(2, vtable, Vec::new());
        patches.push(Patch::Backward(0, vtable_id));
        Ok(self.push_block(max_align, body, patches))
    }

    /// Final layout pass: blocks are assigned offsets in reverse creation
    /// order, so the root table (created last) lands immediately after the
    /// header and every child (created first, since a parent can only
    /// reference a child that already exists) lands further towards the
    /// end of the buffer — this reproduces `flatc`'s own back-to-front
    /// emission order without needing a shrinking cursor while building.
    fn emit(&self, root_body_id: usize, file_identifier: Option<[u8; 4]>) -> Vec<u8> {
        let header_len = 4 + if file_identifier.is_some() { 4 } else { 0 };
        let mut final_offset = vec![0usize; self.blocks.len()];
        let mut cursor = header_len;
        for idx in (0..self.blocks.len()).rev() {
            let blk = &self.blocks[idx];
            cursor = align_up(cursor, blk.align.max(1));
            final_offset[idx] = cursor;
            cursor += blk.bytes.len();
        }
        let total_len = align_up(cursor, 8);

        let mut out = vec![0u8; total_len];
        let root_final = final_offset[root_body_id];
        out[0..4].copy_from_slice(&(root_final as u32).to_le_bytes());
        if let Some(id) = file_identifier {
            out[4..8].copy_from_slice(&id);
        }

        for (idx, blk) in self.blocks.iter().enumerate() {
            let base = final_offset[idx];
            out[base..base + blk.bytes.len()].copy_from_slice(&blk.bytes);
            for patch in &blk.patches {
                match patch {
                    Patch::Forward(local, target) => {
                        let field_abs = base + local;
                        let value = (final_offset[*target] as i64 - field_abs as i64) as u32;
                        out[field_abs..field_abs + 4].copy_from_slice(&value.to_le_bytes());
                    }
                    Patch::Backward(local, target) => {
                        let field_abs = base + local;
                        let value = (field_abs as i64 - final_offset[*target] as i64) as i32;
                        out[field_abs..field_abs + 4].copy_from_slice(&value.to_le_bytes());
                    }
                }
            }
        }
        out
    }
}

/// Encode `value` as a buffer rooted at `root_decl`, which must name a
/// Table declaration (spec.md §3 invariant 1). `value` must be a `Map`
/// (or a `Shared` wrapping one) whose keys are the root table's field
/// names.
pub fn encode(registry: &Registry, root_decl: DeclId, value: &NativeValue) -> Result<Vec<u8>, FbError> {
    let root_skel = match registry.skeleton(root_decl)? {
        Skeleton::Table(t) => t,
        _ => return Err(FbError::SchemaSemantic { message: "root type is not a table".to_owned() }),
    };
    let file_identifier = match registry.decl(root_decl) {
        Decl::Table(t) => t.file_identifier,
        _ => None,
    };

    let mut enc = Encoder { registry, blocks: Vec::new(), shared_cache: HashMap::new(), depth: 0 };
    let body_id = enc.flatten_table_with_skeleton(&root_skel, value)?;
    Ok(enc.emit(body_id, file_identifier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder;
    use crate::native::FbOrderedMap;

    fn registry(src: &str) -> Registry {
        Registry::from_source(src).unwrap()
    }

    fn map(pairs: Vec<(&str, NativeValue)>) -> NativeValue {
        let mut m = FbOrderedMap::new();
        for (k, v) in pairs {
            m.insert(k, v);
        }
        NativeValue::Map(m)
    }

    #[test]
    fn scalar_round_trips_and_omits_defaults() {
        let reg = registry("table T { a: int; b: int = 5; } root_type T;");
        let id = reg.resolve("", "T").unwrap();
        let v = map(vec![("a", NativeValue::Int(7)), ("b", NativeValue::Int(5))]);
        let buf = encode(&reg, id, &v).unwrap();
        let view = decoder::decode_root(&reg, &buf, Some("T")).unwrap();
        assert_eq!(view.get_scalar("a").unwrap(), ScalarValue::Int32(7));
        assert_eq!(view.get_scalar("b").unwrap(), ScalarValue::Int32(5));
    }

    #[test]
    fn string_and_nested_table_round_trip() {
        let reg = registry("table Inner { n: int; } table Outer { name: string; inner: Inner; } root_type Outer;");
        let id = reg.resolve("", "Outer").unwrap();
        let v = map(vec![("name", NativeValue::from("hi")), ("inner", map(vec![("n", NativeValue::Int(3))]))]);
        let buf = encode(&reg, id, &v).unwrap();
        let view = decoder::decode_root(&reg, &buf, Some("Outer")).unwrap();
        assert_eq!(view.get_string("name").unwrap(), Some("hi"));
        let inner = view.get_table("inner").unwrap().unwrap();
        assert_eq!(inner.get_scalar("n").unwrap(), ScalarValue::Int32(3));
    }

    #[test]
    fn union_field_round_trips_via_tag_and_payload_keys() {
        let reg = registry("table X{n:int;} table Y{s:int;} union XY{X,Y} table R{v:XY;} root_type R;");
        let id = reg.resolve("", "R").unwrap();
        let v = map(vec![("v_type", NativeValue::from("Y")), ("v", map(vec![("s", NativeValue::Int(7))]))]);
        let buf = encode(&reg, id, &v).unwrap();
        let view = decoder::decode_root(&reg, &buf, Some("R")).unwrap();
        let (name, payload) = view.get_union("v").unwrap().unwrap();
        assert_eq!(name, "Y");
        assert_eq!(payload.get_scalar("s").unwrap(), ScalarValue::Int32(7));
    }

    #[test]
    fn vector_of_strings_round_trips() {
        let reg = registry("table T { names: [string]; } root_type T;");
        let id = reg.resolve("", "T").unwrap();
        let v = map(vec![("names", NativeValue::Vector(vec![NativeValue::from("a"), NativeValue::from("bb")]))]);
        let buf = encode(&reg, id, &v).unwrap();
        let view = decoder::decode_root(&reg, &buf, Some("T")).unwrap();
        let vec_view = view.get_vector("names").unwrap().unwrap();
        assert_eq!(vec_view.len(), 2);
        match vec_view.get(1).unwrap() {
            decoder::VectorElement::Str(s) => assert_eq!(s, "bb"),
            _ => panic!("expected a string element"),
        }
    }

    #[test]
    fn enum_field_accepts_member_name_string() {
        let reg = registry("enum E:byte { Bar = 1, Buz = 2 } table T { e: E = Bar; } root_type T;");
        let id = reg.resolve("", "T").unwrap();
        let v = map(vec![("e", NativeValue::from("Buz"))]);
        let buf = encode(&reg, id, &v).unwrap();
        let view = decoder::decode_root(&reg, &buf, Some("T")).unwrap();
        assert_eq!(view.get_scalar("e").unwrap(), ScalarValue::Int8(2));
    }

    #[test]
    fn shared_substructure_deduplicates_into_one_block() {
        let reg = registry("table Inner { n: int; } table Outer { a: Inner; b: Inner; } root_type Outer;");
        let id = reg.resolve("", "Outer").unwrap();
        let shared = Rc::new(map(vec![("n", NativeValue::Int(9))]));
        let v = map(vec![("a", NativeValue::Shared(shared.clone())), ("b", NativeValue::Shared(shared))]);
        let mut enc = Encoder { registry: &reg, blocks: Vec::new(), shared_cache: HashMap::new(), depth: 0 };
        let skel = match reg.skeleton(id).unwrap() {
            Skeleton::Table(t) => t,
            _ => unreachable!(),
        };
        enc.flatten_table_with_skeleton(&skel, &v).unwrap();
        // one body+vtable pair for the shared Inner, plus one for Outer itself.
        assert_eq!(enc.blocks.len(), 4);
    }

    #[test]
    fn struct_field_is_encoded_inline() {
        let reg = registry("struct P { x: int; y: int; } table T { p: P; } root_type T;");
        let id = reg.resolve("", "T").unwrap();
        let v = map(vec![("p", map(vec![("x", NativeValue::Int(1)), ("y", NativeValue::Int(2))]))]);
        let buf = encode(&reg, id, &v).unwrap();
        let view = decoder::decode_root(&reg, &buf, Some("T")).unwrap();
        let p = view.get_struct("p").unwrap().unwrap();
        assert_eq!(p.get_scalar("x").unwrap(), ScalarValue::Int32(1));
        assert_eq!(p.get_scalar("y").unwrap(), ScalarValue::Int32(2));
    }
}
