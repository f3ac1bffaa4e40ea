//! Decoder: buffer + skeleton → lazy value views.
//!
//! Grounded in the teacher's `buffer.rs` read-only view (`NP_Buffer`/
//! `NP_Lite_Ptr`-style wrapper over borrowed bytes, field access computed
//! on demand rather than up front), rewritten against a FlatBuffers vtable
//! instead of the teacher's own linked-pointer wire format. All reads here
//! borrow from the input buffer — a view's lifetime is tied to it, matching
//! spec.md §3's "decoded views borrow from an input buffer" ownership rule.

use std::rc::Rc;

use crate::error::FbError;
use crate::schema::registry::Registry;
use crate::schema::Decl;
use crate::skeleton::{FieldSkeleton, Skeleton, StructSkeleton, TableSkeleton, ValueKind};
use crate::wire::{self, ScalarType, ScalarValue};

fn field_of<'a>(skeleton: &'a TableSkeleton, name: &str) -> Result<&'a FieldSkeleton, FbError> {
    let idx = skeleton.slot_of(name).ok_or_else(|| FbError::UnknownType { name: name.to_owned() })?;
    Ok(&skeleton.fields[idx])
}

fn bad_kind(field: &str) -> FbError {
    FbError::BadValue { field: field.to_owned(), message: "field accessed with the wrong kind of getter".to_owned() }
}

/// A lazily-read table: buffer, the absolute offset of its body (the
/// `soffset` field), and the pre-resolved vtable location/length.
pub struct TableView<'b> {
    pub(crate) buf: &'b [u8],
    pub(crate) offset: usize,
    pub(crate) skeleton: Rc<TableSkeleton>,
    pub(crate) registry: &'b Registry,
    vtable_offset: usize,
    vtable_len: u16,
}

impl<'b> TableView<'b> {
    pub fn new(buf: &'b [u8], offset: usize, skeleton: Rc<TableSkeleton>, registry: &'b Registry) -> Result<Self, FbError> {
        let soffset = wire::read_soffset(buf, offset)?;
        let vtable_offset = (offset as i64 - soffset as i64) as usize;
        let vtable_len = wire::read_vsize(buf, vtable_offset)?;
        Ok(Self { buf, offset, skeleton, registry, vtable_offset, vtable_len })
    }

    pub fn skeleton(&self) -> &TableSkeleton {
        &self.skeleton
    }

    /// The slot's absolute byte address in `buf`, or `None` if the field is
    /// absent (not in the vtable, or the vtable doesn't reach that slot).
    fn slot_address(&self, decl_slot: usize) -> Result<Option<usize>, FbError> {
        let byte_pos = 4 + decl_slot * wire::VOFFSET_SIZE;
        if byte_pos + wire::VOFFSET_SIZE > self.vtable_len as usize {
            return Ok(None);
        }
        let voffset = wire::read_voffset(self.buf, self.vtable_offset + byte_pos)?;
        if voffset == 0 {
            return Ok(None);
        }
        Ok(Some(self.offset + voffset as usize))
    }

    /// Read a scalar, enum, or union-discriminant field by name, applying
    /// the field's default when the slot is absent (spec.md §4.F).
    pub fn get_scalar(&self, name: &str) -> Result<ScalarValue, FbError> {
        let field = field_of(&self.skeleton, name)?;
        let ty = match &field.kind {
            ValueKind::Scalar(st) => *st,
            ValueKind::Enum { underlying, .. } => *underlying,
            ValueKind::UnionTag(_) => ScalarType::Uint8,
            _ => return Err(bad_kind(name)),
        };
        let slot = self.skeleton.slot_of(name).unwrap();
        match self.slot_address(slot)? {
            None => field.default.ok_or_else(|| bad_kind(name)),
            Some(addr) => wire::unpack_scalar(ty, self.buf, addr),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, FbError> {
        match self.get_scalar(name)? {
            ScalarValue::Bool(b) => Ok(b),
            other => Ok(!other.is_zero()),
        }
    }

    pub fn get_string(&self, name: &str) -> Result<Option<&'b str>, FbError> {
        let field = field_of(&self.skeleton, name)?;
        if !matches!(field.kind, ValueKind::String) || field.is_vector {
            return Err(bad_kind(name));
        }
        let slot = self.skeleton.slot_of(name).unwrap();
        match self.slot_address(slot)? {
            None => Ok(None),
            Some(addr) => {
                let uoff = wire::read_uoffset(self.buf, addr)?;
                let target = addr + uoff as usize;
                read_string_at(self.buf, target)
            }
        }
    }

    pub fn get_struct(&self, name: &str) -> Result<Option<StructView<'b>>, FbError> {
        let field = field_of(&self.skeleton, name)?;
        let decl = match &field.kind {
            ValueKind::Struct { decl, .. } => *decl,
            _ => return Err(bad_kind(name)),
        };
        let slot = self.skeleton.slot_of(name).unwrap();
        match self.slot_address(slot)? {
            None => Ok(None),
            // struct-typed table fields are inline, not offset-indirected
            // (confirmed against original_source's read_struct_field, which
            // reads `table.offset + foffset` directly — no extra uoffset
            // hop, unlike string/table/union fields).
            Some(addr) => {
                let skel = self.registry.skeleton(decl)?;
                let st = match skel {
                    Skeleton::Struct(s) => s,
                    _ => return Err(bad_kind(name)),
                };
                Ok(Some(StructView { buf: self.buf, offset: addr, skeleton: st, registry: self.registry }))
            }
        }
    }

    pub fn get_table(&self, name: &str) -> Result<Option<TableView<'b>>, FbError> {
        let field = field_of(&self.skeleton, name)?;
        let decl = match &field.kind {
            ValueKind::Table(decl) => *decl,
            _ => return Err(bad_kind(name)),
        };
        let slot = self.skeleton.slot_of(name).unwrap();
        match self.slot_address(slot)? {
            None => Ok(None),
            Some(addr) => {
                let uoff = wire::read_uoffset(self.buf, addr)?;
                let target = addr + uoff as usize;
                let skel = self.registry.skeleton(decl)?;
                let t = match skel {
                    Skeleton::Table(t) => t,
                    _ => return Err(bad_kind(name)),
                };
                Ok(Some(TableView::new(self.buf, target, t, self.registry)?))
            }
        }
    }

    /// Read a union-typed field: the discriminant at `{name}_type` selects
    /// which table skeleton to read `name` as (spec.md §4.F "Union").
    pub fn get_union(&self, name: &str) -> Result<Option<(String, TableView<'b>)>, FbError> {
        let field = field_of(&self.skeleton, name)?;
        let union_decl = match &field.kind {
            ValueKind::Union(decl) => *decl,
            _ => return Err(bad_kind(name)),
        };
        let tag_name = format!("{}_type", name);
        let tag = match self.get_scalar(&tag_name)? {
            ScalarValue::Uint8(t) => t,
            other => other.as_i64().unwrap_or(0) as u8,
        };
        if tag == 0 {
            return Ok(None);
        }
        let slot = self.skeleton.slot_of(name).unwrap();
        let addr = match self.slot_address(slot)? {
            None => return Ok(None),
            Some(a) => a,
        };
        let union_skel = match self.registry.skeleton(union_decl)? {
            Skeleton::Union(u) => u,
            _ => return Err(bad_kind(name)),
        };
        let member_decl = *union_skel.variants.get(&tag).ok_or_else(|| FbError::BadDiscriminant {
            message: format!("union field `{}` has unknown discriminant {}", name, tag),
        })?;
        let member_name = match self.registry.decl(member_decl) {
            Decl::Table(t) => t.name.clone(),
            _ => return Err(bad_kind(name)),
        };
        let table_skel = match self.registry.skeleton(member_decl)? {
            Skeleton::Table(t) => t,
            _ => return Err(bad_kind(name)),
        };
        let uoff = wire::read_uoffset(self.buf, addr)?;
        let target = addr + uoff as usize;
        Ok(Some((member_name, TableView::new(self.buf, target, table_skel, self.registry)?)))
    }

    pub fn get_vector(&self, name: &str) -> Result<Option<VectorView<'b>>, FbError> {
        let field = field_of(&self.skeleton, name)?;
        if !field.is_vector {
            return Err(bad_kind(name));
        }
        let kind = field.kind.clone();
        let slot = self.skeleton.slot_of(name).unwrap();
        match self.slot_address(slot)? {
            None => Ok(None),
            Some(addr) => {
                let uoff = wire::read_uoffset(self.buf, addr)?;
                let vec_start = addr + uoff as usize;
                VectorView::new(self.buf, vec_start, kind, self.registry).map(Some)
            }
        }
    }
}

/// An inline, fixed-size struct value: no vtable, fields at statically
/// known offsets from `offset`.
pub struct StructView<'b> {
    pub(crate) buf: &'b [u8],
    pub(crate) offset: usize,
    pub(crate) skeleton: Rc<StructSkeleton>,
    pub(crate) registry: &'b Registry,
}

impl<'b> StructView<'b> {
    fn field(&self, name: &str) -> Result<&crate::skeleton::StructFieldSkeleton, FbError> {
        self.skeleton.fields.iter().find(|f| f.field.name == name).ok_or_else(|| FbError::UnknownType { name: name.to_owned() })
    }

    pub fn get_scalar(&self, name: &str) -> Result<ScalarValue, FbError> {
        let f = self.field(name)?;
        let ty = match &f.field.kind {
            ValueKind::Scalar(st) => *st,
            ValueKind::Enum { underlying, .. } => *underlying,
            _ => return Err(bad_kind(name)),
        };
        wire::unpack_scalar(ty, self.buf, self.offset + f.offset)
    }

    pub fn get_struct(&self, name: &str) -> Result<StructView<'b>, FbError> {
        let f = self.field(name)?;
        let decl = match &f.field.kind {
            ValueKind::Struct { decl, .. } => *decl,
            _ => return Err(bad_kind(name)),
        };
        let skel = match self.registry.skeleton(decl)? {
            Skeleton::Struct(s) => s,
            _ => return Err(bad_kind(name)),
        };
        Ok(StructView { buf: self.buf, offset: self.offset + f.offset, skeleton: skel, registry: self.registry })
    }
}

/// One kind of vector element, resolved once at construction so
/// per-element access doesn't repeat the dispatch.
pub struct VectorView<'b> {
    buf: &'b [u8],
    elements_start: usize,
    len: usize,
    pub(crate) kind: ValueKind,
    pub(crate) registry: &'b Registry,
}

/// One element read out of a vector; which field you can call depends on
/// `kind`, mirroring the table/struct field accessors above.
pub enum VectorElement<'b> {
    Scalar(ScalarValue),
    Str(&'b str),
    Struct(StructView<'b>),
    Table(TableView<'b>),
}

impl<'b> VectorView<'b> {
    fn new(buf: &'b [u8], vec_start: usize, kind: ValueKind, registry: &'b Registry) -> Result<Self, FbError> {
        let len = wire::read_uoffset(buf, vec_start)? as usize;
        let elements_start = wire::align_up(vec_start + wire::UOFFSET_SIZE, kind.inline_align());
        Ok(Self { buf, elements_start, len, kind, registry })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Result<VectorElement<'b>, FbError> {
        if index >= self.len {
            return Err(FbError::TruncatedBuffer { at: self.elements_start, needed: 0, len: self.buf.len() });
        }
        let stride = self.kind.inline_size();
        let slot = self.elements_start + index * stride;
        Ok(match &self.kind {
            ValueKind::Scalar(st) => VectorElement::Scalar(wire::unpack_scalar(*st, self.buf, slot)?),
            ValueKind::Enum { underlying, .. } => VectorElement::Scalar(wire::unpack_scalar(*underlying, self.buf, slot)?),
            ValueKind::String => {
                let uoff = wire::read_uoffset(self.buf, slot)?;
                let target = slot + uoff as usize;
                let s = read_string_at(self.buf, target)?.ok_or_else(|| FbError::new("vector string element missing"))?;
                VectorElement::Str(s)
            }
            ValueKind::Table(decl) => {
                let uoff = wire::read_uoffset(self.buf, slot)?;
                let target = slot + uoff as usize;
                let skel = match self.registry.skeleton(*decl)? {
                    Skeleton::Table(t) => t,
                    _ => return Err(FbError::new("vector table element: wrong skeleton kind")),
                };
                VectorElement::Table(TableView::new(self.buf, target, skel, self.registry)?)
            }
            ValueKind::Struct { decl, .. } => {
                let skel = match self.registry.skeleton(*decl)? {
                    Skeleton::Struct(s) => s,
                    _ => return Err(FbError::new("vector struct element: wrong skeleton kind")),
                };
                VectorElement::Struct(StructView { buf: self.buf, offset: slot, skeleton: skel, registry: self.registry })
            }
            ValueKind::Union(_) | ValueKind::UnionTag(_) => return Err(FbError::new("vector-of-union is not supported")),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<VectorElement<'b>, FbError>> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }
}

fn read_string_at(buf: &[u8], offset: usize) -> Result<Option<&str>, FbError> {
    let len = wire::read_uoffset(buf, offset)? as usize;
    let start = offset + wire::UOFFSET_SIZE;
    if start + len > buf.len() {
        return Err(FbError::TruncatedBuffer { at: start, needed: len, len: buf.len() });
    }
    std::str::from_utf8(&buf[start..start + len]).map(Some).map_err(|e| FbError::new(e.to_string()))
}

/// Decode a buffer's header and locate its root table.
///
/// `type_name`, when given, selects the root type directly. Otherwise the
/// buffer's embedded file identifier (bytes 4..8) is used to find it
/// (spec.md §8 testable property 3); a buffer too short to carry one, or
/// one whose identifier names no declared type, fails with
/// `MissingRootType`.
pub fn decode_root<'b>(registry: &'b Registry, buf: &'b [u8], type_name: Option<&str>) -> Result<TableView<'b>, FbError> {
    let root_decl = if let Some(name) = type_name {
        registry.resolve("", name)?
    } else if buf.len() >= 8 {
        let mut id = [0u8; 4];
        id.copy_from_slice(&buf[4..8]);
        registry.by_file_identifier(&id)?
    } else {
        return Err(FbError::MissingRootType);
    };

    let root_offset = wire::read_uoffset(buf, 0)? as usize;
    let skel = match registry.skeleton(root_decl)? {
        Skeleton::Table(t) => t,
        _ => return Err(FbError::SchemaSemantic { message: "root type is not a table".to_owned() }),
    };
    TableView::new(buf, root_offset, skel, registry)
}