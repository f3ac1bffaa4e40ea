#![warn(missing_docs)]

//! ## A schema-compiled, zero-copy wire codec
//!
//! An implementation of the FlatBuffers wire format: schemas are written in
//! the FlatBuffers IDL, compiled once into a cached layout (a "skeleton"),
//! and that layout drives both encoding a plain value graph into a buffer
//! and decoding a buffer back out without copying its bytes.
//!
//! ### Features
//! - Zero dependencies
//! - Zero-copy decoding: every accessor borrows from the input buffer
//! - Schemas compiled once per declaration, cached for the life of a `Registry`
//! - Vectors, nested tables, inline structs, enums (including `bit_flags`), and unions
//! - Shared-substructure deduplication on encode, via an explicit `Shared` hint
//! - File-identifier-based root type selection when a buffer's type isn't named explicitly
//!
//! NoProto's original niche was a dynamic, JSON-schema-driven buffer you could
//! mutate in place without a compile step. This crate keeps that zero-copy,
//! borrow-from-the-buffer reading discipline but trades the dynamic schema
//! for FlatBuffers' own ahead-of-time compiled layout: a schema is parsed
//! once into a [`schema::Schema`], and each declaration's byte layout is
//! computed once into a [`skeleton::Skeleton`] and cached on the
//! [`schema::registry::Registry`] that owns it.
//!
//! *Compared to FlatBuffers itself*
//! - Same wire format (`flatc`-readable output, `flatc`-compatible input)
//! - Schema compiled at runtime rather than via a codegen step
//! - A single dynamic value type ([`native::NativeValue`]) stands in for codegen'd accessor structs
//!
//! # Quick Example
//! ```rust
//! use flatcodec::error::FbError;
//! use flatcodec::native::{FbOrderedMap, NativeValue};
//! use flatcodec::schema::registry::Registry;
//!
//! let registry = Registry::from_source(
//!     "table Person { name: string; age: uint16 = 0; } root_type Person;"
//! )?;
//! let person = registry.resolve("", "Person")?;
//!
//! let mut fields = FbOrderedMap::new();
//! fields.insert("name", NativeValue::from("Billy Joel"));
//! fields.insert("age", NativeValue::Int(41));
//! let value = NativeValue::Map(fields);
//!
//! let bytes: Vec<u8> = flatcodec::encoder::encode(&registry, person, &value)?;
//!
//! let view = flatcodec::decoder::decode_root(&registry, &bytes, Some("Person"))?;
//! assert_eq!(view.get_string("name")?, Some("Billy Joel"));
//! # Ok::<(), FbError>(())
//! ```
//!
//! ## Guided Learning / Next Steps
//! 1. [`schema`] - the IDL grammar, the declaration AST, and `Registry`.
//! 2. [`skeleton`] - how a declaration becomes a concrete byte layout.
//! 3. [`decoder`] - reading a buffer through its skeleton.
//! 4. [`encoder`] - turning a [`native::NativeValue`] graph into bytes.
//!
//! #### Limitations
//! - Buffers, tables, and vectors follow the FlatBuffers format's own
//!   offset widths (`uoffset`/`voffset` are 32/16-bit); see [`wire`].
//! - A `Registry`'s skeleton cache is filled lazily and is not
//!   thread-safe to write concurrently; wrap it in a lock if shared
//!   across threads performing first-time encodes/decodes.
//!
//! ----------------------
//!
//! MIT License
//!
//! Copyright (c) 2020 Scott Lott
//!
//! Permission is hereby granted, free of charge, to any person obtaining a copy
//! of this software and associated documentation files (the "Software"), to deal
//! in the Software without restriction, including without limitation the rights
//! to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
//! copies of the Software, and to permit persons to whom the Software is
//! furnished to do so, subject to the following conditions:
//!
//! The above copyright notice and this permission notice shall be included in all
//! copies or substantial portions of the Software.
//!
//! THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
//! IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//! FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//! AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//! LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
//! OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
//! SOFTWARE.

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod native;
pub mod schema;
pub mod skeleton;
pub mod wire;

#[cfg(test)]
mod tests {
    use crate::decoder::decode_root;
    use crate::encoder::encode;
    use crate::native::{FbOrderedMap, NativeValue};
    use crate::schema::registry::Registry;
    use crate::wire::ScalarValue;

    fn map(pairs: Vec<(&str, NativeValue)>) -> NativeValue {
        let mut m = FbOrderedMap::new();
        for (k, v) in pairs {
            m.insert(k, v);
        }
        NativeValue::Map(m)
    }

    // S1: scalars round-trip through encode/decode unchanged.
    #[test]
    fn scenario_s1_scalars_round_trip() {
        let reg = Registry::from_source(
            r#"table T { i8:byte; u32:uint; f:float; b:bool; } root_type T; file_identifier "SCLR";"#,
        )
        .unwrap();
        let id = reg.resolve("", "T").unwrap();
        let input = map(vec![
            ("i8", NativeValue::Int(-8)),
            ("u32", NativeValue::Int(323232)),
            ("f", NativeValue::Float(1.5)),
            ("b", NativeValue::Bool(true)),
        ]);
        let bytes = encode(&reg, id, &input).unwrap();
        let view = decode_root(&reg, &bytes, Some("T")).unwrap();
        assert_eq!(view.get_scalar("i8").unwrap(), ScalarValue::Int8(-8));
        assert_eq!(view.get_scalar("u32").unwrap(), ScalarValue::Uint32(323232));
        assert_eq!(view.get_scalar("f").unwrap(), ScalarValue::Float32(1.5));
        assert!(view.get_bool("b").unwrap());
    }

    // S2: an empty input decodes to all-default scalars, and the emitted
    // buffer is exactly header + soffset + empty vtable.
    #[test]
    fn scenario_s2_defaults_are_omitted_from_the_wire() {
        let reg = Registry::from_source(
            r#"table T { i8:byte; u32:uint; f:float; b:bool; } root_type T; file_identifier "SCLR";"#,
        )
        .unwrap();
        let id = reg.resolve("", "T").unwrap();
        let bytes = encode(&reg, id, &map(vec![])).unwrap();
        let view = decode_root(&reg, &bytes, Some("T")).unwrap();
        assert_eq!(view.get_scalar("i8").unwrap(), ScalarValue::Int8(0));
        assert_eq!(view.get_scalar("u32").unwrap(), ScalarValue::Uint32(0));
        assert_eq!(view.get_scalar("f").unwrap(), ScalarValue::Float32(0.0));
        assert!(!view.get_bool("b").unwrap());
        // header(4) + file_identifier(4) + soffset(4) + vtable(4, no slots) = 16
        assert_eq!(bytes.len(), 16);
    }

    // S3: bit_flags members are powers of two; NONE/ALL synthesize.
    #[test]
    fn scenario_s3_bit_flags_enum_members_are_bit_positions() {
        let reg = Registry::from_source("enum F:ubyte (bit_flags) { Foo, Bar, Buz }").unwrap();
        let id = reg.resolve("", "F").unwrap();
        match reg.decl(id) {
            crate::schema::Decl::Enum(e) => {
                assert_eq!(e.member_value("Foo"), Some(1));
                assert_eq!(e.member_value("Bar"), Some(2));
                assert_eq!(e.member_value("Buz"), Some(4));
                assert_eq!(e.member_value("NONE"), Some(0));
                assert_eq!(e.member_value("ALL"), Some(7));
            }
            _ => panic!("expected an enum declaration"),
        }
    }

    // S6: a struct's inline size pads every field to the struct's own max
    // field alignment, matching spec.md's 24-byte worked example.
    #[test]
    fn scenario_s6_struct_inline_layout() {
        let reg = Registry::from_source("enum E:byte { Bar = 1, Buz = 2 } struct S { a: ubyte; b: double; e: E; }").unwrap();
        let id = reg.resolve("", "S").unwrap();
        match reg.skeleton(id).unwrap() {
            crate::skeleton::Skeleton::Struct(s) => {
                assert_eq!(s.inline_size, 24);
                assert_eq!(s.inline_align, 8);
            }
            _ => panic!("expected a struct skeleton"),
        }
    }

    // Testable property 3: file-identifier-based root selection, and
    // failure when neither a type name nor a recognizable identifier exists.
    #[test]
    fn identifier_gating_selects_root_type_or_fails() {
        let reg = Registry::from_source(r#"table T { x: int; } root_type T; file_identifier "TTTT";"#).unwrap();
        let id = reg.resolve("", "T").unwrap();
        let bytes = encode(&reg, id, &map(vec![("x", NativeValue::Int(1))])).unwrap();

        let view = decode_root(&reg, &bytes, None).unwrap();
        assert_eq!(view.get_scalar("x").unwrap(), ScalarValue::Int32(1));

        let short = [0u8; 4];
        assert_eq!(decode_root(&reg, &short, None).unwrap_err().kind(), "MissingRootType");
    }

    // Testable property 6: a deprecated field keeps every later field's
    // declaration index stable, and omitting it encodes identically to a
    // schema that never had it.
    #[test]
    fn deprecated_field_does_not_shift_sibling_slots() {
        let old = Registry::from_source("table T { a: int; b: int (deprecated); c: int; } root_type T;").unwrap();
        let new = Registry::from_source("table T { a: int; c: int; } root_type T;").unwrap();
        let old_id = old.resolve("", "T").unwrap();
        let new_id = new.resolve("", "T").unwrap();

        let value = map(vec![("a", NativeValue::Int(1)), ("c", NativeValue::Int(2))]);
        let old_bytes = encode(&old, old_id, &value).unwrap();
        let new_bytes = encode(&new, new_id, &value).unwrap();

        let view = decode_root(&old, &old_bytes, Some("T")).unwrap();
        assert_eq!(view.get_scalar("a").unwrap(), ScalarValue::Int32(1));
        assert_eq!(view.get_scalar("c").unwrap(), ScalarValue::Int32(2));
        assert_eq!(old_bytes, new_bytes);
    }
}
