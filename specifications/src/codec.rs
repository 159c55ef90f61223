//! The class-tag codec registry.
//!
//! Every dataset that crosses a shared-memory boundary is addressed by a
//! *class tag* (a short string such as `bytes`, `int` or `grib.earthkit`)
//! rather than by a Rust type: task children only ever exchange
//! `(class tag, bytes)` pairs, never live values, so the core stays
//! independent from whatever language a task's entrypoint happens to be
//! implemented in.

use std::collections::HashMap;

use crate::errors::CodecError;


/***** LIBRARY *****/
/// A value decoded from (or about to be encoded to) a class-tagged byte
/// payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// The `bytes` class: an opaque, uninterpreted payload.
    Bytes(Vec<u8>),
    /// The `str` class: a UTF-8 string.
    Str(String),
    /// The `int` class: a 4-byte big-endian signed integer.
    Int(i32),
    /// The `ndarray` class: a self-describing dtype/shape/raw-data triple.
    NdArray(NdArray),
    /// An external class (`grib.earthkit`, `grib.mir`, or any
    /// user-registered tag that opts into pass-through semantics): the
    /// payload is handed to the entrypoint unparsed.
    Raw(Vec<u8>),
}

/// The `ndarray` class tag's wire layout:
/// `[4B dtype-len | dtype-blob | 4B shape-len | shape-blob | raw-bytes]`.
///
/// `shape-blob` is `shape.len()` big-endian `u64`s back to back; `dtype-blob`
/// is the dtype name's UTF-8 bytes (e.g. `"f64"`).
#[derive(Clone, Debug, PartialEq)]
pub struct NdArray {
    pub dtype: String,
    pub shape: Vec<u64>,
    pub data: Vec<u8>,
}

impl NdArray {
    pub fn encode(&self) -> Vec<u8> {
        let dtype_bytes = self.dtype.as_bytes();
        let shape_bytes: Vec<u8> = self.shape.iter().flat_map(|d| d.to_be_bytes()).collect();

        let mut out = Vec::with_capacity(4 + dtype_bytes.len() + 4 + shape_bytes.len() + self.data.len());
        out.extend_from_slice(&(dtype_bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(dtype_bytes);
        out.extend_from_slice(&(shape_bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(&shape_bytes);
        out.extend_from_slice(&self.data);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let class = "ndarray";
        if bytes.len() < 4 { return Err(CodecError::Truncated { class: class.into(), what: "dtype-len header" }); }
        let dtype_len = u32::from_be_bytes(bytes[0..4].try_into().unwrap()) as usize;
        let mut off = 4;
        if bytes.len() < off + dtype_len { return Err(CodecError::Truncated { class: class.into(), what: "dtype blob" }); }
        let dtype = std::str::from_utf8(&bytes[off..off + dtype_len]).map_err(|_| CodecError::InvalidUtf8 { class: class.into() })?.to_string();
        off += dtype_len;

        if bytes.len() < off + 4 { return Err(CodecError::Truncated { class: class.into(), what: "shape-len header" }); }
        let shape_len = u32::from_be_bytes(bytes[off..off + 4].try_into().unwrap()) as usize;
        off += 4;
        if bytes.len() < off + shape_len { return Err(CodecError::Truncated { class: class.into(), what: "shape blob" }); }
        if shape_len % 8 != 0 { return Err(CodecError::Truncated { class: class.into(), what: "shape blob (not a multiple of 8 bytes)" }); }
        let shape: Vec<u64> = bytes[off..off + shape_len].chunks_exact(8).map(|c| u64::from_be_bytes(c.try_into().unwrap())).collect();
        off += shape_len;

        let data = bytes[off..].to_vec();
        Ok(Self { dtype, shape, data })
    }
}



/// A codec for a single class tag: encodes a [`Value`] into bytes for
/// storage in a shared-memory segment, and decodes it back.
pub trait Codec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

struct BytesCodec;
impl Codec for BytesCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            other => Err(CodecError::Unencodable { class: "bytes".into(), reason: format!("expected Value::Bytes, got {other:?}") }),
        }
    }
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> { Ok(Value::Bytes(bytes.to_vec())) }
}

struct StrCodec;
impl Codec for StrCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::Str(s) => Ok(s.clone().into_bytes()),
            other => Err(CodecError::Unencodable { class: "str".into(), reason: format!("expected Value::Str, got {other:?}") }),
        }
    }
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let s = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8 { class: "str".into() })?;
        Ok(Value::Str(s.to_string()))
    }
}

struct IntCodec;
impl Codec for IntCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::Int(i) => Ok(i.to_be_bytes().to_vec()),
            other => Err(CodecError::Unencodable { class: "int".into(), reason: format!("expected Value::Int, got {other:?}") }),
        }
    }
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let arr: [u8; 4] = bytes.try_into().map_err(|_| CodecError::InvalidIntWidth { len: bytes.len() })?;
        Ok(Value::Int(i32::from_be_bytes(arr)))
    }
}

struct NdArrayCodec;
impl Codec for NdArrayCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::NdArray(arr) => Ok(arr.encode()),
            other => Err(CodecError::Unencodable { class: "ndarray".into(), reason: format!("expected Value::NdArray, got {other:?}") }),
        }
    }
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> { Ok(Value::NdArray(NdArray::decode(bytes)?)) }
}

/// A pass-through codec for external byte formats (GRIB variants and any
/// user-registered tag with the same zero-copy semantics): encoding is the
/// identity, decoding hands the bytes over unparsed for the entrypoint (or a
/// downstream library such as an earthkit/mir binding) to interpret.
struct RawCodec { class: String }
impl Codec for RawCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::Raw(b) | Value::Bytes(b) => Ok(b.clone()),
            other => Err(CodecError::Unencodable { class: self.class.clone(), reason: format!("expected a raw byte payload, got {other:?}") }),
        }
    }
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> { Ok(Value::Raw(bytes.to_vec())) }
}



/// Maps class tags to codecs. New tags can be registered at runtime
/// (user-extensible entries); lookups that miss fall back along the tag's
/// dotted hierarchy (e.g. `grib.mir.custom` falls back to `grib.mir`, then
/// `grib`), mirroring a class's base-class fallback without requiring an
/// actual type hierarchy.
pub struct CodecRegistry {
    codecs: HashMap<String, Box<dyn Codec>>,
}

impl Default for CodecRegistry {
    fn default() -> Self { Self::with_defaults() }
}

impl CodecRegistry {
    /// Builds a registry with the built-in class tags registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self { codecs: HashMap::new() };
        registry.register("bytes", Box::new(BytesCodec));
        registry.register("str", Box::new(StrCodec));
        registry.register("int", Box::new(IntCodec));
        registry.register("ndarray", Box::new(NdArrayCodec));
        registry.register("grib.earthkit", Box::new(RawCodec { class: "grib.earthkit".into() }));
        registry.register("grib.mir", Box::new(RawCodec { class: "grib.mir".into() }));
        registry
    }

    /// Registers (or overrides) the codec for a class tag.
    pub fn register(&mut self, class: impl Into<String>, codec: Box<dyn Codec>) { self.codecs.insert(class.into(), codec); }

    pub fn encode(&self, class: &str, value: &Value) -> Result<Vec<u8>, CodecError> {
        self.lookup(class).ok_or_else(|| CodecError::UnknownClass { class: class.into() })?.encode(value)
    }

    pub fn decode(&self, class: &str, bytes: &[u8]) -> Result<Value, CodecError> {
        self.lookup(class).ok_or_else(|| CodecError::UnknownClass { class: class.into() })?.decode(bytes)
    }

    fn lookup(&self, class: &str) -> Option<&dyn Codec> {
        if let Some(codec) = self.codecs.get(class) { return Some(codec.as_ref()); }

        let mut prefix = class;
        while let Some(idx) = prefix.rfind('.') {
            prefix = &prefix[..idx];
            if let Some(codec) = self.codecs.get(prefix) { return Some(codec.as_ref()); }
        }
        None
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_round_trips() {
        let reg = CodecRegistry::with_defaults();
        let v = Value::Bytes(vec![1, 2, 3]);
        let enc = reg.encode("bytes", &v).unwrap();
        assert_eq!(reg.decode("bytes", &enc).unwrap(), v);
    }

    #[test]
    fn str_round_trips() {
        let reg = CodecRegistry::with_defaults();
        let v = Value::Str("hello world from [1 2] and 3".into());
        let enc = reg.encode("str", &v).unwrap();
        assert_eq!(enc, b"hello world from [1 2] and 3");
        assert_eq!(reg.decode("str", &enc).unwrap(), v);
    }

    #[test]
    fn int_round_trips_big_endian() {
        let reg = CodecRegistry::with_defaults();
        let v = Value::Int(42);
        let enc = reg.encode("int", &v).unwrap();
        assert_eq!(enc, vec![0, 0, 0, 42]);
        assert_eq!(reg.decode("int", &enc).unwrap(), v);
    }

    #[test]
    fn ndarray_round_trips() {
        let reg = CodecRegistry::with_defaults();
        let v = Value::NdArray(NdArray { dtype: "f64".into(), shape: vec![2, 3], data: vec![0u8; 48] });
        let enc = reg.encode("ndarray", &v).unwrap();
        assert_eq!(reg.decode("ndarray", &enc).unwrap(), v);
    }

    #[test]
    fn ndarray_decode_rejects_truncated_header() {
        let reg = CodecRegistry::with_defaults();
        assert!(reg.decode("ndarray", &[0, 0]).is_err());
    }

    #[test]
    fn grib_subtype_falls_back_to_registered_parent() {
        let reg = CodecRegistry::with_defaults();
        let decoded = reg.decode("grib.earthkit.v2", b"\x00\x01").unwrap();
        assert_eq!(decoded, Value::Raw(vec![0, 1]));
    }

    #[test]
    fn unknown_class_errors() {
        let reg = CodecRegistry::with_defaults();
        assert!(matches!(reg.decode("totally.unknown", b""), Err(CodecError::UnknownClass { .. })));
    }

    #[test]
    fn int_decode_rejects_wrong_width() {
        let reg = CodecRegistry::with_defaults();
        assert!(matches!(reg.decode("int", &[0, 1, 2]), Err(CodecError::InvalidIntWidth { len: 3 })));
    }
}
