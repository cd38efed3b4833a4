//! # Clarity Value Codec
//!
//! The Stacks node speaks Clarity values on the wire: a one-byte type
//! prefix followed by a big-endian payload. Read-only calls send their
//! arguments hex-encoded in this format and get their result back the same
//! way.
//!
//! ```text
//! 0x00 int          i128 BE
//! 0x01 uint         u128 BE
//! 0x02 buffer       u32 len ‖ bytes
//! 0x03 true / 0x04 false
//! 0x05 principal    version ‖ hash160
//! 0x06 contract     version ‖ hash160 ‖ u8 len ‖ name
//! 0x07 (ok v)       value
//! 0x08 (err v)      value
//! 0x09 none / 0x0a (some v)
//! 0x0b list         u32 count ‖ values
//! 0x0c tuple        u32 count ‖ (u8 len ‖ name ‖ value)*
//! 0x0d string-ascii u32 len ‖ bytes
//! 0x0e string-utf8  u32 len ‖ bytes
//! ```
//!
//! `Display` renders Clarity source syntax (`u100`, `(err u100)`,
//! `(tuple (shares u5))`), which is also what error messages from the
//! vault look like. The error translator matches against that text.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::address::{AddressError, ContractId, StacksAddress};

/// Guards against hostile length prefixes.
const MAX_VALUE_SIZE: usize = 1024 * 1024;

/// Nesting limit, same as the Clarity VM.
const MAX_DEPTH: usize = 32;

mod type_id {
    pub const INT: u8 = 0x00;
    pub const UINT: u8 = 0x01;
    pub const BUFFER: u8 = 0x02;
    pub const BOOL_TRUE: u8 = 0x03;
    pub const BOOL_FALSE: u8 = 0x04;
    pub const PRINCIPAL_STANDARD: u8 = 0x05;
    pub const PRINCIPAL_CONTRACT: u8 = 0x06;
    pub const RESPONSE_OK: u8 = 0x07;
    pub const RESPONSE_ERR: u8 = 0x08;
    pub const OPTIONAL_NONE: u8 = 0x09;
    pub const OPTIONAL_SOME: u8 = 0x0a;
    pub const LIST: u8 = 0x0b;
    pub const TUPLE: u8 = 0x0c;
    pub const STRING_ASCII: u8 = 0x0d;
    pub const STRING_UTF8: u8 = 0x0e;
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClarityError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),

    #[error("unknown type prefix 0x{0:02x}")]
    UnknownType(u8),

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    #[error("length {0} exceeds limit")]
    TooLarge(usize),

    #[error("nesting deeper than 32 levels")]
    TooDeep,

    #[error("invalid text payload: {0}")]
    BadText(String),

    #[error("invalid hex: {0}")]
    BadHex(String),

    #[error("invalid principal: {0}")]
    BadPrincipal(#[from] AddressError),

    #[error("expected {expected}, found {found}")]
    Shape { expected: &'static str, found: String },
}

// ---------------------------------------------------------------------------
// ClarityValue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarityValue {
    Int(i128),
    UInt(u128),
    Buffer(Vec<u8>),
    Bool(bool),
    StandardPrincipal(StacksAddress),
    ContractPrincipal(StacksAddress, String),
    ResponseOk(Box<ClarityValue>),
    ResponseErr(Box<ClarityValue>),
    OptionalNone,
    OptionalSome(Box<ClarityValue>),
    List(Vec<ClarityValue>),
    Tuple(BTreeMap<String, ClarityValue>),
    StringAscii(String),
    StringUtf8(String),
}

impl ClarityValue {
    /// A standard principal from its c32 text.
    pub fn principal(address: &str) -> Result<Self, ClarityError> {
        Ok(ClarityValue::StandardPrincipal(address.parse()?))
    }

    /// A contract principal from a [`ContractId`].
    pub fn contract_principal(id: &ContractId) -> Result<Self, ClarityError> {
        Ok(ClarityValue::ContractPrincipal(
            id.address.parse()?,
            id.name.clone(),
        ))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ClarityValue::Int(_) => "int",
            ClarityValue::UInt(_) => "uint",
            ClarityValue::Buffer(_) => "buffer",
            ClarityValue::Bool(_) => "bool",
            ClarityValue::StandardPrincipal(_) | ClarityValue::ContractPrincipal(..) => {
                "principal"
            }
            ClarityValue::ResponseOk(_) | ClarityValue::ResponseErr(_) => "response",
            ClarityValue::OptionalNone | ClarityValue::OptionalSome(_) => "optional",
            ClarityValue::List(_) => "list",
            ClarityValue::Tuple(_) => "tuple",
            ClarityValue::StringAscii(_) => "string-ascii",
            ClarityValue::StringUtf8(_) => "string-utf8",
        }
    }

    /// Strips one `(ok …)` wrapper if present. `(err …)` is returned as is.
    pub fn unwrap_ok(self) -> ClarityValue {
        match self {
            ClarityValue::ResponseOk(inner) => *inner,
            other => other,
        }
    }

    pub fn expect_uint(&self) -> Result<u128, ClarityError> {
        match self {
            ClarityValue::UInt(v) => Ok(*v),
            other => Err(other.shape_error("uint")),
        }
    }

    /// Looks up a tuple field.
    pub fn field(&self, name: &str) -> Result<&ClarityValue, ClarityError> {
        match self {
            ClarityValue::Tuple(fields) => fields.get(name).ok_or_else(|| ClarityError::Shape {
                expected: "tuple field",
                found: format!("tuple without '{}'", name),
            }),
            other => Err(other.shape_error("tuple")),
        }
    }

    fn shape_error(&self, expected: &'static str) -> ClarityError {
        ClarityError::Shape {
            expected,
            found: self.type_name().to_string(),
        }
    }

    // -- encoding -----------------------------------------------------------

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }

    /// `0x`-prefixed hex, the form the call-read endpoint expects.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.serialize()))
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            ClarityValue::Int(v) => {
                out.push(type_id::INT);
                out.extend_from_slice(&v.to_be_bytes());
            }
            ClarityValue::UInt(v) => {
                out.push(type_id::UINT);
                out.extend_from_slice(&v.to_be_bytes());
            }
            ClarityValue::Buffer(bytes) => {
                out.push(type_id::BUFFER);
                write_len_prefixed(out, bytes);
            }
            ClarityValue::Bool(true) => out.push(type_id::BOOL_TRUE),
            ClarityValue::Bool(false) => out.push(type_id::BOOL_FALSE),
            ClarityValue::StandardPrincipal(addr) => {
                out.push(type_id::PRINCIPAL_STANDARD);
                out.push(addr.version());
                out.extend_from_slice(addr.hash160());
            }
            ClarityValue::ContractPrincipal(addr, name) => {
                out.push(type_id::PRINCIPAL_CONTRACT);
                out.push(addr.version());
                out.extend_from_slice(addr.hash160());
                out.push(name.len() as u8);
                out.extend_from_slice(name.as_bytes());
            }
            ClarityValue::ResponseOk(inner) => {
                out.push(type_id::RESPONSE_OK);
                inner.write_to(out);
            }
            ClarityValue::ResponseErr(inner) => {
                out.push(type_id::RESPONSE_ERR);
                inner.write_to(out);
            }
            ClarityValue::OptionalNone => out.push(type_id::OPTIONAL_NONE),
            ClarityValue::OptionalSome(inner) => {
                out.push(type_id::OPTIONAL_SOME);
                inner.write_to(out);
            }
            ClarityValue::List(items) => {
                out.push(type_id::LIST);
                out.extend_from_slice(&(items.len() as u32).to_be_bytes());
                for item in items {
                    item.write_to(out);
                }
            }
            ClarityValue::Tuple(fields) => {
                out.push(type_id::TUPLE);
                out.extend_from_slice(&(fields.len() as u32).to_be_bytes());
                // BTreeMap iteration is already in the lexicographic order
                // the node requires.
                for (name, value) in fields {
                    out.push(name.len() as u8);
                    out.extend_from_slice(name.as_bytes());
                    value.write_to(out);
                }
            }
            ClarityValue::StringAscii(s) => {
                out.push(type_id::STRING_ASCII);
                write_len_prefixed(out, s.as_bytes());
            }
            ClarityValue::StringUtf8(s) => {
                out.push(type_id::STRING_UTF8);
                write_len_prefixed(out, s.as_bytes());
            }
        }
    }

    // -- decoding -----------------------------------------------------------

    /// Decodes exactly one value; trailing bytes are an error.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, ClarityError> {
        let mut reader = Reader { bytes, pos: 0 };
        let value = reader.value(0)?;
        let rest = bytes.len() - reader.pos;
        if rest != 0 {
            return Err(ClarityError::TrailingBytes(rest));
        }
        Ok(value)
    }

    /// Accepts hex with or without the `0x` prefix.
    pub fn from_hex(text: &str) -> Result<Self, ClarityError> {
        let digits = text.strip_prefix("0x").unwrap_or(text);
        let bytes = hex::decode(digits).map_err(|e| ClarityError::BadHex(e.to_string()))?;
        Self::deserialize(&bytes)
    }
}

fn write_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ClarityError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(ClarityError::UnexpectedEof(self.pos))?;
        let bytes = self.bytes;
        let slice = &bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ClarityError> {
        Ok(self.take(1)?[0])
    }

    fn u32_len(&mut self) -> Result<usize, ClarityError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        let len = u32::from_be_bytes(buf) as usize;
        if len > MAX_VALUE_SIZE {
            return Err(ClarityError::TooLarge(len));
        }
        Ok(len)
    }

    fn u128_bytes(&mut self) -> Result<[u8; 16], ClarityError> {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(self.take(16)?);
        Ok(buf)
    }

    fn address(&mut self) -> Result<StacksAddress, ClarityError> {
        let version = self.u8()?;
        let mut hash160 = [0u8; 20];
        hash160.copy_from_slice(self.take(20)?);
        Ok(StacksAddress::new(version, hash160)?)
    }

    fn text(&mut self, len: usize) -> Result<String, ClarityError> {
        let raw = self.take(len)?.to_vec();
        String::from_utf8(raw).map_err(|e| ClarityError::BadText(e.to_string()))
    }

    fn value(&mut self, depth: usize) -> Result<ClarityValue, ClarityError> {
        if depth > MAX_DEPTH {
            return Err(ClarityError::TooDeep);
        }
        let prefix = self.u8()?;
        let value = match prefix {
            type_id::INT => ClarityValue::Int(i128::from_be_bytes(self.u128_bytes()?)),
            type_id::UINT => ClarityValue::UInt(u128::from_be_bytes(self.u128_bytes()?)),
            type_id::BUFFER => {
                let len = self.u32_len()?;
                ClarityValue::Buffer(self.take(len)?.to_vec())
            }
            type_id::BOOL_TRUE => ClarityValue::Bool(true),
            type_id::BOOL_FALSE => ClarityValue::Bool(false),
            type_id::PRINCIPAL_STANDARD => ClarityValue::StandardPrincipal(self.address()?),
            type_id::PRINCIPAL_CONTRACT => {
                let addr = self.address()?;
                let len = self.u8()? as usize;
                ClarityValue::ContractPrincipal(addr, self.text(len)?)
            }
            type_id::RESPONSE_OK => ClarityValue::ResponseOk(Box::new(self.value(depth + 1)?)),
            type_id::RESPONSE_ERR => ClarityValue::ResponseErr(Box::new(self.value(depth + 1)?)),
            type_id::OPTIONAL_NONE => ClarityValue::OptionalNone,
            type_id::OPTIONAL_SOME => ClarityValue::OptionalSome(Box::new(self.value(depth + 1)?)),
            type_id::LIST => {
                let count = self.u32_len()?;
                let mut items = Vec::with_capacity(count.min(256));
                for _ in 0..count {
                    items.push(self.value(depth + 1)?);
                }
                ClarityValue::List(items)
            }
            type_id::TUPLE => {
                let count = self.u32_len()?;
                let mut fields = BTreeMap::new();
                for _ in 0..count {
                    let len = self.u8()? as usize;
                    let name = self.text(len)?;
                    fields.insert(name, self.value(depth + 1)?);
                }
                ClarityValue::Tuple(fields)
            }
            type_id::STRING_ASCII => {
                let len = self.u32_len()?;
                let s = self.text(len)?;
                if !s.is_ascii() {
                    return Err(ClarityError::BadText("non-ascii in string-ascii".into()));
                }
                ClarityValue::StringAscii(s)
            }
            type_id::STRING_UTF8 => {
                let len = self.u32_len()?;
                ClarityValue::StringUtf8(self.text(len)?)
            }
            other => return Err(ClarityError::UnknownType(other)),
        };
        Ok(value)
    }
}

impl fmt::Display for ClarityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClarityValue::Int(v) => write!(f, "{}", v),
            ClarityValue::UInt(v) => write!(f, "u{}", v),
            ClarityValue::Buffer(b) => write!(f, "0x{}", hex::encode(b)),
            ClarityValue::Bool(b) => write!(f, "{}", b),
            ClarityValue::StandardPrincipal(a) => write!(f, "'{}", a),
            ClarityValue::ContractPrincipal(a, name) => write!(f, "'{}.{}", a, name),
            ClarityValue::ResponseOk(v) => write!(f, "(ok {})", v),
            ClarityValue::ResponseErr(v) => write!(f, "(err {})", v),
            ClarityValue::OptionalNone => write!(f, "none"),
            ClarityValue::OptionalSome(v) => write!(f, "(some {})", v),
            ClarityValue::List(items) => {
                write!(f, "(list")?;
                for item in items {
                    write!(f, " {}", item)?;
                }
                write!(f, ")")
            }
            ClarityValue::Tuple(fields) => {
                write!(f, "(tuple")?;
                for (name, value) in fields {
                    write!(f, " ({} {})", name, value)?;
                }
                write!(f, ")")
            }
            ClarityValue::StringAscii(s) => write!(f, "{:?}", s),
            ClarityValue::StringUtf8(s) => write!(f, "u{:?}", s),
        }
    }
}
