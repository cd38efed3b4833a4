//! # Stacks Addresses
//!
//! Two layers live here:
//!
//! - [`is_valid_address`]: the cheap shape check the dashboard runs before
//!   fetching a balance. It is advisory: balance lookups log a warning and
//!   carry on when it fails.
//! - [`StacksAddress`]: the real c32check codec. Contract calls need the
//!   version byte and hash160 behind an address to serialize a principal,
//!   so this one is strict and verifies the checksum.
//!
//! A c32check address is `S` + one c32 character for the version byte +
//! c32(hash160 ‖ checksum), where the checksum is the first four bytes of
//! `sha256(sha256(version ‖ hash160))`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Crockford-style base32 alphabet used by c32check.
const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Base58 alphabet; the strict branch of the shape check.
const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Shortest accepted address.
pub const ADDRESS_MIN_LEN: usize = 39;

/// Longest accepted address. Single-sig mainnet/testnet addresses are 41.
pub const ADDRESS_MAX_LEN: usize = 41;

const HASH160_LEN: usize = 20;
const CHECKSUM_LEN: usize = 4;

/// Longest contract name Clarity accepts.
pub const MAX_CONTRACT_NAME_LEN: usize = 128;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,

    #[error("address must start with 'S'")]
    MissingPrefix,

    #[error("address length {0} outside 39..=41")]
    BadLength(usize),

    #[error("invalid c32 character '{0}'")]
    InvalidCharacter(char),

    #[error("decoded payload is {0} bytes, expected 24")]
    BadPayload(usize),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("version {0} does not fit in one c32 character")]
    BadVersion(u8),

    #[error("contract identifier must be '<address>.<name>': {0}")]
    BadContractId(String),
}

// ---------------------------------------------------------------------------
// Shape Check
// ---------------------------------------------------------------------------

/// Returns `true` when `address` looks like a Stacks address.
///
/// `S` prefix, length within [`ADDRESS_MIN_LEN`]`..=`[`ADDRESS_MAX_LEN`],
/// and a Base58 tail. c32 addresses routinely contain `0`, which Base58
/// lacks, so a failed strict check falls back to plain ASCII alphanumerics.
pub fn is_valid_address(address: &str) -> bool {
    validate_address(address).is_ok()
}

/// [`is_valid_address`] with the reason for rejection.
pub fn validate_address(address: &str) -> Result<(), AddressError> {
    if address.is_empty() {
        return Err(AddressError::Empty);
    }
    let len = address.chars().count();
    if !(ADDRESS_MIN_LEN..=ADDRESS_MAX_LEN).contains(&len) {
        return Err(AddressError::BadLength(len));
    }
    let tail = address
        .strip_prefix('S')
        .ok_or(AddressError::MissingPrefix)?;

    let strict = tail.chars().all(|c| BASE58_ALPHABET.contains(c));
    if strict {
        return Ok(());
    }
    match tail.chars().find(|c| !c.is_ascii_alphanumeric()) {
        Some(c) => Err(AddressError::InvalidCharacter(c)),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// c32 Codec
// ---------------------------------------------------------------------------

fn c32_index(c: char) -> Option<u32> {
    let c = match c.to_ascii_uppercase() {
        'O' => '0',
        'L' | 'I' => '1',
        other => other,
    };
    C32_ALPHABET
        .iter()
        .position(|&b| b as char == c)
        .map(|i| i as u32)
}

/// Encodes bytes as c32. Each leading zero byte becomes one `'0'`.
pub fn c32_encode(bytes: &[u8]) -> String {
    let mut out = Vec::with_capacity(bytes.len() * 8 / 5 + 1);
    let mut acc: u32 = 0;
    let mut bits = 0;

    for &b in bytes.iter().rev() {
        acc |= (b as u32) << bits;
        bits += 8;
        while bits >= 5 {
            out.push(C32_ALPHABET[(acc & 31) as usize]);
            acc >>= 5;
            bits -= 5;
        }
    }
    if bits > 0 {
        out.push(C32_ALPHABET[(acc & 31) as usize]);
    }
    while out.last() == Some(&b'0') {
        out.pop();
    }
    for _ in bytes.iter().take_while(|&&b| b == 0) {
        out.push(b'0');
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Decodes c32 text. Each leading `'0'` becomes one zero byte.
pub fn c32_decode(input: &str) -> Result<Vec<u8>, AddressError> {
    let mut bytes = Vec::with_capacity(input.len() * 5 / 8 + 1);
    let mut acc: u32 = 0;
    let mut bits = 0;

    for c in input.chars().rev() {
        let v = c32_index(c).ok_or(AddressError::InvalidCharacter(c))?;
        acc |= v << bits;
        bits += 5;
        while bits >= 8 {
            bytes.push((acc & 0xff) as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 && acc != 0 {
        bytes.push(acc as u8);
    }
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    let leading_zeros = input.chars().take_while(|&c| c == '0').count();
    bytes.extend(std::iter::repeat(0).take(leading_zeros));
    bytes.reverse();
    Ok(bytes)
}

fn checksum(version: u8, hash160: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut first = Sha256::new();
    first.update([version]);
    first.update(hash160);
    let second = Sha256::digest(first.finalize());
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&second[..CHECKSUM_LEN]);
    out
}

// ---------------------------------------------------------------------------
// StacksAddress
// ---------------------------------------------------------------------------

/// A decoded standard principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StacksAddress {
    version: u8,
    hash160: [u8; HASH160_LEN],
}

impl StacksAddress {
    pub fn new(version: u8, hash160: [u8; HASH160_LEN]) -> Result<Self, AddressError> {
        if version >= 32 {
            return Err(AddressError::BadVersion(version));
        }
        Ok(Self { version, hash160 })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn hash160(&self) -> &[u8; HASH160_LEN] {
        &self.hash160
    }
}

impl FromStr for StacksAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix('S').ok_or(AddressError::MissingPrefix)?;
        let mut chars = rest.chars();
        let version_char = chars.next().ok_or(AddressError::BadLength(s.len()))?;
        let version =
            c32_index(version_char).ok_or(AddressError::InvalidCharacter(version_char))? as u8;

        let payload = c32_decode(chars.as_str())?;
        if payload.len() != HASH160_LEN + CHECKSUM_LEN {
            return Err(AddressError::BadPayload(payload.len()));
        }
        let (hash, check) = payload.split_at(HASH160_LEN);
        if checksum(version, hash).as_slice() != check {
            return Err(AddressError::ChecksumMismatch);
        }

        let mut hash160 = [0u8; HASH160_LEN];
        hash160.copy_from_slice(hash);
        Self::new(version, hash160)
    }
}

impl fmt::Display for StacksAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = self.hash160.to_vec();
        payload.extend_from_slice(&checksum(self.version, &self.hash160));
        write!(
            f,
            "S{}{}",
            C32_ALPHABET[self.version as usize] as char,
            c32_encode(&payload)
        )
    }
}

// ---------------------------------------------------------------------------
// ContractId
// ---------------------------------------------------------------------------

/// `<deployer address>.<contract name>`, e.g. `ST1…QE.zeref-vault`.
///
/// The deployer is kept as text; it is decoded only when a contract
/// principal has to be serialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractId {
    pub address: String,
    pub name: String,
}

impl ContractId {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }
}

impl FromStr for ContractId {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, name) = s
            .split_once('.')
            .ok_or_else(|| AddressError::BadContractId(s.to_string()))?;
        let name_ok = !name.is_empty()
            && name.len() <= MAX_CONTRACT_NAME_LEN
            && name.starts_with(|c: char| c.is_ascii_alphabetic())
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if address.is_empty() || !name_ok {
            return Err(AddressError::BadContractId(s.to_string()));
        }
        Ok(Self::new(address, name))
    }
}

impl TryFrom<String> for ContractId {
    type Error = AddressError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ContractId> for String {
    fn from(id: ContractId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.address, self.name)
    }
}
