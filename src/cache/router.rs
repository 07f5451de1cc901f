//! Key Router Module
//!
//! Maps a key to one of N shards by hashing a byte representation of it.
//!
//! Keys describe themselves through [`RouteKey`], which hands back one of a
//! small closed set of representations:
//!
//! 1. [`KeyRepr::Bytes`] - raw bytes the key already holds, or the
//!    little-endian fixed-width encoding of numbers, booleans and sequences
//!    of them
//! 2. [`KeyRepr::Text`] - a textual rendering of the key
//! 3. [`KeyRepr::Encoded`] - the output of the generic structural encoder
//!    (`serde_json`), reached through [`Encoded`] or [`KeyRepr::encode`]
//!
//! The encoder is the only fallible step. When it cannot represent a key the
//! whole operation fails with [`CacheError::UnencodableKey`] instead of
//! routing the key somewhere arbitrary.
//!
//! The shard index is `hash & (shards - 1)` when the shard count is a power
//! of two, and `hash % shards` otherwise. It is a pure function of the key
//! bytes and the shard count.

use std::borrow::Cow;
use std::hash::Hasher;
use std::sync::Arc;

use fnv::FnvHasher;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

// == Key Representation ==
/// Byte-level description of a key, used only for routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRepr<'a> {
    /// Raw or fixed-width numeric bytes
    Bytes(Cow<'a, [u8]>),
    /// Textual representation
    Text(Cow<'a, str>),
    /// Generic encoder output
    Encoded(Vec<u8>),
}

impl<'a> KeyRepr<'a> {
    /// Encodes any serializable value with the generic fallback encoder.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<KeyRepr<'static>> {
        serde_json::to_vec(value)
            .map(KeyRepr::Encoded)
            .map_err(|source| CacheError::UnencodableKey {
                type_name: std::any::type_name::<T>(),
                source,
            })
    }

    /// Renders a key through its `Display` implementation.
    pub fn display<T: std::fmt::Display + ?Sized>(value: &T) -> KeyRepr<'static> {
        KeyRepr::Text(Cow::Owned(value.to_string()))
    }

    /// The bytes fed to the hash.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            KeyRepr::Bytes(bytes) => &**bytes,
            KeyRepr::Text(text) => text.as_bytes(),
            KeyRepr::Encoded(bytes) => bytes.as_slice(),
        }
    }
}

// == Route Key ==
/// A key the router knows how to turn into bytes.
///
/// A type used as a cache key and every form it is looked up by through
/// `Borrow` must produce the same representation, otherwise lookups would
/// land on the wrong shard. The provided impls for `String`/`str`,
/// `Vec<T>`/`[T]` and the smart pointers honour this.
pub trait RouteKey {
    /// Returns the representation to hash.
    fn key_repr(&self) -> Result<KeyRepr<'_>>;
}

/// Primitive types with a native little-endian encoding.
pub trait FixedWidth: Copy {
    /// Appends the little-endian bytes of `self` to `out`.
    fn write_le(&self, out: &mut Vec<u8>);
}

macro_rules! fixed_width {
    ($($t:ty),* $(,)?) => {
        $(
            impl FixedWidth for $t {
                fn write_le(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }

            impl RouteKey for $t {
                fn key_repr(&self) -> Result<KeyRepr<'_>> {
                    Ok(KeyRepr::Bytes(Cow::Owned(self.to_le_bytes().to_vec())))
                }
            }
        )*
    };
}

fixed_width!(i8, u8, i16, u16, i32, u32, i64, u64, i128, u128);

// usize/isize are widened so routing does not depend on the target's word size
impl FixedWidth for usize {
    fn write_le(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(*self as u64).to_le_bytes());
    }
}

impl FixedWidth for isize {
    fn write_le(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(*self as i64).to_le_bytes());
    }
}

impl FixedWidth for bool {
    fn write_le(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }
}

impl FixedWidth for char {
    fn write_le(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&u32::from(*self).to_le_bytes());
    }
}

macro_rules! fixed_width_scalar {
    ($($t:ty),* $(,)?) => {
        $(
            impl RouteKey for $t {
                fn key_repr(&self) -> Result<KeyRepr<'_>> {
                    let mut out = Vec::with_capacity(std::mem::size_of::<$t>());
                    self.write_le(&mut out);
                    Ok(KeyRepr::Bytes(Cow::Owned(out)))
                }
            }
        )*
    };
}

fixed_width_scalar!(usize, isize, bool, char);

impl<T: FixedWidth> RouteKey for [T] {
    fn key_repr(&self) -> Result<KeyRepr<'_>> {
        let mut out = Vec::with_capacity(std::mem::size_of_val(self));
        for item in self {
            item.write_le(&mut out);
        }
        Ok(KeyRepr::Bytes(Cow::Owned(out)))
    }
}

impl<T: FixedWidth> RouteKey for Vec<T> {
    fn key_repr(&self) -> Result<KeyRepr<'_>> {
        self.as_slice().key_repr()
    }
}

impl<T: FixedWidth, const N: usize> RouteKey for [T; N] {
    fn key_repr(&self) -> Result<KeyRepr<'_>> {
        self.as_slice().key_repr()
    }
}

impl RouteKey for str {
    fn key_repr(&self) -> Result<KeyRepr<'_>> {
        Ok(KeyRepr::Text(Cow::Borrowed(self)))
    }
}

impl RouteKey for String {
    fn key_repr(&self) -> Result<KeyRepr<'_>> {
        self.as_str().key_repr()
    }
}

impl<T: RouteKey + ?Sized> RouteKey for &T {
    fn key_repr(&self) -> Result<KeyRepr<'_>> {
        (**self).key_repr()
    }
}

impl<T: RouteKey + ?Sized> RouteKey for Box<T> {
    fn key_repr(&self) -> Result<KeyRepr<'_>> {
        (**self).key_repr()
    }
}

impl<T: RouteKey + ?Sized> RouteKey for Arc<T> {
    fn key_repr(&self) -> Result<KeyRepr<'_>> {
        (**self).key_repr()
    }
}

// == Encoded Wrapper ==
/// Routes an arbitrary serializable key through the generic encoder.
///
/// This is the slow path: prefer implementing [`RouteKey`] with bytes or
/// text when the key type allows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Encoded<T>(pub T);

impl<T: Serialize> RouteKey for Encoded<T> {
    fn key_repr(&self) -> Result<KeyRepr<'_>> {
        KeyRepr::encode(&self.0)
    }
}

// == Key Router ==
/// Deterministic key-to-shard mapping for a fixed shard count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRouter {
    shards: usize,
}

impl KeyRouter {
    /// Creates a router over `shards` shards.
    pub fn new(shards: usize) -> Result<Self> {
        if shards < 1 {
            return Err(CacheError::InvalidConfig(format!(
                "the number of shards must be at least 1, got {}",
                shards
            )));
        }
        Ok(Self { shards })
    }

    pub fn shard_count(&self) -> usize {
        self.shards
    }

    /// Returns the shard index for `key`.
    pub fn shard_for<Q: RouteKey + ?Sized>(&self, key: &Q) -> Result<usize> {
        let repr = key.key_repr()?;
        Ok(self.index_of(hash32(repr.as_bytes())))
    }

    fn index_of(&self, hash: u32) -> usize {
        let hash = hash as usize;
        if self.shards.is_power_of_two() {
            hash & (self.shards - 1)
        } else {
            hash % self.shards
        }
    }
}

/// 64-bit FNV-1a of `bytes`, folded to 32 bits as `h ^ (h >> 32)`.
///
/// This is not the 32-bit FNV-1a variant; shard indexes differ from it.
pub fn hash32(bytes: &[u8]) -> u32 {
    let mut hasher = FnvHasher::default();
    hasher.write(bytes);
    let h = hasher.finish();
    (h ^ (h >> 32)) as u32
}
