//! Type-directed decoding of PostgreSQL values.
//!
//! Each supported Rust type implements [`Decode`], which declares the byte
//! lengths its binary form may have and how to read it from either wire
//! format. The requested type picks the implementation at compile time;
//! downstream crates add types by implementing the trait.
//!
//! Reference: https://www.postgresql.org/docs/current/protocol-overview.html#PROTOCOL-FORMAT-CODES

mod temporal;

use uuid::Uuid;

use crate::error::{Error, Result};

/// Decoder for one Rust type.
///
/// `decode_binary` may assume the caller already checked the length against
/// `MIN_SIZE..=MAX_SIZE`, but must still fail cleanly rather than panic when
/// it is called without that check.
pub trait Decode<'r>: Sized {
    /// Smallest legal length of the binary form.
    const MIN_SIZE: usize;
    /// Largest legal length of the binary form.
    const MAX_SIZE: usize;
    /// Whether a NULL cell has a representation in this type.
    const NULLABLE: bool = false;

    fn decode_binary(bytes: &'r [u8]) -> Result<Self>;

    fn decode_text(text: &'r str) -> Result<Self>;

    /// Value for a NULL cell.
    fn decode_null() -> Result<Self> {
        Err(Error::InvalidData("NULL value for non-nullable type".to_string()))
    }
}

/// Exactly `N` bytes, or an error naming the actual length.
#[inline]
pub(crate) fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| {
        Error::InvalidData(format!("expected {} bytes, got {}", N, bytes.len()))
    })
}

// ============================================================================
// Numbers
// ============================================================================

macro_rules! impl_decode_number {
    ($($ty:ty => $target:literal),* $(,)?) => {
        $(
            impl<'r> Decode<'r> for $ty {
                const MIN_SIZE: usize = std::mem::size_of::<$ty>();
                const MAX_SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn decode_binary(bytes: &'r [u8]) -> Result<Self> {
                    Ok(<$ty>::from_be_bytes(fixed(bytes)?))
                }

                fn decode_text(text: &'r str) -> Result<Self> {
                    text.trim()
                        .parse()
                        .map_err(|_| Error::parse(text, $target, "invalid number"))
                }
            }
        )*
    };
}

impl_decode_number! {
    i16 => "int2",
    i32 => "int4",
    i64 => "int8",
    f32 => "float4",
    f64 => "float8",
}

impl<'r> Decode<'r> for bool {
    const MIN_SIZE: usize = 1;
    const MAX_SIZE: usize = 1;

    fn decode_binary(bytes: &'r [u8]) -> Result<Self> {
        let [b] = fixed::<1>(bytes)?;
        Ok(b != 0)
    }

    fn decode_text(text: &'r str) -> Result<Self> {
        match text {
            "t" | "true" | "1" => Ok(true),
            "f" | "false" | "0" => Ok(false),
            _ => Err(Error::parse(text, "bool", "expected t or f")),
        }
    }
}

// ============================================================================
// Text and bytes
// ============================================================================

impl<'r> Decode<'r> for &'r str {
    const MIN_SIZE: usize = 0;
    const MAX_SIZE: usize = usize::MAX;

    fn decode_binary(bytes: &'r [u8]) -> Result<Self> {
        std::str::from_utf8(bytes)
            .map_err(|e| Error::InvalidData(format!("Invalid UTF-8 in TEXT: {}", e)))
    }

    #[inline]
    fn decode_text(text: &'r str) -> Result<Self> {
        Ok(text)
    }
}

impl<'r> Decode<'r> for String {
    const MIN_SIZE: usize = 0;
    const MAX_SIZE: usize = usize::MAX;

    fn decode_binary(bytes: &'r [u8]) -> Result<Self> {
        <&str>::decode_binary(bytes).map(str::to_owned)
    }

    fn decode_text(text: &'r str) -> Result<Self> {
        Ok(text.to_owned())
    }
}

/// Raw cell bytes in either format; no bytea unescaping.
impl<'r> Decode<'r> for &'r [u8] {
    const MIN_SIZE: usize = 0;
    const MAX_SIZE: usize = usize::MAX;

    #[inline]
    fn decode_binary(bytes: &'r [u8]) -> Result<Self> {
        Ok(bytes)
    }

    #[inline]
    fn decode_text(text: &'r str) -> Result<Self> {
        Ok(text.as_bytes())
    }
}

/// bytea; the text form is unescaped from `\x` hex.
impl<'r> Decode<'r> for Vec<u8> {
    const MIN_SIZE: usize = 0;
    const MAX_SIZE: usize = usize::MAX;

    fn decode_binary(bytes: &'r [u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }

    fn decode_text(text: &'r str) -> Result<Self> {
        let Some(hex) = text.strip_prefix("\\x") else {
            return Ok(text.as_bytes().to_vec());
        };
        if hex.len() % 2 != 0 {
            return Err(Error::parse(text, "bytea", "odd number of hex digits"));
        }
        hex.as_bytes()
            .chunks(2)
            .map(|pair| {
                let digit = |c: u8| (c as char).to_digit(16);
                match (digit(pair[0]), digit(pair[1])) {
                    (Some(hi), Some(lo)) => Ok((hi * 16 + lo) as u8),
                    _ => Err(Error::parse(text, "bytea", "invalid hex digit")),
                }
            })
            .collect()
    }
}

// ============================================================================
// UUID and JSON
// ============================================================================

impl<'r> Decode<'r> for Uuid {
    const MIN_SIZE: usize = 16;
    const MAX_SIZE: usize = 16;

    fn decode_binary(bytes: &'r [u8]) -> Result<Self> {
        Ok(Uuid::from_bytes(fixed(bytes)?))
    }

    fn decode_text(text: &'r str) -> Result<Self> {
        Uuid::parse_str(text).map_err(|_| Error::parse(text, "uuid", "invalid uuid"))
    }
}

/// JSONB version byte prefixed to binary jsonb values.
const JSONB_VERSION: u8 = 1;

/// json or jsonb. A binary jsonb payload starts with version byte 1, which can
/// never start a JSON text, so both are accepted.
impl<'r> Decode<'r> for serde_json::Value {
    const MIN_SIZE: usize = 1;
    const MAX_SIZE: usize = usize::MAX;

    fn decode_binary(bytes: &'r [u8]) -> Result<Self> {
        let json = match bytes.split_first() {
            Some((&JSONB_VERSION, rest)) => rest,
            _ => bytes,
        };
        serde_json::from_slice(json).map_err(|e| Error::InvalidData(format!("Invalid JSON: {}", e)))
    }

    fn decode_text(text: &'r str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::InvalidData(format!("Invalid JSON: {}", e)))
    }
}

// ============================================================================
// Nullable
// ============================================================================

/// NULL decodes to `None`. A zero-length binary cell is also `None` for types
/// whose binary form cannot be empty.
impl<'r, T: Decode<'r>> Decode<'r> for Option<T> {
    const MIN_SIZE: usize = T::MIN_SIZE;
    const MAX_SIZE: usize = T::MAX_SIZE;
    const NULLABLE: bool = true;

    fn decode_binary(bytes: &'r [u8]) -> Result<Self> {
        if bytes.is_empty() && T::MIN_SIZE > 0 {
            return Ok(None);
        }
        T::decode_binary(bytes).map(Some)
    }

    fn decode_text(text: &'r str) -> Result<Self> {
        T::decode_text(text).map(Some)
    }

    fn decode_null() -> Result<Self> {
        Ok(None)
    }
}
