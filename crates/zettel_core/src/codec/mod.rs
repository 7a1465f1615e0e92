//! Text codec between `Note` values and markdown files.
//!
//! # Responsibility
//! - Encode a note as a YAML header block plus markdown body.
//! - Decode tolerant of partial input, reporting substitutions as warnings.
//!
//! # Invariants
//! - `encode(decode(encode(n))) == encode(n)` when `n.content` has no
//!   `## Links` heading.
//! - Decoding never fails on unknown enum values under the default policy.

pub mod frontmatter;
pub mod links;
pub mod markdown;

pub use markdown::{
    decode, decode_file, encode, DecodeError, DecodeOptions, DecodeResult, Decoded, Origin,
};
