use std::fmt;
use std::hash::Hasher;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use twox_hash::XxHash64;

use crate::ConfigError;

/// Hash functions available for image identifiers and content digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    Md5,
    Sha256,
    XxHash64,
    /// MurmurHash3, x64 128-bit variant with seed 0.
    Murmur3,
}

impl HashAlgorithm {
    /// Looks up an algorithm by name, case-insensitively.
    ///
    /// The empty name means "no hashing" and yields `Ok(None)`, which disables
    /// digesting and the image pipeline. Unknown names are refused.
    pub fn from_name(name: &str) -> Result<Option<Self>, ConfigError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let algorithm = match name.to_ascii_lowercase().as_str() {
            "md5" => Self::Md5,
            "sha256" | "sha-256" => Self::Sha256,
            "xxh64" | "xxhash64" => Self::XxHash64,
            "murmurhash3" | "murmur3" => Self::Murmur3,
            _ => return Err(ConfigError::UnknownHashAlgorithm(name.to_string())),
        };
        Ok(Some(algorithm))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha256 => "SHA-256",
            Self::XxHash64 => "xxHash64",
            Self::Murmur3 => "MurmurHash3",
        }
    }

    pub fn hasher(self) -> StreamHasher {
        match self {
            Self::Md5 => StreamHasher::Md5(md5::Context::new()),
            Self::Sha256 => StreamHasher::Sha256(Sha256::new()),
            Self::XxHash64 => StreamHasher::XxHash64(XxHash64::with_seed(0)),
            Self::Murmur3 => StreamHasher::Murmur3(Vec::new()),
        }
    }

    /// One-shot hash of `bytes`.
    pub fn hash(self, bytes: &[u8]) -> Digest {
        let mut hasher = self.hasher();
        hasher.update(bytes);
        hasher.finalize()
    }
}

/// Incremental state of one of the [`HashAlgorithm`]s.
pub enum StreamHasher {
    Md5(md5::Context),
    Sha256(Sha256),
    XxHash64(XxHash64),
    /// The murmur3 crate hashes a complete reader, so input is buffered until `finalize`.
    Murmur3(Vec<u8>),
}

impl StreamHasher {
    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Md5(ctx) => ctx.consume(bytes),
            Self::Sha256(hasher) => hasher.update(bytes),
            Self::XxHash64(hasher) => hasher.write(bytes),
            Self::Murmur3(buffer) => buffer.extend_from_slice(bytes),
        }
    }

    pub fn finalize(self) -> Digest {
        match self {
            Self::Md5(ctx) => Digest(ctx.compute().0.to_vec()),
            Self::Sha256(hasher) => Digest(hasher.finalize().to_vec()),
            Self::XxHash64(hasher) => Digest(hasher.finish().to_be_bytes().to_vec()),
            Self::Murmur3(buffer) => {
                // Reading from a slice cannot fail.
                let value = murmur3::murmur3_x64_128(&mut buffer.as_slice(), 0).unwrap_or_default();
                Digest(value.to_be_bytes().to_vec())
            }
        }
    }
}

/// Fixed-length hash value; its length depends on the algorithm that produced it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Digest(Vec<u8>);

impl Digest {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(self.0.len() * 2);
        for byte in &self.0 {
            use std::fmt::Write;
            let _ = write!(&mut hex, "{byte:02x}");
        }
        hex
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}
