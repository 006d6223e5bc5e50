//! LM-015: BLAKE3 digests for identifiers, build ids, resources and artifacts.

use std::io::Read;
use std::path::Path;

const STREAM_BUF_SIZE: usize = 65536;

/// Hex digits kept when a digest is embedded in a name.
pub const SHORT_DIGEST_LEN: usize = 16;

/// Hash a file's contents. Returns `"blake3:{hex}"`.
pub fn hash_file(path: &Path) -> Result<String, String> {
    let mut file =
        std::fs::File::open(path).map_err(|e| format!("cannot open {}: {}", path.display(), e))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; STREAM_BUF_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| format!("read error {}: {}", path.display(), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("blake3:{}", hasher.finalize().to_hex()))
}

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// Hash a JSON value in canonical (sorted-key, compact) form.
pub fn hash_json(value: &serde_json::Value) -> String {
    hash_string(&value.to_string())
}

/// Short hex digest of a sequence of parts, for embedding in names.
/// Parts are NUL-separated so `["ab", "c"]` and `["a", "bc"]` differ.
pub fn short_digest<S: AsRef<str>>(parts: &[S]) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part.as_ref().as_bytes());
        hasher.update(b"\0");
    }
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..SHORT_DIGEST_LEN].to_string()
}
