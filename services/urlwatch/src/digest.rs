//! Content digest used when caching headers cannot prove a page unchanged

use tokio::io::{AsyncRead, AsyncReadExt};

/// Bytes read from the stream per iteration
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Hash everything `reader` yields until EOF and return the hex digest.
///
/// The stream is always consumed to the end, so digesting an HTTP body also
/// drains its connection. Memory use is bounded by [`CHUNK_SIZE`].
pub async fn digest<R>(reader: &mut R) -> std::io::Result<String>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0usize;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n;
    }
    let hash = hasher.finalize().to_hex().to_string();
    tracing::trace!("Digested {} bytes -> {}", total, hash);
    Ok(hash)
}

/// Digest an in-memory buffer; matches [`digest`] over the same bytes
pub fn digest_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
