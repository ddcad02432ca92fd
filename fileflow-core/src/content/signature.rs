//! Content signature generation
//!
//! Text files are fingerprinted by term frequency; every other type by a SHA-256
//! digest of the full byte stream.

use super::{ContentError, ContentSignature, Result, SignatureType, mime};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;
use uuid::Uuid;

const READ_CHUNK: usize = 8192;
/// Bytes buffered without whitespace before they are counted as one token
const MAX_PENDING: usize = 64 * 1024;

/// Limits applied when building text signatures
#[derive(Debug, Clone)]
pub struct SignatureLimits {
    /// Whitespace-delimited tokens scanned before stopping
    pub max_tokens: usize,
    /// Terms kept in the serialized frequency map
    pub signature_terms: usize,
    pub keywords: usize,
    /// Tokens of this many bytes or fewer are skipped
    pub min_token_len: usize,
}

impl Default for SignatureLimits {
    fn default() -> Self {
        Self {
            max_tokens: 10_000,
            signature_terms: 100,
            keywords: 20,
            min_token_len: 2,
        }
    }
}

/// Produces content signatures for files
#[derive(Debug, Clone, Default)]
pub struct SignatureGenerator {
    limits: SignatureLimits,
}

impl SignatureGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: SignatureLimits) -> Self {
        Self { limits }
    }

    /// Analyze a file and produce a fresh signature with a new ID
    pub async fn generate(&self, path: &Path) -> Result<ContentSignature> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|_| ContentError::FileNotFound(path.to_path_buf()))?;
        if !meta.is_file() {
            return Err(ContentError::InvalidOperation(format!("{:?} is not a regular file", path)));
        }
        if meta.len() == 0 {
            return Err(ContentError::InvalidOperation(format!("{:?} is empty", path)));
        }

        let header = read_header(path).await?;
        let mime_type = mime::detect(path, &header);
        let signature_type = SignatureType::from_mime(&mime_type);
        debug!("Analyzing {:?} as {} ({})", path, signature_type.as_str(), mime_type);

        let (signature, keywords) = match signature_type {
            SignatureType::Text => self.text_signature(path).await?,
            _ => (hash_file(path).await?, Vec::new()),
        };

        let now = Utc::now();
        Ok(ContentSignature {
            id: Uuid::new_v4().to_string(),
            file_path: path.to_path_buf(),
            mime_type,
            signature_type,
            signature,
            keywords,
            file_size: meta.len(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Term-frequency payload and keywords for a text file
    async fn text_signature(&self, path: &Path) -> Result<(String, Vec<String>)> {
        let frequencies = self.term_frequencies(path).await?;
        let ranked = rank_terms(frequencies);

        let payload: BTreeMap<&str, usize> = ranked
            .iter()
            .take(self.limits.signature_terms)
            .map(|(term, count)| (term.as_str(), *count))
            .collect();
        let keywords =
            ranked.iter().take(self.limits.keywords).map(|(term, _)| term.clone()).collect();

        Ok((serde_json::to_string(&payload)?, keywords))
    }

    async fn term_frequencies(&self, path: &Path) -> Result<HashMap<String, usize>> {
        let mut file = File::open(path).await?;
        let mut frequencies = HashMap::new();
        let mut scanned = 0;
        let mut pending = Vec::with_capacity(READ_CHUNK);
        let mut chunk = vec![0u8; READ_CHUNK];

        loop {
            let read = file.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            pending.extend_from_slice(&chunk[..read]);
            // cut after the last whitespace so no token straddles two reads
            let split = match pending.iter().rposition(u8::is_ascii_whitespace) {
                Some(pos) => pos + 1,
                None if pending.len() >= MAX_PENDING => pending.len(),
                None => continue,
            };
            let complete: Vec<u8> = pending.drain(..split).collect();
            if self.count_tokens(&complete, &mut frequencies, &mut scanned) {
                return Ok(frequencies);
            }
        }
        self.count_tokens(&pending, &mut frequencies, &mut scanned);

        Ok(frequencies)
    }

    /// Returns true once the token limit is reached
    fn count_tokens(
        &self,
        bytes: &[u8],
        frequencies: &mut HashMap<String, usize>,
        scanned: &mut usize,
    ) -> bool {
        for token in String::from_utf8_lossy(bytes).split_whitespace() {
            if *scanned >= self.limits.max_tokens {
                return true;
            }
            *scanned += 1;
            let token = token.to_lowercase();
            if token.len() > self.limits.min_token_len {
                *frequencies.entry(token).or_insert(0) += 1;
            }
        }
        *scanned >= self.limits.max_tokens
    }
}

/// Sort by count descending, ties broken alphabetically so output is deterministic
fn rank_terms(frequencies: HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut ranked: Vec<(String, usize)> = frequencies.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

async fn read_header(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).await?;
    let mut header = Vec::with_capacity(mime::SNIFF_LEN);
    file.take(mime::SNIFF_LEN as u64).read_to_end(&mut header).await?;
    Ok(header)
}

/// Hex SHA-256 digest of the whole file
pub async fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
