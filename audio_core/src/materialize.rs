use std::fs;
use std::io::Write;
use std::path::Path;

use base64::{engine::general_purpose, Engine as _};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::{AudioError, AudioFormat};

/// Decode every fragment and join the bytes in order. Pure: the same input
/// always yields the same bytes. ASCII whitespace inside a fragment is ignored.
pub fn decode_fragments<S: AsRef<str>>(fragments: &[S]) -> Result<Vec<u8>, AudioError> {
    let mut out = Vec::new();
    for (index, fragment) in fragments.iter().enumerate() {
        let fragment = fragment.as_ref();
        let decoded = if fragment.bytes().any(|b| b.is_ascii_whitespace()) {
            let compact: String = fragment.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            general_purpose::STANDARD.decode(compact)
        } else {
            general_purpose::STANDARD.decode(fragment)
        };
        out.extend(decoded.map_err(|source| AudioError::Decode { index, source })?);
    }
    Ok(out)
}

/// Speech written to a temporary file. The file is removed when this value
/// is dropped, whichever way the caller leaves.
#[derive(Debug)]
pub struct MaterializedAudio {
    file: NamedTempFile,
    format: AudioFormat,
    len: usize,
}

impl MaterializedAudio {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>, AudioError> {
        Ok(fs::read(self.path())?)
    }

    /// Read the audio and delete the file.
    pub fn into_bytes(self) -> Result<Vec<u8>, AudioError> {
        let bytes = self.read_bytes()?;
        self.file.close()?;
        Ok(bytes)
    }
}

/// Decode `fragments` and persist them for playback. An empty fragment list
/// (or one that decodes to no bytes) means there is nothing to play and
/// yields `Ok(None)`.
pub fn materialize<S: AsRef<str>>(
    fragments: &[S],
    format: AudioFormat,
) -> Result<Option<MaterializedAudio>, AudioError> {
    if fragments.is_empty() {
        return Ok(None);
    }
    let bytes = decode_fragments(fragments)?;
    if bytes.is_empty() {
        return Ok(None);
    }

    let mut file = tempfile::Builder::new()
        .prefix("reply-")
        .suffix(&format!(".{}", format.extension()))
        .tempfile()?;
    file.write_all(&bytes)?;
    file.flush()?;

    debug!(
        "Materialized {} bytes of {} audio at {}",
        bytes.len(),
        format,
        file.path().display()
    );

    Ok(Some(MaterializedAudio {
        file,
        format,
        len: bytes.len(),
    }))
}
