//! Descriptor blobs: what the user copies, pastes or scans.
//!
//! Two renderings of the same [`SessionDescriptor`]:
//! - `Json`: `{"type":"offer","sdp":"..."}`
//! - `Compact`: the same JSON, gzip-compressed, base64-encoded
//!
//! Decoding accepts either and tells them apart by the leading `{`.

use crate::config::DescriptorFormat;
use crate::error::PeerError;
use crate::peer::types::SessionDescriptor;
use base64::{engine::general_purpose, Engine as _};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::io::{self, Read, Write};

/// Upper bound on inflated compact descriptors (zip-bomb guard).
const MAX_DECOMPRESSED_SIZE: u64 = 256 * 1024;

pub fn encode(desc: &SessionDescriptor, format: DescriptorFormat) -> io::Result<String> {
    let json = serde_json::to_string(desc)?;
    match format {
        DescriptorFormat::Json => Ok(json),
        DescriptorFormat::Compact => {
            let mut gz = GzEncoder::new(Vec::new(), Compression::best());
            gz.write_all(json.as_bytes())?;
            let compressed = gz.finish()?;
            Ok(general_purpose::STANDARD.encode(compressed))
        }
    }
}

pub fn decode(blob: &str) -> Result<SessionDescriptor, PeerError> {
    let blob = blob.trim();
    if blob.is_empty() {
        return Err(PeerError::InvalidDescriptor("descriptor is empty".into()));
    }

    if blob.starts_with('{') {
        return parse_json(blob.as_bytes());
    }

    let compressed = general_purpose::STANDARD
        .decode(blob)
        .map_err(|e| PeerError::InvalidDescriptor(format!("not JSON and not base64: {e}")))?;

    let mut json = Vec::new();
    GzDecoder::new(&compressed[..])
        .take(MAX_DECOMPRESSED_SIZE + 1)
        .read_to_end(&mut json)
        .map_err(|e| PeerError::InvalidDescriptor(format!("cannot inflate descriptor: {e}")))?;
    if json.len() as u64 > MAX_DECOMPRESSED_SIZE {
        return Err(PeerError::InvalidDescriptor(format!(
            "descriptor inflates past {MAX_DECOMPRESSED_SIZE} bytes"
        )));
    }

    parse_json(&json)
}

fn parse_json(bytes: &[u8]) -> Result<SessionDescriptor, PeerError> {
    serde_json::from_slice(bytes).map_err(|e| PeerError::InvalidDescriptor(e.to_string()))
}
