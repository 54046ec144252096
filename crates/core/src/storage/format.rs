use crate::errors::CoreError;

/// Magic bytes identifying an SMKT (stock market snapshot) file.
pub const MAGIC: &[u8; 4] = b"SMKT";

/// Current file format version.
pub const CURRENT_VERSION: u16 = 1;

/// Header size in bytes: magic(4) + version(2) + payload_len(8) = 14
pub const HEADER_SIZE: usize = 14;

/// File header read from a snapshot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u16,
    pub payload_len: u64,
}

/// Frame a serialized payload.
///
/// Layout:
/// ```text
/// [SMKT: 4B] [version: 2B LE] [payload_len: 8B LE] [payload: variable]
/// ```
pub fn write_file(version: u16, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&version.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Parse and validate the header, returning it with the payload slice.
/// Trailing bytes past the declared payload are rejected.
pub fn read_file(data: &[u8]) -> Result<(FileHeader, &[u8]), CoreError> {
    if data.len() < HEADER_SIZE {
        return Err(CoreError::InvalidFileFormat(
            "File too small to be a valid SMKT file".into(),
        ));
    }
    if &data[0..4] != MAGIC {
        return Err(CoreError::InvalidFileFormat(
            "Invalid magic bytes: not an SMKT file".into(),
        ));
    }

    let version = u16::from_le_bytes([data[4], data[5]]);
    if version == 0 || version > CURRENT_VERSION {
        return Err(CoreError::UnsupportedVersion(version));
    }

    let payload_len = u64::from_le_bytes(
        data[6..HEADER_SIZE]
            .try_into()
            .map_err(|_| CoreError::InvalidFileFormat("Failed to read payload length".into()))?,
    );

    let available = (data.len() - HEADER_SIZE) as u64;
    if available < payload_len {
        return Err(CoreError::InvalidFileFormat(format!(
            "File truncated: expected {payload_len} bytes of payload, got {available}"
        )));
    }
    if available > payload_len {
        return Err(CoreError::InvalidFileFormat(format!(
            "Unexpected {} trailing bytes after payload",
            available - payload_len
        )));
    }

    Ok((
        FileHeader {
            version,
            payload_len,
        },
        &data[HEADER_SIZE..],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let bytes = write_file(CURRENT_VERSION, b"abc");
        assert_eq!(&bytes[0..4], b"SMKT");
        assert_eq!(bytes.len(), HEADER_SIZE + 3);

        let (header, payload) = read_file(&bytes).unwrap();
        assert_eq!(header.version, 1);
        assert_eq!(header.payload_len, 3);
        assert_eq!(payload, b"abc");
    }

    #[test]
    fn rejects_future_version() {
        let bytes = write_file(CURRENT_VERSION + 1, b"");
        assert!(matches!(read_file(&bytes), Err(CoreError::UnsupportedVersion(2))));
    }

    #[test]
    fn rejects_truncated_and_padded_payloads() {
        let bytes = write_file(CURRENT_VERSION, b"payload");
        assert!(read_file(&bytes[..bytes.len() - 1]).is_err());

        let mut padded = bytes.clone();
        padded.push(0);
        assert!(read_file(&padded).is_err());
    }
}
