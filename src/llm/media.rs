use base64::{engine::general_purpose, Engine as _};

pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

// Decoded prefix handed to `infer`; magic numbers live in the first bytes.
const HEADER_SNIFF_BYTES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImagePayloadError {
    #[error("payload is empty")]
    Empty,
    #[error("payload is not valid base64")]
    InvalidBase64,
    #[error("payload is {0}, not an image")]
    NotAnImage(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data_uri: String,
    pub decoded_len: usize,
}

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

/// Splits a `data:<mime>;base64,<payload>` URI; plain base64 passes through.
fn split_data_uri(value: &str) -> (Option<&str>, &str) {
    let Some(rest) = value.strip_prefix("data:") else {
        return (None, value);
    };
    match rest.split_once(',') {
        Some((header, payload)) => {
            let mime = header
                .split(';')
                .next()
                .map(str::trim)
                .filter(|mime| !mime.is_empty());
            (mime, payload)
        }
        None => (None, rest),
    }
}

fn decode_base64(payload: &str) -> Option<Vec<u8>> {
    let compact: String = payload.chars().filter(|ch| !ch.is_whitespace()).collect();
    general_purpose::STANDARD
        .decode(&compact)
        .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(&compact))
        .or_else(|_| general_purpose::URL_SAFE.decode(&compact))
        .or_else(|_| general_purpose::URL_SAFE_NO_PAD.decode(&compact))
        .ok()
}

/// Validates the inbound image and renders the data URI sent to the model.
pub fn prepare_image_payload(raw: &str) -> Result<ImagePayload, ImagePayloadError> {
    let trimmed = raw.trim();
    let (declared_mime, payload) = split_data_uri(trimmed);
    if payload.trim().is_empty() {
        return Err(ImagePayloadError::Empty);
    }

    let bytes = decode_base64(payload).ok_or(ImagePayloadError::InvalidBase64)?;
    if bytes.is_empty() {
        return Err(ImagePayloadError::Empty);
    }

    let sniff_len = bytes.len().min(HEADER_SNIFF_BYTES);
    let detected = detect_mime_type(&bytes[..sniff_len]);
    if let Some(mime) = detected.as_deref() {
        if !mime.starts_with("image/") {
            return Err(ImagePayloadError::NotAnImage(mime.to_string()));
        }
    }

    let mime_type = detected
        .or_else(|| {
            declared_mime
                .filter(|mime| mime.starts_with("image/"))
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());
    let encoded = general_purpose::STANDARD.encode(&bytes);
    Ok(ImagePayload {
        data_uri: format!("data:{};base64,{}", mime_type, encoded),
        mime_type,
        decoded_len: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];

    #[test]
    fn detects_png_and_builds_data_uri() {
        let encoded = general_purpose::STANDARD.encode(PNG_HEADER);
        let payload = prepare_image_payload(&encoded).unwrap();
        assert_eq!(payload.mime_type, "image/png");
        assert_eq!(payload.data_uri, format!("data:image/png;base64,{encoded}"));
        assert_eq!(payload.decoded_len, PNG_HEADER.len());
    }

    #[test]
    fn accepts_existing_data_uri() {
        let encoded = general_purpose::STANDARD.encode(PNG_HEADER);
        let payload = prepare_image_payload(&format!("data:image/png;base64,{encoded}")).unwrap();
        assert_eq!(payload.mime_type, "image/png");
    }

    #[test]
    fn unknown_bytes_fall_back_to_declared_or_default_mime() {
        let encoded = general_purpose::STANDARD.encode(b"opaque image bytes");
        assert_eq!(
            prepare_image_payload(&encoded).unwrap().mime_type,
            DEFAULT_IMAGE_MIME
        );
        assert_eq!(
            prepare_image_payload(&format!("data:image/webp;base64,{encoded}"))
                .unwrap()
                .mime_type,
            "image/webp"
        );
    }

    #[test]
    fn rejects_bad_payloads() {
        assert_eq!(prepare_image_payload("   "), Err(ImagePayloadError::Empty));
        assert_eq!(
            prepare_image_payload("data:image/png;base64,"),
            Err(ImagePayloadError::Empty)
        );
        assert_eq!(
            prepare_image_payload("not base64 at all!"),
            Err(ImagePayloadError::InvalidBase64)
        );
        let pdf = general_purpose::STANDARD.encode(b"%PDF-1.7 some document body");
        assert_eq!(
            prepare_image_payload(&pdf),
            Err(ImagePayloadError::NotAnImage("application/pdf".to_string()))
        );
    }
}
