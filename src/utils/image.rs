use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Decode an `imageData` field: bare base64 or a `data:image/...;base64,` URL.
pub fn decode_image_payload(image_data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let encoded = match image_data.split_once(',') {
        Some((_, payload)) => payload,
        None => image_data,
    };
    STANDARD.decode(encoded.trim())
}
