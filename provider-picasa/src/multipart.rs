//! `multipart/related` upload body.
//!
//! The body is five segments read back to back: a preamble opening the
//! metadata part, the Atom document, the separator opening the image part,
//! the image stream, and the closing delimiter. Only the image segment is
//! streamed; nothing is buffered beyond the metadata.

use bridge_traits::io::UploadBody;
use std::io::Cursor;
use tokio::io::AsyncReadExt;

pub const BOUNDARY: &str = "END_OF_PART";
pub const CONTENT_TYPE: &str = "multipart/related; boundary=\"END_OF_PART\"";
pub const MIME_VERSION: &str = "1.0";
/// Image part type when the photo does not name one.
pub const DEFAULT_IMAGE_TYPE: &str = "image/jpeg";

const PREAMBLE: &[u8] =
    b"Media multipart posting\r\n--END_OF_PART\r\nContent-Type: application/atom+xml\r\n\r\n";
const TRAILER: &[u8] = b"\r\n--END_OF_PART--";

/// Chain the metadata document and image stream into one request body.
pub fn related_body(metadata: String, image_type: &str, image: UploadBody) -> UploadBody {
    let separator = format!("\r\n--{BOUNDARY}\r\nContent-Type: {image_type}\r\n\r\n");
    let body = Cursor::new(PREAMBLE)
        .chain(Cursor::new(metadata.into_bytes()))
        .chain(Cursor::new(separator.into_bytes()))
        .chain(image)
        .chain(Cursor::new(TRAILER));
    Box::new(body)
}
