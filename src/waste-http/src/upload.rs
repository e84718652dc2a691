//! Extraction of the `image` file from a multipart upload.

use hyper::body::Bytes;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Body, Request, StatusCode};
use multer::{Constraints, Multipart, SizeLimit};
use thiserror::Error;

/// Multipart field carrying the photo.
pub const IMAGE_FIELD: &str = "image";

#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

#[derive(Debug, Error)]
pub enum UploadError {
    /// Not a multipart request, or no `image` field in it.
    #[error("No image file provided")]
    Missing,

    #[error("No selected file")]
    NoFileName,

    #[error("Empty image content")]
    Empty,

    #[error("File too large (limit {0} bytes)")]
    TooLarge(u64),

    #[error("Malformed multipart body: {0}")]
    Malformed(String),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<multer::Error> for UploadError {
    fn from(err: multer::Error) -> Self {
        match err {
            multer::Error::StreamSizeExceeded { limit } => UploadError::TooLarge(limit),
            // The size check runs inside the body stream, so an overflow found
            // while reading arrives wrapped.
            multer::Error::StreamReadFailed(inner) => {
                match inner.downcast_ref::<multer::Error>() {
                    Some(multer::Error::StreamSizeExceeded { limit }) => {
                        UploadError::TooLarge(*limit)
                    }
                    _ => UploadError::Malformed(
                        multer::Error::StreamReadFailed(inner).to_string(),
                    ),
                }
            }
            err => UploadError::Malformed(err.to_string()),
        }
    }
}

/// Read the first `image` field of a multipart request, holding at most
/// `limit` bytes of body.
pub async fn read_image(req: Request<Body>, limit: usize) -> Result<Upload, UploadError> {
    let limit = limit as u64;

    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    if matches!(declared, Some(length) if length > limit) {
        return Err(UploadError::TooLarge(limit));
    }

    let boundary = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| multer::parse_boundary(value).ok())
        .ok_or(UploadError::Missing)?;

    let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(limit));
    let mut multipart = Multipart::with_constraints(req.into_body(), boundary, constraints);

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        // A part without a filename is a plain form value, not a file.
        let file_name = match field.file_name() {
            None => continue,
            Some("") => return Err(UploadError::NoFileName),
            Some(name) => name.to_owned(),
        };

        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }

        return Ok(Upload { file_name, bytes });
    }

    Err(UploadError::Missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_size_overflow_is_too_large() {
        let inner = multer::Error::StreamSizeExceeded { limit: 64 };
        let err = UploadError::from(multer::Error::StreamReadFailed(Box::new(inner)));

        assert!(matches!(err, UploadError::TooLarge(64)));
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn other_read_failures_are_malformed() {
        let inner = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "connection reset");
        let err = UploadError::from(multer::Error::StreamReadFailed(Box::new(inner)));

        assert!(matches!(err, UploadError::Malformed(_)));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
