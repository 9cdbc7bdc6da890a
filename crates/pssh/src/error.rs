use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("File does not exist: {0}")]
    FileNotFound(PathBuf),

    #[error("No moov box found")]
    NoMovieBox,

    #[error("No Widevine pssh box found in moov")]
    NoWidevineHeader,

    #[error("Premature end of data while reading {0}")]
    Truncated(&'static str),

    #[error("Invalid box size {size} for box {box_type}")]
    InvalidBoxSize { box_type: String, size: u64 },

    #[error("Invalid Widevine pssh data: {0}")]
    InvalidPayload(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Maps an unexpected EOF into [Error::Truncated], keeping other IO errors as they are.
pub(crate) fn eof(what: &'static str) -> impl Fn(std::io::Error) -> Error {
    move |e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Truncated(what)
        } else {
            Error::IoError(e)
        }
    }
}
