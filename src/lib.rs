//! # h78
//!
//! Two-stage lossless file compression.
//!
//! * `huffman` is a one-pass adaptive Huffman coder, no code table is transmitted
//! * `lz78` is an LZ78 dictionary coder that can run ahead of the Huffman stage
//!
//! The coders never call each other.  To get LZ78-then-Huffman, feed the output of
//! `lz78::encode` to `huffman::encode`, and reverse the order to expand.
//! Each call builds its own tree or dictionary, so calls on different files are independent.

mod tools;
pub mod huffman;
pub mod lz78;

pub use tools::header::{Format,Header,read_header,MAX_NAME_LEN};

/// Coder Errors
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("file format mismatch")]
    FileFormatMismatch,
    #[error("unexpected end of data")]
    Truncated,
    #[error("corrupt data: {0}")]
    Corrupt(String),
    #[error("file name too long")]
    NameTooLong,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error)
}

impl Error {
    /// Running out of bytes inside a container is a format problem, anything else is I/O.
    pub(crate) fn from_read(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::Truncated,
            _ => Error::Io(e)
        }
    }
    /// true if the error came from the content of a container rather than the I/O layer
    pub fn is_format_error(&self) -> bool {
        !matches!(self,Error::Io(_))
    }
}

pub type Result<T> = std::result::Result<T,Error>;

/// Final path component of `path`, as stored in container headers.
pub fn base_name(path: &std::path::Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().to_string(),
        None => String::new()
    }
}

/// xorshift bytes for tests, reduced to `alphabet` symbols
#[cfg(test)]
pub(crate) fn pseudo_random(n: usize,alphabet: u32,seed: u32) -> Vec<u8> {
    let mut x = seed;
    (0..n).map(|_| {
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        (x % alphabet) as u8
    }).collect()
}

#[test]
fn error_kinds() {
    let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof,"eof");
    assert!(matches!(Error::from_read(eof),Error::Truncated));
    let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied,"denied");
    let err = Error::from_read(denied);
    assert!(matches!(err,Error::Io(_)));
    assert!(!err.is_format_error());
    assert!(Error::FileFormatMismatch.is_format_error());
}

#[test]
fn base_names() {
    assert_eq!(base_name(std::path::Path::new("/tmp/some/file.txt")),"file.txt");
    assert_eq!(base_name(std::path::Path::new("file")),"file");
    assert_eq!(base_name(std::path::Path::new("/")),"");
}
