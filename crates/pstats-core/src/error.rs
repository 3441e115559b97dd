use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected end of marshal data at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("Unsupported marshal type code {code:?} (0x{byte:02x}) at offset {offset}")]
    UnsupportedType { code: char, byte: u8, offset: usize },

    #[error("Invalid marshal back-reference {index} at offset {offset}")]
    InvalidReference { index: usize, offset: usize },

    #[error("Integer at offset {offset} does not fit in 64 bits")]
    IntegerOverflow { offset: usize },

    #[error("Invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("{remaining} trailing byte(s) after marshal object")]
    TrailingData { remaining: usize },

    #[error("Malformed stats data: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
