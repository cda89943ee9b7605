/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::fmt::Display;
use std::io::ErrorKind;
use std::num::TryFromIntError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
/// Well-defined errors for bad things that are expected to happen while decoding a JPEG
pub enum ExitCode {
    /// Assertion failure, which probably indicates a bug in the library.
    AssertionFailure = 1,

    /// A marker segment is missing, truncated, out of order or carries invalid
    /// table or scan parameters.
    MalformedHeader = 20,

    /// The frame header describes an image that can't exist (bad precision,
    /// component count, dimensions or sampling factors).
    MalformedFrame = 21,

    /// The entropy coded data is corrupt: an invalid Huffman code, a run past the end
    /// of a block, a wrong restart marker or data that ends in the middle of a scan.
    MalformedScan = 22,

    /// The stream is valid JPEG but uses a feature that is not supported, or the
    /// requested operation is not supported for this kind of image.
    UnsupportedOperation = 23,

    /// An error was returned by an IO operation, for example if a BufRead
    /// passed in returned an error.
    OsError = 33,

    /// error occured while casting an integer to a smaller type, most likely
    /// means that the JPEG contains invalid data
    IntegerCastOverflow = 1000,

    /// Caller passed in invalid parameters
    SyntaxError = 1006,

    /// The file to be read was not found (only used by utility exe)
    FileNotFound = 1007,
}

impl Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ExitCode {
    /// Converts the error code into an integer for use as a process exit code.
    pub fn as_integer_error_code(self) -> i32 {
        self as i32
    }
}

/// Since errors are rare and stop everything, we want them to be as lightweight as possible.
#[derive(Debug, Clone)]
struct DecodeErrorInternal {
    exit_code: ExitCode,
    message: String,
}

/// Standard error returned by the decoder
#[derive(Debug, Clone)]
pub struct DecodeError {
    i: Box<DecodeErrorInternal>,
}

/// Result type used throughout the decoder
pub type Result<T> = std::result::Result<T, DecodeError>;

impl Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{0}: {1}", self.i.exit_code, self.i.message)
    }
}

impl DecodeError {
    /// Creates a new DecodeError with the specified exit code and message.
    pub fn new(exit_code: ExitCode, message: impl AsRef<str>) -> DecodeError {
        DecodeError {
            i: Box::new(DecodeErrorInternal {
                exit_code,
                message: message.as_ref().to_owned(),
            }),
        }
    }

    /// Returns the exit code that classifies the error
    pub fn exit_code(&self) -> ExitCode {
        self.i.exit_code
    }

    /// Returns the message of the error, which is a human-readable description of the error.
    pub fn message(&self) -> &str {
        &self.i.message
    }

    /// Adds context to the error by appending the current location in the code. This
    /// allows for building a callstack of where the error occurred.
    #[cold]
    #[inline(never)]
    #[track_caller]
    pub fn add_context(&mut self) {
        self.i
            .message
            .push_str(&format!("\n at {}", std::panic::Location::caller()));
    }
}

#[cold]
#[track_caller]
pub fn err_exit_code<T>(error_code: ExitCode, message: impl AsRef<str>) -> Result<T> {
    let mut e = DecodeError::new(error_code, message.as_ref());
    e.add_context();
    return Err(e);
}

pub trait AddContext<T> {
    #[track_caller]
    fn context(self) -> Result<T>;
}

impl<T, E: Into<DecodeError>> AddContext<T> for core::result::Result<T, E> {
    #[track_caller]
    fn context(self) -> Result<T> {
        match self {
            Ok(x) => Ok(x),
            Err(e) => {
                let mut e = e.into();
                e.add_context();
                Err(e)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Running out of input while reading marker segments means the header is
/// truncated, everything else is reported as an OS error.
fn get_io_error_exit_code(e: &std::io::Error) -> ExitCode {
    if e.kind() == ErrorKind::UnexpectedEof {
        ExitCode::MalformedHeader
    } else {
        ExitCode::OsError
    }
}

impl From<TryFromIntError> for DecodeError {
    #[track_caller]
    fn from(e: TryFromIntError) -> Self {
        let mut e = DecodeError::new(ExitCode::IntegerCastOverflow, e.to_string());
        e.add_context();
        e
    }
}

/// translates std::io::Error into DecodeError
impl From<std::io::Error> for DecodeError {
    #[track_caller]
    fn from(e: std::io::Error) -> Self {
        if let Some(inner) = e.get_ref().and_then(|x| x.downcast_ref::<DecodeError>()) {
            return inner.clone();
        }

        let mut e = DecodeError::new(get_io_error_exit_code(&e), e.to_string());
        e.add_context();
        e
    }
}

/// translates DecodeError into std::io::Error, which involves putting into a Box and using Other
impl From<DecodeError> for std::io::Error {
    fn from(e: DecodeError) -> Self {
        return std::io::Error::new(std::io::ErrorKind::Other, e);
    }
}

#[test]
fn test_error_translation() {
    // test wrapping inside an io error
    fn my_std_error() -> core::result::Result<(), std::io::Error> {
        Err(DecodeError::new(ExitCode::SyntaxError, "test error").into())
    }

    let e: DecodeError = my_std_error().unwrap_err().into();
    assert_eq!(e.exit_code(), ExitCode::SyntaxError);
    assert_eq!(e.message(), "test error");

    // an IO error should be translated into an OsError
    let e: DecodeError = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found").into();
    assert_eq!(e.exit_code(), ExitCode::OsError);

    // running out of data in the middle of a header is a malformed header
    let e: DecodeError = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof").into();
    assert_eq!(e.exit_code(), ExitCode::MalformedHeader);
}

#[test]
fn test_context_appends_location() {
    fn failing() -> Result<()> {
        err_exit_code(ExitCode::MalformedScan, "bad code")
    }

    let e = failing().context().unwrap_err();
    assert_eq!(e.exit_code(), ExitCode::MalformedScan);
    assert!(e.message().starts_with("bad code"));
    assert_eq!(e.message().matches("\n at ").count(), 2);
}
