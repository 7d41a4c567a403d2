// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UnknownSharingMode,
    InvalidConfig,
    NoSuchNode,
    NoSuchConnector,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            UnknownSharingMode => "unknown_sharing_mode",
            InvalidConfig => "invalid_config",
            NoSuchNode => "no_such_node",
            NoSuchConnector => "no_such_connector",
        };

        write!(f, "{name}")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Diagram,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind,
            code,
            details,
        }
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Config => "ConfigError",
            ErrorKind::Diagram => "DiagramError",
        };
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", kind, self.code, details),
            None => write!(f, "{}{{{}}}", kind, self.code),
        }
    }
}

impl error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(
            ErrorKind::Config,
            ErrorCode::InvalidConfig,
            Some(err.to_string()),
        )
    }
}

pub type Result<T> = result::Result<T, Error>;

#[macro_export]
macro_rules! layout_err {
    ($kind:tt, $code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::$kind, ErrorCode::$code, Some($str)))
    }};
    ($kind:tt, $code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::$kind, ErrorCode::$code, None))
    }};
}

#[test]
fn test_error_display() {
    let err = Error::new(
        ErrorKind::Config,
        ErrorCode::UnknownSharingMode,
        Some("'share_some'".to_string()),
    );
    assert_eq!(
        format!("{err}"),
        "ConfigError{unknown_sharing_mode: 'share_some'}"
    );

    let err = Error::new(ErrorKind::Diagram, ErrorCode::NoSuchNode, None);
    assert_eq!(format!("{err}"), "DiagramError{no_such_node}");
    assert_eq!(err.get_details(), None);
}

#[test]
fn test_layout_err_macro() {
    fn lookup(found: bool) -> Result<u32> {
        if !found {
            return layout_err!(Diagram, NoSuchConnector, "connector 7".to_string());
        }
        Ok(7)
    }

    let err = lookup(false).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Diagram);
    assert_eq!(err.code, ErrorCode::NoSuchConnector);
    assert_eq!(err.details.as_deref(), Some("connector 7"));
    assert_eq!(lookup(true), Ok(7));
}

#[test]
fn test_json_error_conversion() {
    let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
    let err: Error = json_err.into();
    assert_eq!(err.kind, ErrorKind::Config);
    assert_eq!(err.code, ErrorCode::InvalidConfig);
    assert!(err.details.is_some());
}
