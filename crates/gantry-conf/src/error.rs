use std::io;

/// Failures surfaced by path resolution, directory materialization and
/// property parsing. A missing configuration file is not one of them; loading
/// it contributes zero entries instead.
#[derive(Debug)]
pub enum Error {
    EmptyPath,
    MissingWorkDir,
    BadPath {
        path: String,
        why: &'static str,
    },
    Access {
        path: String,
        source: io::Error,
    },
    CreateDir {
        path: String,
        source: io::Error,
    },
    ReadLink {
        path: String,
        source: io::Error,
    },
    LinkDepth {
        path: String,
    },
    CodePoint {
        value: u32,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::EmptyPath => write!(f, "a non-empty path must be specified"),
            Error::MissingWorkDir => {
                write!(f, "a non-empty working directory must be specified")
            }
            Error::BadPath { path, why } => write!(f, "invalid path {path:?}: {why}"),
            Error::Access { path, source } => write!(f, "error accessing {path}: {source}"),
            Error::CreateDir { path, source } => {
                write!(f, "error creating directory {path}: {source}")
            }
            Error::ReadLink { path, source } => write!(f, "error reading {path}: {source}"),
            Error::LinkDepth { path } => {
                write!(f, "too many levels of symbolic links: {path}")
            }
            Error::CodePoint { value } => {
                write!(f, "codepoint 0x{value:x} out of supported range")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Access { source, .. }
            | Error::CreateDir { source, .. }
            | Error::ReadLink { source, .. } => Some(source),
            _ => None,
        }
    }
}
