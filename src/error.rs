//! Failure modes of a dictionary update

use crate::dictionary::{GrammemeName, LemmaId};
use std::{io, path::PathBuf, sync::Arc};
use thiserror::Error;

/// Everything that can go wrong while fetching, converting, saving or
/// reloading the dictionary
///
/// None of these are recovered from locally: they all abort the update.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote dictionary export could not be fetched
    #[error("failed to retrieve the dictionary from {url}")]
    Retrieval {
        url: Box<str>,
        #[source]
        source: reqwest::Error,
    },

    /// The (decompressed) byte stream failed while being read
    ///
    /// This is how corrupt or truncated bzip2 data surfaces, as the
    /// decompressor only notices it when the affected bytes are read.
    #[error("failed to read the dictionary stream")]
    Decode(#[source] Arc<io::Error>),

    /// The XML document, or one of its grammeme/lemma elements, is malformed
    #[error("malformed <{element}> element: {message}")]
    Parse {
        /// Local name of the element being decoded
        element: &'static str,

        /// What was wrong with it
        message: String,
    },

    /// A lemma referenced a grammeme that was not declared before it
    ///
    /// Only reported in strict mode, otherwise the reference is recorded as
    /// absent.
    #[error("lemma {lemma} references undeclared grammeme {name:?}")]
    UnresolvedGrammeme { lemma: LemmaId, name: GrammemeName },

    /// The snapshot could not be created or fully written
    #[error("failed to write the snapshot to {}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    /// The snapshot could not be read back
    #[error("failed to load the snapshot from {}", path.display())]
    SnapshotLoad {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
}
//
impl Error {
    /// Report a malformed element
    pub fn parse(element: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            element,
            message: message.into(),
        }
    }
}
//
impl From<quick_xml::Error> for Error {
    fn from(value: quick_xml::Error) -> Self {
        match value {
            quick_xml::Error::Io(e) => Self::Decode(e),
            other => Self::parse("dictionary", other.to_string()),
        }
    }
}

/// Result type of the dictionary update pipeline
pub type Result<T, E = Error> = std::result::Result<T, E>;
