//! Update pipeline configuration

use crate::Args;
use std::{path::PathBuf, sync::Arc};

/// Location of the OpenCorpora dictionary export
pub const DICTIONARY_URL: &str = "http://opencorpora.org/files/export/dict/dict.opcorpora.xml.bz2";

/// Default location of the snapshot, relative to the working directory
pub const DEFAULT_SNAPSHOT_PATH: &str = "data.bin";

/// Final process configuration
///
/// This is the digested form of [`Args`]. Please refer to [`Args`] to know
/// more about individual fields.
#[allow(missing_docs)]
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Config {
    /// Where the compressed dictionary is downloaded from
    pub url: Box<str>,

    /// Where the snapshot is written
    pub output: PathBuf,

    // Other fields have the same meaning as in Args
    pub strict: bool,
    pub check: bool,
}
//
impl Config {
    /// Determine process configuration from CLI arguments
    pub(crate) fn new(args: Args) -> Arc<Self> {
        let Args {
            url,
            output,
            strict,
            check,
        } = args;
        Arc::new(Self {
            url: url.unwrap_or_else(|| DICTIONARY_URL.into()),
            output: output.unwrap_or_else(|| DEFAULT_SNAPSHOT_PATH.into()),
            strict,
            check,
        })
    }
}
//
impl Default for Config {
    /// Configuration of a plain `update` with no flags
    fn default() -> Self {
        Self {
            url: DICTIONARY_URL.into(),
            output: DEFAULT_SNAPSHOT_PATH.into(),
            strict: false,
            check: false,
        }
    }
}
