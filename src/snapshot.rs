//! Binary snapshot of the dictionary
//!
//! Parsing the XML export takes a while, so the resulting [`Dictionary`] is
//! saved in a compact binary form that is much faster to load:
//!
//! - A magic byte string identifies the file as a snapshot
//! - A bincode-encoded format version tells how the rest is laid out
//! - The bincode-encoded dictionary follows, with every grammeme reference
//!   encoded by value.

use crate::{
    config::Config,
    dictionary::Dictionary,
    error::{Error, Result},
};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::task::JoinError;

/// Magic bytes at the start of every snapshot
const MAGIC: &[u8; 8] = b"OCDICT\0\0";

/// Version of the snapshot layout that follows the magic bytes
const FORMAT_VERSION: u32 = 1;

/// Save the dictionary to the snapshot location from the configuration
///
/// The snapshot is overwritten in place, so if this fails a partial snapshot
/// may be left behind.
//
// FIXME: Write to a temporary file in the same directory, then rename it over
//        the former snapshot once complete
pub async fn save(config: Arc<Config>, dictionary: Arc<Dictionary>) -> Result<()> {
    let path = config.output.clone();
    log::info!("Saving dictionary snapshot to {}", path.display());
    join(tokio::task::spawn_blocking(move || write(&path, &dictionary)).await)
}

/// Load a snapshot that was previously written by [`save()`]
pub async fn load(path: impl Into<PathBuf>) -> Result<Dictionary> {
    let path = path.into();
    log::info!("Loading dictionary snapshot from {}", path.display());
    join(tokio::task::spawn_blocking(move || read(&path)).await)
}

/// Synchronous implementation of [`save()`]
fn write(path: &Path, dictionary: &Dictionary) -> Result<()> {
    let fail = |source: bincode::Error| Error::Persistence {
        path: path.to_owned(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(|e| fail(e.into()))?);
    writer.write_all(MAGIC).map_err(|e| fail(e.into()))?;
    bincode::serialize_into(&mut writer, &FORMAT_VERSION).map_err(fail)?;
    bincode::serialize_into(&mut writer, dictionary).map_err(fail)?;
    let file = writer.into_inner().map_err(|e| fail(e.into_error().into()))?;
    file.sync_all().map_err(|e| fail(e.into()))?;
    Ok(())
}

/// Synchronous implementation of [`load()`]
fn read(path: &Path) -> Result<Dictionary> {
    let fail = |source: bincode::Error| Error::SnapshotLoad {
        path: path.to_owned(),
        source,
    };
    let invalid = |message: String| fail(Box::new(bincode::ErrorKind::Custom(message)));
    let mut reader = BufReader::new(File::open(path).map_err(|e| fail(e.into()))?);

    // Check that this is a snapshot that we know how to read
    let mut magic = [0; MAGIC.len()];
    reader
        .read_exact(&mut magic)
        .map_err(|_| invalid("not a dictionary snapshot".into()))?;
    if &magic != MAGIC {
        return Err(invalid("not a dictionary snapshot".into()));
    }
    let version: u32 = bincode::deserialize_from(&mut reader).map_err(fail)?;
    if version != FORMAT_VERSION {
        return Err(invalid(format!(
            "unsupported snapshot format version {version}, expected {FORMAT_VERSION}"
        )));
    }

    // Decode the dictionary
    bincode::deserialize_from(&mut reader).map_err(fail)
}

/// Collect the result of a blocking task, propagating panics
fn join<T>(result: std::result::Result<T, JoinError>) -> T {
    match result {
        Ok(output) => output,
        Err(e) => std::panic::resume_unwind(e.into_panic()),
    }
}
