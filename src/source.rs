//! Retrieval of the bzip2-compressed dictionary export

use crate::{
    error::{Error, Result},
    progress::{ProgressConfig, ProgressReport, Work},
};
use async_compression::tokio::bufread::BzDecoder;
use futures::stream::StreamExt;
use reqwest::Response;
use std::{
    io::{self, ErrorKind},
    pin::Pin,
};
use tokio::io::{AsyncBufRead, BufReader};
use tokio_util::io::StreamReader;

/// Decompressed XML byte stream
pub type XmlStream = Pin<Box<dyn AsyncBufRead>>;

/// Start downloading the dictionary export, and decompress it on the fly
///
/// Fails if the server cannot be reached or answers with an error status.
/// Errors that occur later on, like a connection drop or corrupt compressed
/// data, surface as I/O errors when reading from the stream.
pub async fn fetch(client: &reqwest::Client, url: &str, report: &ProgressReport) -> Result<XmlStream> {
    // Start the download
    log::info!("Downloading the dictionary from {url}");
    let response = client
        .get(url)
        .send()
        .await
        .and_then(Response::error_for_status)
        .map_err(|source| Error::Retrieval {
            url: url.into(),
            source,
        })?;

    // Track download progress if the server tells how much there is to go
    let bytes = match response.content_length() {
        Some(length) => Some(report.add(
            "Downloading dictionary",
            ProgressConfig::new(Work::Bytes(length)),
        )),
        None => {
            log::debug!("Download size of {url} is unknown, won't report progress");
            None
        }
    };

    // Slice the download into chunks of bytes
    let bz_bytes = StreamReader::new(response.bytes_stream().map(move |res| {
        res
            // Track how many input bytes have been downloaded so far
            .inspect(|bytes_block| {
                if let Some(bytes) = &bytes {
                    bytes.make_progress(bytes_block.len() as u64);
                }
            })
            // Translate reqwest errors into I/O errors
            .map_err(|e| io::Error::new(ErrorKind::Other, Box::new(e)))
    }));

    // Apply bzip2 decoder to compressed bytes
    Ok(Box::pin(decompress(bz_bytes)))
}

/// Decompress a bzip2 byte stream
///
/// Decompression happens lazily as bytes are read, so corrupt input is only
/// reported as an I/O error when the affected bytes are read.
pub fn decompress<R: AsyncBufRead>(compressed: R) -> BufReader<BzDecoder<R>> {
    BufReader::new(BzDecoder::new(compressed))
}
