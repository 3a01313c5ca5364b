//! This program converts the OpenCorpora morphological dictionary into a
//! binary snapshot, whose general documentation you can find at
//! <http://opencorpora.org/?page=export>.

mod config;
mod dictionary;
mod error;
mod progress;
mod snapshot;
mod source;
mod xml;

use crate::{
    config::Config,
    dictionary::{builder, Dictionary},
    progress::{ProgressConfig, ProgressReport, ProgressTracker, Work},
};
use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use std::{path::PathBuf, sync::Arc};
use tokio::io::AsyncBufRead;

/// Download the OpenCorpora dictionary and save it as a binary snapshot
///
/// The snapshot holds every grammeme and every lemma of the dictionary, along
/// with the word forms of each lemma, and is fully rewritten on each run.
#[derive(Parser, Debug)]
#[command(version, author)]
struct Args {
    /// Location of the bzip2-compressed XML dictionary export
    ///
    /// By default, the latest export is downloaded from opencorpora.org.
    #[arg(long, default_value = None)]
    url: Option<Box<str>>,

    /// Location of the snapshot file
    ///
    /// By default, the snapshot is written as "data.bin" in the working
    /// directory.
    #[arg(short, long, default_value = None)]
    output: Option<PathBuf>,

    /// Reject lemmas that reference undeclared grammemes
    ///
    /// The export declares all grammemes before the lemmas that use them, so
    /// this should never happen. By default, such references are recorded as
    /// absent and a warning is logged.
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// Load the snapshot back once written, and check that it matches
    #[arg(long, default_value_t = false)]
    check: bool,
}
//
#[tokio::main]
async fn main() -> Result<()> {
    // Set up logging
    setup_logging().map_err(|e| anyhow::format_err!("{e}"))?;

    // Decode CLI arguments
    let config = Config::new(Args::parse());

    // Update the snapshot
    let report = ProgressReport::new();
    let client = reqwest::Client::new();
    if let Err(e) = update(config, &client, &report).await {
        log::error!("Dictionary update failed: {e:#}");
        return Err(e);
    }
    Ok(())
}

/// Download the dictionary, convert it and save the snapshot
pub async fn update(
    config: Arc<Config>,
    client: &reqwest::Client,
    report: &ProgressReport,
) -> Result<Arc<Dictionary>> {
    let steps = report.add(
        "Updating dictionary",
        ProgressConfig::new(Work::Steps(if config.check { 3 } else { 2 })).dont_show_rate_eta(),
    );
    let stream = source::fetch(client, &config.url, report)
        .await
        .context("starting the dictionary download")?;
    convert(config, stream, &steps).await
}

/// Build the dictionary from an XML stream and save the snapshot
///
/// Nothing is written unless the whole stream was successfully converted.
async fn convert(
    config: Arc<Config>,
    stream: impl AsyncBufRead + Unpin,
    steps: &ProgressTracker,
) -> Result<Arc<Dictionary>> {
    // Build the dictionary
    let dictionary = builder::build(config.clone(), stream)
        .await
        .context("building the dictionary")?;
    let dictionary = Arc::new(dictionary);
    steps.make_progress(1);

    // Save it to disk
    snapshot::save(config.clone(), dictionary.clone())
        .await
        .context("saving the dictionary snapshot")?;
    steps.make_progress(1);

    // Check the snapshot if requested
    if config.check {
        let loaded = snapshot::load(&config.output)
            .await
            .context("reloading the dictionary snapshot")?;
        anyhow::ensure!(
            loaded == *dictionary,
            "snapshot at {} does not match the dictionary that was saved",
            config.output.display()
        );
        log::info!("Checked dictionary snapshot at {}", config.output.display());
        steps.make_progress(1);
    }
    Ok(dictionary)
}

/// Use anyhow for Result type erasure
pub use anyhow::Result;

/// Set up logging
fn setup_logging() -> syslog::Result<()> {
    syslog::init(
        syslog::Facility::LOG_USER,
        if cfg!(feature = "log-trace") {
            LevelFilter::Trace
        } else if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn config(output: PathBuf, check: bool) -> Arc<Config> {
        Arc::new(Config {
            output,
            check,
            ..Config::default()
        })
    }

    #[tokio::test]
    async fn convert_and_check() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path().join("data.bin"), true);
        let report = ProgressReport::new();
        let steps = report.add("test", ProgressConfig::new(Work::Steps(3)));
        let xml = r#"<dictionary>
            <grammeme><name>NOUN</name><alias>N</alias></grammeme>
            <grammeme parent="NOUN"><name>ANIM</name><alias>anim</alias></grammeme>
            <lemma id="42"><l t="cat"><g v="NOUN"/></l><f t="cats"><g v="NOUN"/><g v="ANIM"/></f></lemma>
        </dictionary>"#;
        let dictionary = convert(config.clone(), xml.as_bytes(), &steps).await.unwrap();
        assert_eq!(dictionary.grammemes.len(), 2);
        assert_eq!(dictionary.lemmas.len(), 1);
        assert_eq!(snapshot::load(&config.output).await.unwrap(), *dictionary);
    }

    #[tokio::test]
    async fn malformed_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path().join("data.bin"), false);
        let report = ProgressReport::new();
        let steps = report.add("test", ProgressConfig::new(Work::Steps(2)));
        let xml = r#"<dictionary>
            <grammeme><name>NOUN</name></grammeme>
            <lemma><l t="cat"><g v="NOUN"/></l></lemma>
        </dictionary>"#;
        let error = convert(config.clone(), xml.as_bytes(), &steps)
            .await
            .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::Parse { element: "lemma", .. })
        ));
        assert!(!config.output.exists());
    }
}
