//! Mechanism for building a [`Dictionary`] from the OpenCorpora XML export

use super::{Dictionary, Grammeme, GrammemeName, GrammemeRef, Lemma, LemmaId, SourceInfo, WordForm};
use crate::{
    config::Config,
    error::{Error, Result},
    xml::{self, ParsedForm, ParsedLemma},
};
use quick_xml::events::{BytesStart, Event};
use std::{collections::HashMap, sync::Arc};
use tokio::io::AsyncBufRead;

/// Build a [`Dictionary`] from a stream of (decompressed) XML
///
/// The document is processed in a single forward pass. Grammemes must be
/// declared before the first lemma that references them, which the
/// OpenCorpora export guarantees. Any decoding error aborts the build.
pub async fn build<R: AsyncBufRead + Unpin>(config: Arc<Config>, stream: R) -> Result<Dictionary> {
    let mut reader = xml::reader(stream);
    let mut builder = DictionaryBuilder::new(config);
    let mut buf = Vec::new();
    let mut scratch = Vec::new();
    let mut open_elements = 0usize;
    loop {
        // Only element starts matter at this level, everything else is
        // either handled by the element decoders or irrelevant
        buf.clear();
        let (start, self_closing) = match reader.read_event_into_async(&mut buf).await? {
            Event::Start(start) => (start, false),
            Event::Empty(start) => (start, true),
            Event::End(_) => {
                open_elements = open_elements.saturating_sub(1);
                continue;
            }
            Event::Eof if open_elements > 0 => {
                return Err(Error::parse("dictionary", "unexpected end of document"));
            }
            Event::Eof => break,
            _ => continue,
        };
        match start.local_name().as_ref() {
            // Element decoders consume the matching end tag themselves
            b"grammeme" => {
                let grammeme =
                    xml::decode_grammeme(&mut reader, &start, self_closing, &mut scratch).await?;
                builder.add_grammeme(grammeme);
                continue;
            }
            b"lemma" => {
                let lemma =
                    xml::decode_lemma(&mut reader, &start, self_closing, &mut scratch).await?;
                builder.add_lemma(lemma)?;
                continue;
            }
            b"dictionary" => builder.set_source(source_info(&start)?),
            _ => {}
        }
        if !self_closing {
            open_elements += 1;
        }
    }
    let dictionary = builder.finish();
    log::info!(
        "Built dictionary with {} grammemes, {} lemmas and {} word forms",
        dictionary.grammemes.len(),
        dictionary.lemmas.len(),
        dictionary.num_forms(),
    );
    Ok(dictionary)
}

/// Extract export metadata from the `<dictionary>` root element
fn source_info(start: &BytesStart<'_>) -> Result<SourceInfo> {
    const ELEMENT: &str = "dictionary";
    let version = xml::attribute(start, ELEMENT, "version")?.map(Into::into);
    let revision = xml::attribute(start, ELEMENT, "revision")?.and_then(|revision| {
        revision
            .trim()
            .parse::<u64>()
            .inspect_err(|e| log::warn!("Ignoring invalid dictionary revision {revision:?}: {e}"))
            .ok()
    });
    Ok(SourceInfo { version, revision })
}

/// Accumulator for the contents of the dictionary, in document order
///
/// Once you're done feeding it, call [`finish()`](Self::finish) to get the
/// final [`Dictionary`].
#[derive(Debug)]
pub struct DictionaryBuilder {
    /// Update configuration
    config: Arc<Config>,

    /// Export metadata, if the root element was seen
    source: SourceInfo,

    /// Grammemes declared so far
    grammemes: HashMap<GrammemeName, Arc<Grammeme>>,

    /// Lemmas accumulated so far
    lemmas: Vec<Lemma>,
}
//
impl DictionaryBuilder {
    /// Set up the accumulator
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            source: SourceInfo::default(),
            grammemes: HashMap::new(),
            lemmas: Vec::new(),
        }
    }

    /// Record export metadata
    pub fn set_source(&mut self, source: SourceInfo) {
        log::debug!("Processing dictionary export {source:?}");
        self.source = source;
    }

    /// Declare a grammeme
    ///
    /// A grammeme with the same name as a previously declared one replaces it.
    /// Lemmas that were added before keep referencing the former grammeme.
    pub fn add_grammeme(&mut self, grammeme: Grammeme) {
        log::trace!("Declared {grammeme:?}");
        if let Some(former) = self
            .grammemes
            .insert(grammeme.name.clone(), Arc::new(grammeme))
        {
            log::debug!("Grammeme {:?} was redeclared, replacing {former:?}", former.name);
        }
    }

    /// Resolve a lemma's grammeme references and add it to the dictionary
    pub fn add_lemma(&mut self, lemma: ParsedLemma) -> Result<()> {
        let ParsedLemma { id, main, forms } = lemma;
        let ParsedForm { text, grammemes } = main;
        let grammemes = self.resolve(id, grammemes)?;
        let forms = forms
            .into_iter()
            .map(|ParsedForm { text, grammemes }| {
                Ok(WordForm {
                    form: text,
                    grammemes: self.resolve(id, grammemes)?,
                })
            })
            .collect::<Result<Box<[_]>>>()?;
        let lemma = Lemma {
            id,
            lemma: text,
            grammemes,
            forms,
        };
        log::trace!("Added {lemma:?}");
        self.lemmas.push(lemma);
        Ok(())
    }

    /// Export the dictionary
    pub fn finish(self) -> Dictionary {
        Dictionary {
            source: self.source,
            grammemes: self.grammemes,
            lemmas: self.lemmas,
        }
    }

    /// Resolve grammeme names against the grammemes declared so far
    ///
    /// Undeclared names are recorded as absent, or rejected in strict mode.
    fn resolve(&self, lemma: LemmaId, names: Vec<GrammemeName>) -> Result<Box<[GrammemeRef]>> {
        names
            .into_iter()
            .map(|name| match self.grammemes.get(&name) {
                Some(grammeme) => Ok(Some(grammeme.clone())),
                None if self.config.strict => Err(Error::UnresolvedGrammeme { lemma, name }),
                None => {
                    log::warn!(
                        "Lemma {lemma} references undeclared grammeme {name:?}, recording it as absent"
                    );
                    Ok(None)
                }
            })
            .collect()
    }
}
