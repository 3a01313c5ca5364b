//! In-memory representation of the OpenCorpora morphological dictionary
//!
//! - Grammemes (grammatical categories) are registered by name
//! - Lemmas keep their document order and own their word forms
//! - Grammeme references share the registry's instances in memory, but are
//!   serialized by value, so a snapshot does not depend on the registry to be
//!   interpreted.

pub mod builder;

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

/// Name of a grammeme, e.g. "NOUN" or "anim"
pub type GrammemeName = Box<str>;

/// Source-assigned lemma identifier
pub type LemmaId = i64;

/// Grammeme reference after resolution against the registry
///
/// `None` means that the referenced name was not declared at the time the
/// reference was processed.
pub type GrammemeRef = Option<Arc<Grammeme>>;

/// Named grammatical category (part of speech, case, gender...)
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Grammeme {
    /// Unique name, used by lemmas to reference this grammeme
    pub name: GrammemeName,

    /// Short alias
    pub alias: Box<str>,

    /// Human-readable description
    pub description: Box<str>,

    /// Name of the parent grammeme, if any
    ///
    /// This is not resolved against the registry.
    pub parent: Option<GrammemeName>,
}

/// Dictionary entry: canonical word form and its inflections
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Lemma {
    /// Identifier from the source document, not checked for uniqueness
    pub id: LemmaId,

    /// Canonical (dictionary) form
    pub lemma: Box<str>,

    /// Grammemes of the canonical form, in document order
    pub grammemes: Box<[GrammemeRef]>,

    /// Inflected forms, in document order
    pub forms: Box<[WordForm]>,
}

/// Inflected surface form of a [`Lemma`]
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct WordForm {
    /// Surface form
    pub form: Box<str>,

    /// Grammemes that apply to this form, in document order
    pub grammemes: Box<[GrammemeRef]>,
}

/// Which export of the dictionary a model was built from
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SourceInfo {
    /// Version attribute of the document root
    pub version: Option<Box<str>>,

    /// Revision attribute of the document root
    pub revision: Option<u64>,
}

/// Complete dictionary model, as produced by [`builder::build()`]
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Dictionary {
    /// Source export metadata
    pub source: SourceInfo,

    /// Grammeme registry, keyed by name
    pub grammemes: HashMap<GrammemeName, Arc<Grammeme>>,

    /// Lemmas, in document order
    pub lemmas: Vec<Lemma>,
}
//
impl Dictionary {
    /// Total number of word forms across all lemmas
    pub fn num_forms(&self) -> usize {
        self.lemmas.iter().map(|lemma| lemma.forms.len()).sum()
    }
}
