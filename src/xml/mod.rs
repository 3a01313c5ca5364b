//! Decoding of individual elements from the OpenCorpora XML export
//!
//! The export is a flat sequence of grammeme declarations followed by lemmas:
//!
//! ```xml
//! <dictionary version="0.92" revision="417150">
//!   <grammemes>
//!     <grammeme parent="POST"><name>NOUN</name><alias>СУЩ</alias><description>имя существительное</description></grammeme>
//!   </grammemes>
//!   <lemmata>
//!     <lemma id="1" rev="1"><l t="ёж"><g v="NOUN"/></l><f t="ёж"><g v="sing"/><g v="nomn"/></f></lemma>
//!   </lemmata>
//! </dictionary>
//! ```
//!
//! Each decoding routine takes an event reader positioned right after the
//! start tag of the element of interest, consumes the element up to and
//! including its end tag, and returns the decoded value. Nothing is resolved
//! here: grammeme references are returned as plain names.

use crate::{
    dictionary::{Grammeme, GrammemeName, LemmaId},
    error::{Error, Result},
};
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use tokio::io::AsyncBufRead;

/// Lemma as it appears in the document, before grammeme resolution
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedLemma {
    /// Identifier from the `id` attribute
    pub id: LemmaId,

    /// Canonical form, from the `<l>` child
    pub main: ParsedForm,

    /// Inflected forms, from the `<f>` children, in document order
    pub forms: Vec<ParsedForm>,
}

/// Word form as it appears in the document, before grammeme resolution
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedForm {
    /// Surface form, from the `t` attribute
    pub text: Box<str>,

    /// Names from the `<g v="..."/>` children, in document order
    pub grammemes: Vec<GrammemeName>,
}

/// Set up an XML event reader over a buffered byte stream
pub fn reader<R: AsyncBufRead + Unpin>(stream: R) -> Reader<R> {
    let mut reader = Reader::from_reader(stream);
    reader.config_mut().trim_text(true);
    reader
}

/// Decode a `<grammeme>` element whose start tag was just read
///
/// `self_closing` should be true if the start tag was of the `<grammeme/>`
/// form, in which case nothing more is read from `reader`. `buf` is scratch
/// space, which must not be the buffer that `start` borrows from.
pub async fn decode_grammeme<R: AsyncBufRead + Unpin>(
    reader: &mut Reader<R>,
    start: &BytesStart<'_>,
    self_closing: bool,
    buf: &mut Vec<u8>,
) -> Result<Grammeme> {
    const ELEMENT: &str = "grammeme";
    let parent = attribute(start, ELEMENT, "parent")?
        .filter(|parent| !parent.is_empty())
        .map(Into::into);
    let mut grammeme = Grammeme {
        parent,
        ..Grammeme::default()
    };
    if self_closing {
        return Ok(grammeme);
    }

    /// Child elements of interest
    enum Field {
        Name,
        Alias,
        Description,
        Other,
    }
    loop {
        buf.clear();
        let (field, self_closing) = match reader
            .read_event_into_async(buf)
            .await
            .map_err(xml_error(ELEMENT))?
        {
            Event::Start(child) => (field_kind(&child), false),
            Event::Empty(child) => (field_kind(&child), true),
            Event::End(_) => return Ok(grammeme),
            Event::Eof => return Err(unexpected_eof(ELEMENT)),
            _ => continue,
        };
        fn field_kind(child: &BytesStart<'_>) -> Field {
            match child.local_name().as_ref() {
                b"name" => Field::Name,
                b"alias" => Field::Alias,
                b"description" => Field::Description,
                _ => Field::Other,
            }
        }
        if self_closing {
            // <alias/> and friends stand for empty strings
            continue;
        }
        match field {
            Field::Name => grammeme.name = read_text(reader, buf, ELEMENT).await?,
            Field::Alias => grammeme.alias = read_text(reader, buf, ELEMENT).await?,
            Field::Description => grammeme.description = read_text(reader, buf, ELEMENT).await?,
            Field::Other => skip_element(reader, buf, ELEMENT).await?,
        }
    }
}

/// Decode a `<lemma>` element whose start tag was just read
///
/// Same conventions as [`decode_grammeme()`]. The lemma must have an integer
/// `id` attribute and exactly one `<l>` child.
pub async fn decode_lemma<R: AsyncBufRead + Unpin>(
    reader: &mut Reader<R>,
    start: &BytesStart<'_>,
    self_closing: bool,
    buf: &mut Vec<u8>,
) -> Result<ParsedLemma> {
    const ELEMENT: &str = "lemma";
    let id = required_attribute(start, ELEMENT, "id")?;
    let id = id
        .trim()
        .parse::<LemmaId>()
        .map_err(|e| Error::parse(ELEMENT, format!("invalid id {id:?}: {e}")))?;

    /// Child elements of interest
    enum Child {
        Main(Box<str>),
        Form(Box<str>),
        Other,
    }
    let mut main = None;
    let mut forms = Vec::new();
    if !self_closing {
        loop {
            buf.clear();
            let (child, self_closing) = match reader
                .read_event_into_async(buf)
                .await
                .map_err(xml_error(ELEMENT))?
            {
                Event::Start(child) => (child_kind(&child)?, false),
                Event::Empty(child) => (child_kind(&child)?, true),
                Event::End(_) => break,
                Event::Eof => return Err(unexpected_eof(ELEMENT)),
                _ => continue,
            };
            fn child_kind(child: &BytesStart<'_>) -> Result<Child> {
                Ok(match child.local_name().as_ref() {
                    b"l" => Child::Main(required_attribute(child, "l", "t")?.into()),
                    b"f" => Child::Form(required_attribute(child, "f", "t")?.into()),
                    _ => Child::Other,
                })
            }
            match child {
                Child::Main(text) => {
                    if main.is_some() {
                        return Err(Error::parse(
                            ELEMENT,
                            format!("lemma {id} has more than one <l> element"),
                        ));
                    }
                    let grammemes = decode_form_grammemes(reader, buf, "l", self_closing).await?;
                    main = Some(ParsedForm { text, grammemes });
                }
                Child::Form(text) => {
                    let grammemes = decode_form_grammemes(reader, buf, "f", self_closing).await?;
                    forms.push(ParsedForm { text, grammemes });
                }
                Child::Other if self_closing => {}
                Child::Other => skip_element(reader, buf, ELEMENT).await?,
            }
        }
    }
    let main =
        main.ok_or_else(|| Error::parse(ELEMENT, format!("lemma {id} has no <l> element")))?;
    Ok(ParsedLemma { id, main, forms })
}

/// Read the `<g v="..."/>` children of an `<l>` or `<f>` element whose start
/// tag was just read, up to and including its end tag
async fn decode_form_grammemes<R: AsyncBufRead + Unpin>(
    reader: &mut Reader<R>,
    buf: &mut Vec<u8>,
    element: &'static str,
    self_closing: bool,
) -> Result<Vec<GrammemeName>> {
    let mut grammemes = Vec::new();
    if self_closing {
        return Ok(grammemes);
    }
    loop {
        buf.clear();
        let (name, self_closing) = match reader
            .read_event_into_async(buf)
            .await
            .map_err(xml_error(element))?
        {
            Event::Start(child) => (grammeme_name(&child)?, false),
            Event::Empty(child) => (grammeme_name(&child)?, true),
            Event::End(_) => return Ok(grammemes),
            Event::Eof => return Err(unexpected_eof(element)),
            _ => continue,
        };
        fn grammeme_name(child: &BytesStart<'_>) -> Result<Option<GrammemeName>> {
            if child.local_name().as_ref() == b"g" {
                Ok(Some(required_attribute(child, "g", "v")?.into()))
            } else {
                Ok(None)
            }
        }
        if let Some(name) = name {
            grammemes.push(name);
        }
        if !self_closing {
            skip_element(reader, buf, element).await?;
        }
    }
}

/// Collect the text content of an element whose start tag was just read, up
/// to and including its end tag
///
/// Whitespace is kept as-is, including around CDATA sections. Nested
/// elements are skipped, their text is not collected.
async fn read_text<R: AsyncBufRead + Unpin>(
    reader: &mut Reader<R>,
    buf: &mut Vec<u8>,
    element: &'static str,
) -> Result<Box<str>> {
    reader.config_mut().trim_text(false);
    let text = read_untrimmed_text(reader, buf, element).await;
    reader.config_mut().trim_text(true);
    text
}

/// Implementation of [`read_text()`], for a reader that does not trim text
async fn read_untrimmed_text<R: AsyncBufRead + Unpin>(
    reader: &mut Reader<R>,
    buf: &mut Vec<u8>,
    element: &'static str,
) -> Result<Box<str>> {
    let mut text = String::new();
    loop {
        buf.clear();
        let nested = match reader
            .read_event_into_async(buf)
            .await
            .map_err(xml_error(element))?
        {
            Event::Text(t) => {
                let unescaped = t
                    .unescape()
                    .map_err(|e| Error::parse(element, e.to_string()))?;
                text.push_str(&unescaped);
                false
            }
            Event::CData(c) => {
                let raw = c.into_inner();
                let decoded = std::str::from_utf8(&raw)
                    .map_err(|e| Error::parse(element, format!("invalid CDATA: {e}")))?;
                text.push_str(decoded);
                false
            }
            Event::Start(_) => true,
            Event::End(_) => return Ok(text.into()),
            Event::Eof => return Err(unexpected_eof(element)),
            _ => false,
        };
        if nested {
            skip_element(reader, buf, element).await?;
        }
    }
}

/// Skip over an element whose start tag was just read, up to and including
/// its end tag
pub async fn skip_element<R: AsyncBufRead + Unpin>(
    reader: &mut Reader<R>,
    buf: &mut Vec<u8>,
    element: &'static str,
) -> Result<()> {
    let mut depth = 1usize;
    while depth > 0 {
        buf.clear();
        match reader
            .read_event_into_async(buf)
            .await
            .map_err(xml_error(element))?
        {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(unexpected_eof(element)),
            _ => {}
        }
    }
    Ok(())
}

/// Look up an attribute of a start tag by local name
pub fn attribute(
    start: &BytesStart<'_>,
    element: &'static str,
    key: &str,
) -> Result<Option<String>> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::parse(element, e.to_string()))?;
        if attr.key.local_name().as_ref() == key.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| Error::parse(element, format!("bad {key} attribute: {e}")))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Look up an attribute that must be present
fn required_attribute(start: &BytesStart<'_>, element: &'static str, key: &str) -> Result<String> {
    attribute(start, element, key)?
        .ok_or_else(|| Error::parse(element, format!("missing {key} attribute")))
}

/// Translate errors from the XML reader while inside of some element
fn xml_error(element: &'static str) -> impl FnOnce(quick_xml::Error) -> Error {
    move |e| match e {
        quick_xml::Error::Io(e) => Error::Decode(e),
        other => Error::parse(element, other.to_string()),
    }
}

/// Error for a document that ends in the middle of an element
fn unexpected_eof(element: &'static str) -> Error {
    Error::parse(element, "unexpected end of document")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run a decoding routine on the first element of an XML fragment, then
    /// report the decoding result and the local name of the next element
    macro_rules! decode_first {
        ($decode:ident, $xml:expr) => {{
            let xml: &'static str = $xml;
            let mut reader = reader(xml.as_bytes());
            let mut buf = Vec::new();
            let mut scratch = Vec::new();
            let result = loop {
                buf.clear();
                match reader
                    .read_event_into_async(&mut buf)
                    .await
                    .expect("fragment should start with valid XML")
                {
                    Event::Start(start) => {
                        break $decode(&mut reader, &start, false, &mut scratch).await
                    }
                    Event::Empty(start) => {
                        break $decode(&mut reader, &start, true, &mut scratch).await
                    }
                    Event::Eof => panic!("no element in {xml:?}"),
                    _ => {}
                }
            };
            (result, next_element(&mut reader).await)
        }};
    }

    /// Local name of the next element start, if any
    async fn next_element(reader: &mut Reader<&'static [u8]>) -> Option<String> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_event_into_async(&mut buf).await.ok()? {
                Event::Start(e) | Event::Empty(e) => {
                    return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned())
                }
                Event::Eof => return None,
                _ => {}
            }
        }
    }

    fn form(text: &str, grammemes: &[&str]) -> ParsedForm {
        ParsedForm {
            text: text.into(),
            grammemes: grammemes.iter().map(|&g| g.into()).collect(),
        }
    }

    #[tokio::test]
    async fn grammeme() {
        let (grammeme, next) = decode_first!(
            decode_grammeme,
            r#"<grammeme parent="NOUN"><name>ANIM</name><alias>anim</alias><description>одушевлённое</description></grammeme><next/>"#
        );
        assert_eq!(
            grammeme.unwrap(),
            Grammeme {
                name: "ANIM".into(),
                alias: "anim".into(),
                description: "одушевлённое".into(),
                parent: Some("NOUN".into()),
            }
        );
        assert_eq!(next.as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn grammeme_defaults() {
        let (grammeme, _) = decode_first!(
            decode_grammeme,
            r#"<grammeme parent=""><name>POST</name><alias/><extra><x>1</x></extra></grammeme>"#
        );
        assert_eq!(
            grammeme.unwrap(),
            Grammeme {
                name: "POST".into(),
                ..Grammeme::default()
            }
        );

        let (grammeme, _) = decode_first!(decode_grammeme, "<grammeme><name>NOUN</name></grammeme>");
        assert_eq!(grammeme.unwrap().parent, None);
    }

    #[tokio::test]
    async fn grammeme_text_escapes() {
        let (grammeme, _) = decode_first!(
            decode_grammeme,
            "<grammeme><name>Q&amp;A</name><description><![CDATA[a <b> c]]></description></grammeme>"
        );
        let grammeme = grammeme.unwrap();
        assert_eq!(&*grammeme.name, "Q&A");
        assert_eq!(&*grammeme.description, "a <b> c");
    }

    #[tokio::test]
    async fn grammeme_text_whitespace() {
        let (grammeme, next) = decode_first!(
            decode_grammeme,
            "<grammeme>\n  <name> NOUN</name>\n  <description> a <![CDATA[b]]> c </description>\n</grammeme>\n<next/>"
        );
        let grammeme = grammeme.unwrap();
        assert_eq!(&*grammeme.name, " NOUN");
        assert_eq!(&*grammeme.description, " a b c ");
        assert_eq!(next.as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn lemma() {
        let (lemma, next) = decode_first!(
            decode_lemma,
            r#"<lemma id="42" rev="3">
                 <l t="cat"><g v="NOUN"/></l>
                 <f t="cat"><g v="NOUN"/><g v="sing"/></f>
                 <f t="cats"><g v="NOUN"/><g v="plur"/></f>
               </lemma>
               <after/>"#
        );
        assert_eq!(
            lemma.unwrap(),
            ParsedLemma {
                id: 42,
                main: form("cat", &["NOUN"]),
                forms: vec![form("cat", &["NOUN", "sing"]), form("cats", &["NOUN", "plur"])],
            }
        );
        assert_eq!(next.as_deref(), Some("after"));
    }

    #[tokio::test]
    async fn lemma_skips_unknown_children() {
        let (lemma, _) = decode_first!(
            decode_lemma,
            r#"<lemma id="7"><note><x>y</x></note><l t="a" extra="1"/><f t="b"><g v="X"><junk/></g></f><hr/></lemma>"#
        );
        assert_eq!(
            lemma.unwrap(),
            ParsedLemma {
                id: 7,
                main: form("a", &[]),
                forms: vec![form("b", &["X"])],
            }
        );
    }

    #[tokio::test]
    async fn lemma_without_id() {
        let (lemma, _) = decode_first!(decode_lemma, r#"<lemma><l t="a"/></lemma>"#);
        assert!(matches!(lemma, Err(Error::Parse { element: "lemma", .. })));

        let (lemma, _) = decode_first!(decode_lemma, r#"<lemma id="x1"><l t="a"/></lemma>"#);
        assert!(matches!(lemma, Err(Error::Parse { element: "lemma", .. })));
    }

    #[tokio::test]
    async fn lemma_main_form() {
        let (lemma, _) = decode_first!(decode_lemma, r#"<lemma id="1"><f t="a"/></lemma>"#);
        assert!(matches!(lemma, Err(Error::Parse { element: "lemma", .. })));

        let (lemma, _) = decode_first!(decode_lemma, r#"<lemma id="1"><l t="a"/><l t="b"/></lemma>"#);
        assert!(matches!(lemma, Err(Error::Parse { element: "lemma", .. })));

        let (lemma, _) = decode_first!(decode_lemma, r#"<lemma id="1"><l><g v="X"/></l></lemma>"#);
        assert!(matches!(lemma, Err(Error::Parse { element: "l", .. })));
    }

    #[tokio::test]
    async fn grammeme_reference_without_name() {
        let (lemma, _) = decode_first!(decode_lemma, r#"<lemma id="1"><l t="a"><g/></l></lemma>"#);
        assert!(matches!(lemma, Err(Error::Parse { element: "g", .. })));
    }

    #[tokio::test]
    async fn truncated_lemma() {
        let (lemma, _) = decode_first!(decode_lemma, r#"<lemma id="1"><l t="a"><g v="X"/>"#);
        assert!(matches!(lemma, Err(Error::Parse { element: "l", .. })));

        let (lemma, _) = decode_first!(decode_lemma, r#"<lemma id="1"><l t="a"></f></lemma>"#);
        assert!(matches!(lemma, Err(Error::Parse { element: "l", .. })));
    }
}
