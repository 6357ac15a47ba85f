//! quick-xml plumbing shared by the package readers and the worksheet writer

use crate::error::RustyFillError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Unknown XML entity '&{0};'")]
    ParseEntityError(String),

    #[error("Unexpected attribute value '{0}'")]
    ParseAttributeValueError(String),
}

/// Pull reader over one XML part, reusing a single event buffer.
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    /// Reader for extracting content: `<a/>` is reported as a start and an end event.
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        Self::configured(buf_reader, true)
    }

    /// Reader whose events can be written back unchanged: `<a/>` stays one empty event.
    pub(crate) fn verbatim(buf_reader: R) -> XmlReader<R> {
        Self::configured(buf_reader, false)
    }

    fn configured(buf_reader: R, expand_empty_elements: bool) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        {
            let config = reader.config_mut();
            config.expand_empty_elements = expand_empty_elements;
            config.check_end_names = false;
            config.check_comments = false;
            config.trim_text(false);
        }
        XmlReader { reader, buffer: Vec::with_capacity(1024) }
    }

    /// Next event, or None at the end of the document.
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, RustyFillError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer)? {
            Event::Eof => Ok(None),
            event => Ok(Some(event)),
        }
    }
}

pub(crate) trait XmlAttributeHelper<'a> {
    /// Attribute value with entities resolved
    fn get_value(&self) -> Result<Cow<'a, str>, RustyFillError>;

    fn parse_value<T: FromStr>(&self) -> Result<T, RustyFillError>;
}

impl<'a> XmlAttributeHelper<'a> for Attribute<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, RustyFillError> {
        Ok(self.unescape_value()?)
    }

    fn parse_value<T: FromStr>(&self) -> Result<T, RustyFillError> {
        let value = self.get_value()?;
        value
            .parse::<T>()
            .map_err(|_| XmlError::ParseAttributeValueError(value.to_string()).into())
    }
}

/// Attribute lookup by name on start and empty elements.
pub(crate) trait XmlNodeHelper<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, RustyFillError>;

    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, RustyFillError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, RustyFillError> {
        match self.try_get_attribute(name)? {
            Some(attribute) => Ok(Some(attribute.get_value()?)),
            None => Ok(None),
        }
    }

    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, RustyFillError> {
        match self.try_get_attribute(name)? {
            Some(attribute) => Ok(Some(attribute.parse_value()?)),
            None => Ok(None),
        }
    }
}

/// Accumulates element text split across text and reference events.
pub(crate) trait XmlTextContextHelper {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), RustyFillError>;

    /// Resolves `&amp;`-style entities and `&#65;` / `&#x41;` character references.
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), RustyFillError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), RustyFillError> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), RustyFillError> {
        let name = bytes.xml_content()?;
        match name.strip_prefix('#') {
            Some(reference) => {
                let code = match reference.strip_prefix('x') {
                    Some(hex) => u32::from_str_radix(hex, 16)?,
                    None => reference.parse::<u32>()?,
                };
                self.extend(char::from_u32(code));
            }
            None => {
                let entity = resolve_xml_entity(&name)
                    .ok_or_else(|| XmlError::ParseEntityError(name.to_string()))?;
                self.push_str(entity);
            }
        }
        Ok(())
    }
}

/// Loops over the events of an [`XmlReader`], ignoring events no arm matches.
/// Arms may `break` out of the loop.
#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}
