//! Module descriptor documents.
//!
//! A module descriptor is a small XML document declaring a named build
//! unit's public resources, source roots, entry points, servlet mappings,
//! and the modules it inherits from:
//!
//! ```xml
//! <module rename-to="app">
//!   <inherits name="com.example.Widgets"/>
//!   <source path="client"/>
//!   <public path="static"/>
//!   <entry-point class="com.example.app.client.App"/>
//!   <servlet path="/rpc" class="com.example.app.server.RpcImpl"/>
//! </module>
//! ```
//!
//! Descriptors are attribute-driven: text content, comments, and processing
//! instructions are ignored. The parser builds a plain recursive element
//! tree; all interpretation of tags and attributes lives in
//! [`crate::module`].

use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

/// File-name suffix of on-disk module descriptors.
pub const DESCRIPTOR_SUFFIX: &str = ".module.xml";

/// Root element tag every descriptor must carry.
pub const ROOT_TAG: &str = "module";

/// Errors that can occur while reading a descriptor document.
#[derive(Debug, Error)]
pub enum DescriptorError {
  /// The descriptor file could not be read.
  #[error("cannot read '{}': {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The document is not well-formed XML.
  #[error("malformed descriptor at byte {position}: {message}")]
  Parse { position: u64, message: String },

  /// The document contains no root element.
  #[error("descriptor has no root element")]
  Empty,

  /// The root element is not `<module>`.
  #[error("expected <{ROOT_TAG}> root element, found <{tag}>")]
  UnexpectedRoot { tag: String },
}

/// One parsed descriptor element: tag name, attributes and child elements,
/// both in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
  tag: String,
  attributes: Vec<(String, String)>,
  children: Vec<Descriptor>,
}

impl Descriptor {
  /// Parse a descriptor document from its source text.
  ///
  /// The root element must be `<{ROOT_TAG}>`; content after it is ignored.
  pub fn parse(input: &str) -> Result<Self, DescriptorError> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<Descriptor> = Vec::new();
    let mut root: Option<Descriptor> = None;

    loop {
      match reader.read_event() {
        Ok(Event::Start(element)) => {
          let node = element_node(&reader, &element)?;
          stack.push(node);
        }
        Ok(Event::Empty(element)) => {
          let node = element_node(&reader, &element)?;
          attach(&mut stack, &mut root, node);
        }
        Ok(Event::End(_)) => {
          if let Some(node) = stack.pop() {
            attach(&mut stack, &mut root, node);
          }
        }
        Ok(Event::Eof) => break,
        // Text, CDATA, comments, PIs, declarations carry no descriptor data
        Ok(_) => {}
        Err(err) => {
          return Err(DescriptorError::Parse {
            position: reader.buffer_position(),
            message: err.to_string(),
          });
        }
      }
    }

    if !stack.is_empty() {
      return Err(DescriptorError::Parse {
        position: reader.buffer_position(),
        message: "unclosed element".to_string(),
      });
    }

    let root = root.ok_or(DescriptorError::Empty)?;
    if root.tag != ROOT_TAG {
      return Err(DescriptorError::UnexpectedRoot { tag: root.tag });
    }
    Ok(root)
  }

  /// Parse a descriptor document from a file.
  pub fn parse_file(path: &Path) -> Result<Self, DescriptorError> {
    let input = fs::read_to_string(path).map_err(|source| DescriptorError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(&input)
  }

  /// The element's tag name.
  pub fn tag(&self) -> &str {
    &self.tag
  }

  /// Look up an attribute by name (first declaration wins).
  pub fn attribute(&self, name: &str) -> Option<&str> {
    self
      .attributes
      .iter()
      .find(|(key, _)| key == name)
      .map(|(_, value)| value.as_str())
  }

  /// Child elements with the given tag, in document order.
  pub fn children<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Descriptor> {
    self.children.iter().filter(move |child| child.tag == tag)
  }
}

/// Build a childless node from a start/empty tag, decoding its attributes.
fn element_node<R>(reader: &Reader<R>, element: &BytesStart<'_>) -> Result<Descriptor, DescriptorError> {
  let tag = String::from_utf8_lossy(element.name().as_ref()).into_owned();

  let mut attributes = Vec::new();
  for attribute in element.attributes() {
    let attribute = attribute.map_err(|err| DescriptorError::Parse {
      position: reader.buffer_position(),
      message: err.to_string(),
    })?;
    let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
    let value = attribute
      .unescape_value()
      .map_err(|err| DescriptorError::Parse {
        position: reader.buffer_position(),
        message: err.to_string(),
      })?
      .into_owned();
    attributes.push((key, value));
  }

  Ok(Descriptor {
    tag,
    attributes,
    children: Vec::new(),
  })
}

/// Hand a completed node to its parent, or make it the root.
fn attach(stack: &mut Vec<Descriptor>, root: &mut Option<Descriptor>, node: Descriptor) {
  if let Some(parent) = stack.last_mut() {
    parent.children.push(node);
  } else if root.is_none() {
    *root = Some(node);
  }
}
