//! The XML document sent to the remote side with `update_settings_xml`.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use xmltree::{Element, EmitterConfig, XMLNode};

use crate::error::{GlotError, Result};

const DEFINITION: &str = "definition";
const TRANSFERRER: &str = "transferrer";
const INPUT: &str = "input";
const LOCATION: &str = "location";

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationDescriptor {
    root: Element,
}

impl SimulationDescriptor {
    pub fn parse<R: Read>(reader: R) -> Result<Self> {
        Ok(Self {
            root: Element::parse(reader)?,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(GlotError::io("failed to open descriptor", path))?;
        Self::parse(BufReader::new(file))
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Point the first `definition` element at the definition bundle.
    pub fn set_definition_location(&mut self, location: &str) -> Result<()> {
        let definition = find_mut(&mut self.root, DEFINITION)
            .ok_or(GlotError::InvalidDescriptor { element: DEFINITION })?;
        definition
            .attributes
            .insert(LOCATION.to_string(), location.to_string());
        Ok(())
    }

    /// Append an `input` child carrying the input bundle's location to the
    /// first `transferrer` element.
    pub fn add_input_location(&mut self, location: &str) -> Result<()> {
        let transferrer = find_mut(&mut self.root, TRANSFERRER)
            .ok_or(GlotError::InvalidDescriptor { element: TRANSFERRER })?;
        let mut input = Element::new(INPUT);
        input
            .attributes
            .insert(LOCATION.to_string(), location.to_string());
        transferrer.children.push(XMLNode::Element(input));
        Ok(())
    }

    pub fn definition_location(&self) -> Option<&str> {
        find(&self.root, DEFINITION)
            .and_then(|definition| definition.attributes.get(LOCATION))
            .map(String::as_str)
    }

    /// Locations of every `transferrer/input` child, in document order.
    pub fn input_locations(&self) -> Vec<&str> {
        find(&self.root, TRANSFERRER)
            .map(|transferrer| {
                transferrer
                    .children
                    .iter()
                    .filter_map(XMLNode::as_element)
                    .filter(|child| child.name == INPUT)
                    .filter_map(|child| child.attributes.get(LOCATION).map(String::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn to_xml_string(&self) -> Result<String> {
        let mut out = Vec::new();
        let config = EmitterConfig::new()
            .perform_indent(false)
            .write_document_declaration(false);
        self.root.write_with_config(&mut out, config)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

fn find<'a>(element: &'a Element, name: &str) -> Option<&'a Element> {
    if element.name == name {
        return Some(element);
    }
    element
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .find_map(|child| find(child, name))
}

fn find_mut<'a>(element: &'a mut Element, name: &str) -> Option<&'a mut Element> {
    if element.name == name {
        return Some(element);
    }
    for child in element.children.iter_mut() {
        if let XMLNode::Element(child) = child {
            if let Some(found) = find_mut(child, name) {
                return Some(found);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<simulation>
  <definition family="elmer-libnuma"/>
  <transferrer class="http"><url>http://files.local</url></transferrer>
</simulation>"#;

    #[test]
    fn sets_definition_location_attribute() {
        let mut descriptor = SimulationDescriptor::parse(SAMPLE.as_bytes()).expect("parse");
        descriptor
            .set_definition_location("/tmp/gssa-transferrer/def.tar.gz")
            .expect("definition exists");

        assert_eq!(
            descriptor.definition_location(),
            Some("/tmp/gssa-transferrer/def.tar.gz")
        );
        let xml = descriptor.to_xml_string().expect("serialize");
        assert!(xml.contains(r#"location="/tmp/gssa-transferrer/def.tar.gz""#));
        assert!(xml.contains(r#"family="elmer-libnuma""#));
    }

    #[test]
    fn adds_input_child_to_transferrer() {
        let mut descriptor = SimulationDescriptor::parse(SAMPLE.as_bytes()).expect("parse");
        descriptor
            .add_input_location("/tmp/gssa-transferrer/in.tar.gz")
            .expect("transferrer exists");

        assert_eq!(
            descriptor.input_locations(),
            vec!["/tmp/gssa-transferrer/in.tar.gz"]
        );
    }

    #[test]
    fn serialized_document_starts_at_root_element() {
        let descriptor = SimulationDescriptor::parse(SAMPLE.as_bytes()).expect("parse");
        let xml = descriptor.to_xml_string().expect("serialize");
        assert!(xml.starts_with("<simulation>"), "unexpected prologue: {xml}");
        assert!(!xml.contains("<?xml"));
    }

    #[test]
    fn missing_definition_is_reported() {
        let mut descriptor =
            SimulationDescriptor::parse("<simulation/>".as_bytes()).expect("parse");
        let error = descriptor
            .set_definition_location("/x")
            .expect_err("no definition element");
        assert!(matches!(
            error,
            GlotError::InvalidDescriptor {
                element: "definition"
            }
        ));
    }

    #[test]
    fn finds_nested_definition() {
        let mut descriptor = SimulationDescriptor::parse(
            "<simulation><model><definition/></model></simulation>".as_bytes(),
        )
        .expect("parse");
        descriptor.set_definition_location("/x").expect("nested definition");
        assert_eq!(descriptor.definition_location(), Some("/x"));
    }

    #[test]
    fn malformed_xml_fails_to_parse() {
        let error = SimulationDescriptor::parse("<simulation>".as_bytes())
            .expect_err("unterminated document");
        assert!(matches!(error, GlotError::Xml(_)));
    }
}
