//! Legacy XML envelope helpers
//!
//! Only what the ticket strategy and the raw XML transport need: building a
//! `<qdbapi>` request and reading the top-level result elements plus the
//! `errcode` / `errtext` / `errdetail` triple. Action-specific payloads are
//! returned to callers untouched.

use crate::error::{Error, Result};
use quick_xml::escape::escape;
use std::collections::HashMap;

/// Content type for the legacy transport
pub const XML_CONTENT_TYPE: &str = "application/xml";

/// Header naming the legacy action
pub const ACTION_HEADER: &str = "QUICKBASE-ACTION";

/// Build a `<qdbapi>` envelope from escaped elements plus a raw XML fragment
pub fn build_envelope(elements: &[(&str, &str)], raw_inner: &str) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><qdbapi>");
    for (name, value) in elements {
        xml.push('<');
        xml.push_str(name);
        xml.push('>');
        xml.push_str(&escape(*value));
        xml.push_str("</");
        xml.push_str(name);
        xml.push('>');
    }
    xml.push_str(raw_inner);
    xml.push_str("</qdbapi>");
    xml
}

/// Top-level text elements of a `<qdbapi>` response
#[derive(Debug, Clone, Default)]
pub struct XmlResponse {
    /// `errcode`, 0 on success
    pub errcode: i64,
    /// `errtext`
    pub errtext: String,
    /// `errdetail`, when present
    pub errdetail: Option<String>,
    fields: HashMap<String, String>,
}

impl XmlResponse {
    /// Parse a response document
    pub fn parse(text: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(text).map_err(|e| Error::xml_parse(e.to_string()))?;
        let root = doc.root_element();
        if root.tag_name().name() != "qdbapi" {
            return Err(Error::xml_parse(format!(
                "expected <qdbapi> root, found <{}>",
                root.tag_name().name()
            )));
        }

        let fields: HashMap<String, String> = root
            .children()
            .filter(roxmltree::Node::is_element)
            .map(|node| {
                (
                    node.tag_name().name().to_string(),
                    node.text().unwrap_or_default().trim().to_string(),
                )
            })
            .collect();

        let errcode = match fields.get("errcode") {
            Some(code) => code
                .parse()
                .map_err(|_| Error::xml_parse(format!("invalid errcode '{code}'")))?,
            None => return Err(Error::xml_parse("response has no <errcode>")),
        };

        Ok(Self {
            errcode,
            errtext: fields.get("errtext").cloned().unwrap_or_default(),
            errdetail: fields.get("errdetail").filter(|d| !d.is_empty()).cloned(),
            fields,
        })
    }

    /// Text of a top-level element
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Fail with [`Error::XmlApi`] on a non-zero errcode
    pub fn into_result(self) -> Result<Self> {
        if self.errcode == 0 {
            Ok(self)
        } else {
            Err(Error::XmlApi {
                code: self.errcode,
                text: self.errtext,
                detail: self.errdetail,
            })
        }
    }
}
