//! SOAP envelope codec
//!
//! Parses the payload element of an incoming envelope into an [`Args`]
//! tree and wraps outgoing fragments in a response or fault envelope of
//! the same SOAP version, echoing the request MessageID as RelatesTo.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use crate::args::Args;
use crate::error::{Fault, SoapError};
use crate::templates::xml_escape;

pub const SOAP_ENV_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
pub const SOAP11_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const WSA_NS: &str = "http://www.w3.org/2005/08/addressing";
pub const SCHEMA_NS: &str = "http://www.onvif.org/ver10/schema";
pub const DEVICE_NS: &str = "http://www.onvif.org/ver10/device/wsdl";
pub const MEDIA_NS: &str = "http://www.onvif.org/ver10/media/wsdl";
pub const PTZ_NS: &str = "http://www.onvif.org/ver20/ptz/wsdl";
pub const ERROR_NS: &str = "http://www.onvif.org/ver10/error";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SoapVersion {
    V11,
    #[default]
    V12,
}

impl SoapVersion {
    pub fn from_namespace(ns: &str) -> Option<Self> {
        match ns {
            SOAP11_ENV_NS => Some(Self::V11),
            SOAP_ENV_NS => Some(Self::V12),
            _ => None,
        }
    }

    /// Best guess for a document that did not parse
    pub fn sniff(xml: &str) -> Self {
        if xml.contains(SOAP11_ENV_NS) {
            Self::V11
        } else {
            Self::V12
        }
    }

    pub fn namespace(self) -> &'static str {
        match self {
            Self::V11 => SOAP11_ENV_NS,
            Self::V12 => SOAP_ENV_NS,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::V11 => "text/xml; charset=utf-8",
            Self::V12 => "application/soap+xml; charset=utf-8",
        }
    }
}

/// What a reply envelope carries over from its request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyContext {
    pub version: SoapVersion,
    pub relates_to: Option<String>,
}

/// The payload of a SOAP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapRequest {
    /// lowerCamel method name, e.g. `getProfiles`
    pub method: String,
    /// Namespace URI of the payload element, when bound
    pub namespace: Option<String>,
    pub args: Args,
    /// Taken from the Envelope namespace; SOAP 1.2 when unrecognised
    pub version: SoapVersion,
    /// WS-Addressing MessageID from the header
    pub message_id: Option<String>,
}

impl SoapRequest {
    pub fn reply(&self) -> ReplyContext {
        ReplyContext {
            version: self.version,
            relates_to: self.message_id.clone(),
        }
    }
}

/// Envelope-level fields seen before the payload
#[derive(Default)]
struct Header {
    version: SoapVersion,
    message_id: Option<String>,
}

/// Parse a SOAP envelope and extract the first element inside `Body`
pub fn parse_request(xml: &str) -> Result<SoapRequest, SoapError> {
    let mut reader = NsReader::from_str(xml);

    // open elements outside the payload
    let mut outer: Vec<String> = Vec::new();
    // open payload elements, root first
    let mut stack: Vec<Args> = Vec::new();
    let mut namespace = None;
    let mut header = Header::default();
    let mut in_body = false;

    loop {
        let (ns, event) = reader.read_resolved_event().map_err(xml_err)?;
        let ns = bound_namespace(ns);

        match event {
            Event::Start(e) => {
                let name = local_name(&e);
                if in_body {
                    if stack.is_empty() {
                        namespace = ns;
                    }
                    stack.push(element(&e, name)?);
                } else {
                    if outer.is_empty() && name == "Envelope" {
                        if let Some(version) = ns.as_deref().and_then(SoapVersion::from_namespace) {
                            header.version = version;
                        }
                    }
                    if name == "Body" && outer.last().map(String::as_str) == Some("Envelope") {
                        in_body = true;
                    }
                    outer.push(name);
                }
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                if in_body {
                    let node = element(&e, name)?;
                    match stack.last_mut() {
                        Some(parent) => parent.push_child(node),
                        None => return Ok(request(node, ns, header)),
                    }
                } else if name == "Body" && outer.last().map(String::as_str) == Some("Envelope") {
                    return Err(SoapError::EmptyBody);
                }
            }
            Event::End(_) => match stack.pop() {
                Some(node) => match stack.last_mut() {
                    Some(parent) => parent.push_child(node),
                    None => return Ok(request(node, namespace.take(), header)),
                },
                None => {
                    if in_body {
                        return Err(SoapError::EmptyBody);
                    }
                    outer.pop();
                }
            },
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.push_text(&t.unescape().map_err(xml_err)?);
                } else if in_header_field(&outer, "MessageID") {
                    let text = t.unescape().map_err(xml_err)?;
                    header.message_id = Some(text.trim().to_string());
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.push_text(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => {
                if !outer.is_empty() || !stack.is_empty() {
                    return Err(SoapError::Xml("unexpected end of document".to_string()));
                }
                return Err(SoapError::MissingBody);
            }
            _ => {}
        }
    }
}

fn request(args: Args, namespace: Option<String>, header: Header) -> SoapRequest {
    SoapRequest {
        method: method_name(args.name()),
        namespace,
        args,
        version: header.version,
        message_id: header.message_id.filter(|id| !id.is_empty()),
    }
}

/// `Envelope/Header/<field>` is the innermost open element
fn in_header_field(outer: &[String], field: &str) -> bool {
    matches!(outer, [e, h, f] if e == "Envelope" && h == "Header" && f == field)
}

fn element(e: &BytesStart<'_>, name: String) -> Result<Args, SoapError> {
    let mut node = Args::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(xml_err)?;
        let key = attr.key;
        if key.as_namespace_binding().is_some() {
            continue;
        }
        let attr_name = String::from_utf8_lossy(key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_err)?.into_owned();
        node.insert_attr(attr_name, value);
    }
    Ok(node)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn bound_namespace(ns: ResolveResult<'_>) -> Option<String> {
    match ns {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    }
}

fn xml_err(e: impl std::fmt::Display) -> SoapError {
    SoapError::Xml(e.to_string())
}

/// `GetProfiles` -> `getProfiles`
pub fn method_name(element: &str) -> String {
    let mut chars = element.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Wrap a body fragment in a response envelope
pub fn envelope(reply: &ReplyContext, fragment: &str) -> String {
    let header = match &reply.relates_to {
        Some(id) => format!(
            "\n  <env:Header><wsa5:RelatesTo xmlns:wsa5=\"{}\">{}</wsa5:RelatesTo></env:Header>",
            WSA_NS,
            xml_escape(id)
        ),
        None => String::new(),
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<env:Envelope xmlns:env="{}"
              xmlns:tt="{}"
              xmlns:tds="{}"
              xmlns:trt="{}"
              xmlns:tptz="{}"
              xmlns:ter="{}">{}
  <env:Body>{}</env:Body>
</env:Envelope>"#,
        reply.version.namespace(),
        SCHEMA_NS,
        DEVICE_NS,
        MEDIA_NS,
        PTZ_NS,
        ERROR_NS,
        header,
        fragment
    )
}

/// Render a fault envelope. SOAP 1.1 has no subcodes: the ONVIF subcode
/// becomes the faultcode and the detail subcode goes into `detail`.
pub fn fault_envelope(reply: &ReplyContext, fault: &Fault) -> String {
    let body = match reply.version {
        SoapVersion::V12 => fault12(fault),
        SoapVersion::V11 => fault11(fault),
    };
    envelope(reply, &body)
}

fn fault12(fault: &Fault) -> String {
    let detail = match fault.detail {
        Some(detail) => format!(
            "<env:Subcode><env:Value>{}</env:Value></env:Subcode>",
            detail
        ),
        None => String::new(),
    };
    format!(
        r#"
    <env:Fault>
      <env:Code>
        <env:Value>{}</env:Value>
        <env:Subcode>
          <env:Value>{}</env:Value>{}
        </env:Subcode>
      </env:Code>
      <env:Reason>
        <env:Text xml:lang="en">{}</env:Text>
      </env:Reason>
    </env:Fault>
  "#,
        fault.code.as_str(),
        fault.subcode,
        detail,
        xml_escape(&fault.reason)
    )
}

fn fault11(fault: &Fault) -> String {
    let detail = match fault.detail {
        Some(detail) => format!("\n      <detail>{}</detail>", detail),
        None => String::new(),
    };
    format!(
        r#"
    <env:Fault>
      <faultcode>{}</faultcode>
      <faultstring xml:lang="en">{}</faultstring>{}
    </env:Fault>
  "#,
        fault.subcode,
        xml_escape(&fault.reason),
        detail
    )
}
