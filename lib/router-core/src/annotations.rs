//! Per-node virtual router attributes carried in node annotations
//!
//! A node may override attributes of the virtual router with a given local
//! ASN through an annotation such as:
//!
//! ```text
//! router.datum.net/bgp-virtual-router.64512: "router-id=172.16.0.1,local-port=45450"
//! ```

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Prefix of every virtual router annotation key. The local ASN follows the
/// final dot.
pub const ANNOTATION_PREFIX: &str = "router.datum.net/bgp-virtual-router";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("annotation {0:?} does not specify a local ASN")]
    MissingAsn(String),

    #[error("annotation {key:?} has an invalid local ASN {asn:?}")]
    InvalidAsn { key: String, asn: String },

    #[error("annotation {key:?} repeats local ASN {asn} already set by {previous:?}")]
    DuplicateAsn {
        key: String,
        previous: String,
        asn: u32,
    },

    #[error("annotation {key:?} has an invalid attribute {attribute:?}: {reason}")]
    InvalidAttribute {
        key: String,
        attribute: String,
        reason: String,
    },
}

/// Attributes for one virtual router
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VirtualRouterAttributes {
    pub asn: u32,
    pub router_id: Option<Ipv4Addr>,
    pub local_port: Option<u16>,
}

/// Virtual router attributes keyed by local ASN
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnnotationMap(BTreeMap<u32, VirtualRouterAttributes>);

impl AnnotationMap {
    /// Parse a node's annotations. Unrelated annotations are skipped; the
    /// first malformed virtual router annotation fails the whole parse.
    pub fn new(annotations: &BTreeMap<String, String>) -> Result<Self, AnnotationError> {
        let mut map = BTreeMap::new();
        let mut keys: BTreeMap<u32, &str> = BTreeMap::new();
        for (key, value) in annotations {
            let Some(attrs) = parse_annotation(key, value)? else {
                continue;
            };
            // "64512" and "064512" name the same router
            if let Some(previous) = keys.insert(attrs.asn, key) {
                return Err(AnnotationError::DuplicateAsn {
                    key: key.clone(),
                    previous: previous.to_string(),
                    asn: attrs.asn,
                });
            }
            map.insert(attrs.asn, attrs);
        }
        Ok(Self(map))
    }

    pub fn get(&self, asn: u32) -> Option<&VirtualRouterAttributes> {
        self.0.get(&asn)
    }

    /// Router id configured for the virtual router with the given ASN
    pub fn resolve_router_id(&self, asn: u32) -> Option<Ipv4Addr> {
        self.0.get(&asn).and_then(|attrs| attrs.router_id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VirtualRouterAttributes> {
        self.0.values()
    }
}

fn parse_annotation(
    key: &str,
    value: &str,
) -> Result<Option<VirtualRouterAttributes>, AnnotationError> {
    let Some(rest) = key.strip_prefix(ANNOTATION_PREFIX) else {
        return Ok(None);
    };
    let asn_str = match rest.strip_prefix('.') {
        Some(asn) if !asn.is_empty() => asn,
        Some(_) => return Err(AnnotationError::MissingAsn(key.to_string())),
        // "bgp-virtual-router" must be followed by ".<asn>" or nothing
        None if rest.is_empty() => return Err(AnnotationError::MissingAsn(key.to_string())),
        None => return Ok(None),
    };
    let asn = asn_str.parse::<u32>().map_err(|_| AnnotationError::InvalidAsn {
        key: key.to_string(),
        asn: asn_str.to_string(),
    })?;

    let mut attrs = VirtualRouterAttributes {
        asn,
        ..Default::default()
    };

    let invalid = |attribute: &str, reason: &str| AnnotationError::InvalidAttribute {
        key: key.to_string(),
        attribute: attribute.to_string(),
        reason: reason.to_string(),
    };

    for attribute in value.split(',').map(str::trim).filter(|a| !a.is_empty()) {
        let (name, val) = attribute
            .split_once('=')
            .ok_or_else(|| invalid(attribute, "expected key=value"))?;
        match name.trim() {
            "router-id" => {
                let id = val
                    .trim()
                    .parse::<Ipv4Addr>()
                    .map_err(|_| invalid(attribute, "router-id must be an IPv4 address"))?;
                attrs.router_id = Some(id);
            }
            "local-port" => {
                let port = val
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| invalid(attribute, "local-port must be a port number"))?;
                attrs.local_port = Some(port);
            }
            _ => return Err(invalid(attribute, "unknown attribute")),
        }
    }

    Ok(Some(attrs))
}
