//! Typed view of the structured configuration document.
//!
//! The renderer deserializes the (already schema-validated) document into
//! these structs rather than walking raw JSON; a mismatch — including an
//! unknown enumeration value — is reported as a render error.  Named
//! collections use `IndexMap` so the document's property order carries
//! through to the emitted configuration.

use indexmap::IndexMap;
use ipnet::{Ipv4Net, Ipv6Net};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct Document {
    pub(crate) router_id: Option<String>,
    pub(crate) bgp: Option<Bgp>,
    pub(crate) static_routes: Option<StaticRoutes>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct Bgp {
    pub(crate) defined_sets: Option<DefinedSets>,
    #[serde(default)]
    pub(crate) policies: IndexMap<String, Policy>,
    #[serde(default)]
    pub(crate) sessions: IndexMap<String, Session>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct DefinedSets {
    #[serde(default)]
    pub(crate) as_path_lists: IndexMap<String, MemberList>,
    #[serde(default)]
    pub(crate) community_lists: IndexMap<String, MemberList>,
    #[serde(default)]
    pub(crate) ext_community_lists: IndexMap<String, MemberList>,
    #[serde(default)]
    pub(crate) large_community_lists: IndexMap<String, MemberList>,
    #[serde(default)]
    pub(crate) prefix_v4_lists: IndexMap<String, PrefixListV4>,
    #[serde(default)]
    pub(crate) prefix_v6_lists: IndexMap<String, PrefixListV6>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberList {
    #[serde(default)]
    pub(crate) members: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PrefixListV4 {
    #[serde(default)]
    pub(crate) prefixes: Vec<PrefixEntry<Ipv4Net>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PrefixListV6 {
    #[serde(default)]
    pub(crate) prefixes: Vec<PrefixEntry<Ipv6Net>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PrefixEntry<T> {
    pub(crate) prefix: T,
    pub(crate) ge: Option<u8>,
    pub(crate) le: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct Policy {
    #[serde(default)]
    pub(crate) terms: IndexMap<String, Term>,
    #[serde(default)]
    pub(crate) default_action: RouteAction,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct Term {
    #[serde(default)]
    pub(crate) match_type: MatchType,
    pub(crate) if_match: IfMatch,
    #[serde(default)]
    pub(crate) then: ThenBlock,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub(crate) enum MatchType {
    #[default]
    All,
    Any,
}

/// Operand checks of a term.  Field order here is the fixed emission order.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct IfMatch {
    pub(crate) as_path_eq: Option<String>,
    pub(crate) as_path_in: Option<String>,
    pub(crate) community_eq: Option<String>,
    pub(crate) community_in: Option<String>,
    pub(crate) ext_community_eq: Option<String>,
    pub(crate) ext_community_in: Option<String>,
    pub(crate) net_eq: Option<String>,
    pub(crate) net_in: Option<String>,
    pub(crate) net_type_eq: Option<NetType>,
    pub(crate) source_protocol_eq: Option<SourceProtocol>,
}

impl IfMatch {
    pub(crate) fn is_empty(&self) -> bool {
        self.as_path_eq.is_none()
            && self.as_path_in.is_none()
            && self.community_eq.is_none()
            && self.community_in.is_none()
            && self.ext_community_eq.is_none()
            && self.ext_community_in.is_none()
            && self.net_eq.is_none()
            && self.net_in.is_none()
            && self.net_type_eq.is_none()
            && self.source_protocol_eq.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum NetType {
    Ipv4,
    Ipv6,
}

impl fmt::Display for NetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetType::Ipv4 => write!(f, "NET_IP4"),
            NetType::Ipv6 => write!(f, "NET_IP6"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum SourceProtocol {
    Bgp,
    Static,
    Direct,
    Device,
}

impl fmt::Display for SourceProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceProtocol::Bgp => write!(f, "RTS_BGP"),
            SourceProtocol::Static => write!(f, "RTS_STATIC"),
            // Directly-connected routes come from the device protocol.
            SourceProtocol::Direct | SourceProtocol::Device => write!(f, "RTS_DEVICE"),
        }
    }
}

/// Actions of a term.  Field order here is the fixed emission order.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct ThenBlock {
    pub(crate) as_path_prepend: Option<u32>,
    pub(crate) community_add: Option<String>,
    pub(crate) community_remove: Option<String>,
    pub(crate) local_preference_set: Option<u32>,
    pub(crate) med_set: Option<u32>,
    pub(crate) action: Option<RouteAction>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RouteAction {
    Permit,
    #[default]
    Deny,
}

impl RouteAction {
    pub(crate) fn as_statement(self) -> &'static str {
        match self {
            RouteAction::Permit => "accept",
            RouteAction::Deny => "reject",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct Session {
    pub(crate) router_id: Option<String>,
    pub(crate) local: Option<Endpoint>,
    pub(crate) peer: Option<Peer>,
    pub(crate) ebgp_multihop: Option<u8>,
    pub(crate) ibgp_next_hop_self: Option<bool>,
    pub(crate) ipv4: Option<FamilyBlock>,
    pub(crate) ipv6: Option<FamilyBlock>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Endpoint {
    pub(crate) address: String,
    #[serde(rename = "as")]
    pub(crate) asn: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Peer {
    pub(crate) address: Option<PeerAddress>,
    pub(crate) interface: Option<String>,
    #[serde(rename = "as")]
    pub(crate) asn: Option<u32>,
    pub(crate) port: Option<u16>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum PeerAddress {
    Plain(String),
    Range { range: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct FamilyBlock {
    pub(crate) next_hop_self: Option<bool>,
    pub(crate) import_policy: Option<String>,
    pub(crate) export_policy: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct StaticRoutes {
    #[serde(default)]
    pub(crate) ipv4: Vec<StaticRoute>,
    #[serde(default)]
    pub(crate) ipv6: Vec<StaticRoute>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct StaticRoute {
    pub(crate) prefix: String,
    pub(crate) next_hop: Option<String>,
    pub(crate) interface: Option<String>,
    #[serde(default)]
    pub(crate) onlink: bool,
    #[serde(rename = "type")]
    pub(crate) route_type: Option<RouteType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RouteType {
    Blackhole,
    Unreachable,
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteType::Blackhole => write!(f, "blackhole"),
            RouteType::Unreachable => write!(f, "unreachable"),
        }
    }
}
