//! BGP session rendering: one `protocol bgp '<name>' { ... }` block per
//! session, in document order.

use indexmap::IndexMap;

use crate::error::Result;
use crate::lists::{DefinedNames, ListKind};
use crate::model::{FamilyBlock, Peer, PeerAddress, Session};

const INDENT: &str = "    ";

pub(crate) fn render_sessions(
    out: &mut String,
    sessions: &IndexMap<String, Session>,
    names: &DefinedNames,
) -> Result<()> {
    for (name, session) in sessions {
        render_session(out, name, session, names)?;
    }
    Ok(())
}

fn render_session(
    out: &mut String,
    name: &str,
    session: &Session,
    names: &DefinedNames,
) -> Result<()> {
    out.push_str(&format!("protocol bgp '{}' {{\n", name));

    if let Some(router_id) = &session.router_id {
        out.push_str(&format!("{}router id {};\n", INDENT, router_id));
    }

    if let Some(local) = &session.local {
        match local.asn {
            Some(asn) => {
                out.push_str(&format!("{}local {} as {};\n", INDENT, local.address, asn))
            }
            None => out.push_str(&format!("{}local {};\n", INDENT, local.address)),
        }
    }

    if let Some(peer) = &session.peer {
        out.push_str(&neighbor_statement(peer));
    }

    if let Some(hops) = session.ebgp_multihop {
        out.push_str(&format!("{}multihop {};\n", INDENT, hops));
    }
    if session.ibgp_next_hop_self == Some(true) {
        out.push_str(&format!("{}next hop self;\n", INDENT));
    }

    if let Some(family) = &session.ipv4 {
        render_family(out, "ipv4", family, names)?;
    }
    if let Some(family) = &session.ipv6 {
        render_family(out, "ipv6", family, names)?;
    }

    out.push_str("}\n");
    Ok(())
}

/// The neighbor statement carries, in order: the address (plain, `range`, or
/// link-local scoped to an interface), the port, and the AS number.
fn neighbor_statement(peer: &Peer) -> String {
    let mut attrs = String::new();

    match &peer.address {
        Some(PeerAddress::Plain(address)) => match &peer.interface {
            Some(interface) => attrs.push_str(&format!(" {} % '{}'", address, interface)),
            None => attrs.push_str(&format!(" {}", address)),
        },
        Some(PeerAddress::Range { range }) => attrs.push_str(&format!(" range {}", range)),
        None => {}
    }

    if let Some(port) = peer.port {
        attrs.push_str(&format!(" port {}", port));
    }
    if let Some(asn) = peer.asn {
        attrs.push_str(&format!(" as {}", asn));
    }

    if attrs.is_empty() {
        return String::new();
    }
    format!("{}neighbor{};\n", INDENT, attrs)
}

fn render_family(
    out: &mut String,
    family: &str,
    block: &FamilyBlock,
    names: &DefinedNames,
) -> Result<()> {
    out.push_str(&format!("{}{} {{\n", INDENT, family));
    if block.next_hop_self == Some(true) {
        out.push_str(&format!("{}{}next hop self;\n", INDENT, INDENT));
    }
    if let Some(policy) = &block.import_policy {
        names.resolve(policy, &[ListKind::Policy])?;
        out.push_str(&format!("{}{}import filter {};\n", INDENT, INDENT, policy));
    }
    if let Some(policy) = &block.export_policy {
        names.resolve(policy, &[ListKind::Policy])?;
        out.push_str(&format!("{}{}export filter {};\n", INDENT, INDENT, policy));
    }
    out.push_str(&format!("{}}};\n", INDENT));
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn session_from(value: serde_json::Value) -> Session {
        serde_json::from_value(value).unwrap()
    }

    fn policy_names() -> DefinedNames {
        let mut names = DefinedNames::default();
        names.define("POL_IN", ListKind::Policy).unwrap();
        names.define("POL_OUT", ListKind::Policy).unwrap();
        names
    }

    #[test]
    fn full_session_renders_in_order() {
        let session = session_from(json!({
            "router-id": "10.0.0.9",
            "local": { "address": "10.0.0.1", "as": 65000 },
            "peer": { "address": "10.0.0.2", "port": 179, "as": 65001 },
            "ebgp-multihop": 2,
            "ipv4": {
                "next-hop-self": true,
                "import-policy": "POL_IN",
                "export-policy": "POL_OUT"
            }
        }));

        let mut out = String::new();
        render_session(&mut out, "upstream1", &session, &policy_names()).unwrap();
        assert_eq!(
            out,
            "protocol bgp 'upstream1' {\n\
             \x20   router id 10.0.0.9;\n\
             \x20   local 10.0.0.1 as 65000;\n\
             \x20   neighbor 10.0.0.2 port 179 as 65001;\n\
             \x20   multihop 2;\n\
             \x20   ipv4 {\n\
             \x20       next hop self;\n\
             \x20       import filter POL_IN;\n\
             \x20       export filter POL_OUT;\n\
             \x20   };\n\
             }\n"
        );
    }

    #[test]
    fn range_neighbor() {
        let session = session_from(json!({
            "peer": { "address": { "range": "10.0.0.0/24" }, "as": 65001 }
        }));

        let mut out = String::new();
        render_session(&mut out, "clients", &session, &DefinedNames::default()).unwrap();
        assert!(out.contains("neighbor range 10.0.0.0/24 as 65001;\n"));
    }

    #[test]
    fn link_local_neighbor_is_scoped_to_interface() {
        let session = session_from(json!({
            "peer": { "address": "fe80::1", "interface": "eth0", "as": 65001 }
        }));

        let mut out = String::new();
        render_session(&mut out, "fabric", &session, &DefinedNames::default()).unwrap();
        assert!(out.contains("neighbor fe80::1 % 'eth0' as 65001;\n"));
    }

    #[test]
    fn ibgp_next_hop_self_is_top_level() {
        let session = session_from(json!({
            "peer": { "address": "10.0.0.2", "as": 65000 },
            "ibgp-next-hop-self": true
        }));

        let mut out = String::new();
        render_session(&mut out, "rr", &session, &DefinedNames::default()).unwrap();
        assert!(out.contains("\n    next hop self;\n"));
    }

    #[test]
    fn undefined_filter_reference_is_rejected() {
        let session = session_from(json!({
            "ipv4": { "import-policy": "MISSING" }
        }));

        let mut out = String::new();
        render_session(&mut out, "s", &session, &DefinedNames::default()).unwrap_err();
    }

    #[test]
    fn session_without_peer_omits_neighbor() {
        let session = session_from(json!({
            "local": { "address": "10.0.0.1", "as": 65000 }
        }));

        let mut out = String::new();
        render_session(&mut out, "s", &session, &DefinedNames::default()).unwrap();
        assert!(!out.contains("neighbor"));
    }
}
