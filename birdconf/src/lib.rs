/*!
# Background

`birdconf` translates the structured configuration document into the routing
daemon's declarative configuration language.  `render` is a pure function:
the same document always produces byte-identical output, and a constraint
violation yields an error with no partial output.

Sections are emitted in a fixed order: preamble, router identity, device,
kernel (IPv4 then IPv6), direct, the BGP block (list definitions by kind,
then policies, then sessions), and finally static routes.  Within a section,
elements keep the order they have in the document.

List names live in a single global namespace across every list kind; a name
collision or a dangling reference fails the render.
*/

pub mod error;

mod bgp;
mod lists;
mod model;
mod policy;
mod static_routes;

pub use error::{Error, Result};
pub use lists::ListKind;

use log::trace;
use serde_json::Value;
use snafu::ResultExt;

use lists::DefinedNames;
use model::Document;

const PREAMBLE: &str = "log syslog all;\n\n";

const DEVICE_SECTION: &str = "protocol device {\n    scan time 10;\n}\n\n";

const KERNEL4_SECTION: &str = "\
protocol kernel kernel4 {\n    ipv4 {\n        export all;\n    };\n}\n\n";

const KERNEL6_SECTION: &str = "\
protocol kernel kernel6 {\n    ipv6 {\n        export all;\n    };\n}\n\n";

const DIRECT_SECTION: &str = "protocol direct {\n    ipv4;\n    ipv6;\n}\n\n";

/// Renders the document to the daemon's configuration language.
pub fn render(document: &Value) -> Result<String> {
    let document: Document =
        serde_json::from_value(document.clone()).context(error::ModelSnafu)?;

    let mut out = String::new();
    out.push_str(PREAMBLE);

    if let Some(router_id) = &document.router_id {
        out.push_str(&format!("router id {};\n\n", router_id));
    }

    out.push_str(DEVICE_SECTION);
    out.push_str(KERNEL4_SECTION);
    out.push_str(KERNEL6_SECTION);
    out.push_str(DIRECT_SECTION);

    let mut names = DefinedNames::default();
    if let Some(bgp) = &document.bgp {
        if let Some(sets) = &bgp.defined_sets {
            lists::render_defined_sets(&mut out, sets, &mut names)?;
        }
        policy::render_policies(&mut out, &bgp.policies, &mut names)?;
        bgp::render_sessions(&mut out, &bgp.sessions, &names)?;
    }

    if let Some(routes) = &document.static_routes {
        static_routes::render_static_routes(&mut out, routes)?;
    }

    trace!("Rendered {} bytes of daemon configuration", out.len());
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn full_document() -> Value {
        json!({
            "router-id": "10.0.0.1",
            "bgp": {
                "defined-sets": {
                    "as-path-lists": { "AP1": { "members": ["65010"] } },
                    "community-lists": { "CL1": { "members": ["65000:100", "65000:200"] } },
                    "prefix-v4-lists": {
                        "PF1": { "prefixes": [ { "prefix": "10.0.0.0/16", "ge": 20, "le": 24 } ] }
                    }
                },
                "policies": {
                    "POL_IN": {
                        "terms": {
                            "match-upstream": {
                                "if-match": { "as-path-in": "AP1", "net-in": "PF1" },
                                "then": { "local-preference-set": 200, "action": "permit" }
                            }
                        },
                        "default-action": "deny"
                    }
                },
                "sessions": {
                    "upstream1": {
                        "local": { "address": "10.0.0.1", "as": 65000 },
                        "peer": { "address": "10.0.0.2", "as": 65001 },
                        "ipv4": { "import-policy": "POL_IN" }
                    }
                }
            },
            "static-routes": {
                "ipv4": [ { "prefix": "10.9.0.0/24", "next-hop": "192.168.1.1" } ]
            }
        })
    }

    #[test]
    fn render_is_deterministic() {
        let doc = full_document();
        let first = render(&doc).unwrap();
        let second = render(&doc).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn sections_emit_in_fixed_order() {
        let out = render(&full_document()).unwrap();

        let positions = [
            out.find("log syslog").unwrap(),
            out.find("router id 10.0.0.1;").unwrap(),
            out.find("protocol device").unwrap(),
            out.find("protocol kernel kernel4").unwrap(),
            out.find("protocol kernel kernel6").unwrap(),
            out.find("protocol direct").unwrap(),
            out.find("define AP1").unwrap(),
            out.find("define CL1").unwrap(),
            out.find("define PF1").unwrap(),
            out.find("filter POL_IN").unwrap(),
            out.find("protocol bgp 'upstream1'").unwrap(),
            out.find("protocol static static4").unwrap(),
        ];
        let mut sorted = positions.to_vec();
        sorted.sort_unstable();
        assert_eq!(positions.to_vec(), sorted);
    }

    #[test]
    fn each_defined_name_appears_exactly_once() {
        let out = render(&full_document()).unwrap();
        for name in ["define AP1 ", "define CL1 ", "define PF1 "] {
            assert_eq!(out.matches(name).count(), 1, "{} not unique", name);
        }
    }

    #[test]
    fn duplicate_name_across_kinds_fails_render() {
        let doc = json!({
            "bgp": {
                "defined-sets": {
                    "as-path-lists": { "MY_LIST": { "members": ["65010"] } },
                    "community-lists": { "MY_LIST": { "members": ["65000:100"] } }
                }
            }
        });
        let err = render(&doc).unwrap_err();
        assert!(err.to_string().contains("MY_LIST"));
    }

    #[test]
    fn empty_sections_are_omitted() {
        let out = render(&json!({})).unwrap();
        assert!(!out.contains("router id"));
        assert!(!out.contains("protocol bgp"));
        assert!(!out.contains("protocol static"));
        // Fixed sections are always present.
        assert!(out.contains("protocol device"));
        assert!(out.contains("protocol kernel kernel4"));
    }

    #[test]
    fn unknown_enum_value_fails_render() {
        let doc = json!({
            "bgp": {
                "policies": {
                    "P": {
                        "terms": {
                            "t": {
                                "if-match": { "source-protocol-eq": "ospf" },
                                "then": {}
                            }
                        }
                    }
                }
            }
        });
        render(&doc).unwrap_err();
    }

    #[test]
    fn out_of_range_prefix_bounds_fail_render() {
        let doc = json!({
            "bgp": {
                "defined-sets": {
                    "prefix-v4-lists": {
                        "PF1": { "prefixes": [ { "prefix": "10.0.0.0/16", "ge": 8, "le": 24 } ] }
                    }
                }
            }
        });
        render(&doc).unwrap_err();
    }

    #[test]
    fn session_order_follows_document_order() {
        let doc = json!({
            "bgp": {
                "sessions": {
                    "zebra": { "peer": { "address": "10.0.0.2", "as": 65001 } },
                    "apple": { "peer": { "address": "10.0.0.3", "as": 65002 } }
                }
            }
        });
        let out = render(&doc).unwrap();
        assert!(out.find("protocol bgp 'zebra'").unwrap() < out.find("protocol bgp 'apple'").unwrap());
    }
}
