//! Static route rendering, grouped into one static protocol per address
//! family.

use std::str::FromStr;

use ipnet::{Ipv4Net, Ipv6Net};

use crate::error::{self, Result};
use crate::model::{StaticRoute, StaticRoutes};

const INDENT: &str = "    ";

pub(crate) fn render_static_routes(out: &mut String, routes: &StaticRoutes) -> Result<()> {
    if !routes.ipv4.is_empty() {
        render_family(out, "static4", "ipv4", &routes.ipv4, |p| {
            Ipv4Net::from_str(p).map(|_| ()).map_err(|e| e.to_string())
        })?;
    }
    if !routes.ipv6.is_empty() {
        render_family(out, "static6", "ipv6", &routes.ipv6, |p| {
            Ipv6Net::from_str(p).map(|_| ()).map_err(|e| e.to_string())
        })?;
    }
    Ok(())
}

fn render_family<F>(
    out: &mut String,
    protocol: &str,
    family: &'static str,
    routes: &[StaticRoute],
    parse: F,
) -> Result<()>
where
    F: Fn(&str) -> std::result::Result<(), String>,
{
    out.push_str(&format!("protocol static {} {{\n", protocol));
    out.push_str(&format!("{}{};\n", INDENT, family));
    for route in routes {
        parse(&route.prefix).map_err(|reason| error::Error::InvalidRoutePrefix {
            prefix: route.prefix.clone(),
            family,
            reason,
        })?;
        out.push_str(&format!("{}{}\n", INDENT, route_statement(route)?));
    }
    out.push_str("}\n");
    Ok(())
}

/// One `route ...;` statement.  A route is directed at a next-hop address
/// (optionally pinned to a device), at an interface, or at a sink type.
fn route_statement(route: &StaticRoute) -> Result<String> {
    if let Some(route_type) = route.route_type {
        return Ok(format!("route {} {};", route.prefix, route_type));
    }

    if let Some(next_hop) = &route.next_hop {
        let mut statement = format!("route {} via {}", route.prefix, next_hop);
        if let Some(interface) = &route.interface {
            statement.push_str(&format!(" dev \"{}\"", interface));
        }
        if route.onlink {
            statement.push_str(" onlink");
        }
        statement.push(';');
        return Ok(statement);
    }

    if let Some(interface) = &route.interface {
        return Ok(format!("route {} via \"{}\";", route.prefix, interface));
    }

    error::RouteWithoutTargetSnafu {
        prefix: &route.prefix,
    }
    .fail()
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn routes_from(value: serde_json::Value) -> StaticRoutes {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn families_render_separately() {
        let routes = routes_from(json!({
            "ipv4": [ { "prefix": "10.9.0.0/24", "next-hop": "192.168.1.1" } ],
            "ipv6": [ { "prefix": "2001:db8::/48", "next-hop": "fe80::1", "interface": "eth0" } ]
        }));

        let mut out = String::new();
        render_static_routes(&mut out, &routes).unwrap();
        assert_eq!(
            out,
            "protocol static static4 {\n\
             \x20   ipv4;\n\
             \x20   route 10.9.0.0/24 via 192.168.1.1;\n\
             }\n\
             protocol static static6 {\n\
             \x20   ipv6;\n\
             \x20   route 2001:db8::/48 via fe80::1 dev \"eth0\";\n\
             }\n"
        );
    }

    #[test]
    fn onlink_route() {
        let routes = routes_from(json!({
            "ipv4": [ { "prefix": "10.1.0.0/24", "next-hop": "10.0.0.1",
                        "interface": "eth1", "onlink": true } ]
        }));

        let mut out = String::new();
        render_static_routes(&mut out, &routes).unwrap();
        assert!(out.contains("route 10.1.0.0/24 via 10.0.0.1 dev \"eth1\" onlink;\n"));
    }

    #[test]
    fn interface_route() {
        let routes = routes_from(json!({
            "ipv4": [ { "prefix": "10.2.0.0/24", "interface": "eth0" } ]
        }));

        let mut out = String::new();
        render_static_routes(&mut out, &routes).unwrap();
        assert!(out.contains("route 10.2.0.0/24 via \"eth0\";\n"));
    }

    #[test]
    fn sink_routes() {
        let routes = routes_from(json!({
            "ipv4": [
                { "prefix": "10.3.0.0/24", "type": "blackhole" },
                { "prefix": "10.4.0.0/24", "type": "unreachable" }
            ]
        }));

        let mut out = String::new();
        render_static_routes(&mut out, &routes).unwrap();
        assert!(out.contains("route 10.3.0.0/24 blackhole;\n"));
        assert!(out.contains("route 10.4.0.0/24 unreachable;\n"));
    }

    #[test]
    fn route_without_target_is_rejected() {
        let routes = routes_from(json!({
            "ipv4": [ { "prefix": "10.5.0.0/24" } ]
        }));

        let mut out = String::new();
        render_static_routes(&mut out, &routes).unwrap_err();
    }

    #[test]
    fn prefix_of_wrong_family_is_rejected() {
        let routes = routes_from(json!({
            "ipv4": [ { "prefix": "2001:db8::/48", "next-hop": "fe80::1" } ]
        }));

        let mut out = String::new();
        render_static_routes(&mut out, &routes).unwrap_err();
    }
}
