//! Policy rendering: each policy becomes a filter whose terms are
//! `if (...) then { ...; action; }` rules, closed by the policy's default
//! action.
//!
//! Operand checks and actions are emitted in a fixed order regardless of the
//! order they appear in the document.  Every named-list reference must have
//! been defined earlier with the matching kind.

use indexmap::IndexMap;

use crate::error::{self, Result};
use crate::lists::{DefinedNames, ListKind};
use crate::model::{IfMatch, MatchType, Policy, RouteAction, Term, ThenBlock};

const INDENT: &str = "    ";

pub(crate) fn render_policies(
    out: &mut String,
    policies: &IndexMap<String, Policy>,
    names: &mut DefinedNames,
) -> Result<()> {
    for (name, policy) in policies {
        names.define(name, ListKind::Policy)?;
        render_policy(out, name, policy, names)?;
    }
    Ok(())
}

fn render_policy(
    out: &mut String,
    name: &str,
    policy: &Policy,
    names: &DefinedNames,
) -> Result<()> {
    out.push_str(&format!("filter {} {{\n", name));
    for (term_name, term) in &policy.terms {
        render_term(out, name, term_name, term, names)?;
    }
    out.push_str(&format!(
        "{}{};\n}}\n",
        INDENT,
        policy.default_action.as_statement()
    ));
    Ok(())
}

fn render_term(
    out: &mut String,
    policy: &str,
    term_name: &str,
    term: &Term,
    names: &DefinedNames,
) -> Result<()> {
    let conditions = conditions(policy, term_name, &term.if_match, names)?;
    let joiner = match term.match_type {
        MatchType::All => " && ",
        MatchType::Any => " || ",
    };

    out.push_str(&format!("{}# term {}\n", INDENT, term_name));
    out.push_str(&format!(
        "{}if ({}) then {{\n",
        INDENT,
        conditions.join(joiner)
    ));
    for action in actions(&term.then) {
        out.push_str(&format!("{}{}{};\n", INDENT, INDENT, action));
    }
    out.push_str(&format!("{}}}\n", INDENT));
    Ok(())
}

/// Builds the operand checks in their fixed emission order.  At least one
/// check must be present.
fn conditions(
    policy: &str,
    term: &str,
    if_match: &IfMatch,
    names: &DefinedNames,
) -> Result<Vec<String>> {
    if if_match.is_empty() {
        return error::EmptyMatchSnafu { policy, term }.fail();
    }

    let mut conditions = Vec::new();
    let mut list_check = |expr: &Option<String>,
                          operator: &str,
                          variable: &str,
                          accepted: &[ListKind]|
     -> Result<()> {
        if let Some(name) = expr {
            names.resolve(name, accepted)?;
            conditions.push(format!("{} {} {}", variable, operator, name));
        }
        Ok(())
    };

    list_check(&if_match.as_path_eq, "=", "bgp_path", &[ListKind::AsPath])?;
    list_check(&if_match.as_path_in, "~", "bgp_path", &[ListKind::AsPath])?;
    list_check(&if_match.community_eq, "=", "bgp_community", &[ListKind::Community])?;
    list_check(&if_match.community_in, "~", "bgp_community", &[ListKind::Community])?;
    list_check(
        &if_match.ext_community_eq,
        "=",
        "bgp_ext_community",
        &[ListKind::ExtCommunity],
    )?;
    list_check(
        &if_match.ext_community_in,
        "~",
        "bgp_ext_community",
        &[ListKind::ExtCommunity],
    )?;
    list_check(
        &if_match.net_eq,
        "=",
        "net",
        &[ListKind::PrefixV4, ListKind::PrefixV6],
    )?;
    list_check(
        &if_match.net_in,
        "~",
        "net",
        &[ListKind::PrefixV4, ListKind::PrefixV6],
    )?;

    if let Some(net_type) = if_match.net_type_eq {
        conditions.push(format!("net.type = {}", net_type));
    }
    if let Some(protocol) = if_match.source_protocol_eq {
        conditions.push(format!("source = {}", protocol));
    }

    Ok(conditions)
}

/// Builds the action statements in their fixed emission order, ending with
/// the terminal accept/reject.  A term with no explicit action accepts the
/// route it matched.
fn actions(then: &ThenBlock) -> Vec<String> {
    let mut actions = Vec::new();
    if let Some(asn) = then.as_path_prepend {
        actions.push(format!("bgp_path.prepend({})", asn));
    }
    if let Some(community) = &then.community_add {
        actions.push(format!("bgp_community.add(({}))", community.replace(':', ",")));
    }
    if let Some(community) = &then.community_remove {
        actions.push(format!(
            "bgp_community.delete(({}))",
            community.replace(':', ",")
        ));
    }
    if let Some(pref) = then.local_preference_set {
        actions.push(format!("bgp_local_pref = {}", pref));
    }
    if let Some(med) = then.med_set {
        actions.push(format!("bgp_med = {}", med));
    }
    actions.push(
        then.action
            .unwrap_or(RouteAction::Permit)
            .as_statement()
            .to_string(),
    );
    actions
}
