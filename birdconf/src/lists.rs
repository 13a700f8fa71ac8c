//! Named list definitions.
//!
//! Every list defined anywhere in the document lands in one global namespace:
//! a name may be used by exactly one list, whatever its kind.  The namespace
//! doubles as the resolution table for references from policy terms and
//! session filter attachments.

use std::collections::HashMap;
use std::fmt;

use crate::error::{self, Result};
use crate::model::DefinedSets;
use snafu::ensure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    AsPath,
    Community,
    ExtCommunity,
    LargeCommunity,
    PrefixV4,
    PrefixV6,
    Policy,
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListKind::AsPath => "as-path-list",
            ListKind::Community => "community-list",
            ListKind::ExtCommunity => "ext-community-list",
            ListKind::LargeCommunity => "large-community-list",
            ListKind::PrefixV4 => "prefix-v4-list",
            ListKind::PrefixV6 => "prefix-v6-list",
            ListKind::Policy => "policy-list",
        };
        write!(f, "{}", name)
    }
}

/// The per-render uniqueness and resolution map, list name -> kind.
#[derive(Debug, Default)]
pub(crate) struct DefinedNames {
    names: HashMap<String, ListKind>,
}

impl DefinedNames {
    pub(crate) fn define(&mut self, name: &str, kind: ListKind) -> Result<()> {
        if let Some(existing) = self.names.get(name) {
            return error::DuplicateListNameSnafu {
                name,
                existing: *existing,
            }
            .fail();
        }
        self.names.insert(name.to_string(), kind);
        Ok(())
    }

    /// Checks that `name` was previously defined with one of the accepted
    /// kinds; the first accepted kind names the expectation in errors.
    pub(crate) fn resolve(&self, name: &str, accepted: &[ListKind]) -> Result<()> {
        let found = self.names.get(name).copied();
        match found {
            None => error::UnresolvedReferenceSnafu {
                name,
                expected: accepted[0],
            }
            .fail(),
            Some(kind) if !accepted.contains(&kind) => error::ReferenceKindMismatchSnafu {
                name,
                found: kind,
                expected: accepted[0],
            }
            .fail(),
            Some(_) => Ok(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn kind_of(&self, name: &str) -> Option<ListKind> {
        self.names.get(name).copied()
    }
}

/// Emits every defined list, registering names as it goes.  Kinds are emitted
/// in a fixed order; within one kind, lists keep their document order.
pub(crate) fn render_defined_sets(
    out: &mut String,
    sets: &DefinedSets,
    names: &mut DefinedNames,
) -> Result<()> {
    for (name, list) in &sets.as_path_lists {
        names.define(name, ListKind::AsPath)?;
        render_simple_list(out, name, &list.members, false);
    }
    for (name, list) in &sets.community_lists {
        names.define(name, ListKind::Community)?;
        render_simple_list(out, name, &list.members, true);
    }
    for (name, list) in &sets.ext_community_lists {
        names.define(name, ListKind::ExtCommunity)?;
        render_simple_list(out, name, &list.members, true);
    }
    for (name, list) in &sets.large_community_lists {
        names.define(name, ListKind::LargeCommunity)?;
        render_simple_list(out, name, &list.members, true);
    }
    for (name, list) in &sets.prefix_v4_lists {
        names.define(name, ListKind::PrefixV4)?;
        let elements = list
            .prefixes
            .iter()
            .map(|e| prefix_element(&e.prefix.to_string(), e.prefix.prefix_len(), 32, e.ge, e.le))
            .collect::<Result<Vec<String>>>()?;
        render_prefix_list(out, name, &elements);
    }
    for (name, list) in &sets.prefix_v6_lists {
        names.define(name, ListKind::PrefixV6)?;
        let elements = list
            .prefixes
            .iter()
            .map(|e| {
                prefix_element(&e.prefix.to_string(), e.prefix.prefix_len(), 128, e.ge, e.le)
            })
            .collect::<Result<Vec<String>>>()?;
        render_prefix_list(out, name, &elements);
    }
    Ok(())
}

/// A simple list holds its single element bare, or its several elements
/// bracketed.  Community-style elements have colons rewritten to commas and
/// are wrapped in parentheses.
fn render_simple_list(out: &mut String, name: &str, members: &[String], community_style: bool) {
    let rendered: Vec<String> = members
        .iter()
        .map(|m| {
            if community_style {
                format!("({})", m.replace(':', ","))
            } else {
                m.clone()
            }
        })
        .collect();

    match rendered.as_slice() {
        [single] => out.push_str(&format!("define {} = {};\n", name, single)),
        multiple => out.push_str(&format!("define {} = [{}];\n", name, multiple.join(", "))),
    }
}

fn render_prefix_list(out: &mut String, name: &str, elements: &[String]) {
    out.push_str(&format!("define {} = [ {} ];\n", name, elements.join(", ")));
}

/// Expands one prefix with its optional `{min,max}` length-range suffix.
///
/// With both bounds, `prefix length <= ge <= le` must hold; with only `ge`
/// the maximum defaults to the family maximum, and with only `le` the minimum
/// defaults to the prefix length itself.
pub(crate) fn prefix_element(
    prefix: &str,
    pfx_len: u8,
    family_max: u8,
    ge: Option<u8>,
    le: Option<u8>,
) -> Result<String> {
    let (min, max) = match (ge, le) {
        (None, None) => return Ok(prefix.to_string()),
        (Some(ge), Some(le)) => (ge, le),
        (Some(ge), None) => (ge, family_max),
        (None, Some(le)) => (pfx_len, le),
    };

    ensure!(
        pfx_len <= min,
        error::PrefixRangeSnafu {
            prefix,
            reason: format!("minimum length {} is shorter than the prefix ({})", min, pfx_len),
        }
    );
    ensure!(
        min <= max,
        error::PrefixRangeSnafu {
            prefix,
            reason: format!("minimum length {} exceeds maximum {}", min, max),
        }
    );
    ensure!(
        max <= family_max,
        error::PrefixRangeSnafu {
            prefix,
            reason: format!("maximum length {} exceeds the family maximum {}", max, family_max),
        }
    );

    Ok(format!("{}{{{},{}}}", prefix, min, max))
}
