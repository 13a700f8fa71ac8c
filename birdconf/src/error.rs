use crate::lists::ListKind;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Document does not match the expected shape: {}", source))]
    Model { source: serde_json::Error },

    #[snafu(display(
        "List name '{}' is already defined as {}; names are global across all list kinds",
        name,
        existing
    ))]
    DuplicateListName { name: String, existing: ListKind },

    #[snafu(display("Reference to undefined {} '{}'", expected, name))]
    UnresolvedReference { name: String, expected: ListKind },

    #[snafu(display(
        "Reference '{}' resolves to {}, expected {}",
        name,
        found,
        expected
    ))]
    ReferenceKindMismatch {
        name: String,
        found: ListKind,
        expected: ListKind,
    },

    #[snafu(display("Invalid range for prefix '{}': {}", prefix, reason))]
    PrefixRange { prefix: String, reason: String },

    #[snafu(display("Term '{}' of policy '{}' has an empty if-match", term, policy))]
    EmptyMatch { policy: String, term: String },

    #[snafu(display("Static route '{}' is not a valid {} prefix: {}", prefix, family, reason))]
    InvalidRoutePrefix {
        prefix: String,
        family: &'static str,
        reason: String,
    },

    #[snafu(display(
        "Static route '{}' has neither a next-hop, an interface, nor a route type",
        prefix
    ))]
    RouteWithoutTarget { prefix: String },
}

pub type Result<T> = std::result::Result<T, Error>;
