use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Store error: {}", source))]
    Store { source: confstore::Error },

    #[snafu(display("Configuration document has not been loaded yet"))]
    NotLoaded,

    #[snafu(display("Document to diff against is empty"))]
    EmptyDiffInput,

    #[snafu(display("Document is not valid JSON: {}", source))]
    ParseDocument { source: serde_json::Error },

    #[snafu(display("Patch is not a valid JSON Patch: {}", source))]
    ParsePatch { source: serde_json::Error },

    #[snafu(display("Failed to apply patch: {}", source))]
    ApplyPatch { source: json_patch::PatchError },

    #[snafu(display("Unable to serialize document: {}", source))]
    SerializeDocument { source: serde_json::Error },

    #[snafu(display("Unable to serialize patch: {}", source))]
    SerializePatch { source: serde_json::Error },

    #[snafu(display("Schema is not valid JSON: {}", source))]
    ParseSchema { source: serde_json::Error },

    #[snafu(display("Schema could not be compiled: {}", reason))]
    CompileSchema { reason: String },

    #[snafu(display("Document failed schema validation: {}", reason))]
    SchemaViolation { reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
