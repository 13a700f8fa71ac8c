/*!
# Background

The configuration manager owns the in-memory structured document bound to a
store.  The running document lives in one manager; a candidate is simply a
clone of that manager, mutated through JSON Patch until it is promoted or
discarded.

Property order is significant: the target-format renderer is
ordering-sensitive, so documents keep the property order they were loaded
with across serialize/diff/patch round-trips.

The `schema` module wraps the schema-validator engine behind the two calls
the rest of the system needs: compile once at startup, validate documents
thereafter.
*/

pub mod error;
pub mod schema;

pub use error::{Error, Result};
pub use schema::SchemaValidator;

use confstore::JsonFileStore;
use json_patch::Patch;
use log::trace;
use serde_json::Value;
use snafu::{ensure, OptionExt, ResultExt};

#[derive(Debug, Clone)]
pub struct ConfigManager {
    store: JsonFileStore,
    document: Option<Value>,
}

impl ConfigManager {
    pub fn new(store: JsonFileStore) -> Self {
        Self {
            store,
            document: None,
        }
    }

    /// Reads the bound store and replaces the in-memory document.  The
    /// previous document is kept on failure.
    pub fn load(&mut self) -> Result<()> {
        let doc = self.store.load().context(error::StoreSnafu)?;
        trace!("Loaded configuration document from '{}'", self.store.uri());
        self.document = Some(doc);
        Ok(())
    }

    pub fn document(&self) -> Result<&Value> {
        self.document.as_ref().context(error::NotLoadedSnafu)
    }

    /// Emits the current document in its canonical (load-order) form.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let doc = self.document()?;
        serde_json::to_vec(doc).context(error::SerializeDocumentSnafu)
    }

    /// Returns the patch that transforms the current document into `other`.
    pub fn diff(&self, other: &[u8]) -> Result<Vec<u8>> {
        let doc = self.document()?;
        ensure!(!other.is_empty(), error::EmptyDiffInputSnafu);

        let other: Value = serde_json::from_slice(other).context(error::ParseDocumentSnafu)?;
        let patch = json_patch::diff(doc, &other);
        serde_json::to_vec(&patch).context(error::SerializePatchSnafu)
    }

    /// Applies a JSON Patch in place.  The patch is applied to a scratch copy
    /// first, so the document is unchanged if any operation fails.
    pub fn apply_patch(&mut self, patch: &[u8]) -> Result<()> {
        let doc = self.document()?;
        let patch: Patch = serde_json::from_slice(patch).context(error::ParsePatchSnafu)?;

        let mut scratch = doc.clone();
        json_patch::patch(&mut scratch, &patch).context(error::ApplyPatchSnafu)?;
        self.document = Some(scratch);
        Ok(())
    }
}
