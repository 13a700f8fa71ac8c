/*!
# Background

A 'store' holds one configuration artifact on disk, addressed by a URI-like
path.  Writers never modify the artifact in place: data is written to a
sibling temporary file, flushed, and atomically renamed over the target, so
readers (including the external routing daemon) always observe a complete
file.

# Library

`FileStore` is the byte-level store; it knows nothing about the content it
holds and is used for the rendered target-format file.

`JsonFileStore` layers JSON semantics on top: documents are parsed on load
and pretty-printed on save.  On load, sibling files in the same directory are
overlaid additively onto the primary document — each sibling may introduce
new subtrees, but never overwrites or removes existing values.  Siblings are
applied in lexicographic file-name order so a load is reproducible.
*/

pub mod error;
mod file;
mod json;

pub use error::{Error, Result};
pub use file::FileStore;
pub use json::JsonFileStore;
