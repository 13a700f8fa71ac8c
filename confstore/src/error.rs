use snafu::Snafu;
use std::io;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to read '{}': {}", path.display(), source))]
    FileRead { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to write '{}': {}", path.display(), source))]
    FileWrite { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to rename '{}' to '{}': {}", from.display(), to.display(), source))]
    FileRename {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[snafu(display("Failed to list directory '{}': {}", path.display(), source))]
    ListDirectory {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[snafu(display("'{}' is not valid JSON: {}", path.display(), source))]
    JsonParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("Unable to serialize document for '{}': {}", path.display(), source))]
    JsonSerialize {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("Failed to overlay '{}' onto primary document: {}", path.display(), source))]
    Overlay {
        path: PathBuf,
        source: json_patch::PatchError,
    },

    #[snafu(display("Document loaded from '{}' is empty", path.display()))]
    EmptyDocument { path: PathBuf },
}

impl Error {
    /// Whether the error stems from the stored file not existing yet.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::FileRead { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
