use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use snafu::{ResultExt, Snafu};

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("failed to create output directory [{}]", path.display()))]
    CreateOutputDir {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to write manifest [{}]", path.display()))]
    WriteManifest {
        source: std::io::Error,
        path: PathBuf,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// Writes every document into `output_dir`, creating the directory tree if
/// needed. Existing files are fully rewritten.
pub fn write_all(output_dir: &Path, documents: &BTreeMap<String, String>) -> Result<()> {
    create_dir_owner_only(output_dir).context(CreateOutputDirSnafu { path: output_dir })?;

    for (file_name, document) in documents {
        let path = output_dir.join(file_name);
        fs::write(&path, document).context(WriteManifestSnafu { path: &path })?;
    }

    Ok(())
}

#[cfg(unix)]
fn create_dir_owner_only(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new().recursive(true).mode(0o700).create(path)
}

#[cfg(not(unix))]
fn create_dir_owner_only(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)
}
