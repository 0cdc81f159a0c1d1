use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use snafu::{ensure, ResultExt, Snafu};

/// Marker file identifying the root of a scaffolded project.
pub const PROJECT_FILE: &str = "PROJECT";

const DOMAIN_PREFIX: &str = "domain:";

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("failed to resolve absolute path of [{}]", path.display()))]
    AbsoluteStartPath {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("path [{}] is not a directory containing [{PROJECT_FILE}]", path.display()))]
    InvalidRoot { path: PathBuf },

    #[snafu(display("failed to find a directory containing [{PROJECT_FILE}] above [{}]", start.display()))]
    RootNotFound { start: PathBuf },

    #[snafu(display("failed to open [{}]", path.display()))]
    OpenProjectFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to read [{}]", path.display()))]
    ReadProjectFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("no domain field found in [{}]", path.display()))]
    DomainNotFound { path: PathBuf },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// Resolves the project root directory.
///
/// An explicitly supplied root is used as-is but must contain the marker
/// file. Otherwise the parent directories of `start` are searched, nearest
/// first, until the marker file is found. The walk stops at the filesystem
/// root, or at `boundary` if one is given.
pub fn resolve_root(
    start: &Path,
    explicit: Option<&Path>,
    boundary: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(root) = explicit {
        ensure!(has_project_file(root), InvalidRootSnafu { path: root });
        return Ok(root.to_path_buf());
    }

    let start = std::path::absolute(start).context(AbsoluteStartPathSnafu { path: start })?;
    for dir in start.ancestors() {
        if has_project_file(dir) {
            return Ok(dir.to_path_buf());
        }
        if boundary.is_some_and(|boundary| dir == boundary) {
            break;
        }
    }

    RootNotFoundSnafu { start }.fail()
}

/// Resolves the API domain, preferring an explicitly supplied one over the
/// `domain:` field of the marker file at `root`.
pub fn resolve_domain(root: &Path, explicit: Option<&str>) -> Result<String> {
    if let Some(domain) = explicit {
        return Ok(domain.to_owned());
    }

    let path = root.join(PROJECT_FILE);
    let file = File::open(&path).context(OpenProjectFileSnafu { path: &path })?;
    for line in BufReader::new(file).lines() {
        let line = line.context(ReadProjectFileSnafu { path: &path })?;
        if let Some(value) = line.strip_prefix(DOMAIN_PREFIX) {
            let value = value.trim();
            if !value.is_empty() {
                return Ok(value.to_owned());
            }
        }
    }

    DomainNotFoundSnafu { path }.fail()
}

fn has_project_file(dir: &Path) -> bool {
    dir.join(PROJECT_FILE).is_file()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use indoc::indoc;
    use rstest::rstest;

    use super::*;

    #[test]
    fn finds_root_in_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("workspace");
        let nested = root.join("pkg/apis/apps");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.join(PROJECT_FILE), "domain: example.com\n").unwrap();

        let resolved = resolve_root(&nested, None, Some(dir.path())).unwrap();

        assert_eq!(resolved, root);
    }

    #[test]
    fn search_stops_at_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();

        let err = resolve_root(&nested, None, Some(dir.path())).unwrap_err();

        assert!(matches!(err, Error::RootNotFound { .. }));
    }

    #[test]
    fn explicit_root_must_contain_marker_file() {
        let dir = tempfile::tempdir().unwrap();

        let err = resolve_root(dir.path(), Some(dir.path()), None).unwrap_err();
        assert!(matches!(err, Error::InvalidRoot { .. }));

        fs::write(dir.path().join(PROJECT_FILE), "domain: example.com\n").unwrap();
        let resolved = resolve_root(dir.path(), Some(dir.path()), None).unwrap();
        assert_eq!(resolved, dir.path());
    }

    #[test]
    fn explicit_domain_skips_marker_file() {
        // The root does not even exist, so any marker file access would fail.
        let domain = resolve_domain(Path::new("/does/not/exist"), Some("example.com")).unwrap();

        assert_eq!(domain, "example.com");
    }

    #[rstest]
    #[case("domain: example.com", "example.com")]
    #[case("domain:example.com", "example.com")]
    #[case("domain:    spaced.example.com   ", "spaced.example.com")]
    fn parses_domain_from_marker_file(#[case] line: &str, #[case] expected: &str) {
        let dir = tempfile::tempdir().unwrap();
        let contents = format!("version: \"1\"\n{line}\nrepo: example.com/widgets\n");
        fs::write(dir.path().join(PROJECT_FILE), contents).unwrap();

        let domain = resolve_domain(dir.path(), None).unwrap();

        assert_eq!(domain, expected);
    }

    #[test]
    fn fails_without_domain_field() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(PROJECT_FILE),
            indoc! {"
                version: \"1\"
                repo: example.com/widgets
            "},
        )
        .unwrap();

        let err = resolve_domain(dir.path(), None).unwrap_err();

        assert!(matches!(err, Error::DomainNotFound { .. }));
    }

    #[test]
    fn fails_without_marker_file() {
        let dir = tempfile::tempdir().unwrap();

        let err = resolve_domain(dir.path(), None).unwrap_err();

        assert!(matches!(err, Error::OpenProjectFile { .. }));
    }
}
