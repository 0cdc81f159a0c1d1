use std::path::{Path, PathBuf};

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use snafu::Snafu;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("failed to list type definitions in [{}]", path.display()))]
    ReadTypeDir {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to read type definition [{}]", path.display()))]
    ReadTypeDefinition {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse type definition [{}]", path.display()))]
    ParseTypeDefinition {
        source: serde_yaml::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse type definition [{}]", path.display()))]
    ParseJsonTypeDefinition {
        source: serde_json::Error,
        path: PathBuf,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// One discovered API resource type together with its derived CRD document.
///
/// `group` is the short group name as found on disk, the CRD inside carries
/// the domain-qualified group.
#[derive(Clone, Debug)]
pub struct ApiResource {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub crd: CustomResourceDefinition,
}

#[derive(Clone, Debug)]
pub struct ApiVersion {
    pub version: String,
    pub resources: Vec<ApiResource>,
}

#[derive(Clone, Debug)]
pub struct ApiGroup {
    pub group: String,
    pub versions: Vec<ApiVersion>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeriveOptions {
    pub domain: String,
    pub skip_map_validation: bool,
}

/// Derives CRD schema documents from the API type definitions below a
/// resource directory.
pub trait SchemaDeriver {
    fn derive(&self, api_dir: &Path, options: &DeriveOptions) -> Result<Vec<ApiGroup>>;
}
