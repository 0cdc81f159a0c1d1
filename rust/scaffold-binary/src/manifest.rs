use std::collections::BTreeMap;

use snafu::{ResultExt, Snafu};

use crate::schema::ApiGroup;

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display(
        "resources [{first}] and [{second}] both map to manifest [{file_name}]"
    ))]
    DuplicateManifest {
        file_name: String,
        first: String,
        second: String,
    },

    #[snafu(display("failed to serialize CRD for [{file_name}]"))]
    SerializeCrd {
        source: serde_yaml::Error,
        file_name: String,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// Computes the manifest file name for a group/version/kind triple.
pub fn crd_file_name(group: &str, version: &str, kind: &str) -> String {
    format!("{group}_{version}_{}.yaml", kind.to_lowercase())
}

/// Serializes every derived resource into its manifest document, keyed by
/// file name. Two resources mapping to the same file name fail the run.
pub fn aggregate(
    groups: &[ApiGroup],
    namespace: Option<&str>,
) -> Result<BTreeMap<String, String>> {
    let mut documents = BTreeMap::new();
    let mut origins: BTreeMap<String, String> = BTreeMap::new();

    for group in groups {
        for version in &group.versions {
            for resource in &version.resources {
                let file_name =
                    crd_file_name(&resource.group, &resource.version, &resource.kind);
                let origin = format!(
                    "{}/{}, Kind={}",
                    resource.group, resource.version, resource.kind
                );
                if let Some(first) = origins.get(&file_name) {
                    return DuplicateManifestSnafu {
                        file_name,
                        first: first.clone(),
                        second: origin,
                    }
                    .fail();
                }

                let mut crd = resource.crd.clone();
                if let Some(namespace) = namespace {
                    crd.metadata.namespace = Some(namespace.to_owned());
                }

                let document = serde_yaml::to_string(&crd).context(SerializeCrdSnafu {
                    file_name: file_name.as_str(),
                })?;
                origins.insert(file_name.clone(), origin);
                documents.insert(file_name, document);
            }
        }
    }

    Ok(documents)
}
