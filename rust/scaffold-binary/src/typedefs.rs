use std::{
    fs::{self, DirEntry},
    path::Path,
};

use k8s_openapi::{
    apiextensions_apiserver::pkg::apis::apiextensions::v1::{
        CustomResourceDefinition, CustomResourceDefinitionNames, CustomResourceDefinitionSpec,
        CustomResourceDefinitionVersion, CustomResourceValidation, JSONSchemaProps,
        JSONSchemaPropsOrArray,
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use serde::Deserialize;
use snafu::ResultExt;

use crate::schema::{
    ApiGroup, ApiResource, ApiVersion, DeriveOptions, ParseJsonTypeDefinitionSnafu,
    ParseTypeDefinitionSnafu, ReadTypeDefinitionSnafu, ReadTypeDirSnafu, Result, SchemaDeriver,
};

/// Derives CRDs from declarative type definitions laid out as
/// `<api-dir>/<group>/<version>/<name>.{yaml,yml,json}`.
pub struct TypeDefinitionDeriver;

/// A single type definition file. Everything except the kind is optional and
/// defaulted from it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeDefinition {
    kind: String,
    plural: Option<String>,
    singular: Option<String>,
    list_kind: Option<String>,
    #[serde(default)]
    short_names: Vec<String>,
    #[serde(default)]
    scope: ResourceScope,
    schema: Option<JSONSchemaProps>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, strum::Display)]
enum ResourceScope {
    #[default]
    Namespaced,
    Cluster,
}

impl SchemaDeriver for TypeDefinitionDeriver {
    fn derive(&self, api_dir: &Path, options: &DeriveOptions) -> Result<Vec<ApiGroup>> {
        let mut groups = Vec::new();
        for group_entry in sorted_entries(api_dir)? {
            let group_path = group_entry.path();
            if !group_path.is_dir() {
                continue;
            }
            let group = group_entry.file_name().to_string_lossy().into_owned();

            let mut versions = Vec::new();
            for version_entry in sorted_entries(&group_path)? {
                let version_path = version_entry.path();
                if !version_path.is_dir() {
                    continue;
                }
                let version = version_entry.file_name().to_string_lossy().into_owned();
                let resources = derive_version(&group, &version, &version_path, options)?;
                if !resources.is_empty() {
                    versions.push(ApiVersion { version, resources });
                }
            }

            if !versions.is_empty() {
                groups.push(ApiGroup { group, versions });
            }
        }

        tracing::debug!(
            groups = groups.len(),
            "derived API groups from type definitions"
        );
        Ok(groups)
    }
}

fn derive_version(
    group: &str,
    version: &str,
    dir: &Path,
    options: &DeriveOptions,
) -> Result<Vec<ApiResource>> {
    let mut resources = Vec::new();
    for entry in sorted_entries(dir)? {
        let path = entry.path();
        let Some(extension) = path.extension().and_then(|extension| extension.to_str()) else {
            continue;
        };
        if !matches!(extension, "yaml" | "yml" | "json") {
            continue;
        }

        let raw = fs::read_to_string(&path).context(ReadTypeDefinitionSnafu { path: &path })?;
        let definition: TypeDefinition = if extension == "json" {
            serde_json::from_str(&raw).context(ParseJsonTypeDefinitionSnafu { path: &path })?
        } else {
            serde_yaml::from_str(&raw).context(ParseTypeDefinitionSnafu { path: &path })?
        };

        resources.push(ApiResource {
            group: group.to_owned(),
            version: version.to_owned(),
            kind: definition.kind.clone(),
            crd: build_crd(group, version, definition, options),
        });
    }
    Ok(resources)
}

fn sorted_entries(dir: &Path) -> Result<Vec<DirEntry>> {
    let mut entries = fs::read_dir(dir)
        .context(ReadTypeDirSnafu { path: dir })?
        .collect::<std::io::Result<Vec<_>>>()
        .context(ReadTypeDirSnafu { path: dir })?;
    entries.sort_by_key(DirEntry::file_name);
    Ok(entries)
}

fn build_crd(
    group: &str,
    version: &str,
    definition: TypeDefinition,
    options: &DeriveOptions,
) -> CustomResourceDefinition {
    let qualified_group = if options.domain.is_empty() {
        group.to_owned()
    } else {
        format!("{group}.{}", options.domain)
    };

    let kind = definition.kind;
    let plural = definition
        .plural
        .unwrap_or_else(|| format!("{}s", kind.to_lowercase()));
    let singular = definition.singular.unwrap_or_else(|| kind.to_lowercase());
    let list_kind = definition.list_kind.unwrap_or_else(|| format!("{kind}List"));

    let mut schema = definition.schema;
    if options.skip_map_validation {
        if let Some(schema) = &mut schema {
            strip_map_validation(schema);
        }
    }

    CustomResourceDefinition {
        metadata: ObjectMeta {
            name: Some(format!("{plural}.{qualified_group}")),
            ..ObjectMeta::default()
        },
        spec: CustomResourceDefinitionSpec {
            group: qualified_group,
            names: CustomResourceDefinitionNames {
                kind,
                list_kind: Some(list_kind),
                plural,
                singular: Some(singular),
                short_names: if definition.short_names.is_empty() {
                    None
                } else {
                    Some(definition.short_names)
                },
                ..CustomResourceDefinitionNames::default()
            },
            scope: definition.scope.to_string(),
            versions: vec![CustomResourceDefinitionVersion {
                name: version.to_owned(),
                served: true,
                storage: true,
                schema: schema.map(|open_api_v3_schema| CustomResourceValidation {
                    open_api_v3_schema: Some(open_api_v3_schema),
                }),
                ..CustomResourceDefinitionVersion::default()
            }],
            ..CustomResourceDefinitionSpec::default()
        },
        status: None,
    }
}

// Maps are published as bare objects, the value schema is not validated.
fn strip_map_validation(schema: &mut JSONSchemaProps) {
    schema.additional_properties = None;
    if let Some(properties) = &mut schema.properties {
        for property in properties.values_mut() {
            strip_map_validation(property);
        }
    }
    if let Some(items) = &mut schema.items {
        match items {
            JSONSchemaPropsOrArray::Schema(item) => strip_map_validation(item),
            JSONSchemaPropsOrArray::Schemas(list) => {
                list.iter_mut().for_each(strip_map_validation)
            }
        }
    }
}
