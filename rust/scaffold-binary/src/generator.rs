use std::path::{Path, PathBuf};

use snafu::{ensure, ResultExt, Snafu};

use crate::{
    manifest, output, project,
    schema::{self, DeriveOptions, SchemaDeriver},
};

/// Relative path below the project root holding the API type definitions.
pub const API_TYPES_DIR: &str = "pkg/apis";
/// Relative path below the project root the manifests are written to.
pub const CRD_OUTPUT_DIR: &str = "config/crds";

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("failed to resolve project root"))]
    ResolveRoot { source: project::Error },

    #[snafu(display("failed to resolve API domain"))]
    ResolveDomain { source: project::Error },

    #[snafu(display("expected API type definitions under [{}]", path.display()))]
    MissingResourceDir { path: PathBuf },

    #[snafu(display("failed to derive CRD schemas from [{}]", path.display()))]
    DeriveSchemas {
        source: schema::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to aggregate CRD manifests"))]
    AggregateManifests { source: manifest::Error },

    #[snafu(display("failed to write CRD manifests to [{}]", path.display()))]
    WriteManifests {
        source: output::Error,
        path: PathBuf,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// One CRD generation request. Constructed per invocation and handed down
/// the call chain, nothing is shared between runs.
#[derive(Clone, Debug, Default)]
pub struct CrdGenerator {
    /// Project root. When unset, the parent directories of the working
    /// directory are searched for one containing the marker file.
    pub root_path: Option<PathBuf>,
    /// API domain. When unset, taken from the marker file.
    pub domain: Option<String>,
    /// Namespace to stamp into the manifests, root scoped when unset.
    pub namespace: Option<String>,
    pub skip_map_validation: bool,
}

#[derive(Debug)]
pub struct GenerationSummary {
    pub root_path: PathBuf,
    pub output_dir: PathBuf,
    /// File names of the written manifests, in write order.
    pub manifests: Vec<String>,
}

impl CrdGenerator {
    /// Runs one generation pass: resolve root, resolve domain, derive
    /// schemas, aggregate manifests, write them out. Every failure aborts
    /// the remaining steps, re-running is the recovery mechanism.
    pub fn run<D: SchemaDeriver>(&self, deriver: &D) -> Result<GenerationSummary> {
        let root = project::resolve_root(Path::new("."), self.root_path.as_deref(), None)
            .context(ResolveRootSnafu)?;
        let domain = project::resolve_domain(&root, self.domain.as_deref())
            .context(ResolveDomainSnafu)?;
        tracing::debug!(root = %root.display(), %domain, "resolved project root");

        let api_dir = root.join(API_TYPES_DIR);
        ensure!(api_dir.is_dir(), MissingResourceDirSnafu { path: &api_dir });

        let options = DeriveOptions {
            domain,
            skip_map_validation: self.skip_map_validation,
        };
        let groups = deriver
            .derive(&api_dir, &options)
            .context(DeriveSchemasSnafu { path: &api_dir })?;

        let namespace = self
            .namespace
            .as_deref()
            .filter(|namespace| !namespace.is_empty());
        let documents =
            manifest::aggregate(&groups, namespace).context(AggregateManifestsSnafu)?;
        tracing::info!(manifests = documents.len(), "aggregated CRD manifests");

        let output_dir = root.join(CRD_OUTPUT_DIR);
        output::write_all(&output_dir, &documents)
            .context(WriteManifestsSnafu { path: &output_dir })?;

        Ok(GenerationSummary {
            root_path: root,
            output_dir,
            manifests: documents.into_keys().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, fs};

    use indoc::indoc;
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;

    use super::*;
    use crate::{schema::ApiGroup, typedefs::TypeDefinitionDeriver};

    fn scaffold_project(root: &Path) {
        fs::write(
            root.join(project::PROJECT_FILE),
            indoc! {"
                version: \"1\"
                domain: example.com
                repo: example.com/widgets
            "},
        )
        .unwrap();
        let api_dir = root.join("pkg/apis/apps/v1");
        fs::create_dir_all(&api_dir).unwrap();
        fs::write(
            api_dir.join("widget_types.yaml"),
            indoc! {"
                kind: Widget
                schema:
                  type: object
                  properties:
                    spec:
                      type: object
                      properties:
                        replicas:
                          type: integer
            "},
        )
        .unwrap();
    }

    fn generator_for(root: &Path) -> CrdGenerator {
        CrdGenerator {
            root_path: Some(root.to_path_buf()),
            skip_map_validation: true,
            ..CrdGenerator::default()
        }
    }

    #[test]
    fn generates_manifest_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        scaffold_project(dir.path());

        let summary = generator_for(dir.path()).run(&TypeDefinitionDeriver).unwrap();

        assert_eq!(summary.output_dir, dir.path().join(CRD_OUTPUT_DIR));
        assert_eq!(summary.manifests, vec!["apps_v1_widget.yaml".to_string()]);

        let manifest =
            fs::read_to_string(summary.output_dir.join("apps_v1_widget.yaml")).unwrap();
        let crd: CustomResourceDefinition = serde_yaml::from_str(&manifest).unwrap();
        assert_eq!(crd.spec.group, "apps.example.com");
        assert_eq!(crd.spec.names.kind, "Widget");
        assert_eq!(crd.spec.versions[0].name, "v1");
        assert_eq!(crd.metadata.namespace, None);
    }

    #[test]
    fn repeated_runs_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        scaffold_project(dir.path());
        let generator = generator_for(dir.path());

        let summary = generator.run(&TypeDefinitionDeriver).unwrap();
        let manifest_path = summary.output_dir.join("apps_v1_widget.yaml");
        let first = fs::read(&manifest_path).unwrap();

        generator.run(&TypeDefinitionDeriver).unwrap();
        let second = fs::read(&manifest_path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn namespace_override_lands_in_manifest() {
        let dir = tempfile::tempdir().unwrap();
        scaffold_project(dir.path());
        let generator = CrdGenerator {
            namespace: Some("team-a".to_string()),
            ..generator_for(dir.path())
        };

        let summary = generator.run(&TypeDefinitionDeriver).unwrap();

        let manifest =
            fs::read_to_string(summary.output_dir.join("apps_v1_widget.yaml")).unwrap();
        let crd: CustomResourceDefinition = serde_yaml::from_str(&manifest).unwrap();
        assert_eq!(crd.metadata.namespace.as_deref(), Some("team-a"));
    }

    #[test]
    fn fails_without_resource_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(project::PROJECT_FILE), "domain: example.com\n").unwrap();

        let err = generator_for(dir.path())
            .run(&TypeDefinitionDeriver)
            .unwrap_err();

        assert!(matches!(err, Error::MissingResourceDir { .. }));
    }

    /// Captures the options the orchestrator hands to the deriver.
    struct RecordingDeriver {
        seen: RefCell<Option<DeriveOptions>>,
    }

    impl SchemaDeriver for RecordingDeriver {
        fn derive(
            &self,
            _api_dir: &Path,
            options: &DeriveOptions,
        ) -> schema::Result<Vec<ApiGroup>> {
            *self.seen.borrow_mut() = Some(options.clone());
            Ok(Vec::new())
        }
    }

    #[test]
    fn passes_resolved_domain_to_deriver() {
        let dir = tempfile::tempdir().unwrap();
        scaffold_project(dir.path());
        let deriver = RecordingDeriver {
            seen: RefCell::new(None),
        };

        generator_for(dir.path()).run(&deriver).unwrap();

        assert_eq!(
            deriver.seen.into_inner(),
            Some(DeriveOptions {
                domain: "example.com".to_string(),
                skip_map_validation: true,
            })
        );
    }
}
