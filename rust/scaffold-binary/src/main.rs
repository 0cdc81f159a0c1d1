use std::path::PathBuf;

use clap::{ArgAction, Parser};
use snafu::Report;
use tracing_subscriber::EnvFilter;

use crate::{generator::CrdGenerator, typedefs::TypeDefinitionDeriver};

mod generator;
mod manifest;
mod output;
mod project;
mod schema;
mod typedefs;

mod built_info {
    // The file has been placed there by the build script.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
    pub const TARGET_PLATFORM: Option<&str> = option_env!("TARGET");
}

#[derive(clap::Parser)]
#[clap(about, author, version)]
struct Opts {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Generate CRD manifests for the API resources of a project
    Crd(CrdArgs),
}

#[derive(clap::Parser)]
struct CrdArgs {
    /// Working dir, must have the PROJECT file under the path. When unset,
    /// parent directories of the working dir are searched for it
    #[clap(long)]
    root_path: Option<PathBuf>,

    /// API domain, taken from the PROJECT file when unset
    #[clap(long)]
    domain: Option<String>,

    /// CRD namespace, treat it as root scoped if not set
    #[clap(long)]
    namespace: Option<String>,

    /// If set to true, skip generating validation schema for map types in CRDs
    #[clap(long, default_value_t = true, action = ArgAction::Set)]
    skip_map_validation: bool,
}

fn main() {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CRD_SCAFFOLD_LOG")
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    tracing::debug!(
        version = built_info::PKG_VERSION,
        rustc = built_info::RUSTC_VERSION,
        built_at = built_info::BUILT_TIME_UTC,
        target = built_info::TARGET_PLATFORM.unwrap_or("unknown target"),
        "starting up"
    );

    match opts.cmd {
        Command::Crd(CrdArgs {
            root_path,
            domain,
            namespace,
            skip_map_validation,
        }) => {
            let generator = CrdGenerator {
                root_path,
                domain,
                namespace,
                skip_map_validation,
            };

            println!("Writing CRD manifests...");
            match generator.run(&TypeDefinitionDeriver) {
                Ok(summary) => println!(
                    "CRD manifests generated, files can be found under path {}.",
                    summary.output_dir.display()
                ),
                Err(err) => {
                    tracing::error!("CRD generation failed: {}", Report::from_error(err));
                    std::process::exit(1);
                }
            }
        }
    }
}
