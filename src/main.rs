use std::path::PathBuf;
use std::process::exit;

use anyhow::Context;
use env_logger::{Env, TimestampPrecision};
use structopt::StructOpt;

use fuzzci::batch::RunPolicy;
use fuzzci::{BuildConfig, Config};

#[derive(Debug, StructOpt)]
#[structopt(name = "fuzzci", about = "Build and run a project's fuzz targets in CI.")]
enum Settings {
    /// Clone the project at a revision and build its fuzz targets.
    #[structopt(name = "build_fuzzers")]
    BuildFuzzers {
        /// Project name, passed to the build as PROJECT.
        project_name: String,
        /// Git URL of the project repository.
        repo_url: String,
        /// Commit to check out before building.
        commit_sha: String,
        /// Workspace directory, defaults to $GITHUB_WORKSPACE.
        #[structopt(long)]
        workspace: Option<PathBuf>,
        /// Build command run inside the checkout.
        #[structopt(long, default_value = "./infra/build.sh")]
        build_cmd: String,
    },
    /// Run every built fuzz target for a bounded time.
    #[structopt(name = "run_fuzzers")]
    RunFuzzers {
        /// Project name the targets belong to.
        project_name: String,
        /// Workspace directory, defaults to $GITHUB_WORKSPACE.
        #[structopt(long)]
        workspace: Option<PathBuf>,
        /// Seconds to fuzz each target.
        #[structopt(long, default_value = "20")]
        fuzz_seconds: u64,
        /// Where a reproducing input is saved on failure.
        #[structopt(long, default_value = "/tmp/testcase")]
        testcase_path: PathBuf,
        /// Keep running remaining targets after a failure.
        #[structopt(long)]
        run_all: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(Env::new().filter_or("FUZZCI_LOG", "info"))
        .format_timestamp(Some(TimestampPrecision::Seconds))
        .init();
    fuzzci::utils::setup_signal_handler();

    if let Err(e) = run(Settings::from_args()) {
        log::error!("{:#}", e);
        exit(1);
    }
}

fn run(settings: Settings) -> anyhow::Result<()> {
    match settings {
        Settings::BuildFuzzers {
            project_name,
            repo_url,
            commit_sha,
            workspace,
            build_cmd,
        } => {
            let workspace = resolve_workspace(workspace)?;
            let mut config = BuildConfig::new(&project_name, &repo_url, &commit_sha, workspace);
            config.build_cmd = build_cmd;
            fuzzci::build_fuzzers(&config)
        }
        Settings::RunFuzzers {
            project_name,
            workspace,
            fuzz_seconds,
            testcase_path,
            run_all,
        } => {
            let workspace = resolve_workspace(workspace)?;
            let config = Config {
                project_name,
                out_dir: workspace.join("out"),
                workspace,
                fuzz_seconds,
                testcase_path,
                run_policy: if run_all {
                    RunPolicy::RunAll
                } else {
                    RunPolicy::StopOnFirstFailure
                },
                ..Config::default()
            };
            let result = fuzzci::run_fuzzers(&config)?;
            if result.any_failure {
                log::error!(
                    "bug detected in: {}",
                    result.failed_targets.join(", ")
                );
                exit(1);
            }
            log::info!("all fuzzers ran cleanly");
            Ok(())
        }
    }
}

fn resolve_workspace(flag: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(workspace) = flag {
        return Ok(workspace);
    }
    std::env::var_os("GITHUB_WORKSPACE")
        .map(PathBuf::from)
        .context("no --workspace given and GITHUB_WORKSPACE is not set")
}
