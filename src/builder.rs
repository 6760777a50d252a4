//! Checking out a project revision and building its fuzzers.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;

/// Where and what to build. Unlike runtime config this is consumed once,
/// by `build_fuzzers`.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub project_name: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub workspace: PathBuf,
    pub out_dir: PathBuf,
    /// Command executed inside the checkout, via `sh -c`.
    pub build_cmd: String,
}

impl BuildConfig {
    pub fn new(project_name: &str, repo_url: &str, commit_sha: &str, workspace: PathBuf) -> Self {
        let out_dir = workspace.join("out");
        Self {
            project_name: project_name.to_string(),
            repo_url: repo_url.to_string(),
            commit_sha: commit_sha.to_string(),
            workspace,
            out_dir,
            build_cmd: "./infra/build.sh".to_string(),
        }
    }

    /// Checkout directory, named after the repo.
    pub fn src_dir(&self) -> PathBuf {
        let repo_name = self
            .repo_url
            .trim_end_matches('/')
            .trim_end_matches(".git")
            .rsplit('/')
            .next()
            .unwrap_or(&self.project_name)
            .to_string();
        self.workspace.join("storage").join(repo_name)
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("git {op} failed: {status}")]
    Git { op: &'static str, status: ExitStatus },
    #[error("build command failed: {0}")]
    Build(ExitStatus),
}

/// Clones the repo at the requested revision and runs the project's build
/// command with `SRC`, `OUT` and `PROJECT` exported, the environment build
/// scripts expect. Build output is inherited so CI logs show compiler
/// errors verbatim.
pub fn build_fuzzers(config: &BuildConfig) -> Result<(), BuildError> {
    let src_dir = config.src_dir();
    fs::create_dir_all(&config.out_dir)?;

    if !src_dir.exists() {
        log::info!("cloning {} to {}", config.repo_url, src_dir.display());
        git(
            "clone",
            Command::new("git")
                .arg("clone")
                .arg(&config.repo_url)
                .arg(&src_dir),
        )?;
    }
    log::info!("checking out {}", config.commit_sha);
    git(
        "checkout",
        Command::new("git")
            .arg("checkout")
            .arg("--force")
            .arg(&config.commit_sha)
            .current_dir(&src_dir),
    )?;

    log::info!("building fuzzers for {}", config.project_name);
    let status = Command::new("sh")
        .arg("-c")
        .arg(&config.build_cmd)
        .current_dir(&src_dir)
        .env("SRC", &src_dir)
        .env("OUT", &config.out_dir)
        .env("PROJECT", &config.project_name)
        .stdin(Stdio::null())
        .status()?;
    if !status.success() {
        return Err(BuildError::Build(status));
    }
    Ok(())
}

fn git(op: &'static str, cmd: &mut Command) -> Result<(), BuildError> {
    let status = cmd.stdin(Stdio::null()).status()?;
    if !status.success() {
        return Err(BuildError::Git { op, status });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn src_dir_is_named_after_the_repo() {
        let config = BuildConfig::new(
            "example",
            "https://github.com/org/example.git",
            "deadbeef",
            PathBuf::from("/ws"),
        );
        assert_eq!(config.src_dir(), PathBuf::from("/ws/storage/example"));
    }

    #[test]
    fn trailing_slash_does_not_break_repo_naming() {
        let config = BuildConfig::new(
            "example",
            "https://github.com/org/example/",
            "deadbeef",
            PathBuf::from("/ws"),
        );
        assert_eq!(config.src_dir(), PathBuf::from("/ws/storage/example"));
    }

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .stdout(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn seed_repo(dir: &std::path::Path) -> String {
        fs::create_dir_all(dir.join("infra")).unwrap();
        fs::write(dir.join("infra/build.sh"), "#!/bin/sh\ntouch \"$OUT/built\"\n").unwrap();
        for args in [
            vec!["init", "-q"],
            vec!["add", "."],
            vec!["-c", "user.email=t@t", "-c", "user.name=t", "commit", "-q", "-m", "seed"],
        ] {
            let status = Command::new("git").args(&args).current_dir(dir).status().unwrap();
            assert!(status.success(), "git {:?}", args);
        }
        let out = Command::new("git")
            .args(&["rev-parse", "HEAD"])
            .current_dir(dir)
            .output()
            .unwrap();
        String::from_utf8(out.stdout).unwrap().trim().to_string()
    }

    #[test]
    fn clones_checks_out_and_runs_the_build_command() {
        if !git_available() {
            return;
        }
        let root = std::env::temp_dir().join(format!("fuzzci-test-build-{}", std::process::id()));
        let upstream = root.join("upstream");
        fs::create_dir_all(&upstream).unwrap();
        let sha = seed_repo(&upstream);

        let mut config = BuildConfig::new(
            "proj",
            upstream.to_str().unwrap(),
            &sha,
            root.join("workspace"),
        );
        config.build_cmd = "sh ./infra/build.sh".to_string();
        build_fuzzers(&config).unwrap();
        assert!(config.out_dir.join("built").exists());
    }

    #[test]
    fn failed_build_command_surfaces_the_exit_status() {
        if !git_available() {
            return;
        }
        let root =
            std::env::temp_dir().join(format!("fuzzci-test-buildfail-{}", std::process::id()));
        let upstream = root.join("upstream");
        fs::create_dir_all(&upstream).unwrap();
        let sha = seed_repo(&upstream);

        let mut config = BuildConfig::new(
            "proj",
            upstream.to_str().unwrap(),
            &sha,
            root.join("workspace"),
        );
        config.build_cmd = "exit 7".to_string();
        let err = build_fuzzers(&config).unwrap_err();
        match err {
            BuildError::Build(status) => assert_eq!(status.code(), Some(7)),
            other => panic!("unexpected error: {}", other),
        }
    }
}
