use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;

use crate::dropbox::DEFAULT_API_BASE;
use crate::error::LinkError;

pub const USAGE: &str =
    "Usage: linkmap abs_path_to_dropbox rel_path_to_dir_to_process [old.json]";

#[derive(Parser, Debug)]
#[command(
    name = "linkmap",
    version,
    about = "Build a manifest of Dropbox share links for a directory"
)]
pub struct Cli {
    /// Absolute path to the local Dropbox folder.
    pub storage_root: Option<PathBuf>,

    /// Directory to process, relative to the Dropbox folder.
    pub target_dir: Option<String>,

    /// Manifest written by a previous run, used as a cache.
    pub previous: Option<PathBuf>,

    /// File holding the API access token.
    #[arg(long, env = "LINKMAP_KEY_FILE", default_value = "key.txt")]
    pub key_file: PathBuf,

    /// Directory the manifest is written to.
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Skip files whose relative path matches this glob (repeatable).
    #[arg(short = 'x', long = "exclude")]
    pub exclusions: Vec<String>,

    /// Visit directory entries in file name order.
    #[arg(long)]
    pub sort: bool,

    /// Resolve every record but do not write the manifest.
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, env = "LINKMAP_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Default log filter when RUST_LOG is not set.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub storage_root: PathBuf,
    /// Forward-slash relative path, no leading or trailing slash.
    pub target_dir: String,
    pub previous_manifest: Option<PathBuf>,
    pub key_file: PathBuf,
    pub output_dir: PathBuf,
    pub exclusions: Vec<String>,
    pub sort: bool,
    pub dry_run: bool,
    pub api_base: String,
}

pub fn normalize_target(raw: &str) -> String {
    raw.replace('\\', "/").trim_matches('/').to_string()
}

impl Settings {
    /// Returns `None` when the positional arguments are incomplete.
    pub fn from_cli(cli: Cli) -> Option<Self> {
        let storage_root = cli.storage_root?;
        let target_dir = normalize_target(&cli.target_dir?);
        if target_dir.is_empty() {
            return None;
        }
        Some(Settings {
            storage_root,
            target_dir,
            previous_manifest: cli.previous,
            key_file: cli.key_file,
            output_dir: cli.output_dir,
            exclusions: cli.exclusions,
            sort: cli.sort,
            dry_run: cli.dry_run,
            api_base: cli.api_base,
        })
    }

    pub fn walk_root(&self) -> PathBuf {
        self.storage_root.join(&self.target_dir)
    }

    pub fn base_name(&self) -> &str {
        self.target_dir
            .rsplit('/')
            .next()
            .unwrap_or(&self.target_dir)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.json", self.base_name()))
    }

    /// Path of a file as the storage provider sees it.
    pub fn remote_path(&self, check_path: &str) -> String {
        format!("/{}{}", self.target_dir, check_path)
    }
}

pub fn load_token(path: &Path) -> Result<String, LinkError> {
    let raw = fs::read_to_string(path).map_err(|e| LinkError::io(path, e))?;
    let token = raw.trim();
    if token.is_empty() {
        return Err(LinkError::MissingCredential {
            path: path.to_path_buf(),
        });
    }
    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Option<Settings> {
        let mut argv = vec!["linkmap"];
        argv.extend_from_slice(args);
        Settings::from_cli(Cli::parse_from(argv))
    }

    #[test]
    fn missing_positionals_mean_usage() {
        assert!(parse(&[]).is_none());
        assert!(parse(&["/home/me/Dropbox"]).is_none());
        assert!(parse(&["/home/me/Dropbox", "/"]).is_none());
    }

    #[test]
    fn target_is_normalized() {
        let s = parse(&["/home/me/Dropbox", "\\games\\data\\"]).unwrap();
        assert_eq!(s.target_dir, "games/data");
        assert_eq!(s.base_name(), "data");
        assert_eq!(s.manifest_path(), PathBuf::from("./data.json"));
        assert_eq!(s.remote_path("/a/b.txt"), "/games/data/a/b.txt");
        assert_eq!(s.walk_root(), PathBuf::from("/home/me/Dropbox/games/data"));
    }

    #[test]
    fn optional_arguments() {
        let s = parse(&[
            "/root",
            "docs",
            "old.json",
            "--exclude",
            "*.tmp",
            "-x",
            "cache",
            "--output-dir",
            "/tmp/out",
            "--sort",
        ])
        .unwrap();
        assert_eq!(s.previous_manifest, Some(PathBuf::from("old.json")));
        assert_eq!(s.exclusions, vec!["*.tmp".to_string(), "cache".to_string()]);
        assert_eq!(s.manifest_path(), PathBuf::from("/tmp/out/docs.json"));
        assert!(s.sort);
        assert!(!s.dry_run);
    }

    #[test]
    fn token_is_trimmed() {
        let dir = TempDir::new().unwrap();
        let key = dir.path().join("key.txt");
        fs::write(&key, "  abc123\n").unwrap();
        assert_eq!(load_token(&key).unwrap(), "abc123");
    }

    #[test]
    fn empty_or_missing_token_is_fatal() {
        let dir = TempDir::new().unwrap();
        let key = dir.path().join("key.txt");
        assert!(matches!(load_token(&key), Err(LinkError::Io { .. })));
        fs::write(&key, "\n").unwrap();
        assert!(matches!(
            load_token(&key),
            Err(LinkError::MissingCredential { .. })
        ));
    }
}
