use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use glob::Pattern;
use md5::{Digest, Md5};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::Settings;
use crate::dropbox::LinkProvider;
use crate::error::LinkError;
use crate::models::{FileRecord, Manifest, RunSummary};

const CHUNK_SIZE: usize = 1 << 20;

// -----------------------------------------------------------------------------
// Path helpers
// -----------------------------------------------------------------------------

fn check_path_for(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let joined = rel
        .iter()
        .map(|c| c.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{joined}")
}

fn matches_exclusion(check_path: &str, exclusions: &[String]) -> bool {
    for exc in exclusions {
        if let Ok(pat) = Pattern::new(exc) {
            if pat.matches(check_path) {
                return true;
            }
        }
        if check_path.contains(exc.as_str()) {
            return true;
        }
    }
    false
}

/// Swaps the trailing `0` of `?dl=0` for `1` so the link downloads directly.
pub fn direct_download_url(url: &str) -> String {
    let mut out = url.to_string();
    out.pop();
    out.push('1');
    out
}

/// Seconds relative to the Unix epoch, negative for older files.
fn modified_secs(path: &Path) -> Result<i64, LinkError> {
    let meta = fs::metadata(path).map_err(|e| LinkError::io(path, e))?;
    let mtime = meta.modified().map_err(|e| LinkError::io(path, e))?;
    let secs = match mtime.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    };
    Ok(secs)
}

// -----------------------------------------------------------------------------
// Hashing
// -----------------------------------------------------------------------------

pub fn hash_file(path: &Path) -> Result<String, LinkError> {
    let file = File::open(path).map_err(|e| LinkError::io(path, e))?;
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, file);
    let mut hasher = Md5::new();
    io::copy(&mut reader, &mut hasher).map_err(|e| LinkError::io(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

// -----------------------------------------------------------------------------
// Previous manifest
// -----------------------------------------------------------------------------

/// Loads a previous run's records keyed by `check_path`.
///
/// The cache only saves work, so every failure here yields `None`.
pub fn load_previous(path: Option<&Path>) -> Option<HashMap<String, FileRecord>> {
    let path = path?;
    let txt = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            info!(path = %path.display(), error = %e, "previous manifest unreadable, starting cold");
            return None;
        }
    };
    let manifest: Manifest = match serde_json::from_str(&txt) {
        Ok(m) => m,
        Err(e) => {
            info!(path = %path.display(), error = %e, "previous manifest invalid, starting cold");
            return None;
        }
    };
    let map: HashMap<String, FileRecord> = manifest
        .files
        .into_iter()
        .map(|r| (r.check_path.clone(), r))
        .collect();
    info!(path = %path.display(), entries = map.len(), "loaded previous manifest");
    Some(map)
}

// -----------------------------------------------------------------------------
// Scan
// -----------------------------------------------------------------------------

fn fetch_link(
    provider: &dyn LinkProvider,
    settings: &Settings,
    check_path: &str,
) -> Result<String, LinkError> {
    let remote = settings.remote_path(check_path);
    let url = direct_download_url(&provider.create_share_link(&remote)?);
    println!("{url}");
    Ok(url)
}

/// Resolves `url` and `md5` for one file, touching its content only when
/// the previous record cannot vouch for it.
fn resolve(
    path: &Path,
    check_path: &str,
    lwt: i64,
    prior: Option<&FileRecord>,
    settings: &Settings,
    provider: &dyn LinkProvider,
    summary: &mut RunSummary,
) -> Result<(String, String), LinkError> {
    if let Some(old) = prior {
        if old.lwt == Some(lwt) {
            debug!(check_path, "unchanged since last run");
            summary.fast_path += 1;
            return Ok((old.url.clone(), old.md5.clone()));
        }
        let md5 = hash_file(path)?;
        if md5 == old.md5 {
            debug!(check_path, "timestamp moved, content identical");
            summary.rehashed += 1;
            return Ok((old.url.clone(), md5));
        }
        info!(check_path, "content changed, requesting new link");
        let url = fetch_link(provider, settings, check_path)?;
        summary.fetched += 1;
        return Ok((url, md5));
    }

    let md5 = hash_file(path)?;
    info!(check_path, "new file, requesting link");
    let url = fetch_link(provider, settings, check_path)?;
    summary.fetched += 1;
    Ok((url, md5))
}

pub fn build_manifest(
    settings: &Settings,
    previous: Option<&HashMap<String, FileRecord>>,
    provider: &dyn LinkProvider,
) -> Result<(Manifest, RunSummary), LinkError> {
    let root = settings.walk_root();
    let mut summary = RunSummary::default();
    let mut files = Vec::new();

    let mut walk = WalkDir::new(&root);
    if settings.sort {
        walk = walk.sort_by_file_name();
    }

    for entry in walk {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let check_path = check_path_for(&root, path);
        if matches_exclusion(&check_path, &settings.exclusions) {
            debug!(check_path, "excluded");
            summary.excluded += 1;
            continue;
        }

        let lwt = modified_secs(path)?;
        let prior = previous.and_then(|p| p.get(&check_path));
        let (url, md5) = resolve(
            path,
            &check_path,
            lwt,
            prior,
            settings,
            provider,
            &mut summary,
        )?;

        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        files.push(FileRecord {
            check_path,
            lwt: Some(lwt),
            md5,
            name,
            packed: false,
            url,
        });
    }

    Ok((Manifest { files }, summary))
}

pub fn save_manifest(path: &Path, manifest: &Manifest) -> Result<(), LinkError> {
    let json = serde_json::to_string_pretty(manifest)?;
    fs::write(path, json).map_err(|e| LinkError::io(path, e))
}

/// Builds the manifest and writes it unless this is a dry run.
///
/// Returns the path written, if any.
pub fn run(
    settings: &Settings,
    previous: Option<&HashMap<String, FileRecord>>,
    provider: &dyn LinkProvider,
) -> Result<Option<PathBuf>, LinkError> {
    let (manifest, summary) = build_manifest(settings, previous, provider)?;

    info!(
        files = summary.total(),
        fast_path = summary.fast_path,
        rehashed = summary.rehashed,
        fetched = summary.fetched,
        excluded = summary.excluded,
        "scan complete"
    );

    if settings.dry_run {
        info!("dry run, manifest not written");
        return Ok(None);
    }

    let out = settings.manifest_path();
    save_manifest(&out, &manifest)?;
    info!(path = %out.display(), "manifest written");
    Ok(Some(out))
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
