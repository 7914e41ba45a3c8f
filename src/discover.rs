// src/discover.rs

//! Schema directory discovery and script overlay
//!
//! A schema root holds one subdirectory per driver plus the two reserved
//! names `_common` and `_generic`:
//!
//! ```text
//! <root>/<driver>/<version>/NNN_*.sql
//! <root>/<driver>/<v1>-<v2>/NNN_*.sql
//! <root>/_common/<version>/NNN_*.sql
//! <root>/_generic/<version>/NNN_*.sql
//! ```
//!
//! Directories named as a single version install that version from
//! nothing; `v1-v2` directories carry the scripts for one directed
//! transition. Anything else is ignored with a warning.
//!
//! The script list for a directory is the union of base names under the
//! driver directory and `_common`, with the driver file winning per name,
//! sorted ascending. `_generic` is a stand-in for a whole missing driver
//! directory and is never mixed with `_common`.

use crate::error::{Error, Result};
use crate::graph::Edge;
use crate::version::Version;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reserved directory of scripts shared by all drivers, overlaid under a
/// real driver directory.
pub const COMMON_DIR: &str = "_common";

/// Reserved directory used in place of a driver directory when no
/// driver-specific one exists.
pub const GENERIC_DIR: &str = "_generic";

/// One script file: its ordering key (base name) and body.
#[derive(Debug, Clone)]
pub struct ScriptFile {
    pub name: String,
    pub body: String,
}

/// What a directory name under a driver root means.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DirKind {
    Install(Version),
    Transition(Version, Version),
    Other,
}

fn classify(name: &str) -> DirKind {
    if let Ok(version) = Version::parse(name) {
        return DirKind::Install(version);
    }
    if let Some((from, to)) = name.split_once('-') {
        if let (Ok(from), Ok(to)) = (Version::parse(from), Version::parse(to)) {
            return DirKind::Transition(from, to);
        }
    }
    DirKind::Other
}

/// The classified contents of one schema root for one driver.
#[derive(Debug)]
pub struct SchemaLayout {
    driver_dir: Option<PathBuf>,
    common_dir: Option<PathBuf>,
    installs: BTreeMap<Version, String>,
    transitions: BTreeMap<(Version, Version), String>,
}

impl SchemaLayout {
    /// Scan `root` for `driver_name`'s scripts.
    ///
    /// If `<root>/<driver_name>` exists it is the driver directory and
    /// `<root>/_common` (when present) overlays it. Otherwise
    /// `<root>/_generic` stands in alone. With neither, the layout is
    /// empty and every non-trivial migration fails for lack of a path.
    pub fn scan(root: &Path, driver_name: &str) -> Result<Self> {
        let exact = root.join(driver_name);
        let (driver_dir, common_dir) = if exact.is_dir() {
            let common = root.join(COMMON_DIR);
            (Some(exact), common.is_dir().then_some(common))
        } else {
            let generic = root.join(GENERIC_DIR);
            if generic.is_dir() {
                debug!(
                    "no {} directory under {}, using {}",
                    driver_name,
                    root.display(),
                    GENERIC_DIR
                );
                (Some(generic), None)
            } else {
                debug!(
                    "no {} or {} directory under {}",
                    driver_name,
                    GENERIC_DIR,
                    root.display()
                );
                (None, None)
            }
        };

        let mut layout = SchemaLayout {
            driver_dir,
            common_dir,
            installs: BTreeMap::new(),
            transitions: BTreeMap::new(),
        };

        // Union of directory names from the driver tree and the shared
        // tree; sorted so classification is independent of readdir order.
        let mut names: Vec<String> = Vec::new();
        for dir in [&layout.driver_dir, &layout.common_dir].into_iter().flatten() {
            for entry_name in subdirectories(dir)? {
                if !names.contains(&entry_name) {
                    names.push(entry_name);
                }
            }
        }
        names.sort();

        for name in names {
            match classify(&name) {
                DirKind::Install(version) => {
                    if let Some(first) = layout.installs.get(&version) {
                        warn!(
                            "install directory {} duplicates version {}, keeping {}",
                            name, version, first
                        );
                    } else {
                        layout.installs.insert(version, name);
                    }
                }
                DirKind::Transition(from, to) => {
                    let key = (from, to);
                    if let Some(first) = layout.transitions.get(&key) {
                        warn!(
                            "transition directory {} duplicates {}-{}, keeping {}",
                            name, key.0, key.1, first
                        );
                    } else {
                        layout.transitions.insert(key, name);
                    }
                }
                DirKind::Other => {
                    warn!("ignoring unrecognized schema directory {:?}", name);
                }
            }
        }

        Ok(layout)
    }

    /// Whether any script directory was found for this driver.
    pub fn has_scripts(&self) -> bool {
        self.driver_dir.is_some()
    }

    /// The migration edges this layout contributes: `0 -> V` per install
    /// directory and `V1 -> V2` per transition directory.
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges = Vec::with_capacity(self.installs.len() + self.transitions.len());
        for (version, dir_name) in &self.installs {
            edges.push(Edge {
                from: Version::zero(),
                to: version.clone(),
                dir_name: dir_name.clone(),
            });
        }
        for ((from, to), dir_name) in &self.transitions {
            edges.push(Edge {
                from: from.clone(),
                to: to.clone(),
                dir_name: dir_name.clone(),
            });
        }
        edges
    }

    /// Resolve the ordered script list for one directory name, applying
    /// the `_common` overlay.
    pub fn resolve(&self, dir_name: &str) -> Result<Vec<ScriptFile>> {
        let mut files: BTreeMap<String, PathBuf> = BTreeMap::new();
        if let Some(common) = &self.common_dir {
            collect_scripts(&common.join(dir_name), &mut files)?;
        }
        if let Some(driver) = &self.driver_dir {
            // Driver-specific bodies override _common per base name.
            collect_scripts(&driver.join(dir_name), &mut files)?;
        }

        files
            .into_iter()
            .map(|(name, path)| {
                let body = fs::read_to_string(&path)
                    .map_err(|source| Error::ScriptReadFailure { path, source })?;
                Ok(ScriptFile { name, body })
            })
            .collect()
    }
}

/// Names of the immediate subdirectories of `dir`, hidden entries skipped.
fn subdirectories(dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|source| Error::ScriptReadFailure {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| Error::ScriptReadFailure {
            path: dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        if entry.path().is_dir() {
            names.push(name);
        }
    }
    Ok(names)
}

/// Record the script files directly under `dir` into `files`, later
/// sources overriding earlier ones per base name. A missing `dir` simply
/// contributes nothing.
fn collect_scripts(dir: &Path, files: &mut BTreeMap<String, PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    let entries = fs::read_dir(dir).map_err(|source| Error::ScriptReadFailure {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| Error::ScriptReadFailure {
            path: dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        if entry.path().is_file() {
            files.insert(name, entry.path());
        }
    }
    Ok(())
}
