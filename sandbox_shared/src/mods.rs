//! Mod descriptors and the per-tick mod host.
//!
//! Each mod ships a `mod.toml` descriptor:
//!
//! ```toml
//! [info]
//! name = "farming"
//! authors = ["someone"]
//! version = [0, 1, 0]
//!
//! [[info.dependencies]]
//! name = "core"
//! version = [0, 1, 0]
//! ```
//!
//! Descriptors are parsed field by field so every malformed file names the
//! exact failure, and a bad descriptor excludes only that mod. Dependency
//! constraints are parsed into data but deliberately not resolved or
//! enforced.
//!
//! Behavior comes from a [`ModRuntime`] supplied by the script host. The
//! [`ModHost`] calls `update` once per simulation tick in load order; a
//! runtime that returns an error is logged and disabled for the rest of
//! the run, so one broken mod never takes the loop or its siblings down.

use std::path::Path;

use tracing::{error, info, warn};

use crate::ecs::World;

/// Semantic version triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModVersion {
    pub major: i64,
    pub minor: i64,
    pub patch: i64,
}

/// A declared (unresolved) dependency on another mod.
#[derive(Debug, Clone, PartialEq)]
pub struct ModDependency {
    pub name: String,
    pub version: ModVersion,
}

/// Static metadata for one mod.
#[derive(Debug, Clone, PartialEq)]
pub struct ModInfo {
    pub name: String,
    pub authors: Vec<String>,
    pub version: ModVersion,
    pub dependencies: Vec<ModDependency>,
}

/// Descriptor parse failures.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("not valid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("missing or mistyped field: {0}")]
    MissingField(&'static str),

    #[error("version must be an array of 3 integers, got {0} elements")]
    BadVersion(usize),
}

fn parse_version(value: &toml::Value, len_err: bool) -> Result<ModVersion, DescriptorError> {
    let array = value
        .as_array()
        .ok_or(DescriptorError::MissingField("version"))?;
    if array.len() != 3 {
        if len_err {
            return Err(DescriptorError::BadVersion(array.len()));
        }
        return Err(DescriptorError::MissingField("version"));
    }
    let mut parts = [0i64; 3];
    for (slot, v) in parts.iter_mut().zip(array) {
        *slot = v
            .as_integer()
            .ok_or(DescriptorError::MissingField("version"))?;
    }
    Ok(ModVersion {
        major: parts[0],
        minor: parts[1],
        patch: parts[2],
    })
}

/// Parses a `mod.toml` descriptor.
pub fn parse_descriptor(text: &str) -> Result<ModInfo, DescriptorError> {
    let root: toml::Table = text.parse()?;
    let info = root
        .get("info")
        .and_then(|v| v.as_table())
        .ok_or(DescriptorError::MissingField("info"))?;

    let name = info
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or(DescriptorError::MissingField("name"))?
        .to_string();

    let authors = info
        .get("authors")
        .and_then(|v| v.as_array())
        .ok_or(DescriptorError::MissingField("authors"))?
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or(DescriptorError::MissingField("authors"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let version = parse_version(
        info.get("version")
            .ok_or(DescriptorError::MissingField("version"))?,
        true,
    )?;

    // Dependencies are optional; constraints are carried but not resolved.
    let mut dependencies = Vec::new();
    if let Some(deps) = info.get("dependencies") {
        let deps = deps
            .as_array()
            .ok_or(DescriptorError::MissingField("dependencies"))?;
        for dep in deps {
            let table = dep
                .as_table()
                .ok_or(DescriptorError::MissingField("dependencies"))?;
            let dep_name = table
                .get("name")
                .and_then(|v| v.as_str())
                .ok_or(DescriptorError::MissingField("dependencies.name"))?
                .to_string();
            let dep_version = parse_version(
                table
                    .get("version")
                    .ok_or(DescriptorError::MissingField("dependencies.version"))?,
                false,
            )?;
            dependencies.push(ModDependency {
                name: dep_name,
                version: dep_version,
            });
        }
    }

    Ok(ModInfo {
        name,
        authors,
        version,
        dependencies,
    })
}

/// Scans `dir` for `<mod>/mod.toml` descriptors.
///
/// Malformed descriptors are logged and skipped; they have zero effect on
/// the mods that do parse. Returns descriptors in directory order.
pub fn load_descriptors(dir: &Path) -> Vec<ModInfo> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "mods directory not readable");
            return Vec::new();
        }
    };

    let mut mods = Vec::new();
    for entry in entries.flatten() {
        let descriptor_path = entry.path().join("mod.toml");
        if !descriptor_path.is_file() {
            continue;
        }
        let text = match std::fs::read_to_string(&descriptor_path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %descriptor_path.display(), error = %e, "descriptor not readable, skipping mod");
                continue;
            }
        };
        match parse_descriptor(&text) {
            Ok(info) => {
                info!(
                    name = %info.name,
                    version = format!("{}.{}.{}", info.version.major, info.version.minor, info.version.patch),
                    "found mod"
                );
                mods.push(info);
            }
            Err(e) => {
                warn!(path = %descriptor_path.display(), error = %e, "malformed descriptor, skipping mod");
            }
        }
    }
    mods
}

/// Behavior hooks supplied by the script host for one loaded mod.
pub trait ModRuntime: Send {
    /// Called once when the mod is loaded.
    fn init(&mut self, world: &mut World) -> anyhow::Result<()>;

    /// Called once per simulation tick with the elapsed delta.
    fn update(&mut self, world: &mut World, delta: f64) -> anyhow::Result<()>;
}

struct LoadedMod {
    info: ModInfo,
    runtime: Box<dyn ModRuntime>,
    failed: bool,
}

/// Owns the loaded mods and drives their per-tick hooks in load order.
#[derive(Default)]
pub struct ModHost {
    mods: Vec<LoadedMod>,
}

impl ModHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a runtime for a parsed descriptor. Load order is
    /// registration order.
    pub fn register(&mut self, info: ModInfo, runtime: Box<dyn ModRuntime>) {
        self.mods.push(LoadedMod {
            info,
            runtime,
            failed: false,
        });
    }

    pub fn mod_names(&self) -> Vec<&str> {
        self.mods.iter().map(|m| m.info.name.as_str()).collect()
    }

    /// Mods still eligible to run.
    pub fn active_count(&self) -> usize {
        self.mods.iter().filter(|m| !m.failed).count()
    }

    /// Runs every mod's `init`. A failing mod is disabled, not fatal.
    pub fn init_all(&mut self, world: &mut World) {
        for m in &mut self.mods {
            if let Err(e) = m.runtime.init(world) {
                error!(name = %m.info.name, error = %e, "mod init failed, disabling");
                m.failed = true;
            }
        }
    }

    /// Runs every active mod's `update` exactly once, in load order.
    ///
    /// An update failure disables that mod for subsequent ticks; the
    /// remaining mods and the loop itself continue untouched.
    pub fn update_all(&mut self, world: &mut World, delta: f64) {
        for m in &mut self.mods {
            if m.failed {
                continue;
            }
            if let Err(e) = m.runtime.update(world, delta) {
                error!(name = %m.info.name, error = %e, "mod update failed, disabling");
                m.failed = true;
            }
        }
    }
}
