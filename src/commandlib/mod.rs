// src/commandlib/mod.rs

//! Command knowledge base and `created_by` resolution
//!
//! Maps the program names found in a layer's `created_by` string to a
//! package-extraction strategy. A lookup resolves once into a tagged
//! [`Resolution`]: a direct package-manager binary (generic extraction), a
//! structured listing of retrieval snippets, or unknown. Resolution is
//! strictly per command; a layer created by `apt-get update && apt-get
//! install curl` yields two independent resolutions dispatched in order.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Named snippet sets describing how to retrieve package information for one
/// package manager
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackageListing {
    /// Package database format this listing targets ("deb", "rpm", "apk", ...)
    pub format: String,
    /// Attribute name (e.g. "names", "versions") to the shell snippets that
    /// produce it, parameterized by the invoking command's arguments
    #[serde(default)]
    pub snippets: BTreeMap<String, Vec<String>>,
}

/// Outcome of looking up a command name, decided once at lookup time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Treat the command as a direct package-manager invocation and extract
    /// with the generic strategy rooted at this binary
    DirectBinary(PathBuf),
    /// Retrieve package information through the listing's snippets
    StructuredListing(PackageListing),
    /// Command not present in the knowledge base
    Unknown,
}

/// Lookup capability over the command knowledge base
pub trait CommandLibrary {
    fn lookup(&self, command_name: &str) -> Resolution;
}

/// One discrete command extracted from a layer's `created_by` string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    /// Program name with any leading directory stripped
    pub name: String,
    pub args: Vec<String>,
}

impl ShellCommand {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Split a layer's `created_by` string into discrete commands.
///
/// Dockerfile no-op history entries (`#(nop) ENV ...`, WORKDIR, LABEL and
/// friends) produce no commands, as do missing or blank strings; the caller
/// then falls back to base-state extraction. Shell wrappers (`/bin/sh -c`)
/// are stripped and the remainder split on `&&` and `;`. Leading environment
/// assignments (`DEBIAN_FRONTEND=noninteractive apt-get ...`) are skipped
/// when locating the program name.
pub fn split_created_by(created_by: &str) -> Vec<ShellCommand> {
    let text = created_by.trim();
    if text.is_empty() || text.contains("#(nop)") {
        return Vec::new();
    }

    // Strip the shell invocation wrapper if present
    let script = match text.find("/bin/sh -c") {
        Some(pos) => &text[pos + "/bin/sh -c".len()..],
        None => text,
    };

    let mut commands = Vec::new();
    for segment in script.split("&&").flat_map(|s| s.split(';')) {
        let mut tokens = segment.split_whitespace().peekable();
        // Skip env assignments preceding the program name
        while tokens
            .peek()
            .is_some_and(|t| t.contains('=') && !t.starts_with('='))
        {
            tokens.next();
        }
        let Some(program) = tokens.next() else {
            continue;
        };
        let name = Path::new(program)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.to_string());
        let args = tokens.map(str::to_string).collect();
        commands.push(ShellCommand::new(name, args));
    }
    commands
}

#[derive(Debug, Deserialize)]
struct LibraryDoc {
    #[serde(default)]
    command: BTreeMap<String, CommandDoc>,
}

#[derive(Debug, Deserialize)]
struct CommandDoc {
    /// Direct binary path; mutually exclusive with `format`/`snippets`
    binary: Option<String>,
    format: Option<String>,
    #[serde(default)]
    snippets: BTreeMap<String, Vec<String>>,
}

/// Command knowledge base loaded from a TOML table
///
/// ```toml
/// [command.apt-get]
/// format = "deb"
/// [command.apt-get.snippets]
/// names = ["dpkg-query -W -f '${Package}\\n'"]
///
/// [command.dpkg]
/// binary = "/usr/bin/dpkg"
/// ```
#[derive(Debug, Clone, Default)]
pub struct TomlCommandLibrary {
    entries: BTreeMap<String, Resolution>,
}

impl TomlCommandLibrary {
    /// Load a knowledge base from a TOML file
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::CommandLibrary(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&data)
    }

    pub fn from_toml(data: &str) -> Result<Self> {
        let doc: LibraryDoc = toml::from_str(data)
            .map_err(|e| Error::CommandLibrary(format!("malformed command library: {}", e)))?;
        let mut entries = BTreeMap::new();
        for (name, command) in doc.command {
            let resolution = match (command.binary, command.format) {
                (Some(binary), None) => Resolution::DirectBinary(PathBuf::from(binary)),
                (None, Some(format)) => Resolution::StructuredListing(PackageListing {
                    format,
                    snippets: command.snippets,
                }),
                (Some(_), Some(_)) => {
                    return Err(Error::CommandLibrary(format!(
                        "command '{}' declares both binary and listing",
                        name
                    )));
                }
                (None, None) => {
                    return Err(Error::CommandLibrary(format!(
                        "command '{}' declares neither binary nor listing",
                        name
                    )));
                }
            };
            entries.insert(name, resolution);
        }
        Ok(Self { entries })
    }

    /// Built-in table covering the common Linux package managers
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();
        for name in ["apt-get", "apt", "aptitude"] {
            entries.insert(
                name.to_string(),
                Resolution::StructuredListing(PackageListing {
                    format: "deb".to_string(),
                    snippets: deb_snippets(),
                }),
            );
        }
        for name in ["yum", "dnf", "microdnf", "tdnf"] {
            entries.insert(
                name.to_string(),
                Resolution::StructuredListing(PackageListing {
                    format: "rpm".to_string(),
                    snippets: rpm_snippets(),
                }),
            );
        }
        entries.insert(
            "apk".to_string(),
            Resolution::StructuredListing(PackageListing {
                format: "apk".to_string(),
                snippets: apk_snippets(),
            }),
        );
        entries.insert(
            "dpkg".to_string(),
            Resolution::DirectBinary(PathBuf::from("/usr/bin/dpkg")),
        );
        entries.insert(
            "rpm".to_string(),
            Resolution::DirectBinary(PathBuf::from("/usr/bin/rpm")),
        );
        entries.insert(
            "pacman".to_string(),
            Resolution::DirectBinary(PathBuf::from("/usr/bin/pacman")),
        );
        Self { entries }
    }
}

impl CommandLibrary for TomlCommandLibrary {
    fn lookup(&self, command_name: &str) -> Resolution {
        self.entries
            .get(command_name)
            .cloned()
            .unwrap_or(Resolution::Unknown)
    }
}

fn deb_snippets() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        (
            "names".to_string(),
            vec!["dpkg-query -W -f '${Package}\\n'".to_string()],
        ),
        (
            "versions".to_string(),
            vec!["dpkg-query -W -f '${Version}\\n'".to_string()],
        ),
    ])
}

fn rpm_snippets() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        (
            "names".to_string(),
            vec!["rpm -qa --qf '%{NAME}\\n'".to_string()],
        ),
        (
            "versions".to_string(),
            vec!["rpm -qa --qf '%{VERSION}-%{RELEASE}\\n'".to_string()],
        ),
    ])
}

fn apk_snippets() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        (
            "names".to_string(),
            vec!["apk info".to_string()],
        ),
        (
            "versions".to_string(),
            vec!["apk info -v".to_string()],
        ),
    ])
}
