use std::path::{Path, PathBuf};

use crate::error::{Result, TransportError};

/// A validated channel name and the OS location it resolves to.
///
/// Both sides of a channel must agree on the name out of band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeName {
    name: String,
    path: PathBuf,
}

impl PipeName {
    /// Windows named pipe namespace prefix.
    pub const WINDOWS_PREFIX: &'static str = r"\\.\pipe\";

    /// Unix `sockaddr_un.sun_path` limit; FIFOs are held to it too so a
    /// name works for every direction.
    #[cfg(target_os = "linux")]
    pub const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    pub const MAX_PATH_LEN: usize = 104;

    /// Validate and resolve a channel name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(TransportError::InvalidName {
                name,
                reason: "name is empty",
            });
        }
        if name.contains('\0') {
            return Err(TransportError::InvalidName {
                name,
                reason: "name contains a NUL byte",
            });
        }

        let path = resolve(&name);
        let len = path.as_os_str().len();
        if cfg!(unix) && len >= Self::MAX_PATH_LEN {
            return Err(TransportError::NameTooLong {
                path,
                len,
                max: Self::MAX_PATH_LEN,
            });
        }

        Ok(Self { name, path })
    }

    /// The name as given.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The resolved OS location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Display for PipeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

impl std::str::FromStr for PipeName {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(unix)]
fn resolve(name: &str) -> PathBuf {
    if name.contains('/') {
        PathBuf::from(name)
    } else {
        std::env::temp_dir().join(format!("{name}.pipe"))
    }
}

#[cfg(windows)]
fn resolve(name: &str) -> PathBuf {
    if name.starts_with(PipeName::WINDOWS_PREFIX) {
        PathBuf::from(name)
    } else {
        PathBuf::from(format!("{}{name}", PipeName::WINDOWS_PREFIX))
    }
}
