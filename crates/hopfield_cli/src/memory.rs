//! Memory files: the patterns to store and the probes to recall from.
//!
//! ```toml
//! patterns = [
//!     [1, -1, 1, -1],
//!     [1, 1, -1, -1],
//! ]
//! probes = [[1, -1, -1, -1]]
//! ```

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub patterns: Vec<Vec<f32>>,
    #[serde(default)]
    pub probes: Vec<Vec<f32>>,
}

impl Memory {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading memory file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing memory file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Network size implied by the stored patterns.
    ///
    /// Bipolarity is left to the network; only the shape is checked here.
    pub fn units(&self) -> anyhow::Result<usize> {
        let Some(first) = self.patterns.first() else {
            bail!("memory file stores no patterns");
        };
        let n = first.len();
        if n == 0 {
            bail!("stored patterns are empty");
        }
        if let Some(k) = self.patterns.iter().position(|p| p.len() != n) {
            bail!(
                "pattern {} has {} values, pattern 0 has {}",
                k,
                self.patterns[k].len(),
                n
            );
        }
        Ok(n)
    }

    /// Index of the stored pattern `state` matches exactly, if any.
    pub fn matching(&self, state: &[f32]) -> Option<usize> {
        self.patterns.iter().position(|p| p.as_slice() == state)
    }
}
