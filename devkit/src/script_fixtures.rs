/*!
Scripts de diagnostic jetables

Écrit des scripts shell dans un répertoire temporaire (supprimé au drop)
pour exercer le vrai runner sans dépendre des scripts du device.
*/

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct ScriptFixtures {
    dir: TempDir,
}

impl ScriptFixtures {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Écrit un script `#!/bin/sh` exécutable contenant `body`
    pub fn script(&self, name: &str, body: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        }

        log::debug!("[fixtures] wrote {}", path.display());
        Ok(path)
    }

    /// Script d'identité qui affiche `mac`
    pub fn identity(&self, mac: &str) -> Result<PathBuf> {
        self.script("mac_id.sh", &format!("echo '{}'", mac))
    }

    /// Script vitals qui affiche toujours la même ligne
    pub fn vitals(&self, name: &str, line: &str) -> Result<PathBuf> {
        self.script(name, &format!("echo '{}'", line))
    }

    /// Script vitals dont la première valeur s'incrémente à chaque exécution
    /// (1,61,5.1,120,300 puis 2,61,...) - utile pour vérifier l'ordre
    pub fn counting_vitals(&self, name: &str) -> Result<PathBuf> {
        let state = self.dir.path().join(format!("{}.count", name));
        let body = format!(
            "n=$(cat '{state}' 2>/dev/null || echo 0)\nn=$((n + 1))\necho \"$n\" > '{state}'\necho \"$n,61,5.1,120,300\"",
            state = state.display()
        );
        self.script(name, &body)
    }

    /// Script qui écrit `stderr` et sort avec `code`
    pub fn failing(&self, name: &str, stderr: &str, code: i32) -> Result<PathBuf> {
        self.script(name, &format!("echo '{}' >&2\nexit {}", stderr, code))
    }
}
