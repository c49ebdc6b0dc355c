//! Run-at-login registration via a batch file in the user's Startup folder.
//!
//! Only Windows has a Startup folder; elsewhere both operations log and return.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{error, info};

pub struct StartupManager {
    /// `None` on platforms without a Startup folder.
    script_path: Option<PathBuf>,
}

impl StartupManager {
    /// `%APPDATA%\Microsoft\Windows\Start Menu\Programs\Startup\<app_name>.bat`.
    pub fn for_current_user(app_name: &str) -> Self {
        let folder = if cfg!(windows) {
            std::env::var_os("APPDATA").map(|appdata| {
                PathBuf::from(appdata)
                    .join("Microsoft")
                    .join("Windows")
                    .join("Start Menu")
                    .join("Programs")
                    .join("Startup")
            })
        } else {
            None
        };
        Self {
            script_path: folder.map(|f| f.join(format!("{app_name}.bat"))),
        }
    }

    #[cfg(test)]
    fn in_folder(folder: &Path, app_name: &str) -> Self {
        Self {
            script_path: Some(folder.join(format!("{app_name}.bat"))),
        }
    }

    /// Write the launcher script; it changes into `base_dir` and starts this binary.
    pub fn install(&self, base_dir: &Path) -> anyhow::Result<()> {
        let Some(ref script) = self.script_path else {
            error!("Startup registration is only supported on Windows.");
            return Ok(());
        };

        let exe = std::env::current_exe().context("cannot locate the running executable")?;
        std::fs::write(script, launcher_script(base_dir, &exe))
            .with_context(|| format!("failed to create startup script {}", script.display()))?;

        info!(path = %script.display(), "Startup script created");
        println!(
            "Success: Registered to Windows Startup.\nPath: {}",
            script.display()
        );
        Ok(())
    }

    pub fn uninstall(&self) -> anyhow::Result<()> {
        let Some(ref script) = self.script_path else {
            error!("Startup registration is only supported on Windows.");
            return Ok(());
        };

        if !script.exists() {
            println!("Info: Startup script does not exist.");
            return Ok(());
        }

        std::fs::remove_file(script)
            .with_context(|| format!("failed to remove startup script {}", script.display()))?;
        info!(path = %script.display(), "Startup script removed");
        println!("Success: Removed from Windows Startup.");
        Ok(())
    }
}

fn launcher_script(base_dir: &Path, exe: &Path) -> String {
    [
        "@echo off".to_string(),
        format!("cd /d \"{}\"", base_dir.display()),
        format!("start \"\" \"{}\"", exe.display()),
    ]
    .join("\r\n")
}
