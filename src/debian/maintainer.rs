use std::io;
use std::path::{Path, PathBuf};

use crate::misc;

/// Scripts dpkg runs around installation and removal, in the order it runs them.
pub const SCRIPTS: &[&str] = &["preinst", "postinst", "prerm", "postrm"];

/// Copies whichever maintainer scripts exist in `src` into the `DEBIAN` directory, executable.
pub fn install_scripts(src: &Path, control_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut installed = Vec::new();
    for script in SCRIPTS {
        let source = src.join(script);
        if !source.is_file() {
            debug!("no {} script in {}", script, src.display());
            continue
        }

        let destination = control_dir.join(script);
        info!("installing {} script", script);
        misc::copy(&source, &destination)?;
        misc::set_mode(&destination, 0o755)?;
        installed.push(destination);
    }

    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    #[test]
    fn installs_present_scripts() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("resources/linux/DEBIAN");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("postinst"), "#!/bin/sh\n/opt/app/jre-install\n").unwrap();
        fs::write(src.join("control"), "Package: {{name}}\n").unwrap();

        let control_dir = dir.path().join("tmp/app_1.0.0/DEBIAN");
        let installed = install_scripts(&src, &control_dir).unwrap();

        assert_eq!(installed, vec![control_dir.join("postinst")]);
        let mode = fs::metadata(control_dir.join("postinst")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert!(!control_dir.join("control").exists());
        assert!(!control_dir.join("preinst").exists());
    }
}
