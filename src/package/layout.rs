use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::debian::gen_filename;
use crate::manifest::Manifest;

/// Where every stage of the pipeline reads from and writes to.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub project: PathBuf,
    pub tmp_dir: PathBuf,
    /// Staging directory mirroring the installed filesystem: `tmp/<name>_<version>`.
    pub pack_dir: PathBuf,
    /// `opt/<name>` within the staging directory.
    pub app_dir: PathBuf,
    pub control_dir: PathBuf,
    pub desktop_file: PathBuf,
    pub releases_dir: PathBuf,
    pub deb: PathBuf,
}

impl Layout {
    pub fn new(project: &Path, config: &Config, manifest: &Manifest) -> Self {
        let tmp_dir = project.join(&config.tmp_dir);
        let pack_dir = tmp_dir.join(manifest.pack_name());
        let releases_dir = project.join(&config.releases_dir);

        Layout {
            project: project.to_path_buf(),
            app_dir: pack_dir.join("opt").join(&manifest.name),
            control_dir: pack_dir.join("DEBIAN"),
            desktop_file: pack_dir.join(["usr/share/applications/", &manifest.name, ".desktop"].concat()),
            deb: releases_dir.join(gen_filename(&manifest.name, &manifest.version, &config.arch)),
            tmp_dir,
            pack_dir,
            releases_dir,
        }
    }

    /// Resolves a path from the config against the project directory.
    pub fn source(&self, path: &Path) -> PathBuf {
        self.project.join(path)
    }
}
