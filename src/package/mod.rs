mod layout;

pub use self::layout::Layout;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{Config, ParsingError};
use crate::debian::archive::{ArchiveError, DebianArchive};
use crate::debian::{control, maintainer};
use crate::manifest::{self, Manifest, ManifestError};
use crate::misc;
use crate::packager::{PackError, Packager};
use crate::template::{self, Variables};

#[derive(Debug, Fail)]
pub enum BuildError {
    #[fail(display = "invalid packaging config: {}", why)]
    Config { why: ParsingError },
    #[fail(display = "{}", why)]
    Manifest { why: ManifestError },
    #[fail(display = "failed to create directory at {:?}: {}", path, why)]
    Directory { path: PathBuf, why: io::Error },
    #[fail(display = "failed to copy {:?} to {:?}: {}", src, dst, why)]
    Copy { src: PathBuf, dst: PathBuf, why: io::Error },
    #[fail(display = "failed to set mode {:04o} on {:?}: {}", mode, path, why)]
    Permissions { path: PathBuf, mode: u32, why: io::Error },
    #[fail(display = "failed to read template at {:?}: {}", path, why)]
    Template { path: PathBuf, why: io::Error },
    #[fail(display = "failed to write {:?}: {}", path, why)]
    Write { path: PathBuf, why: io::Error },
    #[fail(display = "failed to rename {:?} to {:?}: {}", src, dst, why)]
    Rename { src: PathBuf, dst: PathBuf, why: io::Error },
    #[fail(display = "failed to measure the size of {:?}: {}", path, why)]
    Size { path: PathBuf, why: io::Error },
    #[fail(display = "failed to install maintainer scripts from {:?}: {}", path, why)]
    Scripts { path: PathBuf, why: io::Error },
    #[fail(display = "packaging failed: {}", why)]
    Packaging { why: PackError },
    #[fail(display = "failed to verify package: {}", why)]
    Verify { why: ArchiveError },
    #[fail(display = "{:?} has {} {}, but the manifest says {}", deb, field, found, expected)]
    Mismatch { deb: PathBuf, field: &'static str, expected: String, found: String },
    #[fail(display = "failed to remove temporary directory {:?}: {}", path, why)]
    Cleanup { path: PathBuf, why: io::Error },
}

/// The packaging pipeline. Each stage consumes the package and hands it to the next, in
/// the order the staging directory has to be assembled.
pub struct Package<'a, P> {
    config: &'a Config,
    manifest: Manifest,
    layout: Layout,
    variables: Variables,
    packager: P,
}

impl<'a, P: Packager> Package<'a, P> {
    /// Reads the manifest and prepares an empty temporary directory and the releases directory.
    pub fn init(project: &Path, config: &'a Config, packager: P) -> Result<Self, BuildError> {
        config.validate().map_err(|why| BuildError::Config { why })?;

        let manifest = manifest::read(&project.join(&config.manifest))
            .map_err(|why| BuildError::Manifest { why })?;

        let layout = Layout::new(project, config, &manifest);
        info!("packaging {} {} for {}", manifest.name, manifest.version, config.arch);

        misc::empty_dir(&layout.tmp_dir)
            .map_err(|why| BuildError::Directory { path: layout.tmp_dir.clone(), why })?;

        for dir in &[&layout.releases_dir, &layout.pack_dir] {
            fs::create_dir_all(dir)
                .map_err(|why| BuildError::Directory { path: dir.to_path_buf(), why })?;
        }

        let mut variables = Variables::from_manifest(&manifest);
        variables.set("arch", config.arch.as_str());

        Ok(Package { config, manifest, layout, variables, packager })
    }

    pub fn layout(&self) -> &Layout { &self.layout }

    /// Runs every remaining stage and returns the path of the built package.
    ///
    /// The temporary directory is removed once packaging has been attempted, whether or not
    /// the packaging tool succeeded. A failure in an earlier stage leaves it in place.
    pub fn run(self) -> Result<PathBuf, BuildError> {
        let package = self.copy_runtime()?
            .stage_assets()?
            .finalize()?
            .rename_app()?;

        let packed = package.pack().and_then(|_| package.verify());
        match (packed, package.clean()) {
            (Ok(()), Ok(())) => Ok(package.layout.deb),
            (Err(why), Ok(())) | (Ok(()), Err(why)) => Err(why),
            (Err(why), Err(cleanup)) => {
                error!("{}", cleanup);
                Err(why)
            }
        }
    }

    pub fn copy_runtime(self) -> Result<Self, BuildError> {
        let src = self.layout.source(&self.config.runtime.src);
        let dst = &self.layout.app_dir;
        info!("copying runtime from {}", src.display());
        misc::copy(&src, dst)
            .map_err(|why| BuildError::Copy { src, dst: dst.clone(), why })?;

        Ok(self)
    }

    /// Copies the build output and bundled files into the application directory, then
    /// applies the configured permissions.
    pub fn stage_assets(self) -> Result<Self, BuildError> {
        for asset in &self.config.assets {
            let src = self.layout.source(&asset.src);
            let dst = self.layout.app_dir.join(&asset.dst);
            info!("copying {} to {}", asset.src.display(), dst.display());
            let bytes = misc::copy(&src, &dst)
                .map_err(|why| BuildError::Copy { src, dst: dst.clone(), why })?;
            debug!("copied {} bytes", bytes);

            if let Some(mode) = asset.mode {
                set_mode(&dst, mode)?;
            }
        }

        for permission in &self.config.permissions {
            set_mode(&self.layout.app_dir.join(&permission.path), permission.mode)?;
        }

        Ok(self)
    }

    /// Renders the desktop entry into `usr/share/applications`.
    pub fn finalize(self) -> Result<Self, BuildError> {
        let desktop = self.render(&self.config.templates.desktop, &self.variables)?;
        info!("writing desktop entry to {}", self.layout.desktop_file.display());
        misc::write(&self.layout.desktop_file, desktop.as_bytes())
            .map_err(|why| BuildError::Write { path: self.layout.desktop_file.clone(), why })?;

        Ok(self)
    }

    /// Renames the runtime's executable after the application.
    pub fn rename_app(self) -> Result<Self, BuildError> {
        if self.config.runtime.executable == self.manifest.name {
            return Ok(self);
        }

        let src = self.layout.app_dir.join(&self.config.runtime.executable);
        let dst = self.layout.app_dir.join(&self.manifest.name);
        info!("renaming {} to {}", src.display(), dst.display());
        fs::rename(&src, &dst).map_err(|why| BuildError::Rename { src, dst, why })?;

        Ok(self)
    }

    /// Writes the control file and maintainer scripts, then runs the packaging tool.
    pub fn pack(&self) -> Result<(), BuildError> {
        let app_dir = &self.layout.app_dir;
        let size = misc::dir_size(app_dir)
            .map(misc::kibibytes)
            .map_err(|why| BuildError::Size { path: app_dir.clone(), why })?;
        debug!("installed size of {} is {} KiB", app_dir.display(), size);

        let mut variables = self.variables.clone();
        variables.set("size", size.to_string());

        let control_dir = &self.layout.control_dir;
        let control_file = control_dir.join("control");
        let rendered = self.render(&self.config.templates.control, &variables)?;
        match control::parse(rendered.as_bytes()) {
            Ok(ref fields) => for field in control::missing_fields(fields) {
                warn!("control file is missing the {} field", field);
            },
            Err(why) => warn!("rendered control file is malformed: {}", why),
        }

        misc::write(&control_file, rendered.as_bytes())
            .map_err(|why| BuildError::Write { path: control_file.clone(), why })?;
        set_mode(control_dir, 0o755)?;

        let scripts = self.layout.source(&self.config.maintainer_scripts);
        maintainer::install_scripts(&scripts, control_dir)
            .map_err(|why| BuildError::Scripts { path: scripts, why })?;

        info!("creating DEB package...");
        match self.packager.build(&self.layout.pack_dir, &self.layout.deb) {
            Ok(output) => {
                log_lines(log::Level::Debug, &output.stdout);
                log_lines(log::Level::Warn, &output.stderr);
                info!("DEB package ready! {}", self.layout.deb.display());
                Ok(())
            }
            Err(why) => {
                error!("ERROR while building DEB package");
                if let PackError::Build { ref stdout, .. } = why {
                    log_lines(log::Level::Error, stdout);
                }

                Err(BuildError::Packaging { why })
            }
        }
    }

    /// Reads the package back and checks it carries the manifest's name and version.
    pub fn verify(&self) -> Result<(), BuildError> {
        if !self.config.verify {
            return Ok(());
        }

        let deb = &self.layout.deb;
        let archive = match DebianArchive::new(deb) {
            Ok(archive) => archive,
            Err(ArchiveError::Unsupported { member, .. }) => {
                warn!("skipping verification: unable to decode {}", member);
                return Ok(());
            }
            Err(why) => return Err(BuildError::Verify { why }),
        };

        let control = archive.control().map_err(|why| BuildError::Verify { why })?;
        let expected = [("Package", &self.manifest.name), ("Version", &self.manifest.version)];
        for &(field, value) in &expected {
            let found = control.get(field).map_or("", |x| x.as_str());
            if found != value.as_str() {
                return Err(BuildError::Mismatch {
                    deb: deb.clone(),
                    field,
                    expected: value.clone(),
                    found: found.to_owned(),
                });
            }
        }

        let executable = Path::new("opt").join(&self.manifest.name).join(&self.manifest.name);
        match archive.data_entries() {
            Ok(ref entries) if entries.contains(&executable) => (),
            Ok(_) => warn!("{} does not install {}", deb.display(), executable.display()),
            Err(why) => warn!("unable to list the contents of {}: {}", deb.display(), why),
        }

        info!("verified {}", deb.display());
        Ok(())
    }

    pub fn clean(&self) -> Result<(), BuildError> {
        let tmp_dir = &self.layout.tmp_dir;
        if self.config.keep_tmp {
            info!("keeping temporary directory {}", tmp_dir.display());
            return Ok(());
        }

        debug!("removing {}", tmp_dir.display());
        fs::remove_dir_all(tmp_dir)
            .map_err(|why| BuildError::Cleanup { path: tmp_dir.clone(), why })
    }

    fn render(&self, template: &Path, variables: &Variables) -> Result<String, BuildError> {
        let path = self.layout.source(template);
        debug!("rendering {}", path.display());
        let text = fs::read_to_string(&path)
            .map_err(|why| BuildError::Template { path, why })?;

        Ok(template::render(&text, variables).into_owned())
    }
}

fn set_mode(path: &Path, mode: u32) -> Result<(), BuildError> {
    misc::set_mode(path, mode)
        .map_err(|why| BuildError::Permissions { path: path.to_path_buf(), mode, why })
}

fn log_lines(level: log::Level, output: &str) {
    for line in output.lines().filter(|line| !line.trim().is_empty()) {
        log!(level, "{}", line);
    }
}
