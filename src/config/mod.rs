use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use toml::{self, de};

mod asset;

pub use self::asset::*;

/// Searched for in the project directory when no config is given explicitly.
pub const PACKAGING: &str = "packaging.toml";

#[derive(Debug, Fail)]
pub enum ParsingError {
    #[fail(display = "error reading '{}': {}", file, why)]
    File { file: String, why: io::Error },
    #[fail(display = "failed to parse TOML syntax in {}: {}", file, why)]
    Toml { file: String, why: de::Error },
    #[fail(display = "failed to serialize into TOML: {}", why)]
    TomlSerialize { why: toml::ser::Error },
    #[fail(display = "asset destination {:?} must be relative to the application directory", dst)]
    AbsoluteDestination { dst: PathBuf },
    #[fail(display = "asset destination {:?} must not leave the application directory", dst)]
    EscapingDestination { dst: PathBuf },
    #[fail(display = "temporary directory {:?} must be a relative path below the project directory", dir)]
    InvalidTmpDir { dir: PathBuf },
    #[fail(display = "releases directory {:?} is removed along with the temporary directory {:?}", releases, tmp)]
    ReleasesInTmp { releases: PathBuf, tmp: PathBuf },
    #[fail(display = "{:?} is removed along with the temporary directory {:?}", src, tmp)]
    SourceInTmp { src: PathBuf, tmp: PathBuf },
    #[fail(display = "architecture must not be empty")]
    NoArchitecture,
}

/// Compression handed to `dpkg-deb -Z`.
#[derive(Debug, Deserialize, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Xz,
    Gzip,
    Zstd,
    None,
}

impl Compression {
    pub fn as_str(self) -> &'static str {
        match self {
            Compression::Xz => "xz",
            Compression::Gzip => "gzip",
            Compression::Zstd => "zstd",
            Compression::None => "none",
        }
    }
}

impl Default for Compression {
    fn default() -> Self { Compression::Xz }
}

/// An in-memory representation of the project's packaging TOML.
///
/// Every field has a default, so a project without a `packaging.toml` is packaged with the
/// conventional Electron layout.
#[derive(Debug, Deserialize, Clone, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub manifest: PathBuf,
    pub tmp_dir: PathBuf,
    pub releases_dir: PathBuf,
    pub arch: String,
    pub compression: Compression,
    /// Run the packaging tool under `fakeroot`, so files are owned by root in the archive.
    pub fakeroot: bool,
    /// Read the built package back and compare its control fields with the manifest.
    pub verify: bool,
    pub keep_tmp: bool,
    /// Directory searched for `preinst`, `postinst`, `prerm` and `postrm`.
    pub maintainer_scripts: PathBuf,
    pub runtime: Runtime,
    pub templates: Templates,
    #[serde(rename = "asset")]
    pub assets: Vec<Asset>,
    #[serde(rename = "permission")]
    pub permissions: Vec<Permission>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            manifest: PathBuf::from("app/package.json"),
            tmp_dir: PathBuf::from("tmp"),
            releases_dir: PathBuf::from("releases"),
            arch: "amd64".into(),
            compression: Compression::default(),
            fakeroot: true,
            verify: true,
            keep_tmp: false,
            maintainer_scripts: PathBuf::from("resources/linux/DEBIAN"),
            runtime: Runtime::default(),
            templates: Templates::default(),
            assets: vec![
                Asset::new("build", "resources/app", None),
                Asset::new("app/bbdd", "app/bbdd", Some(0o777)),
                Asset::new("resources/icon.png", "icon.png", None),
                Asset::new("resources/linux/DEBIAN/jvm8.tar.gz", "jvm8.tar.gz", None),
                Asset::new("resources/linux/DEBIAN/jre-install", "jre-install", Some(0o755)),
            ],
            permissions: vec![Permission {
                path: PathBuf::from("app/bbdd/bbdd.mv.db"),
                mode: 0o666,
            }],
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ParsingError> {
        if self.arch.trim().is_empty() {
            return Err(ParsingError::NoArchitecture);
        }

        // The temporary directory is removed recursively before and after packaging.
        let tmp = &self.tmp_dir;
        let plain = tmp.components().all(|c| match c {
            Component::Normal(_) | Component::CurDir => true,
            _ => false,
        });

        let tmp = normalize(tmp);
        if !plain || tmp.as_os_str().is_empty() {
            return Err(ParsingError::InvalidTmpDir { dir: self.tmp_dir.clone() });
        }

        if self.releases_dir.is_relative() && normalize(&self.releases_dir).starts_with(&tmp) {
            return Err(ParsingError::ReleasesInTmp {
                releases: self.releases_dir.clone(),
                tmp: self.tmp_dir.clone(),
            });
        }

        let sources = [
            &self.manifest,
            &self.maintainer_scripts,
            &self.runtime.src,
            &self.templates.desktop,
            &self.templates.control,
        ];

        let in_tmp = sources.iter().cloned()
            .chain(self.assets.iter().map(|asset| &asset.src))
            .find(|src| src.is_relative() && normalize(src).starts_with(&tmp));

        if let Some(src) = in_tmp {
            return Err(ParsingError::SourceInTmp { src: src.clone(), tmp: self.tmp_dir.clone() });
        }

        for dst in self.assets.iter().map(|asset| &asset.dst)
            .chain(self.permissions.iter().map(|permission| &permission.path))
        {
            if dst.is_absolute() {
                return Err(ParsingError::AbsoluteDestination { dst: dst.clone() });
            }

            if dst.components().any(|c| c == Component::ParentDir) {
                return Err(ParsingError::EscapingDestination { dst: dst.clone() });
            }
        }

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ParsingError> {
        toml::to_string_pretty(self).map_err(|why| ParsingError::TomlSerialize { why })
    }
}

/// Lexically resolves `.` and `..`, so `./tmp/`, `out/../tmp` and `tmp` compare equal.
fn normalize(path: &Path) -> PathBuf {
    let mut normal = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => (),
            Component::ParentDir if normal.file_name().is_some() => {
                normal.pop();
            }
            other => normal.push(other),
        }
    }

    normal
}

/// Methods for fetching values from the in-memory representation of the TOML config.
pub trait ConfigFetch {
    /// Fetches a given key, formatted for display.
    fn fetch<'a>(&'a self, key: &str) -> Option<Cow<'a, str>>;
}

impl ConfigFetch for Config {
    fn fetch<'a>(&'a self, key: &str) -> Option<Cow<'a, str>> {
        match key {
            "manifest" => Some(self.manifest.to_string_lossy()),
            "tmp_dir" => Some(self.tmp_dir.to_string_lossy()),
            "releases_dir" => Some(self.releases_dir.to_string_lossy()),
            "arch" => Some(Cow::Borrowed(&self.arch)),
            "compression" => Some(Cow::Borrowed(self.compression.as_str())),
            "fakeroot" => Some(Cow::Owned(self.fakeroot.to_string())),
            "verify" => Some(Cow::Owned(self.verify.to_string())),
            "keep_tmp" => Some(Cow::Owned(self.keep_tmp.to_string())),
            "maintainer_scripts" => Some(self.maintainer_scripts.to_string_lossy()),
            "asset" => Some(Cow::Owned(format!("{:#?}", self.assets))),
            "permission" => Some(Cow::Owned(format!("{:#?}", self.permissions))),
            _ => {
                if key.starts_with("runtime.") {
                    self.runtime.fetch(&key[8..])
                } else if key.starts_with("templates.") {
                    self.templates.fetch(&key[10..])
                } else {
                    None
                }
            }
        }
    }
}

/// Loads the config at `path` if given, otherwise `packaging.toml` in the project directory,
/// falling back to the defaults when that does not exist.
pub fn parse(project: &Path, path: Option<&Path>) -> Result<Config, ParsingError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let path = project.join(PACKAGING);
            if !path.exists() {
                info!("no {} found in {}, using defaults", PACKAGING, project.display());
                return Ok(Config::default());
            }

            path
        }
    };

    let file = path.display().to_string();
    info!("reading packaging config from {}", file);
    let config = fs::read(&path)
        .map_err(|why| ParsingError::File { file: file.clone(), why })
        .and_then(|buffer| {
            toml::from_slice::<Config>(&buffer).map_err(|why| ParsingError::Toml { file, why })
        })?;

    config.validate()?;
    Ok(config)
}
