use regex::Regex;
use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::ConfigFetch;

#[derive(Debug, Fail)]
pub enum ManifestError {
    #[fail(display = "error reading manifest at {:?}: {}", path, why)]
    Read { path: PathBuf, why: io::Error },
    #[fail(display = "failed to parse JSON in {:?}: {}", path, why)]
    Json { path: PathBuf, why: serde_json::Error },
    #[fail(display = "'{}' is not a valid Debian package name", name)]
    InvalidName { name: String },
    #[fail(display = "'{}' is not a valid Debian package version", version)]
    InvalidVersion { version: String },
}

/// The application metadata from `package.json`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    #[serde(rename = "productName", default)]
    product_name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: Option<Author>,
}

/// npm accepts either a plain string or a person object for `author`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Author {
    Name(String),
    Person {
        name: String,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Author::Name(ref name) => f.write_str(name),
            Author::Person { ref name, email: Some(ref email), .. } => write!(f, "{} <{}>", name, email),
            Author::Person { ref name, .. } => f.write_str(name),
        }
    }
}

impl Manifest {
    pub fn product_name(&self) -> &str {
        self.product_name.as_ref().map_or(self.name.as_str(), |x| x.as_str())
    }

    pub fn author(&self) -> String {
        self.author.as_ref().map_or_else(String::new, |x| x.to_string())
    }

    /// `<name>_<version>`, the prefix shared by the staging directory and the package file.
    pub fn pack_name(&self) -> String {
        [&self.name, "_", &self.version].concat()
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        static NAME: OnceLock<Regex> = OnceLock::new();
        static VERSION: OnceLock<Regex> = OnceLock::new();

        let name = NAME.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9+.-]+$").expect("static regex"));
        if !name.is_match(&self.name) {
            return Err(ManifestError::InvalidName { name: self.name.clone() });
        }

        let version = VERSION.get_or_init(|| Regex::new(r"^[0-9][A-Za-z0-9.+~-]*$").expect("static regex"));
        if !version.is_match(&self.version) {
            return Err(ManifestError::InvalidVersion { version: self.version.clone() });
        }

        Ok(())
    }
}

impl ConfigFetch for Manifest {
    fn fetch<'a>(&'a self, key: &str) -> Option<Cow<'a, str>> {
        match key {
            "name" => Some(Cow::Borrowed(&self.name)),
            "version" => Some(Cow::Borrowed(&self.version)),
            "productName" => Some(Cow::Borrowed(self.product_name())),
            "description" => Some(Cow::Borrowed(&self.description)),
            "author" => Some(Cow::Owned(self.author())),
            _ => None,
        }
    }
}

pub fn read(path: &Path) -> Result<Manifest, ManifestError> {
    let manifest = fs::read(path)
        .map_err(|why| ManifestError::Read { path: path.to_path_buf(), why })
        .and_then(|buffer| {
            serde_json::from_slice::<Manifest>(&buffer)
                .map_err(|why| ManifestError::Json { path: path.to_path_buf(), why })
        })?;

    manifest.validate()?;
    debug!("read manifest for {} {}", manifest.name, manifest.version);
    Ok(manifest)
}
