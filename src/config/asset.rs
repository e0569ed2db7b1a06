use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize as _, Serialize as _};
use std::borrow::Cow;
use std::path::PathBuf;

use super::ConfigFetch;

/// A file or directory copied from the project into the application directory.
#[derive(Debug, Deserialize, Clone, Serialize, PartialEq)]
pub struct Asset {
    /// Relative to the project directory.
    pub src: PathBuf,
    /// Relative to the application directory (`opt/<name>`).
    pub dst: PathBuf,
    #[serde(default, deserialize_with = "deserialize_mode", serialize_with = "serialize_mode")]
    pub mode: Option<u32>,
}

impl Asset {
    pub fn new<S: Into<PathBuf>, D: Into<PathBuf>>(src: S, dst: D, mode: Option<u32>) -> Self {
        Asset { src: src.into(), dst: dst.into(), mode }
    }
}

/// Mode bits applied to a path inside the application directory once every asset is staged.
#[derive(Debug, Deserialize, Clone, Serialize, PartialEq)]
pub struct Permission {
    pub path: PathBuf,
    #[serde(deserialize_with = "deserialize_required_mode", serialize_with = "serialize_required_mode")]
    pub mode: u32,
}

/// The bundled runtime which becomes the application directory.
#[derive(Debug, Deserialize, Clone, Serialize, PartialEq)]
#[serde(default)]
pub struct Runtime {
    pub src: PathBuf,
    /// Executable inside the runtime that is renamed after the package.
    pub executable: String,
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime {
            src: PathBuf::from("node_modules/electron-prebuilt/dist"),
            executable: "electron".into(),
        }
    }
}

impl ConfigFetch for Runtime {
    fn fetch<'a>(&'a self, key: &str) -> Option<Cow<'a, str>> {
        match key {
            "src" => Some(self.src.to_string_lossy()),
            "executable" => Some(Cow::Borrowed(&self.executable)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Serialize, PartialEq)]
#[serde(default)]
pub struct Templates {
    pub desktop: PathBuf,
    pub control: PathBuf,
}

impl Default for Templates {
    fn default() -> Self {
        Templates {
            desktop: PathBuf::from("resources/linux/app.desktop"),
            control: PathBuf::from("resources/linux/DEBIAN/control"),
        }
    }
}

impl ConfigFetch for Templates {
    fn fetch<'a>(&'a self, key: &str) -> Option<Cow<'a, str>> {
        match key {
            "desktop" => Some(self.desktop.to_string_lossy()),
            "control" => Some(self.control.to_string_lossy()),
            _ => None,
        }
    }
}

/// Modes may be written as octal strings (`"0755"`) or as TOML integers (`0o755`).
#[derive(Deserialize)]
#[serde(untagged)]
enum ModeRepr {
    Int(u32),
    Str(String),
}

pub fn parse_mode(input: &str) -> Option<u32> {
    let digits = input.trim();
    let digits = digits.strip_prefix("0o").unwrap_or(digits);
    if digits.is_empty() {
        return None;
    }

    u32::from_str_radix(digits, 8).ok().filter(|&mode| mode <= 0o7777)
}

fn mode_from_repr<E: de::Error>(repr: ModeRepr) -> Result<u32, E> {
    match repr {
        ModeRepr::Int(mode) if mode <= 0o7777 => Ok(mode),
        ModeRepr::Int(mode) => Err(E::custom(format!("mode {:o} is out of range", mode))),
        ModeRepr::Str(string) => parse_mode(&string)
            .ok_or_else(|| E::custom(format!("'{}' is not an octal file mode", string))),
    }
}

fn deserialize_mode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    match Option::<ModeRepr>::deserialize(deserializer)? {
        Some(repr) => mode_from_repr(repr).map(Some),
        None => Ok(None),
    }
}

fn deserialize_required_mode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    ModeRepr::deserialize(deserializer).and_then(mode_from_repr)
}

fn serialize_mode<S: Serializer>(mode: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
    match *mode {
        Some(mode) => serialize_required_mode(&mode, serializer),
        None => serializer.serialize_none(),
    }
}

fn serialize_required_mode<S: Serializer>(mode: &u32, serializer: S) -> Result<S::Ok, S::Error> {
    format!("{:04o}", mode).serialize(serializer)
}
