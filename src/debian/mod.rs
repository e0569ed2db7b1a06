pub mod archive;
pub mod control;
pub mod maintainer;

use std::collections::BTreeMap;

pub const DEB_EXTENSION: &str = ".deb";

pub type Control = BTreeMap<String, String>;

/// `<name>_<version>_<arch>.deb`, as `dpkg-name` would call it.
pub fn gen_filename(name: &str, version: &str, arch: &str) -> String {
    [name, "_", version, "_", arch, DEB_EXTENSION].concat()
}
