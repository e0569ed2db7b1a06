use libflate::gzip::Decoder as GzDecoder;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use xz2::read::XzDecoder;

use super::{control, Control};

#[derive(Debug, Fail)]
pub enum ArchiveError {
    #[fail(display = "failed to open {:?}: {}", path, why)]
    Open { path: PathBuf, why: io::Error },
    #[fail(display = "{:?} is not a Debian package: {}", path, why)]
    Format { path: PathBuf, why: io::Error },
    #[fail(display = "{} member not found in {:?}", member, path)]
    Missing { path: PathBuf, member: &'static str },
    #[fail(display = "{:?} uses an unsupported {} compression", path, member)]
    Unsupported { path: PathBuf, member: String },
    #[fail(display = "error reading control archive within {:?}: {}", path, why)]
    Control { path: PathBuf, why: io::Error },
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum DecoderVariant {
    Xz,
    Gz,
    Plain,
}

impl DecoderVariant {
    fn from_identifier(identifier: &[u8], prefix: &[u8]) -> Option<Option<Self>> {
        if !identifier.starts_with(prefix) {
            return None;
        }

        Some(match &identifier[prefix.len()..] {
            b".xz" => Some(DecoderVariant::Xz),
            b".gz" => Some(DecoderVariant::Gz),
            b"" => Some(DecoderVariant::Plain),
            _ => None,
        })
    }
}

/// Matches an ar member against `prefix`, failing if it is compressed with a codec that
/// cannot be decoded.
fn member(path: &Path, identifier: &[u8], prefix: &[u8]) -> Result<Option<DecoderVariant>, ArchiveError> {
    match DecoderVariant::from_identifier(identifier, prefix) {
        Some(Some(variant)) => Ok(Some(variant)),
        Some(None) => Err(ArchiveError::Unsupported {
            path: path.to_path_buf(),
            member: String::from_utf8_lossy(identifier).into_owned(),
        }),
        None => Ok(None),
    }
}

/// A built `.deb`: an `ar` archive holding `debian-binary`, `control.tar*` and `data.tar*`.
pub struct DebianArchive<'a> {
    path: &'a Path,
    control: (usize, DecoderVariant),
    data: (usize, DecoderVariant),
}

impl<'a> DebianArchive<'a> {
    /// The path given must be a valid Debian ar archive. It will be scanned to verify that the
    /// inner control and data members are present, and records their position.
    pub fn new(path: &'a Path) -> Result<Self, ArchiveError> {
        let file = File::open(path).map_err(|why| ArchiveError::Open { path: path.to_path_buf(), why })?;
        let mut archive = ar::Archive::new(file);

        let mut control = None;
        let mut data = None;
        let mut entry_id = 0;

        while let Some(entry) = archive.next_entry() {
            let entry = entry.map_err(|why| ArchiveError::Format { path: path.to_path_buf(), why })?;
            let identifier = entry.header().identifier();

            if let Some(variant) = member(path, identifier, b"control.tar")? {
                control = Some((entry_id, variant));
            } else if let Some(variant) = member(path, identifier, b"data.tar")? {
                data = Some((entry_id, variant));
            }

            entry_id += 1;
        }

        let control = control.ok_or_else(|| ArchiveError::Missing {
            path: path.to_path_buf(),
            member: "control.tar",
        })?;

        let data = data.ok_or_else(|| ArchiveError::Missing {
            path: path.to_path_buf(),
            member: "data.tar",
        })?;

        Ok(DebianArchive { path, control, data })
    }

    fn open_member<F, T>(&self, id: usize, codec: DecoderVariant, mut func: F) -> io::Result<T>
        where F: FnMut(&mut dyn io::Read) -> io::Result<T>,
    {
        let mut archive = ar::Archive::new(File::open(self.path)?);
        let mut member = archive.jump_to_entry(id)?;
        match codec {
            DecoderVariant::Xz => func(&mut XzDecoder::new(member)),
            DecoderVariant::Gz => func(&mut GzDecoder::new(member)?),
            DecoderVariant::Plain => func(&mut member),
        }
    }

    /// Gets the contents of the control file in the control archive as a map.
    pub fn control(&self) -> Result<Control, ArchiveError> {
        self.inner_control().map_err(|why| ArchiveError::Control { path: self.path.to_path_buf(), why })
    }

    fn inner_control(&self) -> io::Result<Control> {
        let (id, codec) = self.control;
        self.open_member(id, codec, |reader| {
            for entry in tar::Archive::new(reader).entries()? {
                let entry = entry?;
                let path = entry.path()?.into_owned();
                if path.strip_prefix(".").unwrap_or(&path) == Path::new("control") {
                    return control::parse(BufReader::new(entry));
                }
            }

            Err(io::Error::new(io::ErrorKind::NotFound, "control file not found"))
        })
    }

    /// Lists the files and directories installed by the package.
    pub fn data_entries(&self) -> Result<Vec<PathBuf>, ArchiveError> {
        let (id, codec) = self.data;
        self.open_member(id, codec, |reader| {
            let mut paths = Vec::new();
            for entry in tar::Archive::new(reader).entries()? {
                let entry = entry?;
                let path = entry.path()?.into_owned();
                paths.push(path.strip_prefix(".").map(Path::to_path_buf).unwrap_or(path));
            }

            Ok(paths)
        }).map_err(|why| ArchiveError::Format { path: self.path.to_path_buf(), why })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use xz2::write::XzEncoder;

    fn tar_xz(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(XzEncoder::new(Vec::new(), 6));
        for &(name, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(name).unwrap();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, contents).unwrap();
        }

        builder.into_inner().unwrap().finish().unwrap()
    }

    /// Writes an `ar` archive holding `members` in order.
    pub(crate) fn write_ar(path: &Path, members: &[(&str, Vec<u8>)]) {
        let mut builder = ar::Builder::new(fs::File::create(path).unwrap());
        for &(name, ref contents) in members {
            let header = ar::Header::new(name.as_bytes().to_vec(), contents.len() as u64);
            builder.append(&header, contents.as_slice()).unwrap();
        }
    }

    /// Writes a minimal package the way `dpkg-deb -Zxz --build` lays it out.
    pub(crate) fn write_deb(path: &Path, control: &str, data: &[(&str, &[u8])]) {
        write_ar(path, &[
            ("debian-binary", b"2.0\n".to_vec()),
            ("control.tar.xz", tar_xz(&[("./control", control.as_bytes())])),
            ("data.tar.xz", tar_xz(data)),
        ]);
    }

    #[test]
    fn reads_control() {
        let dir = tempdir().unwrap();
        let deb = dir.path().join("app_1.0.0_amd64.deb");
        write_deb(
            &deb,
            "Package: app\nVersion: 1.0.0\nArchitecture: amd64\nDescription: An app\n more text\n",
            &[("./opt/app/app", b"\x7fELF")],
        );

        let archive = DebianArchive::new(&deb).unwrap();
        let control = archive.control().unwrap();
        assert_eq!(control["Package"], "app");
        assert_eq!(control["Version"], "1.0.0");
        assert_eq!(control["Description"], "An app\n more text");
        assert_eq!(archive.data_entries().unwrap(), vec![PathBuf::from("opt/app/app")]);
    }

    #[test]
    fn rejects_other_files() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("not.deb");
        fs::write(&file, b"definitely not an ar archive").unwrap();

        match DebianArchive::new(&file) {
            Err(ArchiveError::Format { .. }) => (),
            Err(why) => panic!("expected a format error, got {}", why),
            Ok(_) => panic!("expected a format error"),
        }
    }

    #[test]
    fn missing_members() {
        let dir = tempdir().unwrap();
        let deb = dir.path().join("empty.deb");
        write_ar(&deb, &[("debian-binary", b"2.0\n".to_vec())]);

        match DebianArchive::new(&deb) {
            Err(ArchiveError::Missing { member: "control.tar", .. }) => (),
            Err(why) => panic!("expected a missing member error, got {}", why),
            Ok(_) => panic!("expected a missing member error"),
        }
    }

    #[test]
    fn unsupported_compression() {
        let dir = tempdir().unwrap();
        let deb = dir.path().join("app_1.0.0_amd64.deb");
        write_ar(&deb, &[
            ("debian-binary", b"2.0\n".to_vec()),
            ("control.tar.zst", b"zstd".to_vec()),
            ("data.tar.zst", b"zstd".to_vec()),
        ]);

        match DebianArchive::new(&deb) {
            Err(ArchiveError::Unsupported { member, .. }) => assert_eq!(member, "control.tar.zst"),
            Err(why) => panic!("expected an unsupported member, got {}", why),
            Ok(_) => panic!("expected an unsupported member"),
        }
    }
}
