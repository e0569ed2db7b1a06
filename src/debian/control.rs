use std::io::{self, BufRead};

use super::Control;

/// Parses the fields of a binary package control file.
///
/// Continuation lines (those starting with a space) are appended to the field above them,
/// which is how multi-line `Description` values are written.
pub fn parse<R: BufRead>(reader: R) -> io::Result<Control> {
    let mut control = Control::new();
    let mut current: Option<String> = None;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            match current.as_ref().and_then(|key| control.get_mut(key)) {
                Some(value) => {
                    value.push('\n');
                    value.push_str(&line);
                }
                None => return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("continuation line without a field: {:?}", line)
                )),
            }

            continue
        }

        match line.find(':') {
            Some(pos) => {
                let (key, value) = line.split_at(pos);
                let key = key.trim().to_owned();
                control.insert(key.clone(), value[1..].trim().to_owned());
                current = Some(key);
            }
            None => return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("control line is not a field: {:?}", line)
            )),
        }
    }

    Ok(control)
}

/// Fields that `dpkg-deb --build` refuses to package without.
pub const REQUIRED_FIELDS: &[&str] = &["Package", "Version", "Architecture", "Maintainer", "Description"];

pub fn missing_fields(control: &Control) -> Vec<&'static str> {
    REQUIRED_FIELDS.iter()
        .filter(|field| control.get(**field).map_or(true, |value| value.is_empty()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTROL: &str = "Package: bbdd-viewer
Version: 0.3.1
Architecture: amd64
Maintainer: Jane Roe <jane@example.com>
Installed-Size: 84211
Depends: libgtk2.0-0, libnss3
Description: Browse the bundled database
 The viewer ships its own Electron runtime
 .
 and a private Java runtime.
";

    #[test]
    fn fields() {
        let control = parse(CONTROL.as_bytes()).unwrap();
        assert_eq!(control["Package"], "bbdd-viewer");
        assert_eq!(control["Installed-Size"], "84211");
        assert_eq!(control["Depends"], "libgtk2.0-0, libnss3");
        assert_eq!(
            control["Description"],
            "Browse the bundled database\n The viewer ships its own Electron runtime\n .\n and a private Java runtime."
        );
        assert!(missing_fields(&control).is_empty());
    }

    #[test]
    fn missing() {
        let control = parse("Package: app\nVersion:\n".as_bytes()).unwrap();
        assert_eq!(missing_fields(&control), vec!["Version", "Architecture", "Maintainer", "Description"]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse(" leading continuation\n".as_bytes()).is_err());
        assert!(parse("Package app\n".as_bytes()).is_err());
    }
}
