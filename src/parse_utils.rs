use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::*;

lazy_static! {
    static ref SAMPLE_NAME: Regex = Regex::new("^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

pub fn trim_ascii_whitespace(b: &[u8]) -> Option<&[u8]> {
    let start = b.iter().position(|&c| !c.is_ascii_whitespace())?;
    let end = b.iter().rposition(|&c| !c.is_ascii_whitespace())?;
    Some(&b[start..=end])
}

/// Clean up and validate a sample name.
///
/// Surrounding whitespace is dropped and `-` becomes `_`. The result must not
/// start with a digit and may only contain ASCII letters, digits and `_`,
/// since it prefixes every read ID and output file name.
pub fn check_sample_name(name: &str) -> Result<String> {
    let trimmed = trim_ascii_whitespace(name.as_bytes())
        .ok_or_else(|| Error::config("sample name cannot be empty"))?;
    let mut name = utf8(trimmed);

    if name.contains('-') {
        let replaced = name.replace('-', "_");
        log::warn!("Sample name \"{name}\" contains '-', using \"{replaced}\" instead");
        name = replaced;
    }

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(Error::config(format!(
            "sample name \"{name}\" cannot start with a digit"
        )));
    }

    if !SAMPLE_NAME.is_match(&name) {
        return Err(Error::config(format!(
            "sample name \"{name}\" can only contain ASCII letters, digits and '_'"
        )));
    }

    Ok(name)
}

/// Fail if an output file is already there, so a run never overwrites
/// earlier results.
pub fn check_output_absent(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();

    if path.exists() {
        return Err(Error::config(format!(
            "output \"{}\" already exists, remove it or pick another output directory",
            path.display()
        )));
    }

    Ok(())
}

/// Make sure the output directory exists and is a directory.
pub fn ensure_output_dir(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();

    if dir.exists() && !dir.is_dir() {
        return Err(Error::config(format!(
            "output directory \"{}\" is not a directory",
            dir.display()
        )));
    }

    std::fs::create_dir_all(dir).map_err(|e| Error::FileIo {
        file: dir.display().to_string(),
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_name() {
        assert_eq!(check_sample_name("liver_1").unwrap(), "liver_1");
        assert_eq!(check_sample_name(" liver-rep-2 \n").unwrap(), "liver_rep_2");
        assert_eq!(check_sample_name("_x").unwrap(), "_x");

        assert!(check_sample_name("").is_err());
        assert!(check_sample_name("   ").is_err());
        assert!(check_sample_name("1liver").is_err());
        assert!(check_sample_name("liver.1").is_err());
        assert!(check_sample_name("liver 1").is_err());
    }

    #[test]
    fn test_output_checks() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("profile.tsv");

        assert!(check_output_absent(&file).is_ok());
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            check_output_absent(&file),
            Err(Error::Config { .. })
        ));

        assert!(ensure_output_dir(dir.path().join("a/b")).is_ok());
        assert!(dir.path().join("a/b").is_dir());
        assert!(ensure_output_dir(&file).is_err());
    }
}
