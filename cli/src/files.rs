// Copyright 2024-2026 the mcal developers
// Licensed under the MIT License.

//! Locating tile catalog files on disk.

use anyhow::{bail, Context, Error};
use std::path::{Path, PathBuf};

use mcal_core::schema::TILE_FILE_PATTERN;

/// List the tile catalog files in a directory, sorted by name.
///
/// Sorting makes the output row order a function of the input file set
/// alone, not of directory enumeration order.
pub fn tile_list<P: AsRef<Path>>(input_dir: P) -> Result<Vec<PathBuf>, Error> {
    let input_dir = input_dir.as_ref();
    let pattern = input_dir.join(TILE_FILE_PATTERN);
    let pattern = match pattern.to_str() {
        Some(s) => s,
        None => bail!("input directory {} is not Unicode-safe", input_dir.display()),
    };

    let mut paths = Vec::new();

    for entry in glob::glob(pattern).context("could not scan the input directory")? {
        paths.push(entry.context("could not scan the input directory")?);
    }

    if paths.is_empty() {
        bail!(
            "no tile files matching \"{}\" found in {}",
            TILE_FILE_PATTERN,
            input_dir.display()
        );
    }

    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn listing_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();

        for name in &[
            "DES0002+0001_blind.fits",
            "DES0001-0042_blind.fits",
            "DES0003+0001.fits",
            "notes.txt",
        ] {
            File::create(dir.path().join(name)).unwrap();
        }

        let paths = tile_list(dir.path()).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();

        assert_eq!(
            names,
            vec!["DES0001-0042_blind.fits", "DES0002+0001_blind.fits"]
        );
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(tile_list(dir.path()).is_err());
    }
}
