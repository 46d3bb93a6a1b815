// Copyright 2024-2026 the mcal developers
// Licensed under the MIT License.

/*!
Collating a directory of tile catalogs into a single output file.

Tiles are processed one at a time in sorted filename order, so the peak
memory footprint is a single tile plus its transcription, and the output
row order is reproducible.

*/

use anyhow::{Context, Error};
use std::path::{Path, PathBuf};

use mcal_core::{mn_note, notify::NotificationBackend, schema::EXTNAME, transcribe::transcribe};
use mcal_fits::TableWriter;

use crate::files::tile_list;

/// Orchestrates one collation run.
#[derive(Debug)]
pub struct Collator {
    input_dir: PathBuf,
    output: PathBuf,
}

impl Collator {
    /// Set up a collation of the tiles in `input_dir` into `output`.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(input_dir: P, output: Q) -> Self {
        Collator {
            input_dir: input_dir.as_ref().to_owned(),
            output: output.as_ref().to_owned(),
        }
    }

    /// Run the collation.
    pub fn go(&self, nbe: &mut dyn NotificationBackend) -> Result<(), Error> {
        let paths = tile_list(&self.input_dir)?;
        let n_tiles = paths.len();

        let mut writer = TableWriter::create(&self.output, EXTNAME)
            .with_context(|| format!("could not create output file {}", self.output.display()))?;

        for (i, path) in paths.iter().enumerate() {
            mn_note!(nbe, "{}/{} {}", i + 1, n_tiles, path.display());

            let input = mcal_fits::read_table(path)
                .with_context(|| format!("could not read tile file {}", path.display()))?;

            let output = transcribe(&input)
                .with_context(|| format!("could not transcribe tile file {}", path.display()))?;

            writer
                .append(&output)
                .with_context(|| format!("could not append rows from {}", path.display()))?;
        }

        let n_rows = writer.n_rows();
        writer
            .finish()
            .with_context(|| format!("could not finalize output file {}", self.output.display()))?;

        mn_note!(
            nbe,
            "collated {} rows from {} tiles into {}",
            n_rows,
            n_tiles,
            self.output.display()
        );

        Ok(())
    }
}
