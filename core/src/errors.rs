// Copyright 2024-2026 the mcal developers
// Licensed under the MIT License.

/*!
Error types for the transcription engine.

Every error here is fatal for the file being processed: each one indicates a
structural mismatch between the code's expectations and the data, which no
retry can fix.

*/

use thiserror::Error;

/// An error raised while building the output schema or transcribing a tile.
#[derive(Error, Debug)]
pub enum CollateError {
    /// The parameter vector implies a band count we have no name list for.
    #[error("cannot determine band names for nbands={0}")]
    UnsupportedBandCount(usize),

    /// A column named by the schema is absent from the table.
    #[error("no column named \"{0}\"")]
    MissingColumn(String),

    /// A column exists but cannot be sliced as the schema describes.
    #[error("column \"{column}\": {detail}")]
    BadExtraction {
        /// The name of the offending column.
        column: String,

        /// What went wrong with it.
        detail: String,
    },
}
