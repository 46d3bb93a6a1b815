// Copyright 2024-2026 the mcal developers
// Licensed under the MIT License.

/*!
The guts of the mcal command-line tools: collating a directory of tile
catalogs into one output file, and cross-checking such an output against
the tiles it was built from.

*/

pub mod check;
pub mod collate;
pub mod files;
