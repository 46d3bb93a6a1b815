// Copyright 2024-2026 the mcal developers
// Licensed under the MIT License.

/*!
Resolving the photometric band list of a tile.

The metacal parameter vector packs five structural parameters (centroid
pair, shape pair, size) ahead of one flux per band, so the band count falls
out of the vector's length. Only the 3-band and 4-band layouts have defined
band-name lists; anything else is a hard stop, since no output schema can be
built without the names.

*/

use crate::errors::CollateError;
use crate::table::{Column, Table};

/// Number of leading non-flux entries in a metacal parameter vector.
pub const NON_FLUX_PARS: usize = 5;

/// Derive the number of bands from the parameter-vector length. Vectors
/// shorter than the structural prefix resolve to zero bands and fail the
/// subsequent name lookup.
pub fn nbands_from_pars(npars: usize) -> usize {
    npars.saturating_sub(NON_FLUX_PARS)
}

/// Derive the number of bands from a tile's `mcal_pars` column.
pub fn nbands_from_table(input: &Table) -> Result<usize, CollateError> {
    match input.column("mcal_pars")? {
        Column::VecF64(a) => Ok(nbands_from_pars(a.ncols())),
        other => Err(CollateError::BadExtraction {
            column: "mcal_pars".to_owned(),
            detail: format!("expected a float vector column, found {}", other.kind()),
        }),
    }
}

/// The canonical band-name list for a band count.
pub fn band_names(nbands: usize) -> Result<&'static [&'static str], CollateError> {
    match nbands {
        3 => Ok(&["r", "i", "z"]),
        4 => Ok(&["g", "r", "i", "z"]),
        n => Err(CollateError::UnsupportedBandCount(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        for &nbands in &[3usize, 4] {
            let resolved = nbands_from_pars(NON_FLUX_PARS + nbands);
            assert_eq!(resolved, nbands);
            assert_eq!(band_names(resolved).unwrap().len(), nbands);
        }
    }

    #[test]
    fn band_lists() {
        assert_eq!(band_names(3).unwrap(), &["r", "i", "z"]);
        assert_eq!(band_names(4).unwrap(), &["g", "r", "i", "z"]);
    }

    #[test]
    fn unsupported_counts_fail() {
        for &nbands in &[0usize, 1, 2, 5, 17] {
            match band_names(nbands) {
                Err(CollateError::UnsupportedBandCount(n)) => assert_eq!(n, nbands),
                other => panic!("expected UnsupportedBandCount, got {:?}", other),
            }
        }
    }

    #[test]
    fn short_vectors_resolve_to_zero() {
        assert_eq!(nbands_from_pars(2), 0);
    }
}
