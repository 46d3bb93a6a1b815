// Copyright 2024-2026 the mcal developers
// Licensed under the MIT License.

/*!
Spot-checking a collated catalog against the tiles it was built from.

The checker is deliberately independent of the transcription code: it pulls
values straight out of randomly chosen tile files with its own hand-written
name decoration and compares them, bit for bit, against the matching rows
of the collated output. The response matrix is recomputed from the raw
shear measurements. Only the band resolver and the shear step size are
shared with the collation path.

*/

use anyhow::{bail, Context, Error};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use mcal_core::{
    bands::{band_names, nbands_from_table, NON_FLUX_PARS},
    mn_note, mn_warning,
    notify::NotificationBackend,
    schema::{Elem, ShearVariant, DEFAULT, DGAMMA},
    table::{Table, Values},
};

use crate::files::tile_list;

/// Decorates raw column names with a shear-variant suffix.
///
/// Intentionally not the collation code's namer.
struct VariantNamer {
    suffix: Option<&'static str>,
}

impl VariantNamer {
    fn new(variant: ShearVariant) -> Self {
        let suffix = if variant.is_canonical() {
            None
        } else {
            Some(variant.label())
        };

        VariantNamer { suffix }
    }

    fn apply(&self, name: &str) -> String {
        match self.suffix {
            None => name.to_owned(),
            Some(s) => format!("{}_{}", name, s),
        }
    }
}

/// Orchestrates one cross-check run.
#[derive(Debug)]
pub struct Tester {
    input_dir: PathBuf,
    reference: PathBuf,
    n_test: usize,
    seed: Option<u64>,
}

impl Tester {
    /// Set up a check of `reference` against `n_test` randomly chosen tiles
    /// from `input_dir`. A fixed `seed` makes the choice reproducible.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        input_dir: P,
        reference: Q,
        n_test: usize,
        seed: Option<u64>,
    ) -> Self {
        Tester {
            input_dir: input_dir.as_ref().to_owned(),
            reference: reference.as_ref().to_owned(),
            n_test,
            seed,
        }
    }

    /// Run the check, failing on the first mismatched value.
    pub fn go(&self, nbe: &mut dyn NotificationBackend) -> Result<(), Error> {
        let mut paths = tile_list(&self.input_dir)?;

        let mut rng = match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        paths.shuffle(&mut rng);
        paths.truncate(self.n_test);

        let ref_ids = mcal_fits::read_table_columns(&self.reference, &["coadd_objects_id"])
            .with_context(|| {
                format!("could not read reference file {}", self.reference.display())
            })?;

        let by_id: HashMap<i64, u64> = ref_ids
            .i64s("coadd_objects_id")?
            .iter()
            .enumerate()
            .map(|(row, &id)| (id, row as u64))
            .collect();

        for path in &paths {
            mn_note!(nbe, "checking against {}", path.display());

            let tile = mcal_fits::read_table(path)
                .with_context(|| format!("could not read tile file {}", path.display()))?;

            let mut tile_rows = Vec::new();
            let mut ref_rows = Vec::new();

            for (row, id) in tile.i64s("id")?.iter().enumerate() {
                if let Some(&r) = by_id.get(id) {
                    tile_rows.push(row);
                    ref_rows.push(r);
                }
            }

            if tile_rows.is_empty() {
                mn_warning!(
                    nbe,
                    "no rows of {} appear in the reference; skipping it",
                    path.display()
                );
                continue;
            }

            let reference = mcal_fits::read_table_rows(&self.reference, &ref_rows)
                .with_context(|| {
                    format!("could not read reference file {}", self.reference.display())
                })?;

            check_tile(&tile, &tile_rows, &reference)
                .with_context(|| format!("cross-check against {} failed", path.display()))?;
        }

        mn_note!(nbe, "all checks passed");
        Ok(())
    }
}

fn ints(table: &Table, name: &str) -> Result<Vec<i64>, Error> {
    match table.extract(name, Elem::Whole)? {
        Values::Int(v) => Ok(v),
        Values::Float(_) => bail!("column \"{}\" is unexpectedly float-valued", name),
    }
}

fn floats(table: &Table, name: &str, elem: Elem) -> Result<Vec<f64>, Error> {
    match table.extract(name, elem)? {
        Values::Float(v) => Ok(v),
        Values::Int(v) => Ok(v.iter().map(|&x| x as f64).collect()),
    }
}

fn expect_ints(
    label: &str,
    tile_vals: &[i64],
    tile_rows: &[usize],
    ref_vals: &[i64],
) -> Result<(), Error> {
    for (k, &row) in tile_rows.iter().enumerate() {
        if tile_vals[row] != ref_vals[k] {
            bail!(
                "column \"{}\", tile row {}: tile gives {} but the collation has {}",
                label,
                row,
                tile_vals[row],
                ref_vals[k]
            );
        }
    }

    Ok(())
}

fn expect_floats(
    label: &str,
    tile_vals: &[f64],
    tile_rows: &[usize],
    ref_vals: &[f64],
) -> Result<(), Error> {
    for (k, &row) in tile_rows.iter().enumerate() {
        if tile_vals[row] != ref_vals[k] {
            bail!(
                "column \"{}\", tile row {}: tile gives {} but the collation has {}",
                label,
                row,
                tile_vals[row],
                ref_vals[k]
            );
        }
    }

    Ok(())
}

fn check_tile(tile: &Table, tile_rows: &[usize], reference: &Table) -> Result<(), Error> {
    let nbands = nbands_from_table(tile)?;
    let bands = band_names(nbands)?;

    expect_ints(
        "flags",
        &ints(tile, "flags")?,
        tile_rows,
        &ints(reference, "flags")?,
    )?;

    expect_floats(
        "mask_frac",
        &floats(tile, "mask_frac", Elem::Whole)?,
        tile_rows,
        &floats(reference, "mask_frac", Elem::Whole)?,
    )?;

    for &variant in ShearVariant::ALL.iter() {
        let namer = VariantNamer::new(variant);

        let pairs: [(&str, Elem, &str); 5] = [
            ("mcal_g", Elem::Index(0), "e1"),
            ("mcal_g", Elem::Index(1), "e2"),
            ("mcal_T_r", Elem::Whole, "size"),
            ("mcal_s2n_r", Elem::Whole, "snr"),
            ("mcal_g_cov", Elem::Matrix(0, 0), "covmat_0_0"),
        ];

        for &(raw, elem, out) in pairs.iter() {
            let out = namer.apply(out);
            expect_floats(
                &out,
                &floats(tile, &namer.apply(raw), elem)?,
                tile_rows,
                &floats(reference, &out, Elem::Whole)?,
            )?;
        }

        for &(elem, out) in [
            (Elem::Matrix(0, 1), "covmat_0_1"),
            (Elem::Matrix(1, 1), "covmat_1_1"),
        ]
        .iter()
        {
            let out = namer.apply(out);
            expect_floats(
                &out,
                &floats(tile, &namer.apply("mcal_g_cov"), elem)?,
                tile_rows,
                &floats(reference, &out, Elem::Whole)?,
            )?;
        }

        for (i, band) in bands.iter().enumerate() {
            let out = namer.apply(&format!("flux_{}", band));
            expect_floats(
                &out,
                &floats(tile, &namer.apply("mcal_pars"), Elem::Index(NON_FLUX_PARS + i))?,
                tile_rows,
                &floats(reference, &out, Elem::Whole)?,
            )?;
        }
    }

    check_responses(tile, tile_rows, reference)
}

/// Recompute the shear response matrix from the raw sheared measurements
/// and verify the collated values against it. Rows with nonzero flags must
/// hold the sentinel instead.
fn check_responses(tile: &Table, tile_rows: &[usize], reference: &Table) -> Result<(), Error> {
    let flags = ints(tile, "flags")?;

    let pairs: [(&str, &str, Elem, &str); 4] = [
        ("R11", "mcal_g_1p", Elem::Index(0), "mcal_g_1m"),
        ("R12", "mcal_g_2p", Elem::Index(0), "mcal_g_2m"),
        ("R21", "mcal_g_1p", Elem::Index(1), "mcal_g_1m"),
        ("R22", "mcal_g_2p", Elem::Index(1), "mcal_g_2m"),
    ];

    for &(out, plus, elem, minus) in pairs.iter() {
        let p = floats(tile, plus, elem)?;
        let m = floats(tile, minus, elem)?;
        let got = floats(reference, out, Elem::Whole)?;

        for (k, &row) in tile_rows.iter().enumerate() {
            let expected = if flags[row] == 0 {
                (p[row] - m[row]) / DGAMMA
            } else {
                DEFAULT as f64
            };

            if got[k] != expected {
                bail!(
                    "column \"{}\", tile row {}: recomputed {} but the collation has {}",
                    out,
                    row,
                    expected,
                    got[k]
                );
            }
        }
    }

    Ok(())
}
