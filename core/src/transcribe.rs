// Copyright 2024-2026 the mcal developers
// Licensed under the MIT License.

/*!
Transcribing one tile's records into the standardized output schema.

For each input batch this allocates the output batch, stamps every field
with its "not measured" sentinel, copies the mapped fields (decorating names
per shear variant), converts covariance entries to standard errors where the
map pairs an `_err` output with a `_cov` source, computes the shear response
matrix for rows that passed measurement, and finally stamps known-fragile
fields that came through non-finite.

Any missing source column, extraction mismatch, or unsupported band count
aborts the whole file; there is no partial-row recovery.

*/

use crate::bands::nbands_from_table;
use crate::errors::CollateError;
use crate::mapping;
use crate::names::Namer;
use crate::schema::{
    self, Elem, ShearVariant, DEFAULT, DGAMMA, FLAG_NOT_MEASURED, PDEFAULT, SDEFAULT,
};
use crate::table::{Column, Table, Values};

/// Transcribe one tile's records, producing a fully-populated output batch
/// of the same row count.
pub fn transcribe(input: &Table) -> Result<Table, CollateError> {
    let nbands = nbands_from_table(input)?;

    let dt = mapping::output_schema(nbands)?;
    let mut output = Table::with_schema(&dt, input.nrows());
    set_defaults(&mut output);

    for entry in mapping::plain_map(nbands)? {
        let values = input.extract(&entry.src, entry.elem)?;
        output.assign(&entry.out, values)?;
    }

    for entry in mapping::shear_map(nbands)? {
        for &variant in ShearVariant::ALL.iter() {
            if !entry.applies_to(variant) {
                continue;
            }

            let namer = Namer::for_variant(variant);
            let oname = namer.apply(&entry.out);
            let sname = namer.apply(&entry.src);

            let mut values = input.extract(&sname, entry.elem)?;

            if is_calculated_err(&oname, &sname) {
                convert_err_from_cov(&mut values);
            }

            output.assign(&oname, values)?;
        }
    }

    compute_response(input, &mut output)?;
    fix_nonfinite(&mut output)?;

    Ok(output)
}

/// Initialize every column of an allocated output batch to its sentinel, so
/// that any field left untouched by transcription is distinguishable from a
/// real measurement.
///
/// The rules fire in order: error/covariance fields first, then strings,
/// then flags, then everything else. The `flag` substring check is
/// case-insensitive while the `cov`/`err` checks are not; that asymmetry is
/// deliberate and downstream consumers rely on the current behavior.
pub fn set_defaults(table: &mut Table) {
    for (name, col) in table.columns_mut() {
        if name.contains("cov") || name.contains("err") {
            fill(col, PDEFAULT);
        } else if let Column::Str(v) = col {
            for s in v.iter_mut() {
                *s = SDEFAULT.to_owned();
            }
        } else if name.to_lowercase().contains("flag") {
            fill(col, FLAG_NOT_MEASURED);
        } else {
            fill(col, DEFAULT);
        }
    }
}

fn fill(col: &mut Column, value: i64) {
    match col {
        Column::I32(v) => {
            for x in v.iter_mut() {
                *x = value as i32;
            }
        }

        Column::I64(v) => {
            for x in v.iter_mut() {
                *x = value;
            }
        }

        Column::F64(v) => {
            for x in v.iter_mut() {
                *x = value as f64;
            }
        }

        Column::Str(v) => {
            for x in v.iter_mut() {
                *x = value.to_string();
            }
        }

        Column::VecI32(a) => a.fill(value as i32),
        Column::VecF64(a) => a.fill(value as f64),
        Column::MatF64(a) => a.fill(value as f64),
    }
}

/// An extracted slice needs the variance-to-error conversion when the
/// output field is an error but the source column is a covariance.
fn is_calculated_err(oname: &str, sname: &str) -> bool {
    oname.contains("_err") && sname.contains("_cov")
}

/// Replace each strictly positive entry with its square root, in place.
/// Non-positive variances are not physically convertible, so they pass
/// through untouched and keep whatever value (usually a sentinel) they had.
fn convert_err_from_cov(values: &mut Values) {
    if let Values::Float(v) = values {
        for x in v.iter_mut() {
            if *x > 0.0 {
                *x = x.sqrt();
            }
        }
    }
}

/// Compute the response matrix by central finite differences over the
/// already-transcribed output shear components, for rows whose input flags
/// are zero. All other rows keep their sentinel defaults.
fn compute_response(input: &Table, output: &mut Table) -> Result<(), CollateError> {
    let flags = match input.extract("flags", Elem::Whole)? {
        Values::Int(v) => v,
        Values::Float(v) => v.into_iter().map(|x| x as i64).collect(),
    };

    let good: Vec<usize> = flags
        .iter()
        .enumerate()
        .filter(|(_, &f)| f == 0)
        .map(|(i, _)| i)
        .collect();

    if good.is_empty() {
        return Ok(());
    }

    const PAIRS: [(&str, &str, &str); 4] = [
        ("R11", "e1_1p", "e1_1m"),
        ("R12", "e1_2p", "e1_2m"),
        ("R21", "e2_1p", "e2_1m"),
        ("R22", "e2_2p", "e2_2m"),
    ];

    for &(rname, plus, minus) in PAIRS.iter() {
        let p = output.f64s(plus)?.to_vec();
        let m = output.f64s(minus)?.to_vec();
        let r = output.f64s_mut(rname)?;

        for &i in &good {
            r[i] = (p[i] - m[i]) / DGAMMA;
        }
    }

    Ok(())
}

/// Stamp non-finite values in the known-fragile PSF fields with the generic
/// sentinel. Runs last, as a backstop against upstream measurement NaNs
/// leaking into the collated product.
fn fix_nonfinite(output: &mut Table) -> Result<(), CollateError> {
    for name in schema::FRAGILE_COLUMNS {
        let col = output.f64s_mut(name)?;

        for x in col.iter_mut() {
            if !x.is_finite() {
                *x = DEFAULT as f64;
            }
        }
    }

    Ok(())
}
