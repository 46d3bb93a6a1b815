// Copyright 2024-2026 the mcal developers
// Licensed under the MIT License.

//! End-to-end tests: synthesize tile files on disk, collate them, and
//! cross-check the result.

use ndarray::{Array2, Array3};
use std::path::Path;

use mcal::check::Tester;
use mcal::collate::Collator;
use mcal_core::notify::NoopNotificationBackend;
use mcal_core::schema::EXTNAME;
use mcal_core::table::{Column, Table};
use mcal_core::transcribe::transcribe;
use mcal_fits::TableWriter;

const VARIANTS: [(&str, f64); 5] = [
    ("", 0.0),
    ("_1p", 0.02),
    ("_1m", -0.02),
    ("_2p", 0.04),
    ("_2m", -0.04),
];

/// Build a synthetic 3-band tile with recognizable values.
fn make_tile(nrows: usize, id_base: i64) -> Table {
    let npars = 8;
    let mut t = Table::new();

    t.push_column(
        "id",
        Column::I64((0..nrows).map(|i| id_base + i as i64).collect()),
    );
    t.push_column(
        "flags",
        Column::I32((0..nrows).map(|i| (i % 2) as i32).collect()),
    );
    t.push_column("mask_frac", Column::F64(vec![0.125; nrows]));

    t.push_column(
        "psfrec_g",
        Column::VecF64(Array2::from_shape_fn((nrows, 2), |(r, c)| {
            0.01 * r as f64 + 0.001 * c as f64
        })),
    );
    t.push_column("psfrec_T", Column::F64(vec![0.45; nrows]));
    t.push_column(
        "mcal_gpsf",
        Column::VecF64(Array2::from_shape_fn((nrows, 2), |(r, c)| {
            0.02 * r as f64 + 0.002 * c as f64
        })),
    );
    t.push_column("mcal_Tpsf", Column::F64(vec![0.55; nrows]));

    t.push_column(
        "nimage_tot",
        Column::VecI32(Array2::from_shape_fn((nrows, 3), |(r, c)| {
            (10 * (c + 1) + r) as i32
        })),
    );
    t.push_column(
        "nimage_use",
        Column::VecI32(Array2::from_shape_fn((nrows, 3), |(r, c)| {
            (10 * (c + 1) + r) as i32 - 1
        })),
    );

    for &(suffix, offset) in VARIANTS.iter() {
        t.push_column(
            format!("mcal_g{}", suffix),
            Column::VecF64(Array2::from_shape_fn((nrows, 2), |(r, c)| {
                0.1 + offset + 0.01 * r as f64 + 0.001 * c as f64
            })),
        );
        t.push_column(
            format!("mcal_T_r{}", suffix),
            Column::F64(vec![0.8 + offset; nrows]),
        );
        t.push_column(format!("mcal_T_err{}", suffix), Column::F64(vec![0.05; nrows]));
        t.push_column(
            format!("mcal_s2n_r{}", suffix),
            Column::F64(vec![25.0 + offset; nrows]),
        );
        t.push_column(
            format!("mcal_g_cov{}", suffix),
            Column::MatF64(Array3::from_shape_fn((nrows, 2, 2), |(r, i, j)| {
                4.0 + offset + r as f64 + 0.1 * i as f64 + 0.01 * j as f64
            })),
        );
        t.push_column(
            format!("mcal_pars{}", suffix),
            Column::VecF64(Array2::from_shape_fn((nrows, npars), |(r, c)| {
                offset + (10 * r + c) as f64
            })),
        );
    }

    t.push_column(
        "mcal_pars_cov",
        Column::MatF64(Array3::from_shape_fn((nrows, npars, npars), |(r, i, j)| {
            if i == j {
                9.0 + r as f64
            } else {
                -0.5
            }
        })),
    );

    t
}

fn write_tile(path: &Path, tile: &Table) {
    let mut writer = TableWriter::create(path, "tile").unwrap();
    writer.append(tile).unwrap();
    writer.finish().unwrap();
}

#[test]
fn collate_and_check() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("collated.fits");
    let mut nbe = NoopNotificationBackend::new();

    write_tile(
        &dir.path().join("DES0001-0042_blind.fits"),
        &make_tile(5, 1000),
    );
    write_tile(
        &dir.path().join("DES0002+0001_blind.fits"),
        &make_tile(7, 2000),
    );

    Collator::new(dir.path(), &output).go(&mut nbe).unwrap();

    let collated = mcal_fits::read_table(&output).unwrap();
    assert_eq!(collated.nrows(), 12);
    assert_eq!(collated.ncols(), 77);

    // rows appear in sorted filename order
    let ids = collated.i64s("coadd_objects_id").unwrap();
    assert_eq!(ids[0], 1000);
    assert_eq!(ids[4], 1004);
    assert_eq!(ids[5], 2000);
    assert_eq!(ids[11], 2006);

    // spot-check a transcribed value: size under the 1p perturbation
    assert!((collated.f64s("size_1p").unwrap()[0] - 0.82).abs() < 1e-12);

    // both tiles, chosen deterministically, must check out
    Tester::new(dir.path(), &output, 2, Some(42))
        .go(&mut nbe)
        .unwrap();
}

#[test]
fn mixed_band_counts_fail() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("collated.fits");
    let mut nbe = NoopNotificationBackend::new();

    write_tile(
        &dir.path().join("DES0001-0042_blind.fits"),
        &make_tile(3, 1000),
    );

    // widen one tile's parameter vectors to the 4-band layout
    let mut wide = make_tile(3, 2000);
    for &(suffix, _) in VARIANTS.iter() {
        *wide
            .column_mut(&format!("mcal_pars{}", suffix))
            .unwrap() = Column::VecF64(Array2::zeros((3, 9)));
    }
    *wide.column_mut("mcal_pars_cov").unwrap() =
        Column::MatF64(Array3::zeros((3, 9, 9)));
    write_tile(&dir.path().join("DES0002+0001_blind.fits"), &wide);

    assert!(Collator::new(dir.path(), &output).go(&mut nbe).is_err());
}

#[test]
fn tampered_output_fails_the_check() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("collated.fits");
    let mut nbe = NoopNotificationBackend::new();

    let tile = make_tile(4, 1000);
    write_tile(&dir.path().join("DES0001-0042_blind.fits"), &tile);

    let mut transcribed = transcribe(&tile).unwrap();
    transcribed.f64s_mut("snr").unwrap()[0] += 1.0;

    let mut writer = TableWriter::create(&output, EXTNAME).unwrap();
    writer.append(&transcribed).unwrap();
    writer.finish().unwrap();

    assert!(Tester::new(dir.path(), &output, 1, Some(7))
        .go(&mut nbe)
        .is_err());
}
