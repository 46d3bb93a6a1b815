// Copyright 2024-2026 the mcal developers
// Licensed under the MIT License.

/*!
Static schema definitions: sentinels, shear variants, and the name-map
templates that drive the transcription of metacal tiles.

Everything in this module is immutable compile-time data. The per-band
entries that depend on a tile's band count are expanded from these templates
by the `mapping` module.

*/

/// Generic sentinel for integer and float fields that were never measured.
pub const DEFAULT: i64 = -9999;

/// Sentinel for error and covariance fields. Large and positive, so that a
/// defaulted uncertainty reads as "essentially unconstrained" rather than as
/// a suspiciously good measurement.
pub const PDEFAULT: i64 = 9999;

/// Sentinel for string fields.
pub const SDEFAULT: &str = "None";

/// Flag value marking an object that was never measured at all.
pub const FLAG_NOT_MEASURED: i64 = 1 << 30;

/// Magnitude of the artificial shear applied to produce the perturbed
/// measurement variants.
pub const SHEAR_STEP: f64 = 0.01;

/// Denominator of the central finite difference used for the response
/// matrix: one step up plus one step down.
pub const DGAMMA: f64 = 2.0 * SHEAR_STEP;

/// Extension name of the collated output table.
pub const EXTNAME: &str = "model_fits";

/// Glob pattern selecting the per-tile metacal files in an input directory.
pub const TILE_FILE_PATTERN: &str = "DES*blind.fits";

/// Output columns known to occasionally carry non-finite values from
/// upstream PSF measurement failures.
pub const FRAGILE_COLUMNS: &[&str] = &["psf_e1", "psf_e2", "psf_size"];

/// One of the five conditions under which each shape quantity is measured:
/// unperturbed, or sheared by [`SHEAR_STEP`] up or down in each of the two
/// shear components.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShearVariant {
    /// The unperturbed measurement. Canonical: its fields are unsuffixed.
    NoShear,

    /// Perturbed by +[`SHEAR_STEP`] in the first component.
    OnePlus,

    /// Perturbed by -[`SHEAR_STEP`] in the first component.
    OneMinus,

    /// Perturbed by +[`SHEAR_STEP`] in the second component.
    TwoPlus,

    /// Perturbed by -[`SHEAR_STEP`] in the second component.
    TwoMinus,
}

impl ShearVariant {
    /// Every variant, in the order their fields appear in the output.
    pub const ALL: [ShearVariant; 5] = [
        ShearVariant::NoShear,
        ShearVariant::OnePlus,
        ShearVariant::OneMinus,
        ShearVariant::TwoPlus,
        ShearVariant::TwoMinus,
    ];

    /// The label used to suffix field names for this variant.
    pub fn label(&self) -> &'static str {
        match *self {
            ShearVariant::NoShear => "noshear",
            ShearVariant::OnePlus => "1p",
            ShearVariant::OneMinus => "1m",
            ShearVariant::TwoPlus => "2p",
            ShearVariant::TwoMinus => "2m",
        }
    }

    /// Whether this is the unperturbed, unsuffixed variant.
    pub fn is_canonical(&self) -> bool {
        matches!(*self, ShearVariant::NoShear)
    }
}

/// How to pull per-row values out of a source column.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Elem {
    /// Copy the whole (scalar) column.
    Whole,

    /// Take one element of a vector-valued column.
    Index(usize),

    /// Take one element of a matrix-valued column.
    Matrix(usize, usize),
}

/// Storage types for output columns.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColType {
    /// 32-bit signed integer.
    I32,

    /// 64-bit signed integer.
    I64,

    /// 64-bit float.
    F64,

    /// Variable-length text.
    Str,
}

/// One row of the static name-map tables: which source column feeds which
/// output field, how to slice it, and what type the output field takes.
#[derive(Clone, Copy, Debug)]
pub struct MapTemplate {
    /// The standardized output field name (undecorated).
    pub out: &'static str,

    /// The source column name (undecorated).
    pub src: &'static str,

    /// How to slice the source column.
    pub elem: Elem,

    /// The declared output storage type.
    pub dtype: ColType,
}

/// Templates for the variant-independent fields.
pub const PLAIN_TEMPLATES: &[MapTemplate] = &[
    MapTemplate {
        out: "coadd_objects_id",
        src: "id",
        elem: Elem::Whole,
        dtype: ColType::I64,
    },
    MapTemplate {
        out: "flags",
        src: "flags",
        elem: Elem::Whole,
        dtype: ColType::I32,
    },
    MapTemplate {
        out: "mask_frac",
        src: "mask_frac",
        elem: Elem::Whole,
        dtype: ColType::F64,
    },
    MapTemplate {
        out: "psf_e1",
        src: "psfrec_g",
        elem: Elem::Index(0),
        dtype: ColType::F64,
    },
    MapTemplate {
        out: "psf_e2",
        src: "psfrec_g",
        elem: Elem::Index(1),
        dtype: ColType::F64,
    },
    MapTemplate {
        out: "psf_size",
        src: "psfrec_T",
        elem: Elem::Whole,
        dtype: ColType::F64,
    },
    MapTemplate {
        out: "mcal_psf_e1",
        src: "mcal_gpsf",
        elem: Elem::Index(0),
        dtype: ColType::F64,
    },
    MapTemplate {
        out: "mcal_psf_e2",
        src: "mcal_gpsf",
        elem: Elem::Index(1),
        dtype: ColType::F64,
    },
    MapTemplate {
        out: "mcal_psf_size",
        src: "mcal_Tpsf",
        elem: Elem::Whole,
        dtype: ColType::F64,
    },
];

/// Templates for the fields that exist once per shear variant. Both the
/// output and source names get the variant suffix before use.
pub const SHEAR_TEMPLATES: &[MapTemplate] = &[
    MapTemplate {
        out: "e1",
        src: "mcal_g",
        elem: Elem::Index(0),
        dtype: ColType::F64,
    },
    MapTemplate {
        out: "e2",
        src: "mcal_g",
        elem: Elem::Index(1),
        dtype: ColType::F64,
    },
    MapTemplate {
        out: "size",
        src: "mcal_T_r",
        elem: Elem::Whole,
        dtype: ColType::F64,
    },
    MapTemplate {
        out: "size_err",
        src: "mcal_T_err",
        elem: Elem::Whole,
        dtype: ColType::F64,
    },
    MapTemplate {
        out: "snr",
        src: "mcal_s2n_r",
        elem: Elem::Whole,
        dtype: ColType::F64,
    },
    MapTemplate {
        out: "covmat_0_0",
        src: "mcal_g_cov",
        elem: Elem::Matrix(0, 0),
        dtype: ColType::F64,
    },
    MapTemplate {
        out: "covmat_0_1",
        src: "mcal_g_cov",
        elem: Elem::Matrix(0, 1),
        dtype: ColType::F64,
    },
    MapTemplate {
        out: "covmat_1_1",
        src: "mcal_g_cov",
        elem: Elem::Matrix(1, 1),
        dtype: ColType::F64,
    },
];

/// The four derived response-matrix fields, always present in the output.
pub const RESPONSE_FIELDS: [&str; 4] = ["R11", "R12", "R21", "R22"];
