// Copyright 2024-2026 the mcal developers
// Licensed under the MIT License.

/*!
Expanding the static name-map templates into the concrete schema of a tile.

The static tables in [`crate::schema`] cover the fields every tile has; the
per-band fields depend on how many bands the tile was measured in, so the
full maps are built here, per file, as pure functions of the band count.

The output schema is the plain map, then the shear map crossed with every
shear variant, then the response-matrix fields. Schema construction and
value transcription share one filtering predicate ([`MapEntry::applies_to`])
so the dtype list and the transcription plan cannot diverge.

*/

use crate::bands::{band_names, NON_FLUX_PARS};
use crate::errors::CollateError;
use crate::names::Namer;
use crate::schema::{self, ColType, Elem, MapTemplate, ShearVariant};

/// A fully-expanded name-map entry: one output field, the source column
/// that feeds it, and how to slice it.
#[derive(Clone, Debug)]
pub struct MapEntry {
    /// The output field name (still undecorated for shear-map entries).
    pub out: String,

    /// The source column name (likewise undecorated).
    pub src: String,

    /// How to slice the source column.
    pub elem: Elem,

    /// The declared output storage type.
    pub dtype: ColType,

    /// If set, the shear variants this entry exists for; `None` means all.
    pub variants: Option<&'static [ShearVariant]>,
}

static NOSHEAR_ONLY: &[ShearVariant] = &[ShearVariant::NoShear];

impl MapEntry {
    fn from_template(t: &MapTemplate) -> Self {
        MapEntry {
            out: t.out.to_owned(),
            src: t.src.to_owned(),
            elem: t.elem,
            dtype: t.dtype,
            variants: None,
        }
    }

    /// Whether this entry produces a field for the given variant. Used both
    /// when building the output schema and when transcribing values.
    pub fn applies_to(&self, variant: ShearVariant) -> bool {
        self.variants.map_or(true, |set| set.contains(&variant))
    }
}

/// The variant-independent name map for a tile with `nbands` bands: the
/// static plain templates plus two per-band image-count fields.
pub fn plain_map(nbands: usize) -> Result<Vec<MapEntry>, CollateError> {
    let bands = band_names(nbands)?;

    let mut map: Vec<MapEntry> = schema::PLAIN_TEMPLATES
        .iter()
        .map(MapEntry::from_template)
        .collect();

    for (i, band) in bands.iter().enumerate() {
        let n = Namer::suffixed(band);

        map.push(MapEntry {
            out: n.apply("nimage_tot"),
            src: "nimage_tot".to_owned(),
            elem: Elem::Index(i),
            dtype: ColType::I32,
            variants: None,
        });

        map.push(MapEntry {
            out: n.apply("nimage_use"),
            src: "nimage_use".to_owned(),
            elem: Elem::Index(i),
            dtype: ColType::I32,
            variants: None,
        });
    }

    Ok(map)
}

/// The per-shear-variant name map: the static shear templates plus, per
/// band, a flux field and a flux-error field. The flux error comes from the
/// parameter-covariance diagonal, which only exists for the canonical
/// variant.
pub fn shear_map(nbands: usize) -> Result<Vec<MapEntry>, CollateError> {
    let bands = band_names(nbands)?;

    let mut map: Vec<MapEntry> = schema::SHEAR_TEMPLATES
        .iter()
        .map(MapEntry::from_template)
        .collect();

    for (i, band) in bands.iter().enumerate() {
        let n = Namer::suffixed(band);

        map.push(MapEntry {
            out: n.apply("flux"),
            src: "mcal_pars".to_owned(),
            elem: Elem::Index(NON_FLUX_PARS + i),
            dtype: ColType::F64,
            variants: None,
        });

        map.push(MapEntry {
            out: n.apply("flux_err"),
            src: "mcal_pars_cov".to_owned(),
            elem: Elem::Matrix(NON_FLUX_PARS + i, NON_FLUX_PARS + i),
            dtype: ColType::F64,
            variants: Some(NOSHEAR_ONLY),
        });
    }

    Ok(map)
}

/// The full output schema for a tile with `nbands` bands, in output order.
pub fn output_schema(nbands: usize) -> Result<Vec<(String, ColType)>, CollateError> {
    let mut dt = Vec::new();

    for entry in plain_map(nbands)? {
        dt.push((entry.out, entry.dtype));
    }

    for entry in shear_map(nbands)? {
        for &variant in ShearVariant::ALL.iter() {
            if !entry.applies_to(variant) {
                continue;
            }

            let namer = Namer::for_variant(variant);
            dt.push((namer.apply(&entry.out), entry.dtype));
        }
    }

    for name in &schema::RESPONSE_FIELDS {
        dt.push(((*name).to_owned(), ColType::F64));
    }

    Ok(dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_names(schema: &[(String, ColType)]) -> Vec<&str> {
        schema.iter().map(|(n, _)| n.as_str()).collect()
    }

    #[test]
    fn per_band_plain_fields() {
        let map = plain_map(3).unwrap();
        let outs: Vec<&str> = map.iter().map(|e| e.out.as_str()).collect();

        assert!(outs.contains(&"nimage_tot_r"));
        assert!(outs.contains(&"nimage_use_z"));
        assert!(!outs.contains(&"nimage_tot_g"));

        let map = plain_map(4).unwrap();
        let outs: Vec<&str> = map.iter().map(|e| e.out.as_str()).collect();
        assert!(outs.contains(&"nimage_tot_g"));
    }

    #[test]
    fn flux_entries_index_past_structural_pars() {
        let map = shear_map(3).unwrap();
        let flux_r = map.iter().find(|e| e.out == "flux_r").unwrap();

        assert_eq!(flux_r.elem, Elem::Index(NON_FLUX_PARS));
        assert!(flux_r.variants.is_none());

        let err_r = map.iter().find(|e| e.out == "flux_err_r").unwrap();
        assert_eq!(err_r.elem, Elem::Matrix(NON_FLUX_PARS, NON_FLUX_PARS));
        assert_eq!(err_r.variants, Some(NOSHEAR_ONLY));
    }

    #[test]
    fn schema_crosses_variants() {
        let schema = output_schema(3).unwrap();
        let names = field_names(&schema);

        // 15 plain + 40 shear-template + 15 flux + 3 flux_err + 4 response
        assert_eq!(schema.len(), 77);

        for suffix in &["", "_1p", "_1m", "_2p", "_2m"] {
            assert!(names.contains(&format!("e1{}", suffix).as_str()));
            assert!(names.contains(&format!("covmat_0_1{}", suffix).as_str()));
            assert!(names.contains(&format!("flux_i{}", suffix).as_str()));
        }

        // flux errors exist only for the canonical variant
        assert!(names.contains(&"flux_err_r"));
        assert!(!names.contains(&"flux_err_r_1p"));

        for r in &["R11", "R12", "R21", "R22"] {
            assert!(names.contains(r));
        }
    }

    #[test]
    fn unsupported_band_count_propagates() {
        assert!(output_schema(2).is_err());
    }
}
