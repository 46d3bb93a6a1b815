// Copyright 2024-2026 the mcal developers
// Licensed under the MIT License.

/*!
Field-name decoration.

A [`Namer`] is a small pure value that glues an optional prefix and/or
suffix onto base field names. The same mechanism handles per-band suffixes
(`flux` → `flux_r`) and per-shear-variant suffixes (`e1` → `e1_1p`).

*/

use crate::schema::ShearVariant;

/// Decorates base field names with an optional prefix and/or suffix, joined
/// by underscores. With neither set, it returns names unchanged.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Namer {
    front: Option<String>,
    back: Option<String>,
}

impl Namer {
    /// Create a namer from optional prefix and suffix parts. Empty strings
    /// are treated the same as absent parts.
    pub fn new(front: Option<&str>, back: Option<&str>) -> Self {
        fn clean(part: Option<&str>) -> Option<String> {
            match part {
                None | Some("") => None,
                Some(s) => Some(s.to_owned()),
            }
        }

        Namer {
            front: clean(front),
            back: clean(back),
        }
    }

    /// A namer that only prepends `front`.
    pub fn prefixed(front: &str) -> Self {
        Namer::new(Some(front), None)
    }

    /// A namer that only appends `back`.
    pub fn suffixed(back: &str) -> Self {
        Namer::new(None, Some(back))
    }

    /// The namer for a shear variant: the canonical variant is unsuffixed,
    /// every other variant is suffixed with its own label.
    pub fn for_variant(variant: ShearVariant) -> Self {
        if variant.is_canonical() {
            Namer::new(None, None)
        } else {
            Namer::suffixed(variant.label())
        }
    }

    /// Decorate `name`.
    pub fn apply(&self, name: &str) -> String {
        let mut n = name.to_owned();

        if let Some(front) = &self.front {
            n = format!("{}_{}", front, n);
        }

        if let Some(back) = &self.back {
            n = format!("{}_{}", n, back);
        }

        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoration() {
        assert_eq!(Namer::new(None, None).apply("flux"), "flux");
        assert_eq!(Namer::prefixed("mcal").apply("flux"), "mcal_flux");
        assert_eq!(Namer::suffixed("r").apply("flux"), "flux_r");
        assert_eq!(
            Namer::new(Some("mcal"), Some("r")).apply("flux"),
            "mcal_flux_r"
        );
    }

    #[test]
    fn empty_parts_are_absent() {
        assert_eq!(Namer::new(Some(""), Some("")).apply("flux"), "flux");
        assert_eq!(Namer::new(Some(""), None), Namer::new(None, None));
    }

    #[test]
    fn variant_namer() {
        assert_eq!(Namer::for_variant(ShearVariant::NoShear).apply("e1"), "e1");

        for &variant in ShearVariant::ALL.iter() {
            if variant.is_canonical() {
                continue;
            }

            assert_eq!(
                Namer::for_variant(variant).apply("e1"),
                format!("e1_{}", variant.label())
            );
        }
    }

    #[test]
    fn identity_is_idempotent() {
        let n = Namer::new(None, None);
        assert_eq!(n.apply(&n.apply("size")), "size");
    }
}
