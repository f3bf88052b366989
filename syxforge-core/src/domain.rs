use rand::Rng;
use std::collections::BTreeMap;

use crate::params::{ParamSpec, ParamSpecs};
use crate::schema::SchemaRange;
use crate::{ForgeError, Result};

/// Widest domain the resolver will enumerate. Device values are single
/// bytes, so anything wider points at a broken spec.
pub const MAX_DOMAIN_WIDTH: i64 = 1 << 16;

/// Explicit ascending list of legal values for one parameter. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedDomain {
    values: Vec<i64>,
}

impl AllowedDomain {
    fn span(lo: i64, hi: i64) -> Self {
        Self {
            values: (lo..=hi).collect(),
        }
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        self.values[rng.gen_range(0..self.values.len())]
    }
}

pub type Domains = BTreeMap<String, AllowedDomain>;

/// Intersects the spec range with the schema range. An empty intersection
/// collapses to the single value `max(spec.min, schema.minimum)`.
pub fn resolve_domain(name: &str, spec: &ParamSpec, range: &SchemaRange) -> Result<AllowedDomain> {
    let lo = range.minimum.map_or(spec.min, |min| spec.min.max(min));
    let mut hi = range.maximum.map_or(spec.max, |max| spec.max.min(max));
    if hi < lo {
        hi = lo;
    }

    let width = i128::from(hi) - i128::from(lo) + 1;
    if width > i128::from(MAX_DOMAIN_WIDTH) {
        return Err(ForgeError::Config(format!(
            "parameter '{name}' resolves to {width} values ({lo}..={hi}), more than {MAX_DOMAIN_WIDTH}"
        )));
    }

    Ok(AllowedDomain::span(lo, hi))
}

/// Resolves every spec parameter. A parameter the schema does not know is a
/// configuration error and stops the run before anything is generated.
pub fn resolve_domains(
    specs: &ParamSpecs,
    ranges: &BTreeMap<String, SchemaRange>,
) -> Result<Domains> {
    let mut domains = Domains::new();
    for (name, spec) in specs {
        let range = ranges.get(name).ok_or_else(|| {
            ForgeError::Config(format!(
                "spec JSON contains unknown parameter '{name}' not in schema"
            ))
        })?;
        domains.insert(name.clone(), resolve_domain(name, spec, range)?);
    }
    Ok(domains)
}

/// Number of distinct assignments the domains can express, saturating at
/// `u64::MAX`.
pub fn cross_product_size(domains: &Domains) -> u64 {
    domains
        .values()
        .fold(1u64, |acc, domain| acc.saturating_mul(domain.len() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn spec(min: i64, max: i64) -> ParamSpec {
        ParamSpec {
            min,
            max,
            default: min,
            sysex_offset: 30,
            sysex_length: 1,
            scale: String::new(),
            unit: String::new(),
            section: String::new(),
        }
    }

    fn range(minimum: i64, maximum: i64) -> SchemaRange {
        SchemaRange {
            minimum: Some(minimum),
            maximum: Some(maximum),
        }
    }

    #[test]
    fn intersects_spec_and_schema() {
        let domain = resolve_domain("p", &spec(0, 127), &range(10, 20)).unwrap();
        assert_eq!(domain.values(), (10..=20).collect::<Vec<_>>().as_slice());
    }

    #[test]
    fn disjoint_ranges_collapse_to_one_value() {
        let domain = resolve_domain("p", &spec(0, 5), &range(10, 20)).unwrap();
        assert_eq!(domain.values(), &[10]);

        let domain = resolve_domain("p", &spec(30, 40), &range(10, 20)).unwrap();
        assert_eq!(domain.values(), &[30]);
        assert!(!domain.is_empty());
    }

    #[test]
    fn missing_bounds_leave_spec_range() {
        let domain = resolve_domain("p", &spec(3, 6), &SchemaRange::default()).unwrap();
        assert_eq!(domain.values(), &[3, 4, 5, 6]);
    }

    #[test]
    fn parameter_missing_from_schema_is_fatal() {
        let specs = ParamSpecs::from([("ghost".to_string(), spec(0, 1))]);
        let err = resolve_domains(&specs, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ForgeError::Config(_)));
    }

    #[test]
    fn oversized_domain_is_rejected() {
        let err = resolve_domain("p", &spec(0, i64::MAX), &SchemaRange::default()).unwrap_err();
        assert!(matches!(err, ForgeError::Config(_)));
    }

    #[test]
    fn cross_product_multiplies_widths() {
        let specs = ParamSpecs::from([
            ("a".to_string(), spec(0, 3)),
            ("b".to_string(), spec(0, 2)),
        ]);
        let ranges = BTreeMap::from([
            ("a".to_string(), SchemaRange::default()),
            ("b".to_string(), SchemaRange::default()),
        ]);
        let domains = resolve_domains(&specs, &ranges).unwrap();
        assert_eq!(cross_product_size(&domains), 12);
        assert_eq!(cross_product_size(&Domains::new()), 1);
    }

    #[test]
    fn samples_stay_inside_domain() {
        let domain = resolve_domain("p", &spec(5, 9), &SchemaRange::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let v = domain.sample(&mut rng);
            assert!((5..=9).contains(&v));
        }
    }
}
