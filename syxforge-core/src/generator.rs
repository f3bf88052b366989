use rand::{rngs::StdRng, SeedableRng};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::category::category_name;
use crate::domain::{cross_product_size, resolve_domains, Domains};
use crate::names::{allocate_name, NameExclusions};
use crate::params::{category_spec_path, load_param_specs, Assignment, ParamSpecs};
use crate::patch::{PatchCodec, Record};
use crate::schema::{AssignmentValidator, PatchSchema};
use crate::settings::ForgeSettings;
use crate::{ForgeError, Result};

/// Consecutive rejected candidates allowed per distinct assignment the
/// domains can express, clamped to the bounds below.
const REJECTIONS_PER_DISTINCT: u64 = 16;
const MIN_REJECTIONS: u64 = 4_096;
const MAX_REJECTIONS: u64 = 1_000_000;

#[derive(Debug, Clone)]
pub struct GeneratedPatch {
    pub name: String,
    pub record: Record,
    pub assignment: Assignment,
    pub signature: String,
}

/// Canonical form of an assignment. Keys are ordered, so equal assignments
/// always produce equal signatures.
pub fn signature(assignment: &Assignment) -> Result<String> {
    Ok(serde_json::to_string(assignment)?)
}

fn rejection_budget(distinct: u64) -> u64 {
    distinct
        .saturating_mul(REJECTIONS_PER_DISTINCT)
        .clamp(MIN_REJECTIONS, MAX_REJECTIONS)
}

pub struct PatchGenerator<V> {
    codec: PatchCodec,
    specs: ParamSpecs,
    domains: Domains,
    validator: V,
    rng: StdRng,
}

impl<V: AssignmentValidator> PatchGenerator<V> {
    /// A `seed` makes every batch reproducible; without one the generator
    /// draws from OS entropy.
    pub fn new(
        codec: PatchCodec,
        specs: ParamSpecs,
        domains: Domains,
        validator: V,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            codec,
            specs,
            domains,
            validator,
            rng,
        }
    }

    pub fn domains(&self) -> &Domains {
        &self.domains
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    fn sample(&mut self) -> Assignment {
        let mut assignment = Assignment::new();
        for (name, domain) in &self.domains {
            assignment.insert(name.clone(), domain.sample(&mut self.rng));
        }
        assignment
    }

    /// Produces `count` schema-valid patches with pairwise distinct
    /// assignments and names, none of which collide with `exclusions`.
    pub fn generate(
        &mut self,
        count: usize,
        category: u8,
        exclusions: &NameExclusions,
    ) -> Result<Vec<GeneratedPatch>> {
        let distinct = cross_product_size(&self.domains);
        if count as u64 > distinct {
            warn!(
                event = "domain_too_small",
                requested = count,
                distinct,
                "requested more patches than the parameter domains allow"
            );
            return Err(ForgeError::DomainExhausted {
                requested: count,
                produced: 0,
            });
        }

        let budget = rejection_budget(distinct);
        let mut names = exclusions.clone();
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::with_capacity(count);
        let mut rejected = 0u64;

        while out.len() < count {
            if rejected >= budget {
                warn!(
                    event = "generation_exhausted",
                    requested = count,
                    produced = out.len(),
                    budget
                );
                return Err(ForgeError::DomainExhausted {
                    requested: count,
                    produced: out.len(),
                });
            }

            let assignment = self.sample();
            if !self.validator.is_valid(&assignment) {
                rejected += 1;
                continue;
            }
            let signature = signature(&assignment)?;
            if seen.contains(&signature) {
                rejected += 1;
                continue;
            }

            let name = allocate_name(&mut self.rng, &names)?;
            let record = self
                .codec
                .encode(&name, category, &assignment, &self.specs)?;
            debug!(event = "patch_accepted", name = %name, rejected);

            names.insert(&name);
            seen.insert(signature.clone());
            rejected = 0;
            out.push(GeneratedPatch {
                name,
                record,
                assignment,
                signature,
            });
        }

        info!(
            event = "patches_generated",
            count,
            category = category_name(category)
        );
        Ok(out)
    }
}

impl PatchGenerator<PatchSchema> {
    /// Loads the init template, the category's spec file and the schema
    /// named in `settings`, and resolves the allowed domains.
    pub fn from_settings(settings: &ForgeSettings, category: u8) -> Result<Self> {
        let spec_path = category_spec_path(&settings.specs_dir, category_name(category));
        let specs = load_param_specs(&spec_path)?;
        let schema = PatchSchema::load(&settings.schema_path)?;
        let domains = resolve_domains(&specs, schema.ranges())?;
        let codec = PatchCodec::load(&settings.template_path)?;
        info!(
            event = "generator_ready",
            spec = %spec_path.display(),
            parameters = specs.len()
        );
        Ok(Self::new(codec, specs, domains, schema, settings.seed))
    }
}
