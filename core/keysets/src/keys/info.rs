//! Declarative description of a keyset.
//!
//! A [KeysetInfo] fixes the shape of every key in a keyset, not its bytes.
//! It is produced by the compiler front-end and read-only afterwards.

use super::{KeyId, KeyKind};
use crate::consts::MIN_POLYNOMIAL_SIZE;
use crate::error::{contract_violation_and_log, KeysetResult};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tfhe::core_crypto::commons::dispersion::StandardDev;
use tfhe::core_crypto::prelude::DynamicDistribution;

/// Noise distribution used when encrypting the material of a derived key.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseDistribution {
    Gaussian { std_dev: f64 },
    TUniform { bound_log2: u32 },
}

impl NoiseDistribution {
    /// Checks that the distribution can be sampled for `u64` coefficients.
    pub fn check(&self) -> Result<(), String> {
        match *self {
            NoiseDistribution::Gaussian { std_dev } => {
                if !std_dev.is_finite() || std_dev <= 0.0 {
                    return Err(format!("gaussian standard deviation {std_dev} is not positive"));
                }
                Ok(())
            }
            NoiseDistribution::TUniform { bound_log2 } => {
                DynamicDistribution::<u64>::try_new_t_uniform(bound_log2)
                    .map(|_| ())
                    .map_err(|e| format!("t-uniform bound 2^{bound_log2}: {e}"))
            }
        }
    }

    /// Panics on a distribution rejected by [NoiseDistribution::check].
    pub fn to_dynamic(&self) -> DynamicDistribution<u64> {
        match *self {
            NoiseDistribution::Gaussian { std_dev } => {
                DynamicDistribution::new_gaussian_from_std_dev(StandardDev(std_dev))
            }
            NoiseDistribution::TUniform { bound_log2 } => {
                DynamicDistribution::new_t_uniform(bound_log2)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKeyParams {
    pub lwe_dimension: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BootstrapKeyParams {
    pub level_count: usize,
    pub base_log: usize,
    pub glwe_dimension: usize,
    pub polynomial_size: usize,
    pub input_lwe_dimension: usize,
    pub noise: NoiseDistribution,
}

impl BootstrapKeyParams {
    /// Number of `u64` coefficients in the standard-domain key, `None` if it overflows.
    pub fn raw_len(&self) -> Option<usize> {
        let glwe_size = self.glwe_dimension.checked_add(1)?;
        checked_product(&[
            self.input_lwe_dimension,
            self.level_count,
            glwe_size,
            glwe_size,
            self.polynomial_size,
        ])
    }

    /// Number of complex coefficients in the Fourier-domain key.
    pub fn fourier_len(&self) -> Option<usize> {
        self.raw_len().map(|len| len / 2)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyswitchKeyParams {
    pub level_count: usize,
    pub base_log: usize,
    pub input_lwe_dimension: usize,
    pub output_lwe_dimension: usize,
    pub noise: NoiseDistribution,
}

impl KeyswitchKeyParams {
    pub fn raw_len(&self) -> Option<usize> {
        checked_product(&[
            self.input_lwe_dimension,
            self.level_count,
            self.output_lwe_dimension.checked_add(1)?,
        ])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackingKeyswitchKeyParams {
    pub level_count: usize,
    pub base_log: usize,
    pub glwe_dimension: usize,
    pub polynomial_size: usize,
    pub input_lwe_dimension: usize,
    pub noise: NoiseDistribution,
}

impl PackingKeyswitchKeyParams {
    pub fn raw_len(&self) -> Option<usize> {
        checked_product(&[
            self.input_lwe_dimension,
            self.level_count,
            self.glwe_dimension.checked_add(1)?,
            self.polynomial_size,
        ])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKeyInfo {
    pub id: KeyId,
    pub params: SecretKeyParams,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BootstrapKeyInfo {
    pub id: KeyId,
    pub input_id: KeyId,
    pub output_id: KeyId,
    pub params: BootstrapKeyParams,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyswitchKeyInfo {
    pub id: KeyId,
    pub input_id: KeyId,
    pub output_id: KeyId,
    pub params: KeyswitchKeyParams,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackingKeyswitchKeyInfo {
    pub id: KeyId,
    pub input_id: KeyId,
    pub output_id: KeyId,
    pub params: PackingKeyswitchKeyParams,
}

/// Common view over the infos of keys derived from two secret keys.
pub trait DerivedKeyInfo {
    const KIND: KeyKind;

    fn id(&self) -> KeyId;
    fn input_id(&self) -> KeyId;
    fn output_id(&self) -> KeyId;
    fn level_count(&self) -> usize;
    fn base_log(&self) -> usize;
    /// Polynomial size when the output key is read as a GLWE key.
    fn polynomial_size(&self) -> Option<usize>;
    fn noise(&self) -> NoiseDistribution;
    /// Number of `u64` coefficients of the key, `None` if it overflows.
    fn raw_len(&self) -> Option<usize>;

    /// Checks the dimensions of the input and output secret keys against the parameters.
    fn check_shape(&self, input: &SecretKeyInfo, output: &SecretKeyInfo) -> Result<(), String>;
}

fn glwe_lwe_dimension(glwe_dimension: usize, polynomial_size: usize) -> Result<usize, String> {
    glwe_dimension.checked_mul(polynomial_size).ok_or_else(|| {
        format!("GLWE dimension {glwe_dimension} times polynomial size {polynomial_size} overflows")
    })
}

fn checked_product(factors: &[usize]) -> Option<usize> {
    factors.iter().try_fold(1usize, |acc, f| acc.checked_mul(*f))
}

fn check_dimension(role: &str, key: &SecretKeyInfo, expected: usize) -> Result<(), String> {
    if key.params.lwe_dimension != expected {
        return Err(format!(
            "{role} secret key {} has dimension {} but {expected} is required",
            key.id, key.params.lwe_dimension
        ));
    }
    Ok(())
}

impl DerivedKeyInfo for BootstrapKeyInfo {
    const KIND: KeyKind = KeyKind::Bootstrap;

    fn id(&self) -> KeyId {
        self.id
    }
    fn input_id(&self) -> KeyId {
        self.input_id
    }
    fn output_id(&self) -> KeyId {
        self.output_id
    }
    fn level_count(&self) -> usize {
        self.params.level_count
    }
    fn base_log(&self) -> usize {
        self.params.base_log
    }
    fn polynomial_size(&self) -> Option<usize> {
        Some(self.params.polynomial_size)
    }
    fn noise(&self) -> NoiseDistribution {
        self.params.noise
    }
    fn raw_len(&self) -> Option<usize> {
        self.params.raw_len()
    }

    fn check_shape(&self, input: &SecretKeyInfo, output: &SecretKeyInfo) -> Result<(), String> {
        check_dimension("input", input, self.params.input_lwe_dimension)?;
        check_dimension(
            "output",
            output,
            glwe_lwe_dimension(self.params.glwe_dimension, self.params.polynomial_size)?,
        )
    }
}

impl DerivedKeyInfo for KeyswitchKeyInfo {
    const KIND: KeyKind = KeyKind::Keyswitch;

    fn id(&self) -> KeyId {
        self.id
    }
    fn input_id(&self) -> KeyId {
        self.input_id
    }
    fn output_id(&self) -> KeyId {
        self.output_id
    }
    fn level_count(&self) -> usize {
        self.params.level_count
    }
    fn base_log(&self) -> usize {
        self.params.base_log
    }
    fn polynomial_size(&self) -> Option<usize> {
        None
    }
    fn noise(&self) -> NoiseDistribution {
        self.params.noise
    }
    fn raw_len(&self) -> Option<usize> {
        self.params.raw_len()
    }

    fn check_shape(&self, input: &SecretKeyInfo, output: &SecretKeyInfo) -> Result<(), String> {
        check_dimension("input", input, self.params.input_lwe_dimension)?;
        check_dimension("output", output, self.params.output_lwe_dimension)
    }
}

impl DerivedKeyInfo for PackingKeyswitchKeyInfo {
    const KIND: KeyKind = KeyKind::PackingKeyswitch;

    fn id(&self) -> KeyId {
        self.id
    }
    fn input_id(&self) -> KeyId {
        self.input_id
    }
    fn output_id(&self) -> KeyId {
        self.output_id
    }
    fn level_count(&self) -> usize {
        self.params.level_count
    }
    fn base_log(&self) -> usize {
        self.params.base_log
    }
    fn polynomial_size(&self) -> Option<usize> {
        Some(self.params.polynomial_size)
    }
    fn noise(&self) -> NoiseDistribution {
        self.params.noise
    }
    fn raw_len(&self) -> Option<usize> {
        self.params.raw_len()
    }

    fn check_shape(&self, input: &SecretKeyInfo, output: &SecretKeyInfo) -> Result<(), String> {
        check_dimension("input", input, self.params.input_lwe_dimension)?;
        check_dimension(
            "output",
            output,
            glwe_lwe_dimension(self.params.glwe_dimension, self.params.polynomial_size)?,
        )
    }
}

/// Every key of a keyset, by kind.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KeysetInfo {
    #[serde(default)]
    pub secret_keys: Vec<SecretKeyInfo>,
    #[serde(default)]
    pub bootstrap_keys: Vec<BootstrapKeyInfo>,
    #[serde(default)]
    pub keyswitch_keys: Vec<KeyswitchKeyInfo>,
    #[serde(default)]
    pub packing_keyswitch_keys: Vec<PackingKeyswitchKeyInfo>,
}

impl KeysetInfo {
    pub fn secret_key(&self, id: KeyId) -> Option<&SecretKeyInfo> {
        self.secret_keys.iter().find(|k| k.id == id)
    }

    pub fn bootstrap_key(&self, id: KeyId) -> Option<&BootstrapKeyInfo> {
        self.bootstrap_keys.iter().find(|k| k.id == id)
    }

    pub fn keyswitch_key(&self, id: KeyId) -> Option<&KeyswitchKeyInfo> {
        self.keyswitch_keys.iter().find(|k| k.id == id)
    }

    pub fn packing_keyswitch_key(&self, id: KeyId) -> Option<&PackingKeyswitchKeyInfo> {
        self.packing_keyswitch_keys.iter().find(|k| k.id == id)
    }

    /// Secret key infos in generation order.
    pub fn sorted_secret_keys(&self) -> Vec<&SecretKeyInfo> {
        self.secret_keys.iter().sorted_by_key(|k| k.id).collect()
    }

    /// Checks that the info describes a keyset that can be generated.
    ///
    /// Ids must be unique per kind, every derived key must reference declared
    /// secret keys, and the secret key dimensions must agree with the
    /// parameters of the keys derived from them.
    pub fn validate(&self) -> KeysetResult<()> {
        check_unique_ids(KeyKind::Secret, self.secret_keys.iter().map(|k| k.id))?;
        for sk in &self.secret_keys {
            if sk.params.lwe_dimension == 0 {
                return Err(contract_violation_and_log(format!(
                    "secret key {} has a zero dimension",
                    sk.id
                )));
            }
        }
        self.validate_derived(&self.bootstrap_keys)?;
        self.validate_derived(&self.keyswitch_keys)?;
        self.validate_derived(&self.packing_keyswitch_keys)?;
        Ok(())
    }

    fn validate_derived<K: DerivedKeyInfo>(&self, keys: &[K]) -> KeysetResult<()> {
        check_unique_ids(K::KIND, keys.iter().map(|k| k.id()))?;
        for key in keys {
            let (input, output) = self.resolve(key)?;
            check_decomposition(key)?;
            let violation = |e: String| {
                contract_violation_and_log(format!("{} key {}: {e}", K::KIND, key.id()))
            };
            key.noise().check().map_err(violation)?;
            key.check_shape(input, output).map_err(violation)?;
            if key.raw_len().is_none() {
                return Err(violation("key size overflows".to_string()));
            }
        }
        Ok(())
    }

    /// Finds the input and output secret key infos of a derived key.
    pub fn resolve<K: DerivedKeyInfo>(
        &self,
        key: &K,
    ) -> KeysetResult<(&SecretKeyInfo, &SecretKeyInfo)> {
        let lookup = |role: &str, id: KeyId| {
            self.secret_key(id).ok_or_else(|| {
                contract_violation_and_log(format!(
                    "{} key {} references unknown {role} secret key {id}",
                    K::KIND,
                    key.id()
                ))
            })
        };
        Ok((
            lookup("input", key.input_id())?,
            lookup("output", key.output_id())?,
        ))
    }
}

fn check_unique_ids(kind: KeyKind, ids: impl Iterator<Item = KeyId>) -> KeysetResult<()> {
    let duplicates: Vec<KeyId> = ids.duplicates().collect();
    if !duplicates.is_empty() {
        return Err(contract_violation_and_log(format!(
            "duplicate {kind} key ids {duplicates:?}"
        )));
    }
    Ok(())
}

fn check_decomposition<K: DerivedKeyInfo>(key: &K) -> KeysetResult<()> {
    let (level, base_log) = (key.level_count(), key.base_log());
    let too_wide = level
        .checked_mul(base_log)
        .map_or(true, |bits| bits > u64::BITS as usize);
    if level == 0 || base_log == 0 || too_wide {
        return Err(contract_violation_and_log(format!(
            "{} key {} has an invalid decomposition (level {level}, base log {base_log})",
            K::KIND,
            key.id()
        )));
    }
    if let Some(n) = key.polynomial_size() {
        if !n.is_power_of_two() || n < MIN_POLYNOMIAL_SIZE {
            return Err(contract_violation_and_log(format!(
                "{} key {} has polynomial size {n}, a power of two of at least {MIN_POLYNOMIAL_SIZE} is required",
                K::KIND,
                key.id()
            )));
        }
    }
    Ok(())
}
