//! Deterministic keyset generation.
//!
//! A single deterministic seeder is created from the 128-bit seed. The secret
//! key generator and the encryption generator are both drawn from it, in that
//! order. Keys are then produced in a fixed order: secret keys, bootstrap keys,
//! keyswitch keys and packing keyswitch keys, each by ascending id. The same
//! info and seed therefore always produce the same keyset.

use crate::cache::KeysetCache;
use crate::error::{contract_violation_and_log, KeysetResult};
use crate::keys::info::DerivedKeyInfo;
use crate::keys::{
    BootstrapKey, BootstrapKeyInfo, ClientKeyset, KeyId, Keyset, KeysetInfo, KeyswitchKey,
    KeyswitchKeyInfo, PackingKeyswitchKey, PackingKeyswitchKeyInfo, SecretKey, SecretKeyInfo,
    ServerKeyset,
};
use itertools::Itertools;
use tfhe::core_crypto::commons::generators::{
    DeterministicSeeder, EncryptionRandomGenerator, SecretRandomGenerator,
};
use tfhe::core_crypto::commons::math::random::{DefaultRandomGenerator, Seed};
use tfhe::core_crypto::prelude::{
    allocate_and_generate_new_binary_lwe_secret_key, allocate_and_generate_new_lwe_bootstrap_key,
    allocate_and_generate_new_lwe_keyswitch_key,
    allocate_and_generate_new_lwe_packing_keyswitch_key, CiphertextModulus,
    DecompositionBaseLog, DecompositionLevelCount, LweDimension,
};
use tfhe_csprng::seeders::Seeder;

/// Combines the two halves of a seed as `(msb << 64) | lsb`.
pub fn combine_seed(seed_msb: u64, seed_lsb: u64) -> u128 {
    ((seed_msb as u128) << 64) | seed_lsb as u128
}

/// Generates the keyset described by `info` from `seed`.
pub fn generate(info: &KeysetInfo, seed: u128) -> KeysetResult<Keyset> {
    KeyGenerator::new(seed).generate_keyset(info)
}

/// Returns the keyset for `info` and the seed halves, going through `cache` when one is given.
pub fn keyset(
    info: &KeysetInfo,
    seed_msb: u64,
    seed_lsb: u64,
    cache: Option<&KeysetCache>,
) -> KeysetResult<Keyset> {
    match cache {
        Some(cache) => cache.get_keyset(info, seed_msb, seed_lsb),
        None => generate(info, combine_seed(seed_msb, seed_lsb)),
    }
}

/// Holds the CSPRNG state of one keyset generation.
pub struct KeyGenerator {
    secret_generator: SecretRandomGenerator<DefaultRandomGenerator>,
    encryption_generator: EncryptionRandomGenerator<DefaultRandomGenerator>,
}

impl KeyGenerator {
    pub fn new(seed: u128) -> Self {
        let mut seeder = DeterministicSeeder::<DefaultRandomGenerator>::new(Seed(seed));
        let secret_generator = SecretRandomGenerator::<DefaultRandomGenerator>::new(seeder.seed());
        let encryption_generator =
            EncryptionRandomGenerator::<DefaultRandomGenerator>::new(seeder.seed(), &mut seeder);
        Self {
            secret_generator,
            encryption_generator,
        }
    }

    /// Consumes the generator state for a whole keyset.
    pub fn generate_keyset(mut self, info: &KeysetInfo) -> KeysetResult<Keyset> {
        info.validate()?;
        tracing::debug!(
            "Generating keyset with {} secret keys, {} bootstrap keys, {} keyswitch keys and {} packing keyswitch keys",
            info.secret_keys.len(),
            info.bootstrap_keys.len(),
            info.keyswitch_keys.len(),
            info.packing_keyswitch_keys.len()
        );

        let client = ClientKeyset {
            secret_keys: info
                .sorted_secret_keys()
                .into_iter()
                .map(|sk| self.generate_secret_key(sk))
                .collect(),
        };

        let bootstrap_keys = sorted_by_id(&info.bootstrap_keys)
            .into_iter()
            .map(|bsk| self.generate_bootstrap_key(bsk, &client))
            .collect::<KeysetResult<Vec<_>>>()?;
        let keyswitch_keys = sorted_by_id(&info.keyswitch_keys)
            .into_iter()
            .map(|ksk| self.generate_keyswitch_key(ksk, &client))
            .collect::<KeysetResult<Vec<_>>>()?;
        let packing_keyswitch_keys = sorted_by_id(&info.packing_keyswitch_keys)
            .into_iter()
            .map(|pksk| self.generate_packing_keyswitch_key(pksk, &client))
            .collect::<KeysetResult<Vec<_>>>()?;

        Ok(Keyset {
            client,
            server: ServerKeyset {
                bootstrap_keys,
                keyswitch_keys,
                packing_keyswitch_keys,
            },
        })
    }

    fn generate_secret_key(&mut self, info: &SecretKeyInfo) -> SecretKey {
        let key = allocate_and_generate_new_binary_lwe_secret_key(
            LweDimension(info.params.lwe_dimension),
            &mut self.secret_generator,
        );
        SecretKey::new(*info, key)
    }

    fn generate_bootstrap_key(
        &mut self,
        info: &BootstrapKeyInfo,
        client: &ClientKeyset,
    ) -> KeysetResult<BootstrapKey> {
        let (input, output) = resolve(info, client)?;
        let params = &info.params;
        let key = allocate_and_generate_new_lwe_bootstrap_key(
            input.key(),
            &output.as_glwe(params.polynomial_size),
            DecompositionBaseLog(params.base_log),
            DecompositionLevelCount(params.level_count),
            params.noise.to_dynamic(),
            CiphertextModulus::new_native(),
            &mut self.encryption_generator,
        );
        Ok(BootstrapKey::new(*info, key))
    }

    fn generate_keyswitch_key(
        &mut self,
        info: &KeyswitchKeyInfo,
        client: &ClientKeyset,
    ) -> KeysetResult<KeyswitchKey> {
        let (input, output) = resolve(info, client)?;
        let params = &info.params;
        let key = allocate_and_generate_new_lwe_keyswitch_key(
            input.key(),
            output.key(),
            DecompositionBaseLog(params.base_log),
            DecompositionLevelCount(params.level_count),
            params.noise.to_dynamic(),
            CiphertextModulus::new_native(),
            &mut self.encryption_generator,
        );
        Ok(KeyswitchKey::new(*info, key))
    }

    fn generate_packing_keyswitch_key(
        &mut self,
        info: &PackingKeyswitchKeyInfo,
        client: &ClientKeyset,
    ) -> KeysetResult<PackingKeyswitchKey> {
        let (input, output) = resolve(info, client)?;
        let params = &info.params;
        let key = allocate_and_generate_new_lwe_packing_keyswitch_key(
            input.key(),
            &output.as_glwe(params.polynomial_size),
            DecompositionBaseLog(params.base_log),
            DecompositionLevelCount(params.level_count),
            params.noise.to_dynamic(),
            CiphertextModulus::new_native(),
            &mut self.encryption_generator,
        );
        Ok(PackingKeyswitchKey::new(*info, key))
    }
}

fn sorted_by_id<K: DerivedKeyInfo>(keys: &[K]) -> Vec<&K> {
    keys.iter().sorted_by_key(|k| k.id()).collect()
}

fn resolve<'a, K: DerivedKeyInfo>(
    info: &K,
    client: &'a ClientKeyset,
) -> KeysetResult<(&'a SecretKey, &'a SecretKey)> {
    let lookup = |id: KeyId| {
        client.secret_key(id).ok_or_else(|| {
            contract_violation_and_log(format!(
                "{} key {} depends on secret key {id} which was not generated",
                K::KIND,
                info.id()
            ))
        })
    };
    Ok((lookup(info.input_id())?, lookup(info.output_id())?))
}
