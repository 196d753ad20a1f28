//! Small keysets and helpers shared by the unit and integration tests.

use crate::generation::generate;
use crate::keys::{
    BootstrapKeyInfo, BootstrapKeyParams, KeyId, KeyKind, Keyset, KeysetInfo, KeyswitchKeyInfo,
    KeyswitchKeyParams, NoiseDistribution, PackingKeyswitchKeyInfo, PackingKeyswitchKeyParams,
    SecretKeyInfo, SecretKeyParams,
};
use crate::runtime::KeyTransport;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const SMALL_SEED: u128 = 42;

const SMALL_NOISE: NoiseDistribution = NoiseDistribution::TUniform { bound_log2: 20 };

/// A keyset with one key of each kind, small enough to generate in a few milliseconds.
///
/// Secret key 0 is a 16-dimensional LWE key and secret key 1 doubles as the
/// 1x256 GLWE key of the bootstrap and packing keyswitch keys.
pub fn small_keyset_info() -> KeysetInfo {
    KeysetInfo {
        secret_keys: vec![
            SecretKeyInfo {
                id: 0,
                params: SecretKeyParams { lwe_dimension: 16 },
            },
            SecretKeyInfo {
                id: 1,
                params: SecretKeyParams { lwe_dimension: 256 },
            },
        ],
        bootstrap_keys: vec![BootstrapKeyInfo {
            id: 0,
            input_id: 0,
            output_id: 1,
            params: BootstrapKeyParams {
                level_count: 2,
                base_log: 8,
                glwe_dimension: 1,
                polynomial_size: 256,
                input_lwe_dimension: 16,
                noise: SMALL_NOISE,
            },
        }],
        keyswitch_keys: vec![KeyswitchKeyInfo {
            id: 0,
            input_id: 1,
            output_id: 0,
            params: KeyswitchKeyParams {
                level_count: 3,
                base_log: 4,
                input_lwe_dimension: 256,
                output_lwe_dimension: 16,
                noise: SMALL_NOISE,
            },
        }],
        packing_keyswitch_keys: vec![PackingKeyswitchKeyInfo {
            id: 0,
            input_id: 0,
            output_id: 1,
            params: PackingKeyswitchKeyParams {
                level_count: 2,
                base_log: 10,
                glwe_dimension: 1,
                polynomial_size: 256,
                input_lwe_dimension: 16,
                noise: SMALL_NOISE,
            },
        }],
    }
}

/// [small_keyset_info] together with its keyset generated from [SMALL_SEED].
pub fn small_keyset() -> (KeysetInfo, Keyset) {
    let info = small_keyset_info();
    let keyset = generate(&info, SMALL_SEED).expect("the small keyset info is valid");
    (info, keyset)
}

/// Number of requests a [CountingTransport] forwarded, by key kind.
#[derive(Clone, Default)]
pub struct FetchCounts(Arc<Mutex<HashMap<KeyKind, usize>>>);

impl FetchCounts {
    pub fn get(&self, kind: KeyKind) -> usize {
        self.0
            .lock()
            .expect("counter lock poisoned")
            .get(&kind)
            .copied()
            .unwrap_or_default()
    }

    fn record(&self, kind: KeyKind) {
        *self
            .0
            .lock()
            .expect("counter lock poisoned")
            .entry(kind)
            .or_default() += 1;
    }
}

/// Transport forwarding to another one while counting the requests.
pub struct CountingTransport<T> {
    inner: T,
    calls: FetchCounts,
}

impl<T: KeyTransport> CountingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            calls: FetchCounts::default(),
        }
    }

    pub fn calls(&self) -> FetchCounts {
        self.calls.clone()
    }
}

impl<T: KeyTransport> KeyTransport for CountingTransport<T> {
    fn fetch_key(&self, kind: KeyKind, id: KeyId) -> anyhow::Result<Vec<u8>> {
        self.calls.record(kind);
        self.inner.fetch_key(kind, id)
    }
}
