use super::info::{
    BootstrapKeyInfo, KeyswitchKeyInfo, PackingKeyswitchKeyInfo, SecretKeyInfo,
};
use super::{KeyId, KeyKind};
use crate::wire::Wire;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tfhe::core_crypto::prelude::{
    GlweSecretKey, LweBootstrapKeyOwned, LweKeyswitchKeyOwned, LwePackingKeyswitchKeyOwned,
    LweSecretKeyOwned, PolynomialSize,
};

/// A key together with the info it was generated from.
///
/// The info travels with the key on the wire so that a reader can check it
/// received the key it asked for.
pub trait KeyEntity: Wire + Clone + Debug + Send + Sync {
    const KIND: KeyKind;
    type Info: PartialEq + Debug;

    fn info(&self) -> &Self::Info;
    fn id(&self) -> KeyId;
    /// The raw standard-domain coefficients.
    fn raw(&self) -> &[u64];
}

/// A binary LWE secret key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecretKey {
    info: SecretKeyInfo,
    key: LweSecretKeyOwned<u64>,
}

impl SecretKey {
    pub fn new(info: SecretKeyInfo, key: LweSecretKeyOwned<u64>) -> Self {
        Self { info, key }
    }

    pub fn key(&self) -> &LweSecretKeyOwned<u64> {
        &self.key
    }

    /// Reads the key as a GLWE secret key with the given polynomial size.
    ///
    /// The caller must have checked that the dimension is a multiple of `polynomial_size`.
    pub fn as_glwe(&self, polynomial_size: usize) -> GlweSecretKey<&[u64]> {
        GlweSecretKey::from_container(self.key.as_ref(), PolynomialSize(polynomial_size))
    }
}

/// A bootstrap key in the standard domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BootstrapKey {
    info: BootstrapKeyInfo,
    key: LweBootstrapKeyOwned<u64>,
}

impl BootstrapKey {
    pub fn new(info: BootstrapKeyInfo, key: LweBootstrapKeyOwned<u64>) -> Self {
        Self { info, key }
    }

    pub fn key(&self) -> &LweBootstrapKeyOwned<u64> {
        &self.key
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyswitchKey {
    info: KeyswitchKeyInfo,
    key: LweKeyswitchKeyOwned<u64>,
}

impl KeyswitchKey {
    pub fn new(info: KeyswitchKeyInfo, key: LweKeyswitchKeyOwned<u64>) -> Self {
        Self { info, key }
    }

    pub fn key(&self) -> &LweKeyswitchKeyOwned<u64> {
        &self.key
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackingKeyswitchKey {
    info: PackingKeyswitchKeyInfo,
    key: LwePackingKeyswitchKeyOwned<u64>,
}

impl PackingKeyswitchKey {
    pub fn new(info: PackingKeyswitchKeyInfo, key: LwePackingKeyswitchKeyOwned<u64>) -> Self {
        Self { info, key }
    }

    pub fn key(&self) -> &LwePackingKeyswitchKeyOwned<u64> {
        &self.key
    }
}

macro_rules! impl_key_entity {
    ($entity:ty, $info:ty, $kind:expr) => {
        impl Wire for $entity {}

        impl KeyEntity for $entity {
            const KIND: KeyKind = $kind;
            type Info = $info;

            fn info(&self) -> &Self::Info {
                &self.info
            }

            fn id(&self) -> KeyId {
                self.info.id
            }

            fn raw(&self) -> &[u64] {
                self.key.as_ref()
            }
        }
    };
}

impl_key_entity!(SecretKey, SecretKeyInfo, KeyKind::Secret);
impl_key_entity!(BootstrapKey, BootstrapKeyInfo, KeyKind::Bootstrap);
impl_key_entity!(KeyswitchKey, KeyswitchKeyInfo, KeyKind::Keyswitch);
impl_key_entity!(
    PackingKeyswitchKey,
    PackingKeyswitchKeyInfo,
    KeyKind::PackingKeyswitch
);
