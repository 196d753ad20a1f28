use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

pub mod entities;
pub mod info;
pub mod keyset;

pub use entities::{BootstrapKey, KeyEntity, KeyswitchKey, PackingKeyswitchKey, SecretKey};
pub use info::{
    BootstrapKeyInfo, BootstrapKeyParams, KeysetInfo, KeyswitchKeyInfo, KeyswitchKeyParams,
    NoiseDistribution, PackingKeyswitchKeyInfo, PackingKeyswitchKeyParams, SecretKeyInfo,
    SecretKeyParams,
};
pub use keyset::{ClientKeyset, Keyset, ServerKeyset};

/// Identifier of a key, unique within its [KeyKind].
pub type KeyId = u32;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
pub enum KeyKind {
    #[strum(serialize = "secret")]
    Secret,
    #[strum(serialize = "bootstrap")]
    Bootstrap,
    #[strum(serialize = "keyswitch")]
    Keyswitch,
    #[strum(serialize = "packing keyswitch")]
    PackingKeyswitch,
}

impl KeyKind {
    /// Prefix of the file holding a key of this kind inside a keyset directory.
    pub fn file_prefix(&self) -> &'static str {
        match self {
            KeyKind::Secret => "secretKey",
            KeyKind::Bootstrap => "pbsKey",
            KeyKind::Keyswitch => "ksKey",
            KeyKind::PackingKeyswitch => "pksKey",
        }
    }

    pub fn file_name(&self, id: KeyId) -> String {
        format!("{}_{}", self.file_prefix(), id)
    }
}
