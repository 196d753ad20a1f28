use super::entities::{BootstrapKey, KeyEntity, KeyswitchKey, PackingKeyswitchKey, SecretKey};
use super::info::KeysetInfo;
use super::KeyId;
use crate::wire::Wire;
use serde::{Deserialize, Serialize};

/// The secret keys of a keyset, ordered by id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientKeyset {
    pub secret_keys: Vec<SecretKey>,
}

impl ClientKeyset {
    pub fn secret_key(&self, id: KeyId) -> Option<&SecretKey> {
        self.secret_keys.iter().find(|k| k.id() == id)
    }
}

/// The evaluation keys of a keyset, each sequence ordered by id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerKeyset {
    pub bootstrap_keys: Vec<BootstrapKey>,
    pub keyswitch_keys: Vec<KeyswitchKey>,
    pub packing_keyswitch_keys: Vec<PackingKeyswitchKey>,
}

impl ServerKeyset {
    pub fn bootstrap_key(&self, id: KeyId) -> Option<&BootstrapKey> {
        self.bootstrap_keys.iter().find(|k| k.id() == id)
    }

    pub fn keyswitch_key(&self, id: KeyId) -> Option<&KeyswitchKey> {
        self.keyswitch_keys.iter().find(|k| k.id() == id)
    }

    pub fn packing_keyswitch_key(&self, id: KeyId) -> Option<&PackingKeyswitchKey> {
        self.packing_keyswitch_keys.iter().find(|k| k.id() == id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Keyset {
    pub client: ClientKeyset,
    pub server: ServerKeyset,
}

impl Keyset {
    /// Rebuilds the info describing this keyset.
    pub fn info(&self) -> KeysetInfo {
        KeysetInfo {
            secret_keys: self.client.secret_keys.iter().map(|k| *k.info()).collect(),
            bootstrap_keys: self.server.bootstrap_keys.iter().map(|k| *k.info()).collect(),
            keyswitch_keys: self.server.keyswitch_keys.iter().map(|k| *k.info()).collect(),
            packing_keyswitch_keys: self
                .server
                .packing_keyswitch_keys
                .iter()
                .map(|k| *k.info())
                .collect(),
        }
    }
}

impl Wire for ClientKeyset {}
impl Wire for ServerKeyset {}
impl Wire for Keyset {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::small_keyset;

    #[test]
    fn info_is_recovered_from_keyset() {
        let (info, keyset) = small_keyset();
        assert_eq!(keyset.info(), info);
    }

    #[test]
    fn server_keyset_blob() {
        let (_, keyset) = small_keyset();
        let blob = keyset.server.to_wire().unwrap();
        let back = ServerKeyset::from_wire(&blob).unwrap();
        assert_eq!(back, keyset.server);
        assert!(ServerKeyset::from_wire(&blob[..blob.len() / 2]).is_err());
    }

    #[test]
    fn lookups_by_id() {
        let (_, keyset) = small_keyset();
        assert!(keyset.client.secret_key(1).is_some());
        assert!(keyset.client.secret_key(7).is_none());
        assert!(keyset.server.bootstrap_key(0).is_some());
        assert!(keyset.server.keyswitch_key(0).is_some());
        assert!(keyset.server.packing_keyswitch_key(0).is_some());
        assert!(keyset.server.packing_keyswitch_key(1).is_none());
    }
}
