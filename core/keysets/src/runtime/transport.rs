use crate::error::anyhow_error_and_log;
use crate::keys::{KeyEntity, KeyId, KeyKind, ServerKeyset};
use std::sync::Arc;

/// Request path from a worker node to the node owning the keyset.
///
/// Implementations block until the key bytes arrive. Retries, if any, are the
/// implementation's business.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait KeyTransport: Send + Sync {
    /// Returns the wire form of the key `id` of the given kind.
    fn fetch_key(&self, kind: KeyKind, id: KeyId) -> anyhow::Result<Vec<u8>>;
}

/// Root-side handler answering key requests out of the root's server keyset.
#[derive(Clone)]
pub struct RootKeyServer {
    keyset: Arc<ServerKeyset>,
}

impl RootKeyServer {
    pub fn new(server_keyset: ServerKeyset) -> Self {
        Self {
            keyset: Arc::new(server_keyset),
        }
    }

    pub fn server_keyset(&self) -> &ServerKeyset {
        &self.keyset
    }
}

fn encode<K: KeyEntity>(key: Option<&K>, id: KeyId) -> anyhow::Result<Vec<u8>> {
    match key {
        Some(key) => Ok(key.to_wire()?),
        None => Err(anyhow_error_and_log(format!(
            "root has no {} key with id {id}",
            K::KIND
        ))),
    }
}

impl KeyTransport for RootKeyServer {
    fn fetch_key(&self, kind: KeyKind, id: KeyId) -> anyhow::Result<Vec<u8>> {
        tracing::debug!("Serving {kind} key {id}");
        match kind {
            KeyKind::Bootstrap => encode(self.keyset.bootstrap_key(id), id),
            KeyKind::Keyswitch => encode(self.keyset.keyswitch_key(id), id),
            KeyKind::PackingKeyswitch => encode(self.keyset.packing_keyswitch_key(id), id),
            KeyKind::Secret => Err(anyhow_error_and_log(format!(
                "secret key {id} requested, secret keys are never served"
            ))),
        }
    }
}
