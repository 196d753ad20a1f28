//! Execution-ready view of a server keyset.
//!
//! A [RuntimeContext] is the single place the evaluation engine asks for key
//! material by id. Bootstrap keys are served in the Fourier domain together
//! with their FFT plan; keyswitch and packing keyswitch keys are served raw.
//! Every accessor hands out a reference-counted read-only handle, so callers
//! may keep it for as long as they need without borrowing the context.

use crate::error::{KeysetError, KeysetResult};
use crate::keys::{KeyEntity, KeyId, KeyKind, KeyswitchKey, PackingKeyswitchKey, ServerKeyset};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

pub mod distributed;
pub mod fourier;
pub mod transport;

pub use distributed::NodeRole;
pub use fourier::{FftHandle, FourierBootstrapKey, FourierBootstrapKeyBuffer};
pub use transport::{KeyTransport, RootKeyServer};

use distributed::WorkerKeys;

/// Shared read-only view of the raw coefficients of a key.
pub struct KeyBuffer<K>(Arc<K>);

impl<K> Clone for KeyBuffer<K> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<K> KeyBuffer<K> {
    pub fn key(&self) -> &K {
        &self.0
    }
}

impl<K: KeyEntity> Deref for KeyBuffer<K> {
    type Target = [u64];

    fn deref(&self) -> &Self::Target {
        self.0.raw()
    }
}

pub type KeyswitchKeyBuffer = KeyBuffer<KeyswitchKey>;
pub type PackingKeyswitchKeyBuffer = KeyBuffer<PackingKeyswitchKey>;

/// Keys held by a context, by kind and id.
#[derive(Default)]
pub(crate) struct ContextKeys {
    pub(crate) bootstrap: HashMap<KeyId, Arc<FourierBootstrapKey>>,
    pub(crate) keyswitch: HashMap<KeyId, Arc<KeyswitchKey>>,
    pub(crate) packing_keyswitch: HashMap<KeyId, Arc<PackingKeyswitchKey>>,
}

impl ContextKeys {
    fn from_server_keyset(server_keyset: ServerKeyset) -> Self {
        let bootstrap = server_keyset
            .bootstrap_keys
            .iter()
            .map(|bsk| (bsk.id(), Arc::new(FourierBootstrapKey::convert(bsk))))
            .collect();
        let keyswitch = server_keyset
            .keyswitch_keys
            .into_iter()
            .map(|ksk| (ksk.id(), Arc::new(ksk)))
            .collect();
        let packing_keyswitch = server_keyset
            .packing_keyswitch_keys
            .into_iter()
            .map(|pksk| (pksk.id(), Arc::new(pksk)))
            .collect();
        Self {
            bootstrap,
            keyswitch,
            packing_keyswitch,
        }
    }

    fn len(&self) -> usize {
        self.bootstrap.len() + self.keyswitch.len() + self.packing_keyswitch.len()
    }
}

fn lookup<V: Clone>(map: &HashMap<KeyId, V>, kind: KeyKind, id: KeyId) -> KeysetResult<V> {
    map.get(&id)
        .cloned()
        .ok_or(KeysetError::UnknownKey { kind, id })
}

enum Capability {
    Local(ContextKeys),
    Worker(WorkerKeys),
}

pub struct RuntimeContext {
    capability: Capability,
}

impl RuntimeContext {
    /// Builds a context owning every key of `server_keyset`.
    ///
    /// All bootstrap keys are converted to the Fourier domain here, so the
    /// accessors never compute anything afterwards.
    pub fn new(server_keyset: ServerKeyset) -> Self {
        let keys = ContextKeys::from_server_keyset(server_keyset);
        tracing::info!(
            "Runtime context ready with {} bootstrap keys, {} keyswitch keys and {} packing keyswitch keys",
            keys.bootstrap.len(),
            keys.keyswitch.len(),
            keys.packing_keyswitch.len()
        );
        Self {
            capability: Capability::Local(keys),
        }
    }

    /// Builds a context for one node of a distributed execution.
    ///
    /// The root owns the keyset and behaves as [RuntimeContext::new]. A worker
    /// starts empty and fetches each key from the root the first time it is asked for.
    pub fn distributed(role: NodeRole) -> Self {
        match role {
            NodeRole::Root(server_keyset) => Self::new(server_keyset),
            NodeRole::Worker(transport) => Self {
                capability: Capability::Worker(WorkerKeys::new(transport)),
            },
        }
    }

    pub fn is_worker(&self) -> bool {
        matches!(self.capability, Capability::Worker(_))
    }

    /// Number of keys a worker obtained from the root so far. Always zero on a local context.
    pub fn fetched_keys(&self) -> usize {
        match &self.capability {
            Capability::Local(_) => 0,
            Capability::Worker(worker) => worker.len(),
        }
    }

    fn bootstrap_entry(&self, id: KeyId) -> KeysetResult<Arc<FourierBootstrapKey>> {
        match &self.capability {
            Capability::Local(keys) => lookup(&keys.bootstrap, KeyKind::Bootstrap, id),
            Capability::Worker(worker) => worker.bootstrap_key(id),
        }
    }

    pub fn keyswitch_key_buffer(&self, id: KeyId) -> KeysetResult<KeyswitchKeyBuffer> {
        let key = match &self.capability {
            Capability::Local(keys) => lookup(&keys.keyswitch, KeyKind::Keyswitch, id)?,
            Capability::Worker(worker) => worker.keyswitch_key(id)?,
        };
        Ok(KeyBuffer(key))
    }

    pub fn fourier_bootstrap_key_buffer(
        &self,
        id: KeyId,
    ) -> KeysetResult<FourierBootstrapKeyBuffer> {
        Ok(FourierBootstrapKeyBuffer(self.bootstrap_entry(id)?))
    }

    pub fn packing_keyswitch_key_buffer(
        &self,
        id: KeyId,
    ) -> KeysetResult<PackingKeyswitchKeyBuffer> {
        let key = match &self.capability {
            Capability::Local(keys) => {
                lookup(&keys.packing_keyswitch, KeyKind::PackingKeyswitch, id)?
            }
            Capability::Worker(worker) => worker.packing_keyswitch_key(id)?,
        };
        Ok(KeyBuffer(key))
    }

    /// FFT plan of the bootstrap key `id`.
    pub fn fft(&self, id: KeyId) -> KeysetResult<FftHandle> {
        Ok(FftHandle(self.bootstrap_entry(id)?))
    }
}
