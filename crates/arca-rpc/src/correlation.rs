use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::types::RpcError;

/// One-shot delivery slot for a single in-flight request.
pub type ResponseSlot = oneshot::Sender<Result<Value, RpcError>>;

/// In-flight request table keyed by JSON-RPC identifier.
///
/// Registration hands the caller a receiver; the response reader resolves the
/// matching slot when a reply arrives. Resolving an identifier that is no
/// longer registered is a no-op, which is how late replies after a timeout
/// are absorbed.
#[derive(Default)]
pub struct CorrelationTable {
    pending: Mutex<BTreeMap<u64, ResponseSlot>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        id: u64,
    ) -> Result<oneshot::Receiver<Result<Value, RpcError>>, RpcError> {
        let (sender, receiver) = oneshot::channel();
        let mut pending = lock_or_recover(&self.pending);
        if pending.contains_key(&id) {
            return Err(RpcError::DuplicateId(id));
        }
        pending.insert(id, sender);
        Ok(receiver)
    }

    /// Delivers `outcome` to the slot registered for `id`. Returns false when
    /// no such slot exists or its caller has already gone away.
    pub fn resolve(&self, id: u64, outcome: Result<Value, RpcError>) -> bool {
        let slot = lock_or_recover(&self.pending).remove(&id);
        match slot {
            Some(sender) => sender.send(outcome).is_ok(),
            None => false,
        }
    }

    pub fn cancel(&self, id: u64) -> bool {
        lock_or_recover(&self.pending).remove(&id).is_some()
    }

    /// Empties the table, handing back every pending slot so the caller can
    /// fail them all after the subprocess is gone.
    pub fn drain(&self) -> Vec<(u64, ResponseSlot)> {
        let mut pending = lock_or_recover(&self.pending);
        std::mem::take(&mut *pending).into_iter().collect()
    }

    pub fn pending_count(&self) -> usize {
        lock_or_recover(&self.pending).len()
    }
}

pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
