use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::types::{Facts, RuleId, RuleResult, ValidationError};

pub(crate) type PendingResult = Shared<BoxFuture<'static, RuleResult>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    rule: RuleId,
    facts: Facts,
}

impl CacheKey {
    pub(crate) fn new(rule: RuleId, facts: Facts) -> Self {
        Self { rule, facts }
    }
}

/// Outcome of [`ResultCache::claim`].
pub(crate) enum Claim {
    /// The caller is the first for this key and must run the body.
    Owner(Completion),
    /// Another caller owns the key; the result may still be pending.
    Cached(PendingResult),
}

/// Completes a claimed slot. Dropping it without completing resolves every
/// waiter with a [`ValidationError::TaskAbandoned`] failure.
pub(crate) struct Completion {
    sender: oneshot::Sender<RuleResult>,
}

impl Completion {
    pub(crate) fn complete(self, result: RuleResult) {
        // Every waiter holds the shared receiver, so there is nobody to
        // report a send failure to.
        let _ = self.sender.send(result);
    }
}

/// Single-flight memo of rule results, keyed by rule id and facts value.
///
/// The first caller for a key installs a pending slot and becomes its owner;
/// everyone else shares the owner's outcome.
#[derive(Default)]
pub(crate) struct ResultCache {
    slots: DashMap<CacheKey, PendingResult>,
}

impl ResultCache {
    pub(crate) fn claim(&self, key: CacheKey) -> Claim {
        match self.slots.entry(key) {
            Entry::Occupied(slot) => Claim::Cached(slot.get().clone()),
            Entry::Vacant(slot) => {
                let (sender, receiver) = oneshot::channel();
                let pending = receiver
                    .map(|received| {
                        received.unwrap_or_else(|_| RuleResult::from_error(&ValidationError::TaskAbandoned))
                    })
                    .boxed()
                    .shared();
                slot.insert(pending);
                Claim::Owner(Completion { sender })
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Block the calling thread until a claimed result is available.
pub(crate) fn wait(pending: PendingResult) -> RuleResult {
    if let Some(done) = pending.peek() {
        return done.clone();
    }
    futures::executor::block_on(pending)
}
