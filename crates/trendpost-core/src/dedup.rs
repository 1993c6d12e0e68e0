use std::collections::BTreeSet;
use std::convert::Infallible;

use time::Date;
use tracing::debug;

use crate::LOG_TARGET;
use crate::item::CandidateItem;

/// Durable set of identities that were already handed downstream.
pub trait SeenStore {
    type Error;

    fn is_seen(&self, identity: &str) -> bool;

    /// Persist `item` as seen. Must be durable when it returns `Ok`.
    fn record(&mut self, item: &CandidateItem, processed_date: Date) -> Result<(), Self::Error>;
}

/// In-memory store, nothing survives the process.
impl SeenStore for BTreeSet<String> {
    type Error = Infallible;

    fn is_seen(&self, identity: &str) -> bool {
        self.contains(identity)
    }

    fn record(&mut self, item: &CandidateItem, _processed_date: Date) -> Result<(), Infallible> {
        self.insert(item.identity().to_owned());
        Ok(())
    }
}

/// First candidate, in listing order, whose identity is not in `store`.
pub fn first_unseen<'c, S>(candidates: &'c [CandidateItem], store: &S) -> Option<&'c CandidateItem>
where
    S: SeenStore + ?Sized,
{
    candidates.iter().find(|item| {
        let seen = store.is_seen(item.identity());
        if seen {
            debug!(target: LOG_TARGET, url = %item.url, "Already processed, skipping");
        }
        !seen
    })
}

/// Pick the first unseen candidate and record it before returning it.
///
/// The record happens first, so a crash after this call skips the item on
/// the next run instead of processing it twice. `Ok(None)` means every
/// candidate (possibly zero of them) was already seen; the store is not
/// touched in that case.
pub fn select_first_unseen<S>(
    candidates: &[CandidateItem],
    store: &mut S,
    processed_date: Date,
) -> Result<Option<CandidateItem>, S::Error>
where
    S: SeenStore + ?Sized,
{
    let Some(item) = first_unseen(candidates, store) else {
        return Ok(None);
    };

    store.record(item, processed_date)?;
    Ok(Some(item.clone()))
}
