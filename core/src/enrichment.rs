//! Forward-fill enrichment and "most recent wins" reducers.
//!
//! RULE: Nothing here mutates its input. Enrichment returns a new
//! sequence so a cached pass and a cold pass always see the same stubs.

use crate::records::{LiveLoad, PayStub};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Fill missing dispatcher / team / company / franchise on each stub from
/// the most recent *prior* stub of the same driver that had the value.
/// Values never flow backwards in time.
///
/// The result is ordered by pay date, then driver, then original position.
pub fn enrich_stubs(stubs: &[PayStub]) -> Vec<PayStub> {
    let mut ordered: Vec<PayStub> = stubs.to_vec();
    ordered.sort_by(|a, b| a.driver.cmp(&b.driver).then(a.pay_date.cmp(&b.pay_date)));

    let mut current: Option<String> = None;
    let mut carry = Carry::default();
    for stub in ordered.iter_mut() {
        if current.as_deref() != Some(stub.driver.as_str()) {
            current = Some(stub.driver.clone());
            carry = Carry::default();
        }
        fill(&mut stub.dispatcher, &mut carry.dispatcher);
        fill(&mut stub.team, &mut carry.team);
        fill(&mut stub.company, &mut carry.company);
        fill(&mut stub.franchise, &mut carry.franchise);
    }

    ordered.sort_by(|a, b| a.pay_date.cmp(&b.pay_date).then(a.driver.cmp(&b.driver)));
    ordered
}

#[derive(Default)]
struct Carry {
    dispatcher: Option<String>,
    team:       Option<String>,
    company:    Option<String>,
    franchise:  Option<String>,
}

fn fill(field: &mut Option<String>, last_known: &mut Option<String>) {
    if field.is_some() {
        last_known.clone_from(field);
    } else {
        field.clone_from(last_known);
    }
}

/// Sort ascending by date and keep, per key, the last item seen.
/// Ties on date keep input order, so the later input wins.
pub fn last_write_wins<'a, T, K, FK, FD>(
    items: impl IntoIterator<Item = &'a T>,
    key: FK,
    date: FD,
) -> BTreeMap<K, &'a T>
where
    T: 'a,
    K: Ord,
    FK: Fn(&'a T) -> Option<K>,
    FD: Fn(&'a T) -> NaiveDate,
{
    let mut ordered: Vec<&'a T> = items.into_iter().collect();
    ordered.sort_by_key(|item| date(*item));

    let mut latest = BTreeMap::new();
    for item in ordered {
        if let Some(k) = key(item) {
            latest.insert(k, item);
        }
    }
    latest
}

/// Each driver's most recent stub.
pub fn latest_stub_by_driver<'a>(
    stubs: impl IntoIterator<Item = &'a PayStub>,
) -> BTreeMap<&'a str, &'a PayStub> {
    last_write_wins(stubs, |s: &'a PayStub| Some(s.driver.as_str()), |s| s.pay_date)
}

/// Driver → dispatcher, folding loads in ascending pickup order so the
/// dispatcher on the latest load wins. Loads without a dispatcher are skipped.
pub fn live_dispatcher_map<'a>(
    loads: impl IntoIterator<Item = &'a LiveLoad>,
) -> BTreeMap<&'a str, &'a str> {
    last_write_wins(
        loads,
        |l: &'a LiveLoad| l.dispatcher.as_ref().map(|_| l.driver.as_str()),
        |l| l.pickup_date,
    )
    .into_values()
    .filter_map(|load| Some((load.driver.as_str(), load.dispatcher.as_deref()?)))
    .collect()
}
