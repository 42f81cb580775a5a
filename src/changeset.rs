//! Applying a [`Change`] to a [`NetworkParameters`] document.
//!
//! `apply` is a pure function: given the current parameters and a
//! change, it returns the next parameters, with `epoch` incremented and
//! `modified_time` set to `now`. It never touches storage or the
//! network, which is what lets the processor compute the next document,
//! sign it, and only then decide whether to persist it.

use std::collections::BTreeSet;

use jiff::Timestamp;
use netmap_api::{Change, Hash, NetworkParameters};

/// Apply `change` to `params`, returning the resulting document. The
/// input is left untouched; `epoch` is bumped by exactly one and
/// `modified_time` set to `now`, regardless of whether the change was a
/// no-op (an absent `RemoveNotary` target, for instance) — the epoch
/// always advances on a successful call, matching the "every accepted
/// update gets a new epoch" rule.
pub fn apply(params: &NetworkParameters, change: &Change, now: Timestamp) -> NetworkParameters {
    let mut next = params.clone();
    match change {
        Change::AddNotary(info) => {
            if !next.notaries.iter().any(|n| n.identity == info.identity) {
                next.notaries.push(info.clone());
            }
        }
        Change::RemoveNotary { name_hash } => {
            next.notaries
                .retain(|n| Hash::of(n.identity.name.as_bytes()) != *name_hash);
        }
        Change::AppendWhiteList { entries } => {
            for (contract, hashes) in entries {
                next.whitelisted_contracts
                    .entry(contract.clone())
                    .or_insert_with(BTreeSet::new)
                    .extend(hashes.iter().copied());
            }
        }
        Change::ReplaceWhiteList { entries } => {
            next.whitelisted_contracts = entries
                .iter()
                .map(|(contract, hashes)| (contract.clone(), hashes.clone()))
                .collect();
        }
        Change::ClearWhiteList => {
            next.whitelisted_contracts.clear();
        }
    }
    next.epoch += 1;
    next.modified_time = now;
    next
}

/// The content hash `RemoveNotary` targets a notary by.
pub fn notary_name_hash(name: &str) -> Hash {
    Hash::of(name.as_bytes())
}

/// Replace the notary list wholesale, bumping `epoch`/`modified_time` the
/// same way [`apply`] does.
///
/// This is not one of the five [`netmap_api::Change`] variants: the
/// directory watcher derives a whole new notary set from the files on
/// disk rather than adding or removing a single entry, so it has no use
/// for the admin-facing, wire-serializable `Change` sum. It still goes
/// through the processor's normal parameters-update pipeline, just with
/// this transform in place of `apply`.
pub fn replace_notaries(
    params: &NetworkParameters,
    notaries: Vec<netmap_api::NotaryInfo>,
    now: Timestamp,
) -> NetworkParameters {
    let mut next = params.clone();
    next.notaries = notaries;
    next.epoch += 1;
    next.modified_time = now;
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use netmap_api::{LegalIdentity, NotaryInfo};

    fn base_params(now: Timestamp) -> NetworkParameters {
        NetworkParameters::template(now)
    }

    fn notary(name: &str) -> NotaryInfo {
        NotaryInfo {
            identity: LegalIdentity {
                name: name.to_string(),
                owning_key: bytes::Bytes::from_static(b"key"),
            },
            validating: true,
        }
    }

    #[test]
    fn add_notary_appends_and_is_idempotent() {
        let now = Timestamp::from_second(0).unwrap();
        let params = base_params(now);
        let notary_a = notary("Notary A");

        let once = apply(&params, &Change::AddNotary(notary_a.clone()), now);
        assert_eq!(once.notaries, vec![notary_a.clone()]);
        assert_eq!(once.epoch, params.epoch + 1);

        let twice = apply(&once, &Change::AddNotary(notary_a.clone()), now);
        assert_eq!(twice.notaries, vec![notary_a]);
        assert_eq!(twice.epoch, once.epoch + 1, "epoch still advances on a no-op change");
    }

    #[test]
    fn remove_notary_matches_by_name_hash() {
        let now = Timestamp::from_second(0).unwrap();
        let mut params = base_params(now);
        params.notaries.push(notary("Notary A"));
        params.notaries.push(notary("Notary B"));

        let removed = apply(
            &params,
            &Change::RemoveNotary {
                name_hash: notary_name_hash("Notary A"),
            },
            now,
        );
        assert_eq!(removed.notaries, vec![notary("Notary B")]);
    }

    #[test]
    fn append_whitelist_unions_with_existing_entries() {
        let now = Timestamp::from_second(0).unwrap();
        let mut params = base_params(now);
        let existing_hash = Hash::of(b"existing");
        params
            .whitelisted_contracts
            .insert("com.example.Contract".to_string(), BTreeSet::from([existing_hash]));

        let new_hash = Hash::of(b"new");
        let appended = apply(
            &params,
            &Change::AppendWhiteList {
                entries: vec![("com.example.Contract".to_string(), BTreeSet::from([new_hash]))],
            },
            now,
        );

        let entry = &appended.whitelisted_contracts["com.example.Contract"];
        assert!(entry.contains(&existing_hash));
        assert!(entry.contains(&new_hash));
    }

    #[test]
    fn replace_whitelist_discards_prior_entries() {
        let now = Timestamp::from_second(0).unwrap();
        let mut params = base_params(now);
        params
            .whitelisted_contracts
            .insert("com.example.Old".to_string(), BTreeSet::from([Hash::of(b"old")]));

        let replaced = apply(
            &params,
            &Change::ReplaceWhiteList {
                entries: vec![("com.example.New".to_string(), BTreeSet::from([Hash::of(b"new")]))],
            },
            now,
        );

        assert!(!replaced.whitelisted_contracts.contains_key("com.example.Old"));
        assert!(replaced.whitelisted_contracts.contains_key("com.example.New"));
    }

    #[test]
    fn clear_whitelist_empties_the_map() {
        let now = Timestamp::from_second(0).unwrap();
        let mut params = base_params(now);
        params
            .whitelisted_contracts
            .insert("com.example.Contract".to_string(), BTreeSet::from([Hash::of(b"x")]));

        let cleared = apply(&params, &Change::ClearWhiteList, now);
        assert!(cleared.whitelisted_contracts.is_empty());
    }

    #[test]
    fn every_change_bumps_epoch_and_modified_time() {
        let now = Timestamp::from_second(1_000).unwrap();
        let params = base_params(Timestamp::from_second(0).unwrap());
        let next = apply(&params, &Change::ClearWhiteList, now);
        assert_eq!(next.epoch, params.epoch + 1);
        assert_eq!(next.modified_time, now);
    }
}
