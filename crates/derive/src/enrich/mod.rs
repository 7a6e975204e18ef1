//! The [StateEnricher] correlates sector proof events with the manifest of the message that
//! proved them.

use crate::{
    errors::EnrichError,
    registry::{BatchReturn, SchemaRegistry, SectorManifest},
    traits::ChainApi,
    types::{DdoExtra, DecodedEvent, ManifestPiece},
};
use std::sync::Arc;
use tracing::{debug, warn};

mod methods;
pub use methods::{
    ProveMethod, F05_ADDRESS, PROVE_COMMIT_AGGREGATE, PROVE_COMMIT_SECTORS3,
    PROVE_REPLICA_UPDATES3,
};

/// How far back `StateSearchMsg` may look for the execution of a prove message, in epochs.
pub const SEARCH_LIMIT: i64 = 10;

/// Enriches `sector-activated` and `sector-updated` events with piece manifests.
#[derive(Debug)]
pub struct StateEnricher<A: ChainApi> {
    api: Arc<A>,
    registry: Arc<SchemaRegistry>,
}

impl<A: ChainApi> StateEnricher<A> {
    /// Creates a new [StateEnricher].
    pub const fn new(api: Arc<A>, registry: Arc<SchemaRegistry>) -> Self {
        Self { api, registry }
    }

    /// Derives the piece manifest of the sector an event refers to.
    ///
    /// Returns `Ok(None)` when the event is not enrichable, when the sector was proven with the
    /// legacy aggregate method, or when the message data cannot be matched to the sector.
    pub async fn enrich(&self, event: &DecodedEvent) -> Result<Option<DdoExtra>, EnrichError> {
        let Some(expected) = ProveMethod::for_kind(event.kind) else {
            return Ok(None);
        };
        if event.unsealed_cid().is_none() {
            return Ok(None);
        }
        let sector = event.sector().ok_or(EnrichError::MissingSector(event.kind))?;

        // Chain state queries resolve against the parent of the requested tipset.
        let (tipset, message) = futures::try_join!(
            self.api.tipset_by_height(event.height + 1),
            self.api.chain_get_message(&event.msg_cid),
        )?;

        match ProveMethod::from_number(message.method) {
            Some(method) if method == expected => {}
            Some(ProveMethod::ProveCommitAggregate) => {
                debug!(
                    target: "enricher",
                    msg = %event.msg_cid,
                    sector,
                    "Skipping sector proven with ProveCommitAggregate"
                );
                return Ok(None);
            }
            _ => {
                return Err(EnrichError::UnexpectedMethod {
                    kind: event.kind,
                    method: message.method,
                    msg: event.msg_cid,
                })
            }
        }

        let params = message.params.as_deref().unwrap_or_default();
        let manifests = match expected.decode_manifests(&self.registry, params) {
            Ok(manifests) => manifests,
            Err(err) => {
                warn!(
                    target: "enricher",
                    msg = %event.msg_cid,
                    "Failed to decode {} params: {err}",
                    expected.name()
                );
                return Ok(None);
            }
        };

        let lookup = self
            .api
            .state_search_msg(&tipset.cids, &event.msg_cid, SEARCH_LIMIT, true)
            .await?
            .ok_or(EnrichError::MissingReceipt(event.msg_cid))?;
        let return_data = lookup
            .receipt
            .return_data
            .as_deref()
            .ok_or(EnrichError::MalformedReceipt(event.msg_cid))?;

        let batch = match self.registry.decode_aux::<BatchReturn>(return_data) {
            Ok(batch) => batch,
            Err(err) => {
                warn!(
                    target: "enricher",
                    msg = %event.msg_cid,
                    "Failed to decode {} return: {err}",
                    expected.name()
                );
                return Ok(None);
            }
        };

        let Some(manifest) = select_manifest(manifests, &batch, sector) else {
            warn!(
                target: "enricher",
                msg = %event.msg_cid,
                sector,
                "Expected exactly one manifest for sector in {} params",
                expected.name()
            );
            return Ok(None);
        };

        let pieces = manifest
            .pieces
            .into_iter()
            .map(|piece| {
                let f05 = piece.notify.iter().any(|addr| addr.as_slice() == F05_ADDRESS);
                if piece.notify.iter().any(|addr| addr.as_slice() != F05_ADDRESS) {
                    warn!(
                        target: "enricher",
                        msg = %event.msg_cid,
                        sector,
                        piece = %piece.cid,
                        "Piece notifies an actor other than f05"
                    );
                }
                ManifestPiece {
                    cid: piece.cid,
                    size: piece.size,
                    verified: piece.verified_allocation_key.is_some(),
                    f05,
                }
            })
            .collect();

        Ok(Some(DdoExtra { method: expected.number(), pieces }))
    }
}

/// Drops the manifests that failed in the batch and picks the single one for `sector`.
fn select_manifest(
    manifests: Vec<SectorManifest>,
    batch: &BatchReturn,
    sector: u64,
) -> Option<SectorManifest> {
    let mut matching = manifests
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !batch.failed(*i))
        .map(|(_, m)| m)
        .filter(|m| m.sector == sector);
    let manifest = matching.next()?;
    matching.next().is_none().then_some(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        decoder::EventDecoder,
        errors::ProviderError,
        ipld::Ipld,
        test_utils::{
            batch_return, collect_traces, entry, prove_commit_sectors3, prove_replica_updates3,
            raw_event, sector_activated, test_cid, type_entry, TestChainApi, F05,
        },
        types::{EventKind, TipSet},
    };
    use tracing::Level;

    const HEIGHT: u64 = 100;

    fn setup() -> (Arc<TestChainApi>, StateEnricher<TestChainApi>, EventDecoder) {
        let registry = Arc::new(SchemaRegistry::builtin());
        let api = Arc::new(TestChainApi::default());
        api.insert_tipset(TipSet { cids: vec![test_cid("next")], height: HEIGHT + 1 });
        let enricher = StateEnricher::new(api.clone(), registry.clone());
        (api, enricher, EventDecoder::new(registry))
    }

    fn activated(decoder: &EventDecoder, sector: u64) -> DecodedEvent {
        decoder.decode(&sector_activated(HEIGHT, "msg", sector)).unwrap()
    }

    #[tokio::test]
    async fn test_enrich_prove_commit_sectors3() {
        let (api, enricher, decoder) = setup();
        let params = prove_commit_sectors3(&[
            (7, vec![(test_cid("other"), 1024, None, vec![])]),
            (
                9,
                vec![
                    (test_cid("piece"), 2048, Some((1000, 1)), vec![F05.to_vec()]),
                    (test_cid("piece-2"), 4096, None, vec![]),
                ],
            ),
        ]);
        api.insert_message(test_cid("msg"), PROVE_COMMIT_SECTORS3, Some(params));
        api.insert_receipt(test_cid("msg"), Some(batch_return(2, &[])), HEIGHT);

        let extra = enricher.enrich(&activated(&decoder, 9)).await.unwrap().unwrap();
        assert_eq!(extra.method, PROVE_COMMIT_SECTORS3);
        assert_eq!(
            extra.pieces,
            vec![
                ManifestPiece { cid: test_cid("piece"), size: 2048, verified: true, f05: true },
                ManifestPiece { cid: test_cid("piece-2"), size: 4096, verified: false, f05: false },
            ]
        );

        let searches = api.searches.lock().clone();
        assert_eq!(searches, vec![(vec![test_cid("next")], test_cid("msg"), SEARCH_LIMIT, true)]);
    }

    #[tokio::test]
    async fn test_enrich_prove_replica_updates3() {
        let (api, enricher, decoder) = setup();
        let params = prove_replica_updates3(&[(3, vec![(test_cid("piece"), 2048, None, vec![])])]);
        api.insert_message(test_cid("msg"), PROVE_REPLICA_UPDATES3, Some(params));
        api.insert_receipt(test_cid("msg"), Some(batch_return(1, &[])), HEIGHT);

        let raw = raw_event(
            HEIGHT,
            "msg",
            vec![
                type_entry("sector-updated"),
                entry("sector", Ipld::from(3)),
                entry("unsealed-cid", Ipld::Link(test_cid("unsealed"))),
                entry("piece-cid", Ipld::Link(test_cid("piece"))),
                entry("piece-size", Ipld::from(2048)),
            ],
        );
        let event = decoder.decode(&raw).unwrap();
        let extra = enricher.enrich(&event).await.unwrap().unwrap();
        assert_eq!(extra.method, PROVE_REPLICA_UPDATES3);
        assert_eq!(extra.pieces.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_entries_are_dropped() {
        let (api, enricher, decoder) = setup();
        let params = prove_commit_sectors3(&[
            (9, vec![(test_cid("failed"), 1024, None, vec![])]),
            (9, vec![(test_cid("piece"), 2048, None, vec![])]),
        ]);
        api.insert_message(test_cid("msg"), PROVE_COMMIT_SECTORS3, Some(params));
        api.insert_receipt(test_cid("msg"), Some(batch_return(1, &[(0, 16)])), HEIGHT);

        let extra = enricher.enrich(&activated(&decoder, 9)).await.unwrap().unwrap();
        assert_eq!(extra.pieces[0].cid, test_cid("piece"));
    }

    #[tokio::test]
    async fn test_ambiguous_manifest_is_soft() {
        let (api, enricher, decoder) = setup();
        let params = prove_commit_sectors3(&[(9, vec![]), (9, vec![])]);
        api.insert_message(test_cid("msg"), PROVE_COMMIT_SECTORS3, Some(params));
        api.insert_receipt(test_cid("msg"), Some(batch_return(2, &[])), HEIGHT);

        let (traces, _guard) = collect_traces();
        assert_eq!(enricher.enrich(&activated(&decoder, 9)).await, Ok(None));
        let warnings = traces.get_by_level(Level::WARN);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Expected exactly one manifest"));
    }

    #[tokio::test]
    async fn test_missing_sector_is_soft() {
        let (api, enricher, decoder) = setup();
        let params = prove_commit_sectors3(&[(7, vec![])]);
        api.insert_message(test_cid("msg"), PROVE_COMMIT_SECTORS3, Some(params));
        api.insert_receipt(test_cid("msg"), Some(batch_return(1, &[])), HEIGHT);
        assert_eq!(enricher.enrich(&activated(&decoder, 9)).await, Ok(None));
    }

    #[tokio::test]
    async fn test_non_f05_notification_is_logged() {
        let (api, enricher, decoder) = setup();
        let params = prove_commit_sectors3(&[(
            9,
            vec![(test_cid("piece"), 2048, None, vec![vec![0x00, 0xe8, 0x07]])],
        )]);
        api.insert_message(test_cid("msg"), PROVE_COMMIT_SECTORS3, Some(params));
        api.insert_receipt(test_cid("msg"), Some(batch_return(1, &[])), HEIGHT);

        let (traces, _guard) = collect_traces();
        let extra = enricher.enrich(&activated(&decoder, 9)).await.unwrap().unwrap();
        assert!(!extra.pieces[0].f05);
        assert_eq!(traces.get_by_target("enricher").len(), 1);
    }

    #[tokio::test]
    async fn test_f05_alongside_other_notification() {
        let (api, enricher, decoder) = setup();
        let notify = vec![vec![0x00, 0xe8, 0x07], F05.to_vec()];
        let params =
            prove_commit_sectors3(&[(9, vec![(test_cid("piece"), 2048, Some((1000, 1)), notify)])]);
        api.insert_message(test_cid("msg"), PROVE_COMMIT_SECTORS3, Some(params));
        api.insert_receipt(test_cid("msg"), Some(batch_return(1, &[])), HEIGHT);

        let (traces, _guard) = collect_traces();
        let extra = enricher.enrich(&activated(&decoder, 9)).await.unwrap().unwrap();
        assert_eq!(
            extra.pieces,
            vec![ManifestPiece { cid: test_cid("piece"), size: 2048, verified: true, f05: true }]
        );
        let warnings = traces.get_by_level(Level::WARN);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Piece notifies an actor other than f05"));
        assert!(traces.get_by_level(Level::ERROR).is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_params_are_soft() {
        let (api, enricher, decoder) = setup();
        api.insert_message(test_cid("msg"), PROVE_COMMIT_SECTORS3, Some(vec![0x80]));
        api.insert_receipt(test_cid("msg"), Some(batch_return(1, &[])), HEIGHT);
        assert_eq!(enricher.enrich(&activated(&decoder, 9)).await, Ok(None));
    }

    #[tokio::test]
    async fn test_undecodable_return_is_soft() {
        let (api, enricher, decoder) = setup();
        let params = prove_commit_sectors3(&[(9, vec![])]);
        api.insert_message(test_cid("msg"), PROVE_COMMIT_SECTORS3, Some(params));
        api.insert_receipt(test_cid("msg"), Some(vec![0x01]), HEIGHT);
        assert_eq!(enricher.enrich(&activated(&decoder, 9)).await, Ok(None));
    }

    #[tokio::test]
    async fn test_legacy_aggregate_is_skipped() {
        let (api, enricher, decoder) = setup();
        api.insert_message(test_cid("msg"), PROVE_COMMIT_AGGREGATE, None);
        assert_eq!(enricher.enrich(&activated(&decoder, 9)).await, Ok(None));
        assert!(api.searches.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unexpected_method() {
        let (api, enricher, decoder) = setup();
        api.insert_message(test_cid("msg"), PROVE_REPLICA_UPDATES3, None);
        let err = enricher.enrich(&activated(&decoder, 9)).await.unwrap_err();
        assert_eq!(
            err,
            EnrichError::UnexpectedMethod {
                kind: EventKind::SectorActivated,
                method: PROVE_REPLICA_UPDATES3,
                msg: test_cid("msg"),
            }
        );
        assert!(err.is_format());
    }

    #[tokio::test]
    async fn test_missing_receipt() {
        let (api, enricher, decoder) = setup();
        let params = prove_commit_sectors3(&[(9, vec![])]);
        api.insert_message(test_cid("msg"), PROVE_COMMIT_SECTORS3, Some(params));
        assert_eq!(
            enricher.enrich(&activated(&decoder, 9)).await,
            Err(EnrichError::MissingReceipt(test_cid("msg")))
        );
    }

    #[tokio::test]
    async fn test_receipt_without_return() {
        let (api, enricher, decoder) = setup();
        let params = prove_commit_sectors3(&[(9, vec![])]);
        api.insert_message(test_cid("msg"), PROVE_COMMIT_SECTORS3, Some(params));
        api.insert_receipt(test_cid("msg"), None, HEIGHT);
        assert_eq!(
            enricher.enrich(&activated(&decoder, 9)).await,
            Err(EnrichError::MalformedReceipt(test_cid("msg")))
        );
    }

    #[tokio::test]
    async fn test_not_enrichable() {
        let (api, enricher, decoder) = setup();
        let deal = raw_event(
            HEIGHT,
            "msg",
            vec![type_entry("deal-activated"), entry("id", Ipld::from(1))],
        );
        assert_eq!(enricher.enrich(&decoder.decode(&deal).unwrap()).await, Ok(None));

        let no_data = raw_event(
            HEIGHT,
            "msg",
            vec![
                type_entry("sector-activated"),
                entry("sector", Ipld::from(9)),
                entry("unsealed-cid", Ipld::Null),
            ],
        );
        assert_eq!(enricher.enrich(&decoder.decode(&no_data).unwrap()).await, Ok(None));
        assert!(api.queried_windows().is_empty());
        assert!(api.searches.lock().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let (_api, enricher, decoder) = setup();
        let err = enricher.enrich(&activated(&decoder, 9)).await.unwrap_err();
        assert!(matches!(err, EnrichError::Provider(ProviderError::Response(_))));
        assert!(!err.is_format());
    }
}
