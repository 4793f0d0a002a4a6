mod common;

use common::{FlakyProvider, ScriptedProvider, name, nsec_example, zone_from_listing};
use std::sync::Arc;
use zonewalk::WalkConfig;
use zonewalk::dns::{ChainRecord, DomainName, NsecRecord, RecordType, ResponseStatus, TypeSet};
use zonewalk::output::ZoneTextWriter;
use zonewalk::provider::{Denial, QueryResponse, ResponseRecord};
use zonewalk::scan::{ScanType, Severity};
use zonewalk::sink::{MemorySink, ScanSink};
use zonewalk::walk::{
    AbortReason, NsecWalker, Recorder, SinkBinding, WalkStatus, ZoneType, cancel_pair,
};

fn owners(records: &[ChainRecord]) -> Vec<String> {
    records.iter().map(|r| r.owner().to_string()).collect()
}

fn nsec(owner: &str, next: &str) -> QueryResponse {
    QueryResponse::new(ResponseStatus::NxDomain).with_record(ResponseRecord::Nsec(NsecRecord::new(
        name(owner),
        name(next),
        300,
        TypeSet::new(),
    )))
}

#[tokio::test]
async fn test_walks_every_owner_once_in_canonical_order() {
    let zone = nsec_example();
    let config = WalkConfig::default();
    let mut recorder = Recorder::detached();

    let outcome = NsecWalker::new(name("example."), &zone, &config)
        .walk(&mut recorder)
        .await
        .unwrap();

    assert_eq!(outcome.status, WalkStatus::Closed);
    assert_eq!(
        owners(&outcome.records),
        vec![
            "example.",
            "a.example.",
            "x.a.example.",
            "yljkjljk.a.example.",
            "ns1.example.",
            "host.sub.example.",
            "z.example.",
        ]
    );
    assert_eq!(outcome.queries, 7);
    assert_eq!(zone.query_count(), 7);

    let mut sorted: Vec<DomainName> = outcome.records.iter().map(|r| r.owner().clone()).collect();
    sorted.sort();
    assert_eq!(
        sorted,
        outcome.records.iter().map(|r| r.owner().clone()).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_apex_only_zone_closes_immediately() {
    let zone = zone_from_listing("example.", Denial::Nsec, "");
    let config = WalkConfig::default();
    let mut recorder = Recorder::detached();

    let outcome = NsecWalker::new(name("example."), &zone, &config)
        .walk(&mut recorder)
        .await
        .unwrap();

    assert_eq!(outcome.status, WalkStatus::Closed);
    assert_eq!(outcome.records.len(), 1);
    match &outcome.records[0] {
        ChainRecord::Nsec(rec) => {
            assert_eq!(rec.next_owner, name("example."));
            assert!(rec.types.contains(&RecordType::SOA));
        }
        other => panic!("expected NSEC, got {:?}", other),
    }
}

#[tokio::test]
async fn test_loop_aborts_after_bounded_retries() {
    // b.example. points back to the already visited a.example.
    let provider = ScriptedProvider::new(|_, qname, _| {
        if *qname == name("\\000.example.") {
            Ok(nsec("example.", "a.example."))
        } else if *qname == name("\\000.a.example.") {
            Ok(nsec("a.example.", "b.example."))
        } else {
            Ok(nsec("b.example.", "a.example."))
        }
    });
    let config = WalkConfig::default();
    let mut recorder = Recorder::detached();

    let outcome = NsecWalker::new(name("example."), &provider, &config)
        .walk(&mut recorder)
        .await
        .unwrap();

    assert_eq!(owners(&outcome.records), vec!["example.", "a.example."]);
    assert_eq!(
        outcome.status,
        WalkStatus::Aborted(AbortReason::NoProgress {
            frontier: "b.example.".to_string(),
            retries: 3,
        })
    );
    // two accepted probes, then the first attempt plus three retries
    assert_eq!(provider.query_count(), 6);
    let warning = recorder.entries().last().unwrap();
    assert_eq!(warning.severity, Severity::Warning);
}

#[tokio::test]
async fn test_next_owner_outside_zone_is_not_followed() {
    let provider = ScriptedProvider::new(|_, _, _| Ok(nsec("example.", "www.example.org.")));
    let config = WalkConfig {
        max_no_progress_retries: 1,
        ..Default::default()
    };
    let mut recorder = Recorder::detached();

    let outcome = NsecWalker::new(name("example."), &provider, &config)
        .walk(&mut recorder)
        .await
        .unwrap();

    assert!(outcome.records.is_empty());
    assert!(matches!(
        outcome.status,
        WalkStatus::Aborted(AbortReason::NoProgress { .. })
    ));
    assert_eq!(provider.query_count(), 2);
}

#[tokio::test]
async fn test_query_failure_aborts_with_partial_chain() {
    let provider = ScriptedProvider::new(|i, _, _| {
        if i == 0 {
            Ok(nsec("example.", "a.example."))
        } else {
            Ok(QueryResponse::new(ResponseStatus::ServFail))
        }
    });
    let config = WalkConfig::default();
    let mut recorder = Recorder::detached();

    let outcome = NsecWalker::new(name("example."), &provider, &config)
        .walk(&mut recorder)
        .await
        .unwrap();

    assert_eq!(owners(&outcome.records), vec!["example."]);
    match &outcome.status {
        WalkStatus::Aborted(AbortReason::QueryFailed { name: failed, .. }) => {
            assert_eq!(*failed, name("\\000.a.example."));
        }
        other => panic!("unexpected status {:?}", other),
    }
    // one success, then the failing query and its two retries
    assert_eq!(provider.query_count(), 4);
    assert_eq!(recorder.entries().last().unwrap().severity, Severity::Error);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let provider = FlakyProvider::new(nsec_example(), 2);
    let config = WalkConfig::default();
    let mut recorder = Recorder::detached();

    let outcome = NsecWalker::new(name("example."), &provider, &config)
        .walk(&mut recorder)
        .await
        .unwrap();

    assert_eq!(outcome.status, WalkStatus::Closed);
    assert_eq!(outcome.records.len(), 7);
}

#[tokio::test]
async fn test_cancelled_walk_keeps_nothing_new() {
    let zone = nsec_example();
    let config = WalkConfig::default();
    let mut recorder = Recorder::detached();
    let (handle, token) = cancel_pair();
    handle.cancel();

    let outcome = NsecWalker::new(name("example."), &zone, &config)
        .with_cancel(token)
        .walk(&mut recorder)
        .await
        .unwrap();

    assert_eq!(outcome.status, WalkStatus::Aborted(AbortReason::Cancelled));
    assert!(outcome.records.is_empty());
    assert_eq!(zone.query_count(), 0);
}

#[tokio::test]
async fn test_records_reach_sink_and_output() {
    let zone = nsec_example();
    let config = WalkConfig::default();
    let sink = Arc::new(MemorySink::new());
    let scan_id = sink
        .create_scan(&name("example."), ScanType::Nsec, ZoneType::Nsec)
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("example.zone");
    let writer = ZoneTextWriter::create(&path).unwrap();
    let mut recorder = Recorder::new(
        Some(SinkBinding {
            sink: sink.clone(),
            scan_id,
        }),
        Some(Box::new(writer)),
    );

    let outcome = NsecWalker::new(name("example."), &zone, &config)
        .walk(&mut recorder)
        .await
        .unwrap();
    recorder.finish_output(outcome.records.len()).unwrap();
    drop(recorder);

    let rows = sink.nsec_records(scan_id);
    assert_eq!(rows.len(), 7);
    assert_eq!(rows[0].owner, name("example."));
    assert_eq!(rows[6].next_owner, name("example."));

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 8);
    assert!(lines[0].starts_with("example.\t3600\tIN\tNSEC\ta.example. NS SOA RRSIG NSEC DNSKEY"));
    assert_eq!(lines[7], ";; records found: 7");
}
