mod common;

use common::{ScriptedProvider, name, nsec_example, nsec3_example_com, zone_from_listing};
use zonewalk::dns::{NsecRecord, ResponseStatus, TypeSet};
use zonewalk::provider::{Denial, QueryResponse, ResponseRecord};
use zonewalk::scan::Severity;
use zonewalk::walk::{Recorder, ZoneType, detect_zone_type};
use zonewalk::WalkError;

#[tokio::test]
async fn test_detects_nsec() {
    let zone = nsec_example();
    let mut recorder = Recorder::detached();
    let detected = detect_zone_type(&name("example."), &zone, 5, &mut recorder)
        .await
        .unwrap();
    assert_eq!(detected, ZoneType::Nsec);
    assert_eq!(zone.query_count(), 1);
}

#[tokio::test]
async fn test_detects_nsec3() {
    let zone = nsec3_example_com();
    let mut recorder = Recorder::detached();
    let detected = detect_zone_type(&name("example.com."), &zone, 5, &mut recorder)
        .await
        .unwrap();
    assert_eq!(detected, ZoneType::Nsec3);
}

#[tokio::test]
async fn test_bare_nxdomain_is_unsigned() {
    let zone = zone_from_listing("example.org.", Denial::None, "www A\n");
    let mut recorder = Recorder::detached();
    let detected = detect_zone_type(&name("example.org."), &zone, 5, &mut recorder)
        .await
        .unwrap();
    assert_eq!(detected, ZoneType::NoDnssec);
    assert_eq!(detected.as_str(), "no_dnssec");
}

#[tokio::test]
async fn test_wildcard_noerror_with_nsec_is_nsec() {
    // every probe matches the wildcard and comes back NOERROR
    let zone = zone_from_listing("example.", Denial::Nsec, "* A\nwww A\n");
    let mut recorder = Recorder::detached();
    let detected = detect_zone_type(&name("example."), &zone, 5, &mut recorder)
        .await
        .unwrap();
    assert_eq!(detected, ZoneType::Nsec);
}

#[tokio::test]
async fn test_unknown_after_max_attempts() {
    let provider =
        ScriptedProvider::new(|_, _, _| Ok(QueryResponse::new(ResponseStatus::NoError)));
    let mut recorder = Recorder::detached();
    let detected = detect_zone_type(&name("example."), &provider, 4, &mut recorder)
        .await
        .unwrap();
    assert_eq!(detected, ZoneType::Unknown);
    assert_eq!(provider.query_count(), 4);

    let log = recorder.entries();
    let hits = log
        .iter()
        .filter(|e| e.message.starts_with("hit an existing owner name"))
        .count();
    assert_eq!(hits, 4);
    let last = log.last().unwrap();
    assert_eq!(last.severity, Severity::Error);
}

#[tokio::test]
async fn test_unexpected_status_is_fatal() {
    let provider =
        ScriptedProvider::new(|_, _, _| Ok(QueryResponse::new(ResponseStatus::ServFail)));
    let mut recorder = Recorder::detached();
    let err = detect_zone_type(&name("example."), &provider, 5, &mut recorder)
        .await
        .unwrap_err();
    assert_eq!(err, WalkError::UnexpectedStatus(ResponseStatus::ServFail));
    assert_eq!(err.failed_step(), Some("detect"));
    assert_eq!(provider.query_count(), 1);
}

#[tokio::test]
async fn test_existing_name_then_nsec() {
    let provider = ScriptedProvider::new(|i, _, _| {
        if i < 2 {
            return Ok(QueryResponse::new(ResponseStatus::NoError));
        }
        Ok(
            QueryResponse::new(ResponseStatus::NxDomain).with_record(ResponseRecord::Nsec(
                NsecRecord::new(name("example."), name("a.example."), 60, TypeSet::new()),
            )),
        )
    });
    let mut recorder = Recorder::detached();
    let detected = detect_zone_type(&name("example."), &provider, 0, &mut recorder)
        .await
        .unwrap();
    assert_eq!(detected, ZoneType::Nsec);
    assert_eq!(provider.query_count(), 3);
}

#[tokio::test]
async fn test_probe_names_are_random_children() {
    let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let log = seen.clone();
    let provider = ScriptedProvider::new(move |_, qname, _| {
        log.lock().push(qname.clone());
        Ok(QueryResponse::new(ResponseStatus::NoError))
    });
    let mut recorder = Recorder::detached();
    detect_zone_type(&name("example."), &provider, 5, &mut recorder)
        .await
        .unwrap();

    let probes = seen.lock().clone();
    assert_eq!(probes.len(), 5);
    for probe in &probes {
        assert_eq!(probe.parent().unwrap(), name("example."));
    }
    let distinct: std::collections::HashSet<_> = probes.iter().collect();
    assert_eq!(distinct.len(), 5);
}
