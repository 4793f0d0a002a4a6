mod common;

use common::{ScriptedProvider, name, nsec_example, nsec3_example_com, soa_response, zone_from_listing};
use std::num::NonZeroU32;
use std::sync::Arc;
use zonewalk::dns::{Nsec3Record, ResponseStatus, TypeSet};
use zonewalk::dnssec::{Nsec3Parameters, OwnerHash};
use zonewalk::output::JsonResultWriter;
use zonewalk::provider::{Denial, QueryResponse, RateLimitedProvider, ResponseRecord};
use zonewalk::scan::{EXIT_FATAL, EXIT_OK, EXIT_PARTIAL, EXIT_UNKNOWN_TYPE, Severity};
use zonewalk::sink::jsonl::{JsonlRow, JsonlSink};
use zonewalk::sink::MemorySink;
use zonewalk::walk::{AbortReason, CancelToken, WalkStatus};
use zonewalk::{ScanType, Scanner, WalkConfig, WalkError, ZoneType, cancel_pair};

#[tokio::test]
async fn test_unsigned_zone_is_not_walked() {
    let sink = Arc::new(MemorySink::new());
    let zone = zone_from_listing("example.org.", Denial::None, "www A\n");
    let scanner = Scanner::new(zone, WalkConfig::default()).with_sink(sink.clone());

    let result = scanner
        .run(&name("example.org."), ScanType::Auto, None, CancelToken::never())
        .await
        .unwrap();

    assert_eq!(result.zone_type, ZoneType::NoDnssec);
    assert!(!result.signed);
    assert_eq!(result.status, WalkStatus::NotWalked);
    assert_eq!(result.exit_code(), EXIT_OK);
    assert!(result.log.iter().any(|e| e.severity == Severity::Warning));

    let row = sink.scan(result.scan_id.unwrap()).unwrap();
    assert_eq!(row.zone_type, ZoneType::NoDnssec);
    assert_eq!(row.exit_code, Some(EXIT_OK));
    assert_eq!(row.scan_type, ScanType::Auto);
}

#[tokio::test]
async fn test_nsec_scan_fills_sink_tables() {
    let sink = Arc::new(MemorySink::new());
    let scanner = Scanner::new(nsec_example(), WalkConfig::default()).with_sink(sink.clone());

    let result = scanner
        .run(&name("example."), ScanType::Auto, None, CancelToken::never())
        .await
        .unwrap();

    assert_eq!(result.zone_type, ZoneType::Nsec);
    assert!(result.signed);
    assert_eq!(result.records.len(), 7);
    assert_eq!(result.exit_code(), EXIT_OK);
    assert!(result.finished_at >= result.started_at);

    let id = result.scan_id.unwrap();
    let row = sink.scan(id).unwrap();
    assert_eq!(row.zone, name("example."));
    assert_eq!(row.zone_type, ZoneType::Nsec);
    assert_eq!(row.exit_code, Some(EXIT_OK));
    assert!(row.end_time.is_some());
    assert_eq!(sink.nsec_records(id).len(), 7);
    assert!(sink.nsec3_records(id).is_empty());

    let logs = sink.logs(id);
    assert_eq!(logs.len(), result.log.len());
    assert!(logs.last().unwrap().message.starts_with("scan finished"));
}

#[tokio::test]
async fn test_soa_mismatch_finishes_scan_as_fatal() {
    let sink = Arc::new(MemorySink::new());
    let provider = ScriptedProvider::new(|_, _, _| Ok(soa_response(&name("example."))));
    let scanner = Scanner::new(provider, WalkConfig::default()).with_sink(sink.clone());

    let err = scanner
        .run(&name("sub.example."), ScanType::Auto, None, CancelToken::never())
        .await
        .unwrap_err();
    assert!(matches!(err, WalkError::SoaOwnerMismatch { .. }));
    // nothing past the SOA check was attempted
    assert_eq!(scanner.provider().query_count(), 1);

    let row = sink.scans().pop().unwrap();
    assert_eq!(row.exit_code, Some(EXIT_FATAL));
    assert_eq!(row.zone_type, ZoneType::Unknown);
    let last = sink.logs(row.id).pop().unwrap();
    assert_eq!(last.severity, Severity::Critical);
    assert!(last.message.starts_with("soa failed"));
}

#[tokio::test]
async fn test_forced_nsec3_on_nsec_zone_is_partial() {
    let scanner = Scanner::new(nsec_example(), WalkConfig::default());

    let result = scanner
        .run(&name("example."), ScanType::Nsec3, None, CancelToken::never())
        .await
        .unwrap();

    assert_eq!(result.zone_type, ZoneType::Nsec3);
    assert!(result.records.is_empty());
    assert!(matches!(
        result.status,
        WalkStatus::Aborted(AbortReason::NoProgress { .. })
    ));
    assert_eq!(result.exit_code(), EXIT_PARTIAL);
}

#[tokio::test]
async fn test_undetectable_zone_type() {
    let provider = ScriptedProvider::signed_apex("example.", |_, _, _| {
        Ok(QueryResponse::new(ResponseStatus::NoError))
    });
    let config = WalkConfig {
        detect_attempts: 2,
        ..Default::default()
    };
    let scanner = Scanner::new(provider, config);

    let result = scanner
        .run(&name("example."), ScanType::Auto, None, CancelToken::never())
        .await
        .unwrap();

    assert_eq!(result.zone_type, ZoneType::Unknown);
    assert_eq!(result.status, WalkStatus::NotWalked);
    assert_eq!(result.exit_code(), EXIT_UNKNOWN_TYPE);
    // SOA, DNSKEY and two detection probes
    assert_eq!(scanner.provider().query_count(), 4);
}

#[tokio::test]
async fn test_cancelled_scan_is_partial() {
    let (handle, token) = cancel_pair();
    handle.cancel();
    let scanner = Scanner::new(nsec_example(), WalkConfig::default());

    let result = scanner
        .run(&name("example."), ScanType::Nsec, None, token)
        .await
        .unwrap();

    assert_eq!(result.status, WalkStatus::Aborted(AbortReason::Cancelled));
    assert_eq!(result.exit_code(), EXIT_PARTIAL);
}

#[tokio::test]
async fn test_nsec3_scan_to_jsonl_sink_and_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let sink_path = dir.path().join("scans.jsonl");
    let out_path = dir.path().join("records.jsonl");
    let sink = Arc::new(JsonlSink::create(&sink_path).unwrap());
    let output = JsonResultWriter::create(&out_path).unwrap();
    let scanner = Scanner::new(nsec3_example_com(), WalkConfig::default()).with_sink(sink);

    let result = scanner
        .run(
            &name("example.com."),
            ScanType::Auto,
            Some(Box::new(output)),
            CancelToken::never(),
        )
        .await
        .unwrap();
    assert_eq!(result.exit_code(), EXIT_OK);
    assert_eq!(result.nsec3_records().count(), 3);

    let rows = JsonlSink::read_rows(&sink_path).unwrap();
    assert!(matches!(&rows[0], JsonlRow::Scans(scan) if scan.zone_type == ZoneType::Unknown));
    let count = |f: fn(&JsonlRow) -> bool| rows.iter().filter(|r| f(r)).count();
    assert_eq!(count(|r| matches!(r, JsonlRow::Nsec3ResourceRecords(_))), 3);
    assert_eq!(count(|r| matches!(r, JsonlRow::Nsec3Parameters(_))), 1);
    assert!(rows.iter().any(|r| matches!(
        r,
        JsonlRow::ScanUpdates(update) if update.zone_type == Some(ZoneType::Nsec3)
    )));
    match rows.last().unwrap() {
        JsonlRow::ScanUpdates(update) => assert_eq!(update.exit_code, Some(EXIT_OK)),
        other => panic!("unexpected last row {:?}", other),
    }

    let text = std::fs::read_to_string(&out_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    let tail: serde_json::Value = serde_json::from_str(lines[3]).unwrap();
    assert_eq!(tail["record_count"], 3);
}

#[tokio::test]
async fn test_rate_limited_provider_completes_walk() {
    let limited = RateLimitedProvider::new(nsec_example(), NonZeroU32::new(1000).unwrap());
    let scanner = Scanner::new(limited, WalkConfig::default());

    let result = scanner
        .run(&name("example."), ScanType::Auto, None, CancelToken::never())
        .await
        .unwrap();

    assert_eq!(result.exit_code(), EXIT_OK);
    assert_eq!(result.records.len(), 7);
    // SOA, DNSKEY, one detection probe and the seven walk probes
    assert_eq!(scanner.provider().inner().query_count(), 10);
}

#[tokio::test]
async fn test_unsupported_nsec3_algorithm_is_partial_not_fatal() {
    let sha1 = Nsec3Parameters::sha1(0, Vec::new());
    let unknown = Nsec3Parameters::new(2, 0, 0, Vec::new());
    let record = |byte: u8, params: &Nsec3Parameters| {
        let owner = OwnerHash::from_bytes(&[byte; 20]);
        let next = OwnerHash::from_bytes(&[byte + 0x10; 20]);
        Nsec3Record::new(
            owner.owner_name(&name("example.")).unwrap(),
            next,
            300,
            TypeSet::new(),
            params.clone(),
        )
        .unwrap()
    };
    // SOA and DNSKEY take the first two queries
    let provider = ScriptedProvider::signed_apex("example.", move |i, _, _| {
        let rec = if i == 2 { record(0x10, &sha1) } else { record(0x30, &unknown) };
        Ok(QueryResponse::new(ResponseStatus::NxDomain)
            .with_record(ResponseRecord::Nsec3(rec)))
    });
    let sink = Arc::new(MemorySink::new());
    let scanner = Scanner::new(provider, WalkConfig::default()).with_sink(sink.clone());

    let result = scanner
        .run(&name("example."), ScanType::Nsec3, None, CancelToken::never())
        .await
        .unwrap();

    assert_eq!(
        result.status,
        WalkStatus::Aborted(AbortReason::UnsupportedAlgorithm { algorithm: 2 })
    );
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.exit_code(), EXIT_PARTIAL);
    assert_eq!(sink.scan(result.scan_id.unwrap()).unwrap().exit_code, Some(EXIT_PARTIAL));
    assert!(result.log.iter().all(|e| e.severity != Severity::Critical));
}
