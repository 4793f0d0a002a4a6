mod common;

use common::{ScriptedProvider, name, nsec3_example_com, soa_response, zone_from_listing};
use zonewalk::WalkError;
use zonewalk::dns::{DnskeyRecord, RecordType, ResponseStatus};
use zonewalk::provider::{Denial, ProviderError, QueryResponse, ResponseRecord};
use zonewalk::walk::{check_dnskey, validate_soa};

#[tokio::test]
async fn test_soa_at_apex_is_accepted() {
    let zone = nsec3_example_com();
    assert!(validate_soa(&name("example.com."), &zone).await.is_ok());
}

#[tokio::test]
async fn test_missing_soa_is_fatal() {
    let provider = ScriptedProvider::new(|_, _, _| Ok(QueryResponse::new(ResponseStatus::NoError)));
    let err = validate_soa(&name("www.example.com."), &provider)
        .await
        .unwrap_err();
    assert!(matches!(err, WalkError::MissingSoa { .. }));
    assert_eq!(err.failed_step(), Some("soa"));
}

#[tokio::test]
async fn test_soa_owner_mismatch_is_fatal() {
    // a parent zone answering for a name below its apex
    let provider = ScriptedProvider::new(|_, _, _| Ok(soa_response(&name("example.com."))));
    let err = validate_soa(&name("sub.example.com."), &provider)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        WalkError::SoaOwnerMismatch {
            zone: name("sub.example.com."),
            owner: name("example.com."),
        }
    );
}

#[tokio::test]
async fn test_soa_owner_comparison_ignores_case() {
    let provider = ScriptedProvider::new(|_, _, _| Ok(soa_response(&name("Example.COM."))));
    assert!(validate_soa(&name("example.com."), &provider).await.is_ok());
}

#[tokio::test]
async fn test_provider_error_during_soa_check() {
    let provider = ScriptedProvider::new(|_, _, _| Err(ProviderError::Timeout));
    let err = validate_soa(&name("example.com."), &provider)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WalkError::Query {
            source: ProviderError::Timeout,
            ..
        }
    ));
}

#[tokio::test]
async fn test_dnskey_presence() {
    let signed = nsec3_example_com();
    assert!(check_dnskey(&name("example.com."), &signed).await.unwrap());

    let unsigned = zone_from_listing("example.org.", Denial::None, "www A\n");
    assert!(!check_dnskey(&name("example.org."), &unsigned).await.unwrap());
}

#[tokio::test]
async fn test_dnskey_owner_mismatch_is_fatal() {
    let provider = ScriptedProvider::new(|_, _, rtype| {
        assert_eq!(rtype, RecordType::DNSKEY);
        Ok(QueryResponse::new(ResponseStatus::NoError).with_record(ResponseRecord::Dnskey(
            DnskeyRecord {
                owner: name("evil.example."),
                ttl: 60,
                flags: 256,
                protocol: 3,
                algorithm: 8,
            },
        )))
    });
    let err = check_dnskey(&name("example.com."), &provider)
        .await
        .unwrap_err();
    assert!(matches!(err, WalkError::DnskeyOwnerMismatch { .. }));
    assert_eq!(err.failed_step(), Some("dnskey"));
}
