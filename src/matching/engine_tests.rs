use super::*;
use crate::entitlements::ICLOUD_CONTAINER_IDENTIFIERS_KEY;
use crate::profile::{DistributionType, Platform};
use crate::test_support::{entitlements, profile, DAY};
use plist::Value;
use std::time::SystemTime;

const APP: &str = "com.acme.app";
const ASSOCIATED_DOMAINS: &str = "com.apple.developer.associated-domains";

fn aps_production() -> crate::entitlements::Entitlements {
    entitlements(&[("aps-environment", Value::String("production".into()))])
}

fn request(app_entitlements: crate::entitlements::Entitlements) -> MatchRequest {
    let mut request = MatchRequest::new(
        Platform::Ios,
        DistributionType::AppStore,
        APP,
        app_entitlements,
    );
    request.min_profile_days_valid = 7;
    request
}

fn containers(items: &[&str]) -> crate::entitlements::Entitlements {
    entitlements(&[(
        ICLOUD_CONTAINER_IDENTIFIERS_KEY,
        Value::Array(items.iter().map(|s| Value::String(s.to_string())).collect()),
    )])
}

#[test]
fn exact_pass_selects_manual_profile() {
    let mut candidate = profile(APP);
    candidate.entitlements = aps_production();

    let matched = find_profile(&[candidate.clone()], &request(aps_production()))
        .expect("profile should match");
    assert_eq!(matched.profile, candidate);
    assert_eq!(matched.pass, MatchPass::EXACT);
}

#[test]
fn first_profile_in_input_order_wins() {
    let mut first = profile(APP);
    first.name = "first".into();
    let mut second = profile(APP);
    second.name = "second".into();

    let matched = find_profile(&[first, second], &request(Default::default()))
        .expect("profile should match");
    assert_eq!(matched.profile.name, "first");
}

#[test]
fn exact_pass_is_preferred_over_earlier_superset_candidate() {
    let app = entitlements(&[(ASSOCIATED_DOMAINS, Value::Boolean(false))]);
    let mut superset_only = profile(APP);
    superset_only.name = "superset".into();
    superset_only.entitlements = entitlements(&[(ASSOCIATED_DOMAINS, Value::Boolean(true))]);
    let mut exact = profile(APP);
    exact.name = "exact".into();
    exact.entitlements = app.clone();

    let matched =
        find_profile(&[superset_only, exact], &request(app)).expect("profile should match");
    assert_eq!(matched.profile.name, "exact");
    assert_eq!(matched.pass, MatchPass::EXACT);
}

#[test]
fn superset_pass_accepts_extra_boolean_capability() {
    let app = entitlements(&[(ASSOCIATED_DOMAINS, Value::Boolean(false))]);
    let mut candidate = profile(APP);
    candidate.entitlements = entitlements(&[(ASSOCIATED_DOMAINS, Value::Boolean(true))]);

    let matched = find_profile(&[candidate], &request(app)).expect("profile should match");
    assert_eq!(matched.pass, MatchPass::SUPERSET);
}

#[test]
fn xcode_managed_profile_is_skipped_by_exact_pass_only() {
    let mut managed = profile(APP);
    managed.name = "iOS Team Provisioning Profile: com.acme.app".into();
    managed.entitlements = aps_production();
    let request = request(aps_production());

    assert_eq!(
        evaluate(&managed, &request, MatchPass::EXACT),
        Err(Rejection::XcodeManaged)
    );
    assert!(first_matching(std::slice::from_ref(&managed), &request, MatchPass::EXACT).is_none());

    let matched = find_profile(&[managed], &request).expect("second pass should match");
    assert_eq!(matched.pass, MatchPass::SUPERSET);
}

#[test]
fn required_true_boolean_fails_both_passes() {
    let app = entitlements(&[(ASSOCIATED_DOMAINS, Value::Boolean(true))]);
    let mut candidate = profile(APP);
    candidate.entitlements = entitlements(&[(ASSOCIATED_DOMAINS, Value::Boolean(false))]);
    let request = request(app);

    for pass in MatchPass::ORDER {
        assert_eq!(
            evaluate(&candidate, &request, pass),
            Err(Rejection::Entitlement(ASSOCIATED_DOMAINS.to_string()))
        );
    }
    assert!(find_profile(&[candidate], &request).is_none());
}

#[test]
fn icloud_containers_require_superset_grant() {
    let request = request(containers(&["iCloud.A", "iCloud.B"]));
    let mut wide = profile(APP);
    wide.entitlements = containers(&["iCloud.A", "iCloud.B", "iCloud.C"]);
    let mut narrow = profile(APP);
    narrow.entitlements = containers(&["iCloud.A"]);

    for pass in MatchPass::ORDER {
        assert_eq!(evaluate(&wide, &request, pass), Ok(()));
        assert!(evaluate(&narrow, &request, pass).is_err());
    }
}

#[test]
fn inactive_profile_is_never_returned() {
    let mut expiring = profile(APP);
    expiring.expiration_date = SystemTime::now() + DAY * 3;
    let request = request(Default::default());

    for pass in MatchPass::ORDER {
        assert_eq!(evaluate(&expiring, &request, pass), Err(Rejection::Inactive));
    }
    assert!(find_profile(&[expiring], &request).is_none());
}

#[test]
fn mismatched_fields_are_reported_in_chain_order() {
    let request = request(Default::default());

    let mut wrong_type = profile(APP);
    wrong_type.export_type = DistributionType::Development;
    wrong_type.bundle_id = "com.other".into();
    assert_eq!(
        evaluate(&wrong_type, &request, MatchPass::EXACT),
        Err(Rejection::DistributionType)
    );

    let mut wrong_platform = profile(APP);
    wrong_platform.platform = "tvos".into();
    assert_eq!(
        evaluate(&wrong_platform, &request, MatchPass::EXACT),
        Err(Rejection::Platform)
    );

    let other_bundle = profile("com.acme.other");
    assert_eq!(
        evaluate(&other_bundle, &request, MatchPass::SUPERSET),
        Err(Rejection::BundleId)
    );
}

#[test]
fn certificates_and_devices_are_checked() {
    let mut request = request(Default::default());
    request.certificate_serials = vec!["1234".into()];
    request.device_udids = vec!["udid-1".into()];

    let mut candidate = profile(APP);
    assert_eq!(
        evaluate(&candidate, &request, MatchPass::EXACT),
        Err(Rejection::Devices)
    );
    candidate.provisioned_devices = vec!["udid-1".into()];
    assert_eq!(evaluate(&candidate, &request, MatchPass::EXACT), Ok(()));

    request.certificate_serials.push("9999".into());
    assert_eq!(
        evaluate(&candidate, &request, MatchPass::EXACT),
        Err(Rejection::Certificates)
    );
}

#[test]
fn no_match_is_a_plain_none() {
    assert!(find_profile(&[], &request(aps_production())).is_none());
}
