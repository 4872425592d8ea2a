//! End-to-end workflow tests against the mock fingerprint service.
//!
//! Each test drives the console the way a user would (one-shot commands or
//! interactive lines) and checks the rendered text.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use fingerprint_portal_console::{
    commands,
    config::CliCommand,
    error::ConsoleError,
    flows::{EnrollmentFailure, FlowSettings, ProposalState, RegistrationFlow, RevocationFlow},
    router::ViewRouter,
    session::{Session, Step},
};
use fingerprint_portal_sdk::{
    mock::{EmptyDirectoryMode, IdentifyOutcome, MockFingerprintServer},
    ClientConfig, FingerprintId, PortalClient, RetryPolicy,
};
use fingerprint_portal_test_utils::strategies::{
    arb_alias_set, arb_invalid_alias, arb_invalid_id_input,
};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

fn client(server: &MockFingerprintServer) -> PortalClient {
    let config = ClientConfig::builder()
        .with_endpoint(server.endpoint())
        .with_timeout(Duration::from_secs(2))
        .with_retry_policy(RetryPolicy::no_retry())
        .build()
        .unwrap();
    PortalClient::new(config).unwrap()
}

async fn run(server: &MockFingerprintServer, command: CliCommand) -> (String, Result<(), ConsoleError>) {
    let mut out = Vec::new();
    let shutdown = CancellationToken::new();
    let result =
        commands::execute(&command, &FlowSettings::default(), client(server), &shutdown, &mut out)
            .await;
    (String::from_utf8(out).unwrap(), result)
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_proposal_follows_highest_id() {
    let server = MockFingerprintServer::start().await.unwrap();
    server.add_alias(1, "amy");

    let (output, result) = run(&server, CliCommand::Propose).await;
    result.unwrap();
    assert!(output.contains("Proposed ID: 2"), "{output}");
}

#[tokio::test]
async fn test_proposal_on_empty_directory_is_one() {
    for mode in [EmptyDirectoryMode::NotFound, EmptyDirectoryMode::EmptyList] {
        let server = MockFingerprintServer::start().await.unwrap();
        server.set_empty_directory_mode(mode);

        let (output, result) = run(&server, CliCommand::Propose).await;
        result.unwrap();
        assert!(output.contains("Proposed ID: 1"), "{mode:?}: {output}");
    }
}

#[tokio::test]
async fn test_enroll_taken_id_shows_backend_detail() {
    let server = MockFingerprintServer::start().await.unwrap();
    server.add_alias(1, "amy");
    server.add_alias(2, "bob");
    server.set_duplicate_detail("Fingerprint ID 2 is already registered");

    let command =
        CliCommand::Enroll { alias: "bob".into(), id: Some(FingerprintId::new(2)), auto: false };
    let (output, result) = run(&server, command).await;

    assert!(matches!(
        result,
        Err(ConsoleError::CommandFailed { ref message })
            if message == "Fingerprint ID 2 is already registered"
    ));
    assert!(output.contains("Error: Fingerprint ID 2 is already registered"), "{output}");
    assert_eq!(server.aliases().len(), 2);
}

#[tokio::test]
async fn test_enroll_without_id_uses_proposal() {
    let server = MockFingerprintServer::start().await.unwrap();
    server.add_alias(4, "dan");

    let command = CliCommand::Enroll { alias: "eve".into(), id: None, auto: false };
    let (output, result) = run(&server, command).await;
    result.unwrap();

    assert!(output.contains("Fingerprint 5 registered as eve"), "{output}");
    assert!(output.contains("Proposed ID: outdated"), "{output}");
    assert!(server.aliases().iter().any(|a| a.id == FingerprintId::new(5) && a.alias == "eve"));
}

// =============================================================================
// Identification
// =============================================================================

#[tokio::test]
async fn test_identify_match_without_images() {
    let server = MockFingerprintServer::start().await.unwrap();
    server.add_alias(5, "cara");
    server.queue_identification(IdentifyOutcome::matched(5, 0.92));

    let (output, result) = run(&server, CliCommand::Identify { image_dir: None }).await;
    result.unwrap();

    assert!(output.contains("Match found"), "{output}");
    assert!(output.contains("ID: 5"), "{output}");
    assert!(output.contains("Alias: cara"), "{output}");
    assert!(output.contains("Confidence: 0.92"), "{output}");
    assert!(!output.contains("image"), "{output}");
    assert!(!output.contains("Error:"), "{output}");
}

#[tokio::test]
async fn test_identify_no_match_fails_command() {
    let server = MockFingerprintServer::start().await.unwrap();

    let (output, result) = run(&server, CliCommand::Identify { image_dir: None }).await;
    assert!(matches!(result, Err(ConsoleError::CommandFailed { .. })));
    assert!(output.contains("Error: No match found"), "{output}");
}

// =============================================================================
// Revocation and browsing
// =============================================================================

#[tokio::test]
async fn test_delete_missing_id_shows_detail() {
    let server = MockFingerprintServer::start().await.unwrap();

    let (output, result) = run(&server, CliCommand::Delete { id: "7".into() }).await;
    assert!(result.is_err());
    assert!(output.contains("Error: Fingerprint 7 not found"), "{output}");
    assert!(output.contains("Fingerprint ID: 7"), "{output}");
}

#[tokio::test]
async fn test_matches_and_aliases_tables() {
    let server = MockFingerprintServer::start().await.unwrap();
    server.add_alias(1, "amy");
    server.add_alias(2, "bob");
    let match_id = server.add_match(FingerprintId::new(1));

    let (output, result) = run(&server, CliCommand::Matches { alias: "amy".into() }).await;
    result.unwrap();
    assert!(output.contains("Matches for Alias: amy"), "{output}");
    assert!(output.contains(&match_id.to_string()), "{output}");

    let (output, result) = run(&server, CliCommand::Aliases).await;
    result.unwrap();
    assert!(output.contains("All Aliases"), "{output}");
    assert!(output.contains("bob"), "{output}");
}

// =============================================================================
// Interactive session
// =============================================================================

#[tokio::test]
async fn test_session_switch_discards_view_state() {
    let server = MockFingerprintServer::start().await.unwrap();
    let mut session =
        Session::new(ViewRouter::new(client(&server), FlowSettings::default()));

    let Step::Continue(text) = session.execute("revoke").await else { panic!("quit") };
    assert!(text.contains("Delete Fingerprint"));

    let Step::Continue(text) = session.execute("delete 7").await else { panic!("quit") };
    assert!(text.contains("Error: Fingerprint 7 not found"), "{text}");

    session.execute("identify").await;
    let Step::Continue(text) = session.execute("revoke").await else { panic!("quit") };
    assert!(!text.contains("Error:"), "{text}");
    assert!(text.contains("Fingerprint ID: \n"), "{text}");

    assert_eq!(session.execute("quit").await, Step::Quit);
}

#[tokio::test]
async fn test_session_rejects_command_of_other_view() {
    let server = MockFingerprintServer::start().await.unwrap();
    let mut session =
        Session::new(ViewRouter::new(client(&server), FlowSettings::default()));

    session.execute("browse").await;
    let Step::Continue(text) = session.execute("scan").await else { panic!("quit") };
    assert_eq!(text, "Error: `scan` is not available in the browse view\n");
    assert_eq!(server.identify_count(), 0);
}

#[tokio::test]
async fn test_session_run_reads_until_quit() {
    let server = MockFingerprintServer::start().await.unwrap();
    server.add_alias(1, "amy");
    let mut session =
        Session::new(ViewRouter::new(client(&server), FlowSettings::default()));

    let input: &[u8] = b"register\nenroll bob\nquit\naliases\n";
    let mut output = Vec::new();
    session.run(input, &mut output).await.unwrap();

    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("Proposed ID: 2"), "{output}");
    assert!(output.contains("Fingerprint 2 registered as bob"), "{output}");
    assert_eq!(server.enroll_count(), 1);
}

#[tokio::test]
async fn test_session_run_ends_on_client_shutdown() {
    let server = MockFingerprintServer::start().await.unwrap();
    let client = client(&server);
    let mut session = Session::new(ViewRouter::new(client.clone(), FlowSettings::default()))
        .with_shutdown(client.cancellation_token());

    // The writer half stays open, so only the shutdown can end the session.
    let (_keyboard, input) = tokio::io::duplex(64);
    let mut output = Vec::new();
    client.shutdown();

    tokio::time::timeout(
        Duration::from_secs(1),
        session.run(tokio::io::BufReader::new(input), &mut output),
    )
    .await
    .expect("session ended after shutdown")
    .unwrap();
    assert_eq!(server.read_count(), 0);
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_proposal_is_one_past_highest(records in arb_alias_set()) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let server = MockFingerprintServer::start().await.unwrap();
            for record in &records {
                server.add_alias(record.id, record.alias.clone());
            }
            let expected = records.iter().map(|r| r.id.value()).max().unwrap_or(0) + 1;

            let mut flow = RegistrationFlow::new(client(&server), &FlowSettings::default());
            let state = flow.load().await.clone();
            prop_assert_eq!(state, ProposalState::Ready(FingerprintId::new(expected)));
            Ok(())
        })?;
    }

    #[test]
    fn prop_invalid_alias_never_reaches_backend(alias in arb_invalid_alias()) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let server = MockFingerprintServer::start().await.unwrap();
            let mut flow = RegistrationFlow::new(client(&server), &FlowSettings::default());

            let err = flow.enroll(Some(FingerprintId::FIRST), &alias).await.unwrap_err();
            prop_assert!(matches!(err, EnrollmentFailure::InvalidAlias { .. }), "{:?}", err);
            prop_assert_eq!(server.enroll_count(), 0);
            Ok(())
        })?;
    }

    #[test]
    fn prop_unparseable_id_is_never_deleted(input in arb_invalid_id_input()) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let server = MockFingerprintServer::start().await.unwrap();
            let mut flow = RevocationFlow::new(client(&server), &FlowSettings::default());
            flow.set_input(input.clone());

            prop_assert!(flow.delete_identity().await.is_err());
            prop_assert_eq!(flow.input(), input.as_str());
            prop_assert_eq!(server.delete_count(), 0);
            Ok(())
        })?;
    }
}
