//! # Bridge Scenarios
//!
//! End-to-end tests of the bridge against the in-memory adapter: guard
//! order, connection tiers, chunking, retries, serialization and
//! cancellation.
//!
//! Pauses are zeroed unless a test needs time to pass, so the suite runs in
//! well under a second per test.

use std::sync::Arc;
use std::time::Duration;

use estafeta::address;
use estafeta::bridge::{NotificationLog, OpState, Outcome};
use estafeta::printer::{ConfigStore, MemoryStore};
use estafeta::protocol::commands;
use estafeta::transport::Security;
use estafeta::transport::mock::{ALWAYS, MockAdapter};
use estafeta::{BridgeSettings, EstafetaError, PrinterBridge};
use pretty_assertions::assert_eq;

const MAC: &str = "00:11:22:33:44:55";
const OTHER_MAC: &str = "66:77:88:99:AA:BB";

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn setup_with(mock: &MockAdapter, settings: BridgeSettings) -> (PrinterBridge, Arc<NotificationLog>) {
    let log = Arc::new(NotificationLog::default());
    let bridge = PrinterBridge::new(
        Arc::new(mock.clone()),
        ConfigStore::new(MemoryStore::new()),
        log.clone(),
        settings,
    );
    (bridge, log)
}

/// Bridge with no pauses and the printer already selected.
fn setup(mock: &MockAdapter) -> (PrinterBridge, Arc<NotificationLog>) {
    let (bridge, log) = setup_with(mock, BridgeSettings::without_delays());
    assert!(bridge.set_address(MAC));
    (bridge, log)
}

fn framed_text(text: &str) -> Vec<u8> {
    let mut expected = commands::init();
    expected.extend(commands::mode_reset());
    expected.extend(text.as_bytes());
    expected.extend(commands::finalization());
    expected
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_scenario_a_address_grammar() {
    assert!(address::validate("AA:BB:CC:DD:EE:FF"));
    assert!(!address::validate("AA:BB:CC:DD:EE"));
    assert!(!address::validate("AABBCCDDEEFF"));
}

#[test]
fn test_scenario_b_address_round_trip() {
    let (bridge, _) = setup_with(&MockAdapter::new(), BridgeSettings::without_delays());
    assert!(bridge.set_address(MAC));
    assert_eq!(bridge.get_address().unwrap().as_str(), MAC);
    bridge.clear_address();
    assert!(bridge.get_address().is_none());
}

#[tokio::test]
async fn test_scenario_c_print_without_printer() {
    let mock = MockAdapter::new().with_bonded(MAC, "P");
    let (bridge, log) = setup_with(&mock, BridgeSettings::without_delays());

    let handle = bridge.print("Hi");
    assert_eq!(handle.state(), OpState::Closed(Outcome::Failure));
    assert!(matches!(
        handle.wait().await,
        Err(EstafetaError::NoPrinterConfigured)
    ));
    assert_eq!(log.messages(), vec!["No printer configured"]);
    assert_eq!(mock.sockets_created(), 0);
    assert_eq!(mock.discovery_cancels(), 0);
}

#[tokio::test]
async fn test_scenario_d_insecure_fallback() {
    let mock = MockAdapter::new()
        .with_bonded(MAC, "P")
        .fail_secure_create(ALWAYS);
    let (bridge, log) = setup(&mock);

    bridge.print("Hi").wait().await.unwrap();

    assert_eq!(mock.connections(), vec![Security::Insecure]);
    assert_eq!(mock.written_on(Security::Insecure), framed_text("Hi"));
    assert!(mock.written_on(Security::Secure).is_empty());
    assert_eq!(log.messages(), vec!["Print sent"]);
}

#[tokio::test]
async fn test_scenario_d_fallback_when_half_open_close_fails() {
    let mock = MockAdapter::new()
        .with_bonded(MAC, "P")
        .fail_secure_connect(1)
        .fail_close(1);
    let (bridge, log) = setup(&mock);

    bridge.print("Hi").wait().await.unwrap();

    assert_eq!(mock.connections(), vec![Security::Insecure]);
    assert_eq!(mock.written_on(Security::Insecure), framed_text("Hi"));
    assert_eq!(mock.unclosed_sockets(), 0);
    assert_eq!(log.messages(), vec!["Print sent"]);
}

#[tokio::test]
async fn test_close_failure_after_print_still_succeeds() {
    let mock = MockAdapter::new()
        .with_bonded(MAC, "P")
        .fail_close(ALWAYS);
    let (bridge, log) = setup(&mock);

    bridge.print("Hi").wait().await.unwrap();

    assert_eq!(mock.connections().len(), 1);
    assert_eq!(mock.written(), framed_text("Hi"));
    assert_eq!(mock.unclosed_sockets(), 0);
    assert_eq!(log.messages(), vec!["Print sent"]);
}

#[tokio::test]
async fn test_scenario_e_chunk_sizes() {
    let mock = MockAdapter::new().with_bonded(MAC, "P");
    let settings = BridgeSettings {
        chunk_size: 128,
        ..BridgeSettings::without_delays()
    };
    let (bridge, _) = setup_with(&mock, settings);
    bridge.set_address(MAC);

    let payload: Vec<u8> = (0..300).map(|i| (i % 256) as u8).collect();
    bridge.print_raw(payload.clone()).wait().await.unwrap();

    assert_eq!(mock.write_sizes(), vec![128, 128, 44]);
    assert_eq!(mock.written(), payload);
}

// ============================================================================
// FRAMING
// ============================================================================

#[tokio::test]
async fn test_text_is_framed() {
    let mock = MockAdapter::new().with_bonded(MAC, "P");
    let (bridge, _) = setup(&mock);
    bridge.print("Café\n").wait().await.unwrap();
    assert_eq!(mock.written(), framed_text("Café\n"));
}

#[tokio::test]
async fn test_raw_is_not_wrapped() {
    let mock = MockAdapter::new().with_bonded(MAC, "P");
    let (bridge, _) = setup(&mock);
    // ESC @, "OK", GS V 0
    bridge.print_base64("G0BPSx1WAA==").wait().await.unwrap();
    assert_eq!(mock.written(), vec![0x1B, 0x40, b'O', b'K', 0x1D, 0x56, 0x00]);
}

#[tokio::test]
async fn test_alternative_preamble() {
    let mock = MockAdapter::new().with_bonded(MAC, "P");
    let (bridge, log) = setup(&mock);
    bridge.print_alternative("T0s=").wait().await.unwrap();

    let written = mock.written();
    assert!(written.starts_with(&[0x00, 0x00, 0x1B, 0x40, 0x1B, 0x53]));
    assert!(written.ends_with(&commands::finalization()));
    assert!(written.windows(4).any(|w| w == [b'O', b'K', 0x1B, 0x0C]));
    assert_eq!(log.messages(), vec!["Alt Print sent"]);
}

#[tokio::test]
async fn test_raster_text_is_a_bit_image() {
    let mock = MockAdapter::new().with_bonded(MAC, "P");
    let (bridge, _) = setup(&mock);
    bridge.print_raster("Ñandú").wait().await.unwrap();

    let written = mock.written();
    let header = [0x1D, 0x76, 0x30, 0x00, 72, 0, 120, 0];
    assert!(written.windows(8).any(|w| w == header));
    assert!(written.ends_with(&commands::finalization()));
}

#[tokio::test]
async fn test_diagnostic_sends_self_test() {
    let mock = MockAdapter::new().with_bonded(MAC, "P");
    let (bridge, log) = setup(&mock);
    bridge.diagnostic_test().wait().await.unwrap();

    let text = String::from_utf8_lossy(&mock.written()).into_owned();
    assert!(text.contains("TEST START"));
    assert!(mock.written().ends_with(&commands::cut_partial()));
    assert_eq!(log.messages(), vec!["Diagnostic Test Sent"]);
}

// ============================================================================
// RETRIES
// ============================================================================

#[tokio::test]
async fn test_connect_failure_is_retried() {
    let mock = MockAdapter::new()
        .with_bonded(MAC, "P")
        .fail_secure_connect(1)
        .fail_insecure_connect(1);
    let (bridge, log) = setup(&mock);

    bridge.print("Hi").wait().await.unwrap();

    assert_eq!(mock.connections(), vec![Security::Secure]);
    assert_eq!(mock.written(), framed_text("Hi"));
    assert_eq!(log.messages(), vec!["Print sent"]);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let mock = MockAdapter::new()
        .with_bonded(MAC, "P")
        .fail_secure_connect(ALWAYS)
        .fail_insecure_connect(ALWAYS);
    let (bridge, log) = setup(&mock);

    let handle = bridge.print("Hi");
    let mut states = handle.subscribe();
    let err = handle.wait().await.unwrap_err();

    assert!(matches!(err, EstafetaError::ConnectionFailed { .. }));
    // Two tiers per attempt, two attempts
    assert_eq!(mock.sockets_created(), 4);
    assert_eq!(mock.unclosed_sockets(), 0);
    assert_eq!(*states.borrow_and_update(), OpState::Closed(Outcome::Failure));

    let messages = log.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Print failed: Connection to 00:11:22:33:44:55 failed"));
}

#[tokio::test]
async fn test_write_failure_is_retried_on_fresh_connection() {
    let mock = MockAdapter::new().with_bonded(MAC, "P").fail_writes(1);
    let (bridge, _) = setup(&mock);

    bridge.print("Hi").wait().await.unwrap();

    assert_eq!(mock.connections().len(), 2);
    assert_eq!(mock.written(), framed_text("Hi"));
    assert_eq!(mock.unclosed_sockets(), 0);
}

#[tokio::test]
async fn test_diagnostic_is_not_retried() {
    let mock = MockAdapter::new()
        .with_bonded(MAC, "P")
        .fail_secure_connect(ALWAYS)
        .fail_insecure_connect(ALWAYS);
    let (bridge, log) = setup(&mock);

    assert!(bridge.diagnostic_test().wait().await.is_err());
    assert_eq!(mock.sockets_created(), 2);
    assert!(log.messages()[0].starts_with("Diagnostic Error: "));
}

#[tokio::test]
async fn test_unpaired_printer_is_not_retried() {
    let mock = MockAdapter::new().with_unbonded(MAC);
    let (bridge, log) = setup(&mock);

    let err = bridge.print("Hi").wait().await.unwrap_err();
    assert!(matches!(err, EstafetaError::NotPaired(_)));
    assert_eq!(mock.sockets_created(), 0);
    assert_eq!(mock.discovery_cancels(), 1);
    assert_eq!(
        log.messages(),
        vec!["Print failed: Pair printer 00:11:22:33:44:55 in system settings"]
    );
}

// ============================================================================
// CONNECT / CHECK / DEVICES
// ============================================================================

#[tokio::test]
async fn test_check_connection_opens_and_closes() {
    let mock = MockAdapter::new().with_bonded(MAC, "P");
    let (bridge, log) = setup(&mock);

    bridge.check_connection().wait().await.unwrap();
    assert_eq!(mock.connections().len(), 1);
    assert!(mock.written().is_empty());
    assert_eq!(mock.unclosed_sockets(), 0);
    assert_eq!(log.messages(), vec!["Printer reachable"]);
}

#[tokio::test]
async fn test_connect_failure_still_persists_address() {
    let mock = MockAdapter::new()
        .with_bonded(MAC, "P")
        .fail_secure_connect(ALWAYS)
        .fail_insecure_connect(ALWAYS);
    let (bridge, log) = setup_with(&mock, BridgeSettings::without_delays());

    assert!(bridge.connect(MAC).wait().await.is_err());
    assert_eq!(bridge.get_address().unwrap().as_str(), MAC);
    // A single attempt
    assert_eq!(mock.sockets_created(), 2);
    assert!(log.messages()[0].starts_with("Connection failed: "));
}

#[test]
fn test_list_paired() {
    let mock = MockAdapter::new()
        .with_bonded(MAC, "TSP100")
        .with_unnamed(OTHER_MAC);
    let (bridge, _) = setup_with(&mock, BridgeSettings::without_delays());

    let devices = bridge.list_paired();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].name, "TSP100");
    assert_eq!(devices[1].name, "Unknown");

    let (denied, _) = setup_with(&mock.clone().deny_permission(), BridgeSettings::default());
    assert!(denied.list_paired().is_empty());
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[tokio::test]
async fn test_same_printer_is_serialized() {
    let mock = MockAdapter::new()
        .with_bonded(MAC, "P")
        .connect_delay(Duration::from_millis(30));
    let (bridge, log) = setup(&mock);

    let handles = vec![bridge.print("one"), bridge.print("two"), bridge.print("three")];
    for handle in handles {
        handle.wait().await.unwrap();
    }

    assert_eq!(mock.max_concurrent(), 1);
    assert_eq!(mock.connections().len(), 3);
    assert_eq!(log.messages(), vec!["Print sent"; 3]);

    // Jobs never interleave: each framing appears whole
    let written = mock.written();
    for text in ["one", "two", "three"] {
        let framed = framed_text(text);
        assert!(written.windows(framed.len()).any(|w| w == framed.as_slice()));
    }
}

#[tokio::test]
async fn test_different_printers_run_in_parallel() {
    let mock = MockAdapter::new()
        .with_bonded(MAC, "A")
        .with_bonded(OTHER_MAC, "B")
        .connect_delay(Duration::from_millis(300));
    let (bridge, _) = setup_with(&mock, BridgeSettings::without_delays());

    let a = bridge.connect(MAC);
    let b = bridge.connect(OTHER_MAC);
    a.wait().await.unwrap();
    b.wait().await.unwrap();

    assert_eq!(mock.max_concurrent(), 2);
}

#[tokio::test]
async fn test_cancel_mid_payload() {
    let mock = MockAdapter::new().with_bonded(MAC, "P");
    let settings = BridgeSettings {
        chunk_size: 1,
        chunk_delay_ms: 50,
        ..BridgeSettings::without_delays()
    };
    let (bridge, log) = setup_with(&mock, settings);
    bridge.set_address(MAC);

    let handle = bridge.print_raw(vec![b'x'; 100]);
    let mut states = handle.subscribe();
    tokio::time::sleep(Duration::from_millis(150)).await;
    handle.cancel();

    assert!(matches!(handle.wait().await, Err(EstafetaError::Cancelled)));
    assert_eq!(*states.borrow_and_update(), OpState::Closed(Outcome::Cancelled));
    assert!(mock.written().len() < 100);
    assert_eq!(mock.unclosed_sockets(), 0);
    assert_eq!(log.messages(), vec!["Print failed: Operation cancelled"]);
}

#[tokio::test]
async fn test_cancel_while_queued() {
    let mock = MockAdapter::new().with_bonded(MAC, "P");
    let settings = BridgeSettings {
        chunk_size: 1,
        chunk_delay_ms: 50,
        ..BridgeSettings::without_delays()
    };
    let (bridge, _) = setup_with(&mock, settings);
    bridge.set_address(MAC);

    let busy = bridge.print_raw(vec![b'x'; 100]);
    let queued = bridge.print("never");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(queued.state(), OpState::Idle);

    queued.cancel();
    assert!(matches!(queued.wait().await, Err(EstafetaError::Cancelled)));

    busy.cancel();
    let _ = busy.wait().await;
    assert_eq!(mock.connections().len(), 1);
    assert_eq!(mock.unclosed_sockets(), 0);
}
