mod common;
use common::*;

use pi18_bridge::error::Error;
use pi18_bridge::pi18::crc;
use pi18_bridge::pi18::transaction::Transaction;

#[test]
fn frame_appends_checksum_and_delimiter() {
    common_setup();

    let transaction = Transaction::new(FakeTransport::new());
    let frame = transaction.frame("^P005GS");

    let mut expected = b"^P005GS".to_vec();
    expected.extend_from_slice(&crc::checksum(b"^P005GS"));
    expected.push(b'\r');
    assert_eq!(frame, expected);
}

#[test]
fn frame_without_crc_is_bare() {
    let transaction = Transaction::without_crc(FakeTransport::new());
    assert_eq!(transaction.frame("^P005GS"), b"^P005GS\r");
}

#[tokio::test]
async fn execute_returns_payload_after_prefix() {
    common_setup();

    let transport = FakeTransport::new();
    transport.push_reply("^D1062300,500");

    let mut transaction = Transaction::new(transport.clone());
    let payload = transaction.execute("^P005GS", "^D106").await.unwrap();
    assert_eq!(payload, "2300,500");

    // The command went out exactly as framed.
    assert_eq!(transport.written(), vec![transaction.frame("^P005GS")]);
}

#[tokio::test]
async fn execute_rejects_wrong_prefix() {
    let transport = FakeTransport::new();
    transport.push_reply("^D0050");

    let mut transaction = Transaction::new(transport);
    let err = transaction.execute("^P005GS", "^D106").await.unwrap_err();
    assert!(matches!(
        err,
        Error::UnexpectedResponse { expected, response }
            if expected == "^D106" && response == "^D0050"
    ));
}

#[tokio::test]
async fn execute_rejects_corrupt_checksum() {
    let transport = FakeTransport::new();
    let mut frame = b"^D1062300,500".to_vec();
    let mut trailer = crc::checksum(b"^D1062300,500");
    trailer[0] ^= 0xff;
    frame.extend_from_slice(&trailer);
    transport.push_raw(frame);

    let mut transaction = Transaction::new(transport);
    let err = transaction.execute("^P005GS", "^D106").await.unwrap_err();
    assert!(matches!(err, Error::UnexpectedResponse { .. }));
}

#[tokio::test]
async fn execute_rejects_frame_shorter_than_trailer() {
    let transport = FakeTransport::new();
    transport.push_raw(vec![b'^']);

    let mut transaction = Transaction::new(transport);
    let err = transaction.execute("^P005GS", "^D106").await.unwrap_err();
    assert!(matches!(err, Error::UnexpectedResponse { .. }));
}

#[tokio::test]
async fn execute_propagates_transport_failure() {
    let transport = FakeTransport::new();
    transport.push_error(std::io::ErrorKind::TimedOut);

    let mut transaction = Transaction::new(transport);
    let err = transaction.execute("^P005GS", "^D106").await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn execute_without_crc_skips_verification() {
    let transport = FakeTransport::new();
    transport.push_raw(b"^D00518".to_vec());

    let mut transaction = Transaction::without_crc(transport);
    let payload = transaction.execute("^P005PI", "^D005").await.unwrap();
    assert_eq!(payload, "18");
}

#[tokio::test]
async fn send_command_true_on_accept() {
    common_setup();

    let transport = FakeTransport::new();
    transport.push_reply("^1");

    let mut transaction = Transaction::new(transport);
    assert!(transaction.send_command("^S007PBT0").await.unwrap());
}

#[tokio::test]
async fn send_command_false_on_other_prefix() {
    // A recognised-but-rejected reply is not an error.
    let transport = FakeTransport::new();
    transport.push_reply("^0");

    let mut transaction = Transaction::new(transport);
    assert!(!transaction.send_command("^S007PBT0").await.unwrap());
}

#[tokio::test]
async fn send_command_still_propagates_transport_failure() {
    let transport = FakeTransport::new();
    transport.push_error(std::io::ErrorKind::BrokenPipe);

    let mut transaction = Transaction::new(transport);
    let err = transaction.send_command("^S007PBT0").await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}
