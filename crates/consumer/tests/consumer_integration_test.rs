mod support;

use bridge::{
    BridgeError, ChannelPair, Md5Digest, PayloadDigest, Producer, Resource, digest, length,
    registry,
};
use consumer::config::OutputConfig;
use consumer::{Consumer, ConsumerError, FileSink, PayloadSink, ShutdownToken, Step};
use support::{MemorySink, unique_keys};
use tempfile::tempdir;

fn file_sink(dir: &std::path::Path) -> FileSink {
    FileSink::new(OutputConfig {
        dir: dir.to_path_buf(),
        ..OutputConfig::default()
    })
}

fn assert_gates_open(consumer: Consumer<impl PayloadSink, Md5Digest>) -> ChannelPair {
    let channels = consumer.into_channels();
    assert_eq!(channels.size.gate().value().unwrap(), 1, "Size gate must be released");
    assert_eq!(
        channels.content.gate().value().unwrap(),
        1,
        "Content gate must be released"
    );
    channels
}

/// Test one full consumer cycle driven step by step
///
/// Tests:
/// - Empty size channel yields Idle
/// - A sent payload is read in two steps and persisted byte for byte
/// - Output names follow the counter without gaps
#[test]
fn test_consumer_cycle_persists_payloads_in_order() {
    let keys = unique_keys();
    let dir = tempdir().unwrap();

    let channels = ChannelPair::create(&keys).unwrap();
    let mut producer = Producer::open(&keys).unwrap();
    let mut consumer: Consumer<_, Md5Digest> = Consumer::new(channels, file_sink(dir.path()), None);

    assert_eq!(consumer.step().unwrap(), Step::Idle);

    for i in 1..=3u8 {
        let payload = vec![i; 100 * i as usize];
        producer.send(&payload).unwrap();

        assert_eq!(consumer.step().unwrap(), Step::LengthReceived(payload.len()));
        let step = consumer.step().unwrap();
        let expected_path = dir.path().join(format!("file{:02}.jpg", i));
        assert_eq!(
            step,
            Step::Persisted {
                path: expected_path.clone(),
                length: payload.len(),
                digest: None,
            }
        );
        assert_eq!(std::fs::read(&expected_path).unwrap(), payload);

        assert_eq!(consumer.step().unwrap(), Step::Idle, "Length is reset after consumption");
    }

    assert_eq!(consumer.consumed(), 3);
    assert_eq!(consumer.sink().counter(), 4);

    drop(producer);
    assert!(assert_gates_open(consumer).teardown().is_clean());
}

/// Test that digest mode writes the lowercase hex MD5 back in place
#[test]
fn test_digest_reply_written_into_content_channel() {
    let keys = unique_keys();
    let channels = ChannelPair::create(&keys).unwrap();
    let mut peer = ChannelPair::open(&keys).unwrap();
    let mut producer = Producer::open(&keys).unwrap();
    let mut consumer = Consumer::new(channels, MemorySink::default(), Some(Md5Digest));

    let payload = b"The quick brown fox jumps over the lazy dog";
    producer.send(payload).unwrap();

    consumer.step().unwrap();
    let step = consumer.step().unwrap();
    let expected = "9e107d9d372bb6826bd81d3542a419d6";
    assert!(matches!(step, Step::Persisted { digest: Some(ref d), .. } if d == expected));

    let content = peer.content.lock().unwrap();
    let reply = digest::read_reply(&content, Md5Digest::HEX_LEN + 1);
    assert_eq!(reply, expected);
    assert_eq!(content[Md5Digest::HEX_LEN], 0, "Reply is NUL-terminated");
    content.release().unwrap();

    drop(producer);
    drop(peer);
    assert!(assert_gates_open(consumer).teardown().is_clean());
}

/// Test producer-side verification against a consumer stepping in the same thread
#[test]
fn test_producer_verifies_consumer_digest() {
    let keys = unique_keys();
    let channels = ChannelPair::create(&keys).unwrap();
    let mut producer = Producer::open(&keys).unwrap();
    let mut consumer = Consumer::new(channels, MemorySink::default(), Some(Md5Digest));

    let payload: Vec<u8> = (0..4096u32).map(|i| (i * 31 % 256) as u8).collect();
    producer.send(&payload).unwrap();
    consumer.step().unwrap();
    consumer.step().unwrap();

    // Producer reads the reply the same way send_and_verify does
    let mut channels = consumer.into_channels();
    let guard = channels.content.lock().unwrap();
    assert_eq!(
        digest::read_reply(&guard, Md5Digest::HEX_LEN + 1),
        Md5Digest.hex_digest(&payload)
    );
    guard.release().unwrap();

    drop(producer);
    channels.teardown();
}

/// Test that a length above capacity is rejected without reading content
#[test]
fn test_oversize_length_is_rejected() {
    let keys = unique_keys();
    let channels = ChannelPair::create(&keys).unwrap();
    let mut peer = ChannelPair::open(&keys).unwrap();
    let mut consumer: Consumer<_, Md5Digest> = Consumer::new(channels, MemorySink::default(), None);

    {
        let mut size = peer.size.lock().unwrap();
        length::encode(bridge::CONTENT_CHANNEL_CAPACITY + 1, &mut size).unwrap();
    }

    assert_eq!(consumer.step().unwrap(), Step::Rejected);
    assert_eq!(consumer.step().unwrap(), Step::Idle, "Rejected length is cleared");
    assert!(consumer.sink().payloads.is_empty());

    drop(peer);
    assert!(assert_gates_open(consumer).teardown().is_clean());
}

/// Test that garbage in the size channel is rejected and cleared
#[test]
fn test_invalid_length_is_rejected() {
    let keys = unique_keys();
    let channels = ChannelPair::create(&keys).unwrap();
    let mut peer = ChannelPair::open(&keys).unwrap();
    let mut consumer: Consumer<_, Md5Digest> = Consumer::new(channels, MemorySink::default(), None);

    {
        let mut size = peer.size.lock().unwrap();
        size[..4].copy_from_slice(b"abc\0");
    }

    assert_eq!(consumer.step().unwrap(), Step::Rejected);
    assert_eq!(consumer.step().unwrap(), Step::Idle);

    drop(peer);
    consumer.into_channels().teardown();
}

/// Test that a payload of exactly the channel capacity is persisted in full
#[test]
fn test_full_capacity_payload_is_persisted() {
    let keys = unique_keys();
    let dir = tempdir().unwrap();
    let channels = ChannelPair::create(&keys).unwrap();
    let mut producer = Producer::open(&keys).unwrap();
    let mut consumer: Consumer<_, Md5Digest> = Consumer::new(channels, file_sink(dir.path()), None);

    let payload: Vec<u8> = (0..bridge::CONTENT_CHANNEL_CAPACITY)
        .map(|i| (i % 253) as u8)
        .collect();
    producer.send(&payload).unwrap();

    assert_eq!(
        consumer.step().unwrap(),
        Step::LengthReceived(bridge::CONTENT_CHANNEL_CAPACITY)
    );
    let Step::Persisted { path, length, .. } = consumer.step().unwrap() else {
        panic!("Expected the payload to be persisted");
    };
    assert_eq!(length, bridge::CONTENT_CHANNEL_CAPACITY);
    let written = std::fs::read(path).unwrap();
    assert!(written == payload, "Persisted file must match byte for byte");

    drop(producer);
    consumer.into_channels().teardown();
}

/// Test that an output write failure stops the loop and still releases the gate
#[test]
fn test_persist_failure_is_fatal() {
    let keys = unique_keys();
    let dir = tempdir().unwrap();
    let channels = ChannelPair::create(&keys).unwrap();
    let mut producer = Producer::open(&keys).unwrap();
    let mut consumer: Consumer<_, Md5Digest> =
        Consumer::new(channels, file_sink(&dir.path().join("missing")), None);

    producer.send(b"will not be written").unwrap();

    let result = consumer.run(&ShutdownToken::new());
    assert!(matches!(result, Err(ConsumerError::Persist(_))));
    assert_eq!(consumer.sink().counter(), 1);

    drop(producer);
    let report = assert_gates_open(consumer).teardown();
    assert!(report.is_clean());
}

/// Test that a cancelled token stops the loop before any wait
#[test]
fn test_run_returns_when_already_cancelled() {
    let keys = unique_keys();
    let channels = ChannelPair::create(&keys).unwrap();
    let mut consumer: Consumer<_, Md5Digest> = Consumer::new(channels, MemorySink::default(), None);

    let shutdown = ShutdownToken::new();
    shutdown.cancel();
    consumer.run(&shutdown).unwrap();

    assert!(assert_gates_open(consumer).teardown().is_clean());
}

/// Test that removing a gate under a running consumer ends the loop
#[test]
fn test_removed_gate_stops_the_loop() {
    let keys = unique_keys();
    let channels = ChannelPair::create(&keys).unwrap();
    let mut consumer: Consumer<_, Md5Digest> = Consumer::new(channels, MemorySink::default(), None);

    registry::destroy_gate(&registry::open_gate(keys.size_gate).unwrap()).unwrap();

    let result = consumer.run(&ShutdownToken::new());
    assert!(matches!(
        result,
        Err(ConsumerError::Channel(BridgeError::Removed {
            resource: Resource::Gate,
            ..
        }))
    ));

    let report = consumer.into_channels().teardown();
    assert_eq!(report.removals(Resource::Gate), 2, "Both gates are still attempted");
    assert_eq!(report.failures().count(), 1, "Double-destroy is tolerated");
}
