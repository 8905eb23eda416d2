use glamscan_core::{
    ContentHash, CycleCounters, CycleStats, DaemonConfig, ScanConfig, Transport, Verdict,
};
use std::time::Duration;

#[test]
fn test_content_hash_creation_and_hex() {
    let bytes = [0xab; 32];
    let hash = ContentHash::new(bytes);

    let hex = hash.to_hex();
    assert_eq!(hex.len(), 64);
    assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(hex.starts_with("ab"));

    let hash2 = ContentHash::new(bytes);
    assert_eq!(hash, hash2);

    let hash3 = ContentHash::new([0xcd; 32]);
    assert_ne!(hash, hash3);
}

#[test]
fn test_verdict_display() {
    assert_eq!(Verdict::Clean.to_string(), "Clean");
    assert_eq!(Verdict::Infected.to_string(), "Infected");
    assert_eq!(Verdict::Errored.to_string(), "Errored");
}

#[test]
fn test_counters_shared_across_threads() {
    let counters = std::sync::Arc::new(CycleCounters::new());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let counters = std::sync::Arc::clone(&counters);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    if i % 2 == 0 {
                        counters.record(Verdict::Clean);
                    } else {
                        counters.record_skipped();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = counters.snapshot(Duration::ZERO, false);
    assert_eq!(stats.clean, 400);
    assert_eq!(stats.skipped, 400);
    assert_eq!(stats.visited(), 800);
}

#[test]
fn test_cycle_stats_serialization() {
    let stats = CycleStats {
        skipped: 1,
        clean: 2,
        errored: 3,
        found: 4,
        elapsed: Duration::from_secs(1),
        aborted: true,
    };

    let json = serde_json::to_string(&stats).unwrap();
    let back: CycleStats = serde_json::from_str(&json).unwrap();
    assert_eq!(stats, back);
}

#[test]
fn test_config_deserialize_with_defaults() {
    let daemon: DaemonConfig =
        serde_json::from_str(r#"{"transport":"unix","address":"/run/clamd.sock"}"#).unwrap();
    assert_eq!(daemon.transport, Transport::Unix);
    assert_eq!(daemon.port, 3310);
    assert_eq!(daemon.workers, 10);

    let scan: ScanConfig = serde_json::from_str(r#"{"root":"/srv"}"#).unwrap();
    assert_eq!(scan.max_file_size, 26_214_400);
    assert_eq!(scan.interval, Duration::from_secs(60));
    assert!(scan.include_hidden);
}

#[test]
fn test_tcp_shortcut() {
    let config = DaemonConfig::tcp("127.0.0.1", 3311);
    assert_eq!(config.endpoint(), "127.0.0.1:3311");
    assert_eq!(config.transport, Transport::Tcp);
}
