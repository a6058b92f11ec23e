//! End-to-end tests through the public `Telebuf` API

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use telebuf::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Span {
    id: u64,
    name: String,
}

impl Sizeable for Span {
    fn object_size(&self) -> u64 {
        16 + self.name.object_size()
    }
}

#[derive(Default)]
struct RecordingIndex {
    indexed: Mutex<Vec<u64>>,
    released: Mutex<Vec<u64>>,
    cleans: AtomicU64,
}

impl IndexSink<Span> for RecordingIndex {
    fn index(&self, payload: &Span) {
        self.indexed.lock().unwrap().push(payload.id);
    }

    fn release(&self, payload: &Span) {
        self.released.lock().unwrap().push(payload.id);
    }

    fn clean(&self) {
        self.cleans.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct RecordingAnalysis {
    analyzed: Mutex<Vec<u64>>,
}

impl AnalysisSink<Span> for RecordingAnalysis {
    fn analyze(&self, payload: &Span) {
        self.analyzed.lock().unwrap().push(payload.id);
    }
}

fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn span(id: u64) -> Span {
    Span {
        id,
        name: format!("GET /orders/{}", id),
    }
}

fn strictly_increasing(ids: &[u64]) -> bool {
    ids.windows(2).all(|pair| pair[0] < pair[1])
}

#[test]
fn test_records_flow_to_both_consumers_in_order() {
    let index = Arc::new(RecordingIndex::default());
    let analysis = Arc::new(RecordingAnalysis::default());

    let mut buffer = Telebuf::<Span>::builder()
        .sizeable()
        .old_gen_max(1 << 30)
        .indexing_wait_time(Duration::from_millis(1))
        .index_sink(index.clone())
        .analysis_sink(analysis.clone())
        .build()
        .unwrap();

    for id in 1..=500 {
        buffer.put(span(id));
    }

    assert!(wait_until(|| buffer.stats().elements_indexed == 500));
    let stats = buffer.stats();
    assert_eq!(stats.elements_added, 500);
    assert_eq!(stats.elements_analyzed, 500);
    assert_eq!(stats.elements_evicted, 0);

    let expected: Vec<u64> = (1..=500).collect();
    assert_eq!(*analysis.analyzed.lock().unwrap(), expected);
    assert_eq!(*index.indexed.lock().unwrap(), expected);
    assert_eq!(buffer.oldest_payload(), Some(span(1)));
    assert_eq!(buffer.newest_payload(), Some(span(500)));

    buffer.shutdown();
    assert_eq!(buffer.lifecycle_state(), LifecycleState::Stopped);
}

#[test]
fn test_eviction_keeps_occupancy_bounded() {
    let index = Arc::new(RecordingIndex::default());
    let analysis = Arc::new(RecordingAnalysis::default());

    // 40 KiB old generation sits below the floor: capacity is 25% of it
    let mut buffer = Telebuf::<Span>::builder()
        .size_estimator(FixedSizeEstimator::new(256))
        .old_gen_max(40 * 1024)
        .indexing_wait_time(Duration::from_millis(1))
        .index_sink(index.clone())
        .analysis_sink(analysis.clone())
        .build()
        .unwrap();
    assert_eq!(buffer.capacity_bytes(), 10 * 1024);

    let threshold = (buffer.capacity_bytes() as f64 * 0.8) as u64;
    for id in 1..=400 {
        buffer.put(span(id));
    }

    assert!(wait_until(|| buffer.occupied_bytes() <= threshold));
    buffer.shutdown();

    let stats = buffer.stats();
    assert!(stats.elements_evicted > 0);
    assert_eq!(stats.bytes_added - stats.bytes_removed, stats.occupied_bytes);
    assert_eq!(stats.occupied_bytes, buffer.chain().reachable_bytes());

    // evicted oldest first, consumers never went backwards
    let released = index.released.lock().unwrap().clone();
    assert!(strictly_increasing(&released));
    assert_eq!(released.first(), Some(&1));
    assert!(strictly_increasing(&analysis.analyzed.lock().unwrap()));
    assert!(strictly_increasing(&index.indexed.lock().unwrap()));
    assert!(index.cleans.load(Ordering::SeqCst) > 0);
}

#[test]
fn test_concurrent_producers() {
    let analysis = Arc::new(RecordingAnalysis::default());
    let buffer = Arc::new(
        Telebuf::<Span>::builder()
            .sizeable()
            .old_gen_max(1 << 30)
            .index_after_analysis(false)
            .analysis_sink(analysis.clone())
            .build()
            .unwrap(),
    );

    let producers: Vec<_> = (0..4u64)
        .map(|producer| {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for i in 0..250 {
                    buffer.put(span(producer * 1_000 + i));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    assert!(wait_until(|| buffer.stats().elements_analyzed == 1_000));
    assert!(wait_until(|| buffer.stats().elements_indexed == 1_000));

    let analyzed = analysis.analyzed.lock().unwrap().clone();
    assert_eq!(analyzed.len(), 1_000);
    for producer in 0..4u64 {
        let mine: Vec<u64> = analyzed
            .iter()
            .copied()
            .filter(|id| id / 1_000 == producer)
            .collect();
        assert_eq!(mine, (0..250).map(|i| producer * 1_000 + i).collect::<Vec<_>>());
    }
}

#[test]
fn test_configuration_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "evictionOccupancyPercentage": 0.7,
            "evictionFragmentSizePercentage": 0.2,
            "indexingWaitTime": 5
        }}"#
    )
    .unwrap();

    let config = BufferConfig::load(file.path()).unwrap();
    assert_eq!(config.eviction_occupancy_percentage, 0.7);

    let buffer = Telebuf::<Span>::builder()
        .config(config)
        .sizeable()
        .old_gen_max(1 << 30)
        .build()
        .unwrap();
    assert!(buffer.capacity_bytes() > 0);
}

#[test]
fn test_out_of_range_occupancy_fails_before_start() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "evictionOccupancyPercentage": 1.5 }}"#).unwrap();

    let config = BufferConfig::load(file.path()).unwrap();
    let err = Telebuf::<Span>::builder()
        .config(config)
        .sizeable()
        .old_gen_max(1 << 30)
        .build()
        .unwrap_err();

    assert!(matches!(err, BufferOperationError::InvalidConfiguration(_)));
    assert!(err.is_fatal());
    assert!(err.to_string().starts_with("Buffer properties initialization error"));
}

#[test]
fn test_sizing_from_startup_flags() {
    let buffer = Telebuf::<Span>::builder()
        .sizeable()
        .heap_introspection(
            StaticHeapIntrospection::new()
                .with_pool("Metaspace", 64 << 20)
                .with_argument("-Xmx512m")
                .with_argument("-Xmn128m"),
        )
        .build()
        .unwrap();

    // 384 MiB old generation, between the 200 MiB floor and 2 GiB ceiling
    let old_gen = 384u64 << 20;
    assert!(buffer.capacity_bytes() > old_gen / 4);
    assert!(buffer.capacity_bytes() < old_gen * 45 / 100);
}

#[test]
fn test_shutdown_is_idempotent_and_interrupts_idle_workers() {
    let mut buffer = Telebuf::<Span>::builder()
        .sizeable()
        .old_gen_max(1 << 30)
        .build()
        .unwrap();

    // let the idle workers block
    thread::sleep(Duration::from_millis(20));
    buffer.shutdown();
    buffer.shutdown();

    assert_eq!(buffer.lifecycle_state(), LifecycleState::Stopped);
    let stats = buffer.worker_stats();
    assert_eq!(stats.len(), 3);
    for (_, worker) in stats {
        assert_eq!(worker.failures, 0);
    }
}
