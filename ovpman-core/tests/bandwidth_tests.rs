//! Unit tests for bandwidth sampling

mod common;

use common::MockBus;
use ovpman_core::vpn::bandwidth::{
    BandwidthMonitor, BandwidthSample, BandwidthSeries, StatsSource, DEFAULT_SAMPLE_CAPACITY,
};
use std::collections::HashMap;

fn sample(timestamp: u64, bytes_in: u64, bytes_out: u64) -> BandwidthSample {
    BandwidthSample {
        timestamp,
        bytes_in,
        bytes_out,
        ..BandwidthSample::default()
    }
}

#[test]
fn ring_keeps_the_newest_samples() {
    let mut series = BandwidthSeries::new(3);

    for i in 1..=5u64 {
        series.push(sample(i, i * 100, i * 10));
    }

    assert_eq!(series.len(), 3);
    let samples = series.samples(10);
    let timestamps: Vec<u64> = samples.iter().map(|s| s.timestamp).collect();
    assert_eq!(timestamps, vec![5, 4, 3]);
}

#[test]
fn totals_survive_buffer_rotation() {
    let mut series = BandwidthSeries::new(3);

    series.push(sample(1, 1000, 100));
    for i in 2..=5u64 {
        series.push(sample(i, 1000 + i * 500, 100 + i * 50));
    }

    // Baseline is sample 1 even though the ring only holds samples 3..=5
    assert_eq!(series.baseline().unwrap().timestamp, 1);
    let (downloaded, uploaded) = series.totals().unwrap();
    assert_eq!(downloaded, 5 * 500);
    assert_eq!(uploaded, 5 * 50);
}

#[test]
fn rate_needs_two_samples() {
    let mut series = BandwidthSeries::new(4);
    assert!(series.rate().is_err());

    series.push(sample(1, 100, 10));
    assert!(series.rate().is_err());

    series.push(sample(3, 300, 30));
    let rate = series.rate().unwrap();
    assert_eq!(rate.download_bps, 100.0);
    assert_eq!(rate.upload_bps, 10.0);
}

#[test]
fn identical_timestamps_clamp_instead_of_dividing_by_zero() {
    let mut series = BandwidthSeries::new(4);
    series.push(sample(7, 100, 10));
    series.push(sample(7, 400, 40));

    let rate = series.rate().unwrap();
    assert!(rate.download_bps.is_finite());
    assert_eq!(rate.download_bps, 300.0);
    assert_eq!(rate.upload_bps, 30.0);
}

#[test]
fn rate_carries_lifetime_totals() {
    let mut series = BandwidthSeries::new(2);
    series.push(sample(1, 1000, 100));
    series.push(sample(2, 1500, 130));
    series.push(sample(3, 2500, 180));

    let rate = series.rate().unwrap();
    assert_eq!(rate.total_downloaded, 1500);
    assert_eq!(rate.total_uploaded, 80);
}

#[test]
fn samples_are_bounded_by_stored_count() {
    let mut series = BandwidthSeries::new(10);
    series.push(sample(1, 1, 1));
    series.push(sample(2, 2, 2));

    assert_eq!(series.samples(5).len(), 2);
    assert_eq!(series.samples(1).len(), 1);
    assert_eq!(series.samples(1)[0].timestamp, 2);
}

#[test]
fn reset_clears_history_and_baseline() {
    let mut series = BandwidthSeries::new(3);
    series.push(sample(1, 100, 10));
    series.push(sample(2, 200, 20));

    series.reset();
    assert!(series.is_empty());
    assert!(series.baseline().is_none());
    assert!(series.totals().is_err());

    series.push(sample(9, 900, 90));
    assert_eq!(series.baseline().unwrap().timestamp, 9);
}

#[test]
fn zero_capacity_falls_back_to_default() {
    let series = BandwidthSeries::new(0);
    assert!(series.is_empty());
    let mut series = series;
    for i in 0..DEFAULT_SAMPLE_CAPACITY + 5 {
        series.push(sample(i as u64, i as u64, 0));
    }
    assert_eq!(series.len(), DEFAULT_SAMPLE_CAPACITY);
}

#[tokio::test]
async fn monitor_reads_session_counters() {
    let bus = MockBus::new();
    let mut stats = HashMap::new();
    stats.insert("BYTES_IN".to_string(), 12_000i64);
    stats.insert("BYTES_OUT".to_string(), 3_400i64);
    stats.insert("PACKETS_IN".to_string(), 80i64);
    stats.insert("PACKETS_OUT".to_string(), 60i64);
    bus.set_statistics("/sessions/1", stats);

    let mut monitor = BandwidthMonitor::new("/sessions/1", "tun0", StatsSource::Bus, 16);
    let sample = monitor.update(&bus).await.unwrap();

    assert_eq!(sample.bytes_in, 12_000);
    assert_eq!(sample.bytes_out, 3_400);
    assert_eq!(sample.packets_in, 80);
    assert_eq!(monitor.series().len(), 1);
}

#[tokio::test]
async fn bus_only_monitor_propagates_failures() {
    let bus = MockBus::new();
    let mut monitor = BandwidthMonitor::new("/sessions/none", "tun0", StatsSource::Bus, 16);

    assert!(monitor.update(&bus).await.is_err());
    assert!(monitor.series().is_empty());
}

#[tokio::test]
async fn negative_counters_clamp_to_zero() {
    let bus = MockBus::new();
    let mut stats = HashMap::new();
    stats.insert("BYTES_IN".to_string(), -5i64);
    stats.insert("BYTES_OUT".to_string(), 10i64);
    bus.set_statistics("/sessions/1", stats);

    let mut monitor = BandwidthMonitor::new("/sessions/1", "tun0", StatsSource::Bus, 16);
    let sample = monitor.update(&bus).await.unwrap();
    assert_eq!(sample.bytes_in, 0);
    assert_eq!(sample.bytes_out, 10);
}
