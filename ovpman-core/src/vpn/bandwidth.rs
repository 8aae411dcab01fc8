//! Bandwidth sampling
//!
//! Each monitored session gets a fixed-capacity rolling buffer of counter
//! samples. The first sample ever recorded is kept as the baseline so
//! session-lifetime totals survive buffer rotation. Counters come from the
//! session's `statistics` property or from the tunnel device's kernel
//! counters, selectable per monitor.

use crate::bus::VpnBus;
use crate::error::BusError;
use crate::types::unix_now;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default number of retained samples
pub const DEFAULT_SAMPLE_CAPACITY: usize = 60;

/// Errors from bandwidth sampling
#[derive(Debug, Error)]
pub enum BandwidthError {
    #[error("no samples recorded yet")]
    NoSamples,

    #[error("need at least two samples to derive a rate")]
    NotEnoughData,

    #[error("device counters unavailable for {device}: {source}")]
    DeviceCounters {
        device: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Where counter samples are pulled from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsSource {
    /// Session statistics first, device counters when that fails
    #[default]
    Auto,
    /// Session statistics only
    Bus,
    /// Device counters only
    Device,
}

/// One timestamped counter snapshot. All counters are running totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthSample {
    pub timestamp: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub packets_in: u64,
    pub packets_out: u64,
    pub errors_in: u64,
    pub errors_out: u64,
    pub dropped_in: u64,
    pub dropped_out: u64,
}

/// Throughput derived from the two most recent samples, plus lifetime totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BandwidthRate {
    pub download_bps: f64,
    pub upload_bps: f64,
    pub total_downloaded: u64,
    pub total_uploaded: u64,
}

/// Fixed-capacity rolling sample history
#[derive(Debug, Clone)]
pub struct BandwidthSeries {
    samples: Vec<BandwidthSample>,
    capacity: usize,
    write_index: usize,
    len: usize,
    baseline: Option<BandwidthSample>,
    start_time: u64,
}

impl BandwidthSeries {
    /// New series; a zero capacity falls back to the default.
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_SAMPLE_CAPACITY
        } else {
            capacity
        };
        Self {
            samples: vec![BandwidthSample::default(); capacity],
            capacity,
            write_index: 0,
            len: 0,
            baseline: None,
            start_time: 0,
        }
    }

    /// Append a sample, overwriting the oldest once full. The first sample
    /// ever pushed becomes the permanent baseline.
    pub fn push(&mut self, sample: BandwidthSample) {
        self.samples[self.write_index] = sample;
        self.write_index = (self.write_index + 1) % self.capacity;
        if self.len < self.capacity {
            self.len += 1;
        }

        if self.baseline.is_none() {
            self.baseline = Some(sample);
            self.start_time = sample.timestamp;
        }
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The baseline sample, once one was recorded.
    pub fn baseline(&self) -> Option<&BandwidthSample> {
        self.baseline.as_ref()
    }

    /// Timestamp of the baseline sample.
    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<&BandwidthSample> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.write_index + self.capacity - 1) % self.capacity;
        Some(&self.samples[idx])
    }

    fn previous(&self) -> Option<&BandwidthSample> {
        if self.len < 2 {
            return None;
        }
        let idx = (self.write_index + self.capacity - 2) % self.capacity;
        Some(&self.samples[idx])
    }

    /// Throughput from the two most recent samples plus lifetime totals.
    ///
    /// Needs at least two samples. Identical timestamps clamp the time
    /// delta to one second instead of dividing by zero.
    pub fn rate(&self) -> Result<BandwidthRate, BandwidthError> {
        let latest = self.latest().ok_or(BandwidthError::NotEnoughData)?;
        let previous = self.previous().ok_or(BandwidthError::NotEnoughData)?;

        let elapsed = latest.timestamp.saturating_sub(previous.timestamp).max(1);

        let (total_downloaded, total_uploaded) = self.totals_from(latest);

        Ok(BandwidthRate {
            download_bps: latest.bytes_in.saturating_sub(previous.bytes_in) as f64
                / elapsed as f64,
            upload_bps: latest.bytes_out.saturating_sub(previous.bytes_out) as f64
                / elapsed as f64,
            total_downloaded,
            total_uploaded,
        })
    }

    /// Bytes moved since the baseline sample: `(downloaded, uploaded)`.
    pub fn totals(&self) -> Result<(u64, u64), BandwidthError> {
        let latest = self.latest().ok_or(BandwidthError::NoSamples)?;
        Ok(self.totals_from(latest))
    }

    fn totals_from(&self, latest: &BandwidthSample) -> (u64, u64) {
        match &self.baseline {
            Some(baseline) => (
                latest.bytes_in.saturating_sub(baseline.bytes_in),
                latest.bytes_out.saturating_sub(baseline.bytes_out),
            ),
            None => (latest.bytes_in, latest.bytes_out),
        }
    }

    /// Up to `max` samples, newest first.
    pub fn samples(&self, max: usize) -> Vec<BandwidthSample> {
        let count = max.min(self.len);
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let idx = (self.write_index + self.capacity - 1 - i) % self.capacity;
            out.push(self.samples[idx]);
        }
        out
    }

    /// Drop all samples and the baseline.
    pub fn reset(&mut self) {
        self.len = 0;
        self.write_index = 0;
        self.baseline = None;
        self.start_time = 0;
        self.samples.fill(BandwidthSample::default());
    }
}

/// Sampler for one session's counters
#[derive(Debug)]
pub struct BandwidthMonitor {
    session_path: String,
    device_name: String,
    source: StatsSource,
    series: BandwidthSeries,
}

impl BandwidthMonitor {
    pub fn new(session_path: &str, device_name: &str, source: StatsSource, capacity: usize) -> Self {
        Self {
            session_path: session_path.to_string(),
            device_name: device_name.to_string(),
            source,
            series: BandwidthSeries::new(capacity),
        }
    }

    /// Pull the current counters and record a sample.
    ///
    /// In `Auto` mode the device counters are tried only after the session
    /// statistics fail; in the single-source modes a failure propagates
    /// without fallback.
    pub async fn update<B: VpnBus>(&mut self, bus: &B) -> Result<BandwidthSample, BandwidthError> {
        let sample = match self.source {
            StatsSource::Bus => self.bus_sample(bus).await?,
            StatsSource::Device => self.device_sample()?,
            StatsSource::Auto => match self.bus_sample(bus).await {
                Ok(sample) => sample,
                Err(err) => {
                    debug!(
                        session = %self.session_path,
                        error = %err,
                        "session statistics unavailable, falling back to device counters"
                    );
                    self.device_sample()?
                }
            },
        };

        self.series.push(sample);
        Ok(sample)
    }

    async fn bus_sample<B: VpnBus>(&self, bus: &B) -> Result<BandwidthSample, BandwidthError> {
        let stats = bus.session_statistics(&self.session_path).await?;
        let counter = |key: &str| stats.get(key).copied().unwrap_or(0).max(0) as u64;

        Ok(BandwidthSample {
            timestamp: unix_now(),
            bytes_in: counter("BYTES_IN"),
            bytes_out: counter("BYTES_OUT"),
            packets_in: counter("PACKETS_IN"),
            packets_out: counter("PACKETS_OUT"),
            ..BandwidthSample::default()
        })
    }

    fn device_sample(&self) -> Result<BandwidthSample, BandwidthError> {
        if self.device_name.is_empty() {
            return Err(BandwidthError::Bus(BusError::InvalidArgument(
                "no tunnel device to sample".to_string(),
            )));
        }

        // rx_bytes decides whether the device exists; the rest degrade to 0
        let bytes_in = read_device_counter(&self.device_name, "rx_bytes").map_err(|source| {
            BandwidthError::DeviceCounters {
                device: self.device_name.clone(),
                source,
            }
        })?;

        let counter = |name: &str| read_device_counter(&self.device_name, name).unwrap_or(0);

        Ok(BandwidthSample {
            timestamp: unix_now(),
            bytes_in,
            bytes_out: counter("tx_bytes"),
            packets_in: counter("rx_packets"),
            packets_out: counter("tx_packets"),
            errors_in: counter("rx_errors"),
            errors_out: counter("tx_errors"),
            dropped_in: counter("rx_dropped"),
            dropped_out: counter("tx_dropped"),
        })
    }

    pub fn session_path(&self) -> &str {
        &self.session_path
    }

    pub fn source(&self) -> StatsSource {
        self.source
    }

    /// The recorded history.
    pub fn series(&self) -> &BandwidthSeries {
        &self.series
    }

    /// Current throughput and lifetime totals.
    pub fn rate(&self) -> Result<BandwidthRate, BandwidthError> {
        self.series.rate()
    }
}

fn read_device_counter(device: &str, name: &str) -> Result<u64, std::io::Error> {
    let path = format!("/sys/class/net/{device}/statistics/{name}");
    let text = std::fs::read_to_string(path)?;
    text.trim()
        .parse::<u64>()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
