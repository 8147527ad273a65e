//! Historical trend analysis over merged recovery and cycle records
//!
//! Pure computation: a bounded newest-first window of merged day points feeds
//! rolling averages, week-over-week trend labels, and the post-high-strain
//! recovery correlation. Claude interprets these pre-computed numbers rather
//! than doing math itself.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::whoop::{CycleRecord, RecoveryRecord};

/// ---------------------------------------------------------------------------
/// Thresholds
/// ---------------------------------------------------------------------------

/// Fewer merged points than this and no summary is produced at all
const MIN_DATA_POINTS: usize = 3;
/// HRV weekly diff beyond this many ms flags a trend (strictly greater)
const HRV_TREND_THRESHOLD_MS: i64 = 3;
/// Recovery weekly diff beyond this many points flags a trend (strictly greater)
const RECOVERY_TREND_THRESHOLD_PCT: i64 = 5;
/// Strain at or above this counts as a high-strain day
const HIGH_STRAIN_THRESHOLD: f64 = 15.0;

/// ---------------------------------------------------------------------------
/// Merged Day Points
/// ---------------------------------------------------------------------------

/// One completed day with a scored recovery, newest first in the series
#[derive(Debug, Clone)]
pub struct MergedDayPoint {
  pub date: NaiveDate,
  pub strain: Option<f64>,
  pub recovery: f64,
  pub hrv: Option<i64>,
}

/// Join recoveries onto completed cycles by cycle id (last-wins on duplicate
/// ids), keeping only days with a scored recovery, sorted newest first.
fn merge_records(recoveries: &[RecoveryRecord], cycles: &[CycleRecord]) -> Vec<MergedDayPoint> {
  let mut recovery_by_cycle: HashMap<i64, &RecoveryRecord> = HashMap::new();
  for r in recoveries {
    recovery_by_cycle.insert(r.cycle_id, r);
  }

  let mut merged: Vec<MergedDayPoint> = cycles
    .iter()
    .filter(|c| c.end.is_some())
    .filter_map(|c| {
      let score = recovery_by_cycle.get(&c.id)?.score.as_ref()?;
      let recovery = score.recovery_score?;
      Some(MergedDayPoint {
        date: c.start.date_naive(),
        strain: c.score.as_ref().and_then(|s| s.strain),
        recovery,
        hrv: score.hrv_rmssd_milli.map(|v| v.round() as i64),
      })
    })
    .collect();

  merged.sort_by(|a, b| b.date.cmp(&a.date));
  merged
}

/// ---------------------------------------------------------------------------
/// Trend Labels
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "direction", content = "diff")]
pub enum HrvTrend {
  Up(i64),
  Down(i64),
  Stable,
}

impl fmt::Display for HrvTrend {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      HrvTrend::Up(diff) => write!(f, "up +{}ms vs prior week (positive sign)", diff),
      HrvTrend::Down(diff) => write!(f, "down {}ms vs prior week (watch your load)", diff),
      HrvTrend::Stable => write!(f, "stable week over week"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "direction", content = "diff")]
pub enum RecoveryTrend {
  Improving(i64),
  Declining(i64),
  Stable,
}

impl fmt::Display for RecoveryTrend {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RecoveryTrend::Improving(diff) => write!(f, "improving (+{}% vs prior week)", diff),
      RecoveryTrend::Declining(diff) => {
        write!(f, "declining ({}% vs prior week - may need more rest)", diff)
      }
      RecoveryTrend::Stable => write!(f, "stable week over week"),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Trend Summary
/// ---------------------------------------------------------------------------

/// Rolling statistics over the merged window. All-or-nothing: either every
/// window statistic was computed from at least MIN_DATA_POINTS merged days,
/// or `analyze` returned None.
#[derive(Debug, Clone, Serialize)]
pub struct TrendSummary {
  pub avg_recovery_7: i64,
  pub avg_recovery_30: i64,
  pub avg_hrv_7: Option<i64>,
  pub hrv_trend: Option<HrvTrend>,
  pub recovery_trend: Option<RecoveryTrend>,
  pub avg_post_high_strain: Option<i64>,
  pub high_strain_count: usize,
  pub data_points: usize,
}

/// Mean rounded half away from zero, None for an empty iterator
fn mean_rounded(values: impl Iterator<Item = f64>) -> Option<i64> {
  let mut sum = 0.0;
  let mut count = 0usize;
  for v in values {
    sum += v;
    count += 1;
  }
  if count == 0 {
    None
  } else {
    Some((sum / count as f64).round() as i64)
  }
}

fn avg_recovery(points: &[MergedDayPoint]) -> Option<i64> {
  mean_rounded(points.iter().map(|p| p.recovery))
}

/// Mean of the non-absent HRV readings only; absent values are excluded
/// entirely, never zero-substituted
fn avg_hrv(points: &[MergedDayPoint]) -> Option<i64> {
  mean_rounded(points.iter().filter_map(|p| p.hrv).map(|v| v as f64))
}

/// Compute the trend summary from raw recovery and cycle records.
///
/// Returns None when fewer than three merged points exist; a summary is never
/// partially computed.
pub fn analyze(recoveries: &[RecoveryRecord], cycles: &[CycleRecord]) -> Option<TrendSummary> {
  let merged = merge_records(recoveries, cycles);

  if merged.len() < MIN_DATA_POINTS {
    return None;
  }

  let last7 = &merged[..merged.len().min(7)];
  let prev7 = &merged[merged.len().min(7)..merged.len().min(14)];
  let last30 = &merged[..merged.len().min(30)];

  let avg_recovery_7 = avg_recovery(last7)?;
  let avg_recovery_30 = avg_recovery(last30)?;
  let avg_hrv_7 = avg_hrv(last7);
  let avg_hrv_prev_7 = avg_hrv(prev7);

  // HRV trend requires both weekly means; diffs compare the rounded values
  let hrv_trend = match (avg_hrv_7, avg_hrv_prev_7) {
    (Some(this_week), Some(prior_week)) => {
      let diff = this_week - prior_week;
      Some(if diff > HRV_TREND_THRESHOLD_MS {
        HrvTrend::Up(diff)
      } else if diff < -HRV_TREND_THRESHOLD_MS {
        HrvTrend::Down(diff)
      } else {
        HrvTrend::Stable
      })
    }
    _ => None,
  };

  // Recovery trend: last 7 vs the 7 before that, only once the prior week
  // itself has enough data to mean something
  let recovery_trend = if prev7.len() >= MIN_DATA_POINTS {
    let diff = avg_recovery_7 - avg_recovery(prev7)?;
    Some(if diff > RECOVERY_TREND_THRESHOLD_PCT {
      RecoveryTrend::Improving(diff)
    } else if diff < -RECOVERY_TREND_THRESHOLD_PCT {
      RecoveryTrend::Declining(diff)
    } else {
      RecoveryTrend::Stable
    })
  } else {
    None
  };

  // High-strain days and the next day's recovery. The series is newest-first,
  // so index i+1 holds the chronologically-following calendar day. The literal
  // index adjacency is intentional even when the history has gaps.
  let mut post_high_strain: Vec<f64> = Vec::new();
  for i in 0..last30.len().saturating_sub(1).min(29) {
    if last30[i].strain.map_or(false, |s| s >= HIGH_STRAIN_THRESHOLD) {
      post_high_strain.push(last30[i + 1].recovery);
    }
  }
  let high_strain_count = post_high_strain.len();
  let avg_post_high_strain = mean_rounded(post_high_strain.into_iter());

  Some(TrendSummary {
    avg_recovery_7,
    avg_recovery_30,
    avg_hrv_7,
    hrv_trend,
    recovery_trend,
    avg_post_high_strain,
    high_strain_count,
    data_points: merged.len(),
  })
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
