//! Brief composition: readiness labels, display formatting, and prompt text
//!
//! Everything here is pure string/number shaping. The short brief is a
//! byte-stable plain-text format consumed by a notification shortcut; the
//! long-form context is the prompt sent to Claude. No value is ever invented:
//! absent inputs render as "--" (short brief) or "unavailable" (prompt).

use chrono::NaiveDate;

use crate::trends::TrendSummary;
use crate::whoop::{CycleRecord, RecoveryRecord, SleepRecord};

/// Wake time assumed when the user has not configured one
const DEFAULT_WAKE_TIME: &str = "08:00";

/// ---------------------------------------------------------------------------
/// Readiness Classification
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
  Green,
  Yellow,
  Red,
}

impl Readiness {
  /// Classify a 0-100 recovery score. Callers default an absent score to 0,
  /// which lands in Red.
  pub fn from_score(score: f64) -> Self {
    if score >= 67.0 {
      Readiness::Green
    } else if score >= 34.0 {
      Readiness::Yellow
    } else {
      Readiness::Red
    }
  }

  pub fn emoji(&self) -> &'static str {
    match self {
      Readiness::Green => "\u{1F7E2}",
      Readiness::Yellow => "\u{1F7E1}",
      Readiness::Red => "\u{1F534}",
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Readiness::Green => "Go hard",
      Readiness::Yellow => "Moderate",
      Readiness::Red => "Take it easy",
    }
  }

  pub fn prompt_label(&self) -> &'static str {
    match self {
      Readiness::Green => "Green (well-recovered)",
      Readiness::Yellow => "Yellow (moderate)",
      Readiness::Red => "Red (under-recovered)",
    }
  }
}

/// ---------------------------------------------------------------------------
/// Derived Display Values
/// ---------------------------------------------------------------------------

/// Suggested strain target: recovery score scaled onto the 0-21 strain range,
/// always one decimal
pub fn strain_target(recovery_score: f64) -> String {
  format!("{:.1}", recovery_score * 0.21)
}

/// Recommended bedtime in 12-hour clock, from sleep need and wake time.
/// Absent or zero sleep need yields None.
pub fn bedtime(sleep_need_milli: Option<i64>, wake_time: &str) -> Option<String> {
  let need_ms = sleep_need_milli.filter(|&ms| ms != 0)?;

  let (hours, minutes) = wake_time.split_once(':')?;
  let wake_mins = hours.parse::<i64>().ok()? * 60 + minutes.parse::<i64>().ok()?;

  let need_mins = (need_ms as f64 / 1000.0 / 60.0).round() as i64;
  let mut bed_mins = wake_mins - need_mins;
  if bed_mins < 0 {
    bed_mins += 24 * 60; // wraps to the previous day
  }

  Some(format_12h(bed_mins))
}

pub fn default_bedtime(sleep_need_milli: Option<i64>) -> Option<String> {
  bedtime(sleep_need_milli, DEFAULT_WAKE_TIME)
}

fn format_12h(minutes_of_day: i64) -> String {
  let hour = (minutes_of_day / 60) % 24;
  let minute = minutes_of_day % 60;
  let period = if hour >= 12 { "PM" } else { "AM" };
  let hour12 = match hour % 12 {
    0 => 12,
    h => h,
  };
  format!("{}:{:02} {}", hour12, minute, period)
}

/// "+4ms vs avg" when both sides exist, otherwise no clause at all
fn hrv_delta_clause(today_hrv: Option<i64>, avg_hrv: Option<i64>) -> Option<String> {
  match (today_hrv, avg_hrv) {
    (Some(today), Some(avg)) => Some(format!("{:+}ms vs avg", today - avg)),
    _ => None,
  }
}

/// ---------------------------------------------------------------------------
/// Today Snapshot
/// ---------------------------------------------------------------------------

/// The latest readings that describe "today", pulled from the freshest
/// recovery, sleep, and completed cycle records
#[derive(Debug, Clone, Default)]
pub struct TodaySnapshot {
  pub recovery_score: f64,
  pub hrv: Option<i64>,
  pub resting_heart_rate: Option<i64>,
  pub sleep_performance: Option<f64>,
  pub strain: Option<f64>,
  pub sleep_need_milli: Option<i64>,
}

impl TodaySnapshot {
  pub fn from_records(
    recovery: Option<&RecoveryRecord>,
    sleep: Option<&SleepRecord>,
    cycle: Option<&CycleRecord>,
  ) -> Self {
    let recovery_score = recovery.and_then(|r| r.score.as_ref());
    let sleep_score = sleep.and_then(|s| s.score.as_ref());

    Self {
      recovery_score: recovery_score
        .and_then(|s| s.recovery_score)
        .unwrap_or(0.0),
      hrv: recovery_score
        .and_then(|s| s.hrv_rmssd_milli)
        .map(|v| v.round() as i64),
      resting_heart_rate: recovery_score.and_then(|s| s.resting_heart_rate),
      sleep_performance: sleep_score.and_then(|s| s.sleep_performance_percentage),
      strain: cycle.and_then(|c| c.score.as_ref()).and_then(|s| s.strain),
      sleep_need_milli: sleep_score
        .and_then(|s| s.sleep_needed.as_ref())
        .and_then(|n| n.baseline_milli),
    }
  }

  fn recovery_pct(&self) -> i64 {
    self.recovery_score.round() as i64
  }
}

/// ---------------------------------------------------------------------------
/// Short Brief (notification wire format)
/// ---------------------------------------------------------------------------

/// Newline-joined plain text, fixed line order. Field order and formatting are
/// consumed by an external automation and must stay byte-stable.
pub fn compose_short_brief(
  date: NaiveDate,
  today: &TodaySnapshot,
  avg_hrv: Option<i64>,
) -> String {
  let readiness = Readiness::from_score(today.recovery_score);

  let hrv_display = match today.hrv {
    Some(hrv) => format!("{}ms", hrv),
    None => "--ms".to_string(),
  };
  let hrv_line = match hrv_delta_clause(today.hrv, avg_hrv) {
    Some(clause) => format!(
      "\u{2764}\u{fe0f} HRV {} ({}) \u{b7} RHR {}bpm",
      hrv_display,
      clause,
      opt_int(today.resting_heart_rate)
    ),
    None => format!(
      "\u{2764}\u{fe0f} HRV {} \u{b7} RHR {}bpm",
      hrv_display,
      opt_int(today.resting_heart_rate)
    ),
  };

  let sleep_display = match today.sleep_performance {
    Some(pct) => format!("{}%", pct.round() as i64),
    None => "--".to_string(),
  };
  let strain_display = match today.strain {
    Some(strain) => format!("{:.1}", strain),
    None => "--".to_string(),
  };

  let mut lines = vec![
    date.format("%a, %b %-d").to_string(),
    format!(
      "{} Recovery {}% \u{b7} {}",
      readiness.emoji(),
      today.recovery_pct(),
      readiness.label()
    ),
    hrv_line,
    format!("\u{1F634} Sleep {} \u{b7} Strain {}", sleep_display, strain_display),
    format!("\u{26A1} Target {}", strain_target(today.recovery_score)),
  ];

  if let Some(bed) = default_bedtime(today.sleep_need_milli) {
    lines.push(format!("\u{1F6CF} Bed {}", bed));
  }

  lines.join("\n")
}

fn opt_int(value: Option<i64>) -> String {
  match value {
    Some(v) => v.to_string(),
    None => "--".to_string(),
  }
}

/// Prompt for the optional one-sentence coaching line appended to the short
/// brief when the gateway is reachable
pub fn compose_coaching_prompt(brief_text: &str) -> String {
  format!(
    "You are a concise personal health coach. Reply with one short motivating \
     coaching sentence (under 20 words) for an athlete whose morning summary is:\n\n{}",
    brief_text
  )
}

/// ---------------------------------------------------------------------------
/// Long-Form Prompt Context
/// ---------------------------------------------------------------------------

fn opt_unit(value: Option<i64>, unit: &str) -> String {
  match value {
    Some(v) => format!("{}{}", v, unit),
    None => "unavailable".to_string(),
  }
}

/// Assemble the full prompt sent to the completion gateway. Every number
/// traces to an input field; the snapshot block always renders all of its
/// lines ("unavailable" for absent values) while historical sub-lines are
/// dropped entirely when their value is absent.
pub fn compose_prompt_context(
  today: &TodaySnapshot,
  summary: Option<&TrendSummary>,
  routine: &[String],
) -> String {
  let readiness = Readiness::from_score(today.recovery_score);

  let sleep_display = match today.sleep_performance {
    Some(pct) => format!("{}%", pct.round() as i64),
    None => "unavailable".to_string(),
  };
  let strain_display = match today.strain {
    Some(strain) => format!("{:.1}", strain),
    None => "unavailable".to_string(),
  };
  let bed_display = default_bedtime(today.sleep_need_milli)
    .unwrap_or_else(|| "unavailable".to_string());

  let history_section = summary.map(|s| {
    let mut lines = vec![
      format!("Historical Patterns ({} days of data):", s.data_points),
      format!(
        "- 7-day avg recovery: {}% | 30-day avg: {}%",
        s.avg_recovery_7, s.avg_recovery_30
      ),
    ];
    if let Some(trend) = s.recovery_trend {
      lines.push(format!("- Recovery trend: {}", trend));
    }
    if let Some(avg_hrv_7) = s.avg_hrv_7 {
      let trend = s
        .hrv_trend
        .map(|t| t.to_string())
        .unwrap_or_else(|| "no prior week data".to_string());
      lines.push(format!("- HRV: {}ms 7-day avg ({})", avg_hrv_7, trend));
    }
    if let Some(post) = s.avg_post_high_strain {
      lines.push(format!(
        "- After high-strain days (15+): avg next-day recovery is {}% (seen {}x in last 30 days)",
        post, s.high_strain_count
      ));
    }
    lines.join("\n")
  });

  let routine_text = if routine.is_empty() {
    "(no routine items set)".to_string()
  } else {
    routine
      .iter()
      .map(|item| format!("- {}", item))
      .collect::<Vec<_>>()
      .join("\n")
  };

  let mut prompt = format!(
    "You are a concise personal health coach with access to this athlete's real \
     Whoop data. Give a short, personalized morning brief.\n\n\
     Today's Data:\n\
     - Recovery: {}% - {}\n\
     - HRV: {}\n\
     - Resting HR: {}\n\
     - Sleep Performance: {}\n\
     - Yesterday's Strain: {}\n\
     - Suggested Strain Target: {}\n\
     - Recommended Bedtime: {}\n",
    today.recovery_pct(),
    readiness.prompt_label(),
    opt_unit(today.hrv, "ms"),
    opt_unit(today.resting_heart_rate, " bpm"),
    sleep_display,
    strain_display,
    strain_target(today.recovery_score),
    bed_display,
  );

  if let Some(history) = history_section {
    prompt.push('\n');
    prompt.push_str(&history);
    prompt.push('\n');
  }

  prompt.push_str(&format!(
    "\nMorning Routine:\n{}\n\n\
     Write a brief with these sections (total under 160 words):\n\
     1. One sentence on how they're looking today, referencing their personal trends where relevant.\n\
     2. Specific workout intensity or activity recommendation based on today's numbers and their historical patterns.\n\
     3. A natural reminder of their morning routine items.\n\
     4. One short motivating closing line.\n\n\
     Be direct, personal, and reference actual numbers.",
    routine_text
  ));

  prompt
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::trends::analyze;
  use crate::test_utils::{cycle_record, recovery_record};

  fn full_snapshot() -> TodaySnapshot {
    TodaySnapshot {
      recovery_score: 70.0,
      hrv: Some(65),
      resting_heart_rate: Some(48),
      sleep_performance: Some(88.4),
      strain: Some(10.0),
      sleep_need_milli: Some(28_800_000),
    }
  }

  #[test]
  fn test_readiness_boundaries() {
    assert_eq!(Readiness::from_score(67.0), Readiness::Green);
    assert_eq!(Readiness::from_score(66.9), Readiness::Yellow);
    assert_eq!(Readiness::from_score(34.0), Readiness::Yellow);
    assert_eq!(Readiness::from_score(33.9), Readiness::Red);
    assert_eq!(Readiness::from_score(0.0), Readiness::Red);
  }

  #[test]
  fn test_strain_target_formatting() {
    assert_eq!(strain_target(67.0), "14.1");
    assert_eq!(strain_target(0.0), "0.0");
    assert_eq!(strain_target(100.0), "21.0");
  }

  #[test]
  fn test_bedtime_eight_hours_before_seven() {
    // 8h before a 07:00 wake wraps to the previous evening
    assert_eq!(
      bedtime(Some(28_800_000), "07:00"),
      Some("11:00 PM".to_string())
    );
  }

  #[test]
  fn test_bedtime_absent_or_zero_need() {
    assert_eq!(bedtime(None, "08:00"), None);
    assert_eq!(bedtime(Some(0), "08:00"), None);
  }

  #[test]
  fn test_bedtime_midnight_renders_as_12_am() {
    assert_eq!(
      bedtime(Some(28_800_000), "08:00"),
      Some("12:00 AM".to_string())
    );
  }

  #[test]
  fn test_bedtime_rounds_need_to_whole_minutes() {
    // 7h45m need, 06:30 wake -> 22:45
    assert_eq!(
      bedtime(Some(27_900_000), "06:30"),
      Some("10:45 PM".to_string())
    );
  }

  #[test]
  fn test_hrv_delta_clause() {
    assert_eq!(
      hrv_delta_clause(Some(65), Some(61)),
      Some("+4ms vs avg".to_string())
    );
    assert_eq!(
      hrv_delta_clause(Some(55), Some(61)),
      Some("-6ms vs avg".to_string())
    );
    assert_eq!(hrv_delta_clause(None, Some(61)), None);
    assert_eq!(hrv_delta_clause(Some(65), None), None);
  }

  #[test]
  fn test_short_brief_full_snapshot_is_byte_stable() {
    let date = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap(); // a Saturday
    let brief = compose_short_brief(date, &full_snapshot(), Some(61));

    assert_eq!(
      brief,
      "Sat, Jan 6\n\
       \u{1F7E2} Recovery 70% \u{b7} Go hard\n\
       \u{2764}\u{fe0f} HRV 65ms (+4ms vs avg) \u{b7} RHR 48bpm\n\
       \u{1F634} Sleep 88% \u{b7} Strain 10.0\n\
       \u{26A1} Target 14.7\n\
       \u{1F6CF} Bed 12:00 AM"
    );
  }

  #[test]
  fn test_short_brief_absent_fields() {
    let date = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();
    let today = TodaySnapshot::default();
    let brief = compose_short_brief(date, &today, None);

    let lines: Vec<&str> = brief.lines().collect();
    assert_eq!(lines.len(), 5, "no bedtime line without sleep need");
    assert_eq!(lines[1], "\u{1F534} Recovery 0% \u{b7} Take it easy");
    assert_eq!(lines[2], "\u{2764}\u{fe0f} HRV --ms \u{b7} RHR --bpm");
    assert_eq!(lines[3], "\u{1F634} Sleep -- \u{b7} Strain --");
    assert_eq!(lines[4], "\u{26A1} Target 0.0");
  }

  #[test]
  fn test_snapshot_from_records() {
    let recoveries = vec![recovery_record(1, Some(70.0), Some(64.6))];
    let cycles = vec![cycle_record(1, 0, true, Some(10.0))];

    let today = TodaySnapshot::from_records(recoveries.first(), None, cycles.first());
    assert_eq!(today.recovery_score, 70.0);
    assert_eq!(today.hrv, Some(65));
    assert!(today.sleep_performance.is_none());
    assert_eq!(today.strain, Some(10.0));
  }

  #[test]
  fn test_prompt_context_snapshot_block_never_drops_lines() {
    let today = TodaySnapshot::default();
    let prompt = compose_prompt_context(&today, None, &[]);

    assert!(prompt.contains("- Recovery: 0% - Red (under-recovered)"));
    assert!(prompt.contains("- HRV: unavailable"));
    assert!(prompt.contains("- Resting HR: unavailable"));
    assert!(prompt.contains("- Sleep Performance: unavailable"));
    assert!(prompt.contains("- Yesterday's Strain: unavailable"));
    assert!(prompt.contains("- Recommended Bedtime: unavailable"));
    assert!(prompt.contains("(no routine items set)"));
    assert!(!prompt.contains("Historical Patterns"));
  }

  #[test]
  fn test_prompt_context_with_history_and_routine() {
    let days: Vec<(f64, Option<f64>, Option<f64>)> = (0..14)
      .map(|i| (70.0 - i as f64, Some(60.0), Some(8.0)))
      .collect();
    let (recoveries, cycles): (Vec<_>, Vec<_>) = days
      .iter()
      .enumerate()
      .map(|(i, (r, h, s))| {
        let id = (days.len() - i) as i64;
        (
          recovery_record(id, Some(*r), *h),
          cycle_record(id, i as i64, true, *s),
        )
      })
      .unzip();

    let summary = analyze(&recoveries, &cycles).unwrap();
    let routine = vec!["Stretch 10 min".to_string(), "Protein breakfast".to_string()];
    let prompt = compose_prompt_context(&full_snapshot(), Some(&summary), &routine);

    assert!(prompt.contains("Historical Patterns (14 days of data):"));
    assert!(prompt.contains("- 7-day avg recovery: 67% | 30-day avg: 64%"));
    assert!(prompt.contains("- Recovery trend: improving (+7% vs prior week)"));
    assert!(prompt.contains("- HRV: 60ms 7-day avg (stable week over week)"));
    assert!(prompt.contains("- Stretch 10 min"));
    assert!(prompt.contains("- Protein breakfast"));
    assert!(prompt.contains("under 160 words"));
  }

  #[test]
  fn test_single_point_history_yields_snapshot_only_prompt() {
    // One merged point: below the 3-point floor, so no historical block,
    // but the snapshot block still renders every numeric field
    let recoveries = vec![recovery_record(1, Some(70.0), Some(65.0))];
    let cycles = vec![cycle_record(1, 0, true, Some(10.0))];

    assert!(analyze(&recoveries, &cycles).is_none());

    let today = TodaySnapshot::from_records(recoveries.first(), None, cycles.first());
    let prompt = compose_prompt_context(&today, None, &[]);

    assert!(!prompt.contains("Historical Patterns"));
    assert!(prompt.contains("- Recovery: 70% - Green (well-recovered)"));
    assert!(prompt.contains("- HRV: 65ms"));
    assert!(prompt.contains("- Yesterday's Strain: 10.0"));
    assert!(prompt.contains("- Suggested Strain Target: 14.7"));
  }
}
