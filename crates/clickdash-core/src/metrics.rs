//! Dashboard aggregates over a fetched task list.
//!
//! Everything here is a pure function of the tasks, `now` and the dashboard
//! timezone, so callers decide which clock and zone apply.

use chrono::{
  DateTime,
  Duration,
  Utc
};
use chrono_tz::Tz;

use crate::datetime::{
  MONTH_NAMES,
  days_between_ceil,
  days_since,
  year_month
};
use crate::task::{
  COMPLETED_STATUS,
  Task
};

pub const RECENT_WINDOW_DAYS: i64 = 7;
pub const RECENT_TASKS_LIMIT: usize = 10;
pub const TREND_MONTHS: u32 = 12;

pub const DEFECT_STATUS: &str = "결함";
pub const JUDGING_STATUS: &str = "판정 중";
pub const NO_DEFECT_STATUS: &str =
  "무결함";

/// Status order of the intake summary table.
pub const SUMMARY_ORDER: [&str; 7] = [
  "미확인",
  "확인 중",
  "판정 중",
  "결함",
  "무결함",
  "반려",
  "완료"
];

/// Header shown for a summary status.
pub fn summary_label(status: &str) -> &str {
  match status {
    | "확인 중" => "확인 중(문의)",
    | "반려" => "반려(재처리)",
    | other => other
  }
}

pub fn summary_description(
  status: &str
) -> Option<&'static str> {
  match status {
    | "미확인" => {
      Some("아직 확인하지 못한 접수 건들")
    }
    | "확인 중" => Some(
      "접수는 했으나 요청사항에 대한 문의가 \
       필요한 것들"
    ),
    | "판정 중" => Some(
      "내부 분석이 필요하여 결함 판정 중인 \
       것들"
    ),
    | "결함" => Some("결함 판정된 것들"),
    | "무결함" => {
      Some("무결함 판정된 것들")
    }
    | "완료" => Some(
      "검증시험 중 처리 완료(종결과 \
       배포까지) 된 것들"
    ),
    | _ => None
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCount {
  pub status:     String,
  pub color:      String,
  pub count:      usize,
  /// Share of all tasks, rounded to a whole percent.
  pub percentage: u32
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
  pub status:      &'static str,
  pub label:       &'static str,
  pub description: Option<&'static str>,
  pub count:       usize,
  pub percentage:  f64
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
  pub total: usize,
  pub rows:  Vec<SummaryRow>
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default
)]
pub struct DashboardMetrics {
  pub total:           usize,
  pub completed:       usize,
  pub active:          usize,
  pub recent:          usize,
  pub completion_rate: u32
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendPoint {
  pub label:     String,
  pub year:      i32,
  pub month0:    u32,
  pub created:   usize,
  pub completed: usize
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Default
)]
pub struct DefectResolution {
  pub normal_count:    usize,
  pub urgent_count:    usize,
  pub normal_avg_days: f64,
  pub urgent_avg_days: f64
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefectRow<'a> {
  pub task:                &'a Task,
  pub short_id:            &'a str,
  pub days_since_creation: i64,
  /// Days since the last update, or since creation when that is not
  /// positive.
  pub elapsed_days:        i64
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Default
)]
pub struct DefectTables<'a> {
  pub normal:   Vec<DefectRow<'a>>,
  pub urgent:   Vec<DefectRow<'a>>,
  pub resolved: Vec<DefectRow<'a>>
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusGroup<'a> {
  pub status: String,
  pub color:  String,
  pub tasks:  Vec<&'a Task>
}

fn percent(
  count: usize,
  total: usize
) -> f64 {
  if total == 0 {
    0.0
  } else {
    count as f64 / total as f64 * 100.0
  }
}

fn round1(value: f64) -> f64 {
  (value * 10.0).round() / 10.0
}

fn mean(
  values: impl Iterator<Item = i64>
) -> f64 {
  let (sum, n) = values.fold(
    (0i64, 0usize),
    |(sum, n), v| (sum + v, n + 1)
  );
  if n == 0 {
    0.0
  } else {
    round1(sum as f64 / n as f64)
  }
}

/// Per-status counts in first-seen order.
pub fn status_counts(
  tasks: &[Task]
) -> Vec<StatusCount> {
  let mut out: Vec<StatusCount> =
    Vec::new();
  for task in tasks {
    match out.iter_mut().find(|c| {
      c.status == task.status.status
    }) {
      | Some(existing) => {
        existing.count += 1
      }
      | None => {
        out.push(StatusCount {
          status:     task
            .status
            .status
            .clone(),
          color:      task
            .status
            .color
            .clone(),
          count:      1,
          percentage: 0
        })
      }
    }
  }
  for entry in &mut out {
    entry.percentage =
      percent(entry.count, tasks.len())
        .round() as u32;
  }
  out
}

pub fn count_with_status(
  tasks: &[Task],
  status: &str
) -> usize {
  tasks
    .iter()
    .filter(|t| t.has_status(status))
    .count()
}

pub fn summary_table(
  tasks: &[Task]
) -> SummaryTable {
  let total = tasks.len();
  let rows = SUMMARY_ORDER
    .iter()
    .map(|&status| {
      let count =
        count_with_status(tasks, status);
      SummaryRow {
        status,
        label: summary_label(status),
        description: summary_description(
          status
        ),
        count,
        percentage: percent(count, total)
      }
    })
    .collect();
  SummaryTable {
    total,
    rows
  }
}

#[tracing::instrument(skip(tasks), fields(tasks = tasks.len()))]
pub fn dashboard_metrics(
  tasks: &[Task],
  now: DateTime<Utc>
) -> DashboardMetrics {
  let total = tasks.len();
  let completed = count_with_status(
    tasks,
    COMPLETED_STATUS
  );
  let cutoff = now
    - Duration::days(RECENT_WINDOW_DAYS);
  let recent = tasks
    .iter()
    .filter(|t| {
      t.date_created.is_some_and(
        |created| created > cutoff
      )
    })
    .count();

  DashboardMetrics {
    total,
    completed,
    active: total - completed,
    recent,
    completion_rate: percent(
      completed, total
    )
    .round()
      as u32
  }
}

/// Completed tasks per month of the current year, keyed by last update.
pub fn monthly_completions(
  tasks: &[Task],
  now: DateTime<Utc>,
  tz: &Tz
) -> [usize; 12] {
  let (year, _) = year_month(now, tz);
  let mut buckets = [0usize; 12];
  for task in
    tasks.iter().filter(|t| t.is_completed())
  {
    if let Some(at) = task.touched_at() {
      let (y, m) = year_month(at, tz);
      if y == year {
        buckets[m as usize] += 1;
      }
    }
  }
  buckets
}

/// `(year, month0)` pairs for the trailing months ending with `now`'s month.
fn trailing_months(
  now: DateTime<Utc>,
  tz: &Tz,
  months: u32
) -> Vec<(i32, u32)> {
  let (year, month0) = year_month(now, tz);
  let current = year * 12 + month0 as i32;
  (0..months as i32)
    .rev()
    .map(|back| {
      let idx = current - back;
      (
        idx.div_euclid(12),
        idx.rem_euclid(12) as u32
      )
    })
    .collect()
}

/// Created and completed counts for the last twelve months, oldest first.
pub fn creation_trend(
  tasks: &[Task],
  now: DateTime<Utc>,
  tz: &Tz
) -> Vec<TrendPoint> {
  trailing_months(now, tz, TREND_MONTHS)
    .into_iter()
    .map(|(year, month0)| {
      let in_month =
        |at: Option<DateTime<Utc>>| {
          at.is_some_and(|dt| {
            year_month(dt, tz)
              == (year, month0)
          })
        };
      TrendPoint {
        label: format!(
          "{} {year}",
          MONTH_NAMES[month0 as usize]
        ),
        year,
        month0,
        created: tasks
          .iter()
          .filter(|t| in_month(t.date_created))
          .count(),
        completed: tasks
          .iter()
          .filter(|t| {
            t.is_completed()
              && in_month(t.touched_at())
          })
          .count()
      }
    })
    .collect()
}

/// Mean ceil-day age of the tasks, one decimal.
pub fn average_days_since_creation(
  tasks: &[Task],
  now: DateTime<Utc>
) -> f64 {
  mean(tasks.iter().map(|t| {
    days_since(t.date_created, now)
  }))
}

/// Resolution time of completed tasks, the first 70% counted as normal
/// defects and the rest as urgent.
pub fn defect_resolution(
  tasks: &[Task]
) -> DefectResolution {
  let resolved: Vec<i64> = tasks
    .iter()
    .filter(|t| t.is_completed())
    .filter_map(|t| {
      match (t.date_created, t.date_updated)
      {
        | (Some(created), Some(updated))
          if updated > created =>
        {
          Some(days_between_ceil(
            created, updated
          ))
        }
        | _ => None
      }
    })
    .collect();

  let split = resolved.len() * 7 / 10;
  let (normal, urgent) =
    resolved.split_at(split);
  DefectResolution {
    normal_count:    normal.len(),
    urgent_count:    urgent.len(),
    normal_avg_days: mean(
      normal.iter().copied()
    ),
    urgent_avg_days: mean(
      urgent.iter().copied()
    )
  }
}

fn defect_row(
  task: &Task,
  now: DateTime<Utc>
) -> DefectRow<'_> {
  let days_since_creation =
    days_since(task.date_created, now);
  let since_update =
    days_since(task.date_updated, now);
  DefectRow {
    task,
    short_id: task.short_id(3),
    days_since_creation,
    elapsed_days: if since_update > 0 {
      since_update
    } else {
      days_since_creation
    }
  }
}

fn defect_rows(
  list: Vec<&Task>,
  n: usize,
  now: DateTime<Utc>
) -> Vec<DefectRow<'_>> {
  list
    .into_iter()
    .take(n)
    .map(|t| defect_row(t, now))
    .collect()
}

fn newest_created<'a>(
  tasks: impl Iterator<Item = &'a Task>
) -> Vec<&'a Task> {
  let mut out: Vec<&Task> =
    tasks.collect();
  out.sort_by(|a, b| {
    b.date_created.cmp(&a.date_created)
  });
  out
}

pub fn defect_tables(
  tasks: &[Task],
  now: DateTime<Utc>
) -> DefectTables<'_> {
  let normal =
    newest_created(tasks.iter().filter(
      |t| t.has_status(DEFECT_STATUS)
    ));
  let urgent =
    newest_created(tasks.iter().filter(
      |t| {
        t.has_status(DEFECT_STATUS)
          || t.has_status(JUDGING_STATUS)
      }
    ));
  let mut resolved: Vec<&Task> = tasks
    .iter()
    .filter(|t| {
      t.has_status(NO_DEFECT_STATUS)
        || t.is_completed()
    })
    .collect();
  resolved.sort_by(|a, b| {
    b.date_updated.cmp(&a.date_updated)
  });

  DefectTables {
    normal:   defect_rows(normal, 5, now),
    urgent:   defect_rows(urgent, 3, now),
    resolved: defect_rows(resolved, 4, now)
  }
}

/// Most recently touched tasks first; a task never updated counts from its
/// creation.
pub fn recent_tasks(
  tasks: &[Task],
  limit: usize
) -> Vec<&Task> {
  let mut out: Vec<&Task> =
    tasks.iter().collect();
  out.sort_by(|a, b| {
    b.touched_at().cmp(&a.touched_at())
  });
  out.truncate(limit);
  out
}

/// Tasks grouped by status label in first-seen order, newest-created first
/// inside each group.
pub fn group_by_status(
  tasks: &[Task]
) -> Vec<StatusGroup<'_>> {
  let mut groups: Vec<StatusGroup<'_>> =
    Vec::new();
  for task in tasks {
    match groups.iter_mut().find(|g| {
      g.status == task.status.status
    }) {
      | Some(group) => group.tasks.push(task),
      | None => {
        groups.push(StatusGroup {
          status: task
            .status
            .status
            .clone(),
          color:  task
            .status
            .color
            .clone(),
          tasks:  vec![task]
        })
      }
    }
  }
  for group in &mut groups {
    group.tasks.sort_by(|a, b| {
      b.date_created.cmp(&a.date_created)
    });
  }
  groups
}
