use std::io::{
  self,
  IsTerminal,
  Write
};

use anyhow::anyhow;
use chrono::{
  DateTime,
  Utc
};
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::{
  MONTH_NAMES,
  format_dashboard_date
};
use crate::endpoint::PredefinedEndpoint;
use crate::metrics::{
  self,
  DashboardMetrics,
  DefectResolution,
  DefectRow,
  StatusCount,
  StatusGroup,
  SummaryTable,
  TrendPoint
};
use crate::settings::Settings;
use crate::task::Task;

const BAR_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskView {
  Table,
  Cards
}

#[derive(Debug, Clone)]
pub struct Renderer {
  color: bool,
  tz:    Tz
}

impl Renderer {
  pub fn new(
    cfg: &Config,
    tz: Tz
  ) -> anyhow::Result<Self> {
    let color_cfg = cfg
      .get("color")
      .unwrap_or_else(|| "on".to_string());
    let color = match color_cfg
      .to_ascii_lowercase()
      .as_str()
    {
      | "on" | "yes" | "true" | "1" => true,
      | "off" | "no" | "false" | "0" => {
        false
      }
      | other => {
        return Err(anyhow!(
          "invalid color setting: {other}"
        ));
      }
    };

    Ok(Self {
      color: color
        && io::stdout().is_terminal(),
      tz
    })
  }

  /// Renderer without escape codes.
  pub fn plain(tz: Tz) -> Self {
    Self {
      color: false,
      tz
    }
  }

  pub fn write_settings<W: Write>(
    &self,
    out: &mut W,
    settings: &Settings
  ) -> anyhow::Result<()> {
    let key = if settings.api_key.is_empty()
    {
      "-".to_string()
    } else {
      crate::endpoint::redact(
        &settings.api_key,
        10
      )
    };
    writeln!(out, "apiKey         {key}")?;
    writeln!(
      out,
      "spaceId        {}",
      or_dash(&settings.space_id)
    )?;
    writeln!(
      out,
      "listId         {}",
      or_dash(&settings.list_id)
    )?;
    writeln!(
      out,
      "endpoint       {}",
      settings.endpoint
    )?;
    writeln!(
      out,
      "fetchAllPages  {}",
      settings.fetch_all_pages
    )?;
    Ok(())
  }

  pub fn write_endpoints<W: Write>(
    &self,
    out: &mut W,
    endpoints: &[PredefinedEndpoint],
    base_url: &str
  ) -> anyhow::Result<()> {
    let headers = vec![
      "Name".to_string(),
      "Pages".to_string(),
      "Template".to_string(),
      "Description".to_string(),
    ];
    let rows = endpoints
      .iter()
      .map(|ep| {
        vec![
          self.paint(ep.name, "1"),
          if ep.fetch_all_pages {
            "all"
          } else {
            "one"
          }
          .to_string(),
          ep.template(base_url).unwrap_or_else(
            || "(custom)".to_string()
          ),
          ep.description.to_string(),
        ]
      })
      .collect();
    write_table(out, headers, rows)
  }

  #[tracing::instrument(skip(self, out, tasks), fields(tasks = tasks.len()))]
  pub fn write_tasks<W: Write>(
    &self,
    out: &mut W,
    tasks: &[Task],
    view: TaskView
  ) -> anyhow::Result<()> {
    writeln!(
      out,
      "{}",
      self.paint(
        &format!("Tasks ({})", tasks.len()),
        "1"
      )
    )?;
    if tasks.is_empty() {
      writeln!(out, "No tasks.")?;
      return Ok(());
    }

    for group in metrics::group_by_status(tasks)
    {
      writeln!(out)?;
      self.write_group_header(out, &group)?;
      match view {
        | TaskView::Table => {
          self.write_task_table(
            out,
            &group.tasks
          )?
        }
        | TaskView::Cards => {
          for task in &group.tasks {
            self.write_card(out, task)?;
          }
        }
      }
    }
    Ok(())
  }

  fn write_group_header<W: Write>(
    &self,
    out: &mut W,
    group: &StatusGroup<'_>
  ) -> anyhow::Result<()> {
    let badge = self.paint_hex(
      &format!("■ {}", group.status),
      &group.color
    );
    writeln!(
      out,
      "{badge} ({})",
      group.tasks.len()
    )?;
    Ok(())
  }

  fn write_task_table<W: Write>(
    &self,
    out: &mut W,
    tasks: &[&Task]
  ) -> anyhow::Result<()> {
    let headers = vec![
      "ID".to_string(),
      "Name".to_string(),
      "Assignees".to_string(),
      "Priority".to_string(),
      "Updated".to_string(),
    ];
    let rows = tasks
      .iter()
      .map(|task| {
        vec![
          self.paint(
            &format!("#{}", task.short_id(6)),
            "33"
          ),
          truncate(&task.name, 48),
          assignee_summary(task),
          task
            .priority
            .as_ref()
            .map(|p| p.priority.clone())
            .unwrap_or_default(),
          self.date(task.touched_at()),
        ]
      })
      .collect();
    write_table(out, headers, rows)
  }

  fn write_card<W: Write>(
    &self,
    out: &mut W,
    task: &Task
  ) -> anyhow::Result<()> {
    writeln!(
      out,
      "  ┌ {}",
      self.paint(&task.name, "1")
    )?;
    if let Some(description) = task
      .description
      .as_deref()
      .filter(|d| !d.trim().is_empty())
    {
      writeln!(
        out,
        "  │ {}",
        truncate(description.trim(), 72)
      )?;
    }
    writeln!(
      out,
      "  │ status    {}",
      self.paint_hex(
        task.status_label(),
        &task.status.color
      )
    )?;
    if let Some(priority) = &task.priority {
      writeln!(
        out,
        "  │ priority  {}",
        priority.priority
      )?;
    }
    if !task.tags.is_empty() {
      let tags: Vec<&str> = task
        .tags
        .iter()
        .map(|t| t.name.as_str())
        .collect();
      writeln!(
        out,
        "  │ tags      {}",
        tags.join(", ")
      )?;
    }
    let assignees = if task.assignees.is_empty()
    {
      "Unassigned".to_string()
    } else {
      task
        .assignees
        .iter()
        .map(|a| a.display_name())
        .collect::<Vec<_>>()
        .join(", ")
    };
    writeln!(out, "  │ assignees {assignees}")?;
    writeln!(
      out,
      "  │ created   {}",
      self.date(task.date_created)
    )?;
    writeln!(
      out,
      "  │ updated   {}",
      self.date(task.date_updated)
    )?;
    if let Some(url) = &task.url {
      writeln!(out, "  │ {url}")?;
    }
    writeln!(out, "  └")?;
    Ok(())
  }

  /// Every dashboard section for `tasks` as of `now`.
  #[tracing::instrument(skip(self, out, tasks), fields(tasks = tasks.len()))]
  pub fn write_dashboard<W: Write>(
    &self,
    out: &mut W,
    tasks: &[Task],
    now: DateTime<Utc>
  ) -> anyhow::Result<()> {
    self.write_metrics(
      out,
      &metrics::dashboard_metrics(tasks, now)
    )?;
    writeln!(out)?;
    self.write_status_overview(
      out,
      &metrics::status_counts(tasks)
    )?;
    writeln!(out)?;
    self.write_summary_table(
      out,
      &metrics::summary_table(tasks)
    )?;
    writeln!(out)?;
    self.write_monthly_chart(
      out,
      &metrics::monthly_completions(
        tasks, now, &self.tz
      )
    )?;
    writeln!(out)?;
    self.write_trend(
      out,
      &metrics::creation_trend(
        tasks, now, &self.tz
      )
    )?;
    writeln!(out)?;
    self.write_recent(
      out,
      &metrics::recent_tasks(
        tasks,
        metrics::RECENT_TASKS_LIMIT
      )
    )?;
    writeln!(out)?;
    let tables =
      metrics::defect_tables(tasks, now);
    self.write_defect_table(
      out,
      "일반 결함",
      &tables.normal
    )?;
    writeln!(out)?;
    self.write_defect_table(
      out,
      "긴급 결함",
      &tables.urgent
    )?;
    writeln!(out)?;
    self.write_defect_table(
      out,
      "조치 완료",
      &tables.resolved
    )?;
    writeln!(out)?;
    self.write_summary_info(
      out,
      metrics::average_days_since_creation(
        tasks, now
      ),
      &metrics::defect_resolution(tasks)
    )?;
    Ok(())
  }

  pub fn write_metrics<W: Write>(
    &self,
    out: &mut W,
    m: &DashboardMetrics
  ) -> anyhow::Result<()> {
    self.heading(out, "Metrics")?;
    writeln!(out, "Total Tasks      {}", m.total)?;
    writeln!(
      out,
      "Completed        {}",
      self.paint(&m.completed.to_string(), "32")
    )?;
    writeln!(out, "Active           {}", m.active)?;
    writeln!(out, "Recent (7 days)  {}", m.recent)?;
    writeln!(
      out,
      "Completion Rate  {}%",
      m.completion_rate
    )?;
    Ok(())
  }

  pub fn write_status_overview<W: Write>(
    &self,
    out: &mut W,
    counts: &[StatusCount]
  ) -> anyhow::Result<()> {
    self.heading(out, "Status Overview")?;
    let headers = vec![
      "Status".to_string(),
      "Count".to_string(),
      "%".to_string(),
    ];
    let rows = counts
      .iter()
      .map(|c| {
        vec![
          self.paint_hex(&c.status, &c.color),
          c.count.to_string(),
          format!("{}%", c.percentage),
        ]
      })
      .collect();
    write_table(out, headers, rows)
  }

  pub fn write_summary_table<W: Write>(
    &self,
    out: &mut W,
    table: &SummaryTable
  ) -> anyhow::Result<()> {
    self.heading(out, "총 접수 현황")?;
    let mut headers =
      vec!["TOTAL 접수".to_string()];
    headers.extend(
      table
        .rows
        .iter()
        .map(|r| r.label.to_string())
    );

    let mut counts =
      vec![table.total.to_string()];
    counts.extend(
      table
        .rows
        .iter()
        .map(|r| r.count.to_string())
    );
    let mut shares = vec!["100%".to_string()];
    shares.extend(
      table
        .rows
        .iter()
        .map(|r| format!("{:.2}%", r.percentage))
    );

    write_table(
      &mut *out,
      headers,
      vec![counts, shares]
    )?;

    writeln!(out)?;
    for row in &table.rows {
      if let Some(description) =
        row.description
      {
        writeln!(
          out,
          "  {:<10} {description}",
          row.status
        )?;
      }
    }
    Ok(())
  }

  pub fn write_monthly_chart<W: Write>(
    &self,
    out: &mut W,
    buckets: &[usize; 12]
  ) -> anyhow::Result<()> {
    self.heading(out, "Monthly Completions")?;
    let max = buckets
      .iter()
      .copied()
      .max()
      .unwrap_or(0);
    for (idx, count) in
      buckets.iter().enumerate()
    {
      writeln!(
        out,
        "{:<4} {} {count}",
        MONTH_NAMES[idx],
        self.paint(&bar(*count, max), "34")
      )?;
    }
    Ok(())
  }

  pub fn write_trend<W: Write>(
    &self,
    out: &mut W,
    trend: &[TrendPoint]
  ) -> anyhow::Result<()> {
    self.heading(
      out,
      "Created vs Completed (12 months)"
    )?;
    let max = trend
      .iter()
      .map(|p| p.created.max(p.completed))
      .max()
      .unwrap_or(0);
    for point in trend {
      writeln!(
        out,
        "{:<9} created   {} {}",
        point.label,
        self.paint(
          &bar(point.created, max),
          "36"
        ),
        point.created
      )?;
      writeln!(
        out,
        "{:<9} completed {} {}",
        "",
        self.paint(
          &bar(point.completed, max),
          "32"
        ),
        point.completed
      )?;
    }
    Ok(())
  }

  pub fn write_recent<W: Write>(
    &self,
    out: &mut W,
    tasks: &[&Task]
  ) -> anyhow::Result<()> {
    self.heading(out, "Recent Tasks")?;
    let headers = vec![
      "ID".to_string(),
      "Name".to_string(),
      "Status".to_string(),
      "Assignees".to_string(),
      "Updated".to_string(),
    ];
    let rows = tasks
      .iter()
      .map(|task| {
        vec![
          self.paint(
            &format!("#{}", task.short_id(6)),
            "33"
          ),
          truncate(&task.name, 40),
          self.paint_hex(
            task.status_label(),
            &task.status.color
          ),
          assignee_summary(task),
          self.date(task.touched_at()),
        ]
      })
      .collect();
    write_table(out, headers, rows)
  }

  pub fn write_defect_table<W: Write>(
    &self,
    out: &mut W,
    title: &str,
    rows: &[DefectRow<'_>]
  ) -> anyhow::Result<()> {
    self.heading(out, title)?;
    if rows.is_empty() {
      writeln!(out, "(none)")?;
      return Ok(());
    }
    let headers = vec![
      "No.".to_string(),
      "Name".to_string(),
      "Days Open".to_string(),
      "Elapsed".to_string(),
    ];
    let rows = rows
      .iter()
      .map(|row| {
        let elapsed = format!(
          "{:.2}",
          row.elapsed_days as f64
        );
        let elapsed = if row.elapsed_days > 3 {
          self.paint(&elapsed, "31")
        } else {
          self.paint(&elapsed, "32")
        };
        vec![
          row.short_id.to_string(),
          truncate(&row.task.name, 40),
          row.days_since_creation.to_string(),
          elapsed,
        ]
      })
      .collect();
    write_table(out, headers, rows)
  }

  pub fn write_summary_info<W: Write>(
    &self,
    out: &mut W,
    average_days: f64,
    resolution: &DefectResolution
  ) -> anyhow::Result<()> {
    self.heading(out, "접수 총괄")?;
    writeln!(
      out,
      "평균 접수 후 경과일  {average_days:.1} day"
    )?;
    writeln!(out)?;
    self.heading(out, "결함 조치 기간")?;
    writeln!(
      out,
      "일반결함  평균 약 +{:.1}day ({}건)",
      resolution.normal_avg_days,
      resolution.normal_count
    )?;
    writeln!(
      out,
      "긴급결함  평균 약 +{:.1}day ({}건)",
      resolution.urgent_avg_days,
      resolution.urgent_count
    )?;
    Ok(())
  }

  fn heading<W: Write>(
    &self,
    out: &mut W,
    title: &str
  ) -> anyhow::Result<()> {
    writeln!(
      out,
      "{}",
      self.paint(title, "1;4")
    )?;
    Ok(())
  }

  fn date(
    &self,
    when: Option<DateTime<Utc>>
  ) -> String {
    when
      .map(|dt| {
        format_dashboard_date(dt, &self.tz)
      })
      .unwrap_or_else(|| "-".to_string())
  }

  fn paint(
    &self,
    text: &str,
    code: &str
  ) -> String {
    if !self.color {
      return text.to_string();
    }
    format!("\x1b[{code}m{text}\x1b[0m")
  }

  /// Colors `text` with a `#rrggbb` status color when it parses.
  fn paint_hex(
    &self,
    text: &str,
    hex: &str
  ) -> String {
    match parse_hex_color(hex) {
      | Some((r, g, b)) => {
        self.paint(
          text,
          &format!("38;2;{r};{g};{b}")
        )
      }
      | None => text.to_string()
    }
  }
}

fn parse_hex_color(
  hex: &str
) -> Option<(u8, u8, u8)> {
  let digits =
    hex.trim().strip_prefix('#')?;
  if digits.len() != 6 || !digits.is_ascii()
  {
    return None;
  }
  let channel =
    |range: std::ops::Range<usize>| {
      u8::from_str_radix(&digits[range], 16)
        .ok()
    };
  Some((
    channel(0..2)?,
    channel(2..4)?,
    channel(4..6)?
  ))
}

fn or_dash(value: &str) -> &str {
  if value.is_empty() { "-" } else { value }
}

fn assignee_summary(task: &Task) -> String {
  match task.assignees.len() {
    | 0 => "Unassigned".to_string(),
    | 1 | 2 => {
      task
        .assignees
        .iter()
        .map(|a| a.initial().to_string())
        .collect::<Vec<_>>()
        .join(" ")
    }
    | n => {
      let shown: Vec<String> = task
        .assignees[..2]
        .iter()
        .map(|a| a.initial().to_string())
        .collect();
      format!(
        "{} +{}",
        shown.join(" "),
        n - 2
      )
    }
  }
}

fn bar(value: usize, max: usize) -> String {
  if max == 0 {
    return String::new();
  }
  let len = (value * BAR_WIDTH).div_ceil(max);
  "█".repeat(len)
}

fn truncate(
  text: &str,
  max_width: usize
) -> String {
  if UnicodeWidthStr::width(text) <= max_width
  {
    return text.to_string();
  }
  let mut out = String::new();
  let mut width = 0;
  for ch in text.chars() {
    let w =
      unicode_width::UnicodeWidthChar::width(
        ch
      )
      .unwrap_or(0);
    if width + w + 1 > max_width {
      break;
    }
    out.push(ch);
    width += w;
  }
  out.push('…');
  out
}

fn write_table<W: Write>(
  mut writer: W,
  headers: Vec<String>,
  rows: Vec<Vec<String>>
) -> anyhow::Result<()> {
  let column_count = headers.len();
  let mut widths = vec![0usize; column_count];

  for (idx, header) in
    headers.iter().enumerate()
  {
    widths[idx] = widths[idx].max(
      UnicodeWidthStr::width(header.as_str())
    );
  }

  for row in &rows {
    for (idx, cell) in row
      .iter()
      .enumerate()
      .take(column_count)
    {
      widths[idx] = widths[idx].max(
        UnicodeWidthStr::width(
          strip_ansi(cell).as_str()
        )
      );
    }
  }

  write_row(&mut writer, &headers, &widths)?;

  for width in &widths {
    write!(
      writer,
      "{:-<width$} ",
      "",
      width = *width
    )?;
  }
  writeln!(writer)?;

  for row in rows {
    write_row(&mut writer, &row, &widths)?;
  }

  Ok(())
}

fn write_row<W: Write>(
  writer: &mut W,
  cells: &[String],
  widths: &[usize]
) -> anyhow::Result<()> {
  for (idx, width) in widths.iter().enumerate()
  {
    let cell = cells
      .get(idx)
      .map(String::as_str)
      .unwrap_or("");
    let visible_width =
      UnicodeWidthStr::width(
        strip_ansi(cell).as_str()
      );
    let padding =
      width.saturating_sub(visible_width);
    write!(
      writer,
      "{}{} ",
      cell,
      " ".repeat(padding)
    )?;
  }
  writeln!(writer)?;
  Ok(())
}

fn strip_ansi(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut escaped = false;

  for ch in s.chars() {
    if escaped {
      if ch == 'm' {
        escaped = false;
      }
      continue;
    }

    if ch == '\x1b' {
      escaped = true;
      continue;
    }

    out.push(ch);
  }

  out
}
