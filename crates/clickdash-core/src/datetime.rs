use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::{
  DateTime,
  Datelike,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "clickdash-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "CLICKDASH_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "CLICKDASH_TIME_CONFIG";
const DEFAULT_DASHBOARD_TIMEZONE: &str =
  "Asia/Seoul";

const MILLIS_PER_DAY: i64 = 86_400_000;

pub const MONTH_NAMES: [&str; 12] = [
  "Jan", "Feb", "Mar", "Apr", "May",
  "Jun", "Jul", "Aug", "Sep", "Oct",
  "Nov", "Dec"
];

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Timezone used for calendar bucketing and date display.
pub fn dashboard_timezone() -> &'static Tz
{
  static DASHBOARD_TZ: OnceLock<Tz> =
    OnceLock::new();
  DASHBOARD_TZ.get_or_init(
    resolve_dashboard_timezone
  )
}

#[must_use]
pub fn to_dashboard_date(
  dt: DateTime<Utc>,
  tz: &Tz
) -> NaiveDate {
  dt.with_timezone(tz).date_naive()
}

#[must_use]
pub fn format_dashboard_date(
  dt: DateTime<Utc>,
  tz: &Tz
) -> String {
  dt.with_timezone(tz)
    .format("%Y-%m-%d")
    .to_string()
}

/// Calendar `(year, month0)` of an instant in `tz`; months are 0-based.
#[must_use]
pub fn year_month(
  dt: DateTime<Utc>,
  tz: &Tz
) -> (i32, u32) {
  let local = dt.with_timezone(tz);
  (local.year(), local.month0())
}

/// Parses an upstream timestamp: epoch millis as a decimal string, with an
/// RFC 3339 fallback.
pub fn parse_epoch_millis(
  raw: &str
) -> Option<DateTime<Utc>> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }

  if let Ok(millis) =
    trimmed.parse::<i64>()
  {
    return DateTime::from_timestamp_millis(
      millis
    );
  }

  DateTime::parse_from_rfc3339(trimmed)
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}

/// Whole days from `from` to `to`, rounded up.
#[must_use]
pub fn days_between_ceil(
  from: DateTime<Utc>,
  to: DateTime<Utc>
) -> i64 {
  let ms =
    (to - from).num_milliseconds();
  if ms > 0 {
    (ms + MILLIS_PER_DAY - 1)
      / MILLIS_PER_DAY
  } else {
    ms / MILLIS_PER_DAY
  }
}

/// Ceil-day delta between an optional instant and `now`; missing values
/// count as zero.
#[must_use]
pub fn days_since(
  when: Option<DateTime<Utc>>,
  now: DateTime<Utc>
) -> i64 {
  when
    .map(|dt| days_between_ceil(dt, now))
    .unwrap_or(0)
}

fn resolve_dashboard_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_DASHBOARD_TIMEZONE,
    "DEFAULT_DASHBOARD_TIMEZONE"
  )
  .unwrap_or_else(|| {
    tracing::error!(
      "failed to parse fallback \
       timezone; using UTC"
    );
    chrono_tz::UTC
  })
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured dashboard timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// ClickUp sends timestamps as millisecond strings (occasionally bare
/// numbers). They are written back as strings. Unreadable values become
/// `None` rather than failing the whole task.
pub mod epoch_millis_serde {
  use chrono::{
    DateTime,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };
  use serde_json::Value;

  pub fn serialize<S>(
    dt: &Option<DateTime<Utc>>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    match dt {
      | Some(value) => serializer
        .serialize_str(
          &value
            .timestamp_millis()
            .to_string()
        ),
      | None => {
        serializer.serialize_none()
      }
    }
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<
    Option<DateTime<Utc>>,
    D::Error
  >
  where
    D: Deserializer<'de>
  {
    let raw = Option::<Value>::deserialize(
      deserializer
    )?;
    match raw {
      | None | Some(Value::Null) => {
        Ok(None)
      }
      | Some(Value::String(text)) => {
        Ok(super::parse_epoch_millis(&text))
      }
      | Some(Value::Number(num)) => Ok(num
        .as_i64()
        .and_then(
          DateTime::from_timestamp_millis
        )),
      | Some(other) => {
        Err(serde::de::Error::custom(
          format!(
            "unexpected timestamp \
             value: {other}"
          )
        ))
      }
    }
  }
}
