use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  Local,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

const TIMEZONE_ENV_VAR: &str =
  "TOCK_TIMEZONE";

/// Zone used to turn instants into
/// calendar dates and back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayZone {
  Local,
  Named(Tz)
}

static DISPLAY_ZONE: OnceLock<
  DisplayZone
> = OnceLock::new();

/// Fixes the process-wide display zone.
/// `TOCK_TIMEZONE` wins over the
/// configured value; with neither the
/// system local zone is used. Later
/// calls are ignored.
pub fn init_display_zone(
  configured: Option<&str>
) -> DisplayZone {
  *DISPLAY_ZONE.get_or_init(|| {
    resolve_display_zone(configured)
  })
}

pub fn display_zone() -> DisplayZone {
  *DISPLAY_ZONE.get_or_init(|| {
    resolve_display_zone(None)
  })
}

fn resolve_display_zone(
  configured: Option<&str>
) -> DisplayZone {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return DisplayZone::Named(tz);
  }

  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "config")
  {
    return DisplayZone::Named(tz);
  }

  DisplayZone::Local
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
        "configured display timezone"
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

impl DisplayZone {
  pub fn naive_of(
    &self,
    dt: DateTime<Utc>
  ) -> NaiveDateTime {
    match self {
      | Self::Local => {
        dt.with_timezone(&Local)
          .naive_local()
      }
      | Self::Named(tz) => {
        dt.with_timezone(tz)
          .naive_local()
      }
    }
  }

  pub fn date_of(
    &self,
    dt: DateTime<Utc>
  ) -> NaiveDate {
    self.naive_of(dt).date()
  }

  pub fn to_utc(
    &self,
    local_naive: NaiveDateTime,
    context: &str
  ) -> anyhow::Result<DateTime<Utc>> {
    match self {
      | Self::Local => {
        resolve_local(
          &Local,
          local_naive,
          context
        )
      }
      | Self::Named(tz) => {
        resolve_local(
          tz,
          local_naive,
          context
        )
      }
    }
  }
}

fn resolve_local<Z: TimeZone>(
  zone: &Z,
  local_naive: NaiveDateTime,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  match zone
    .from_local_datetime(&local_naive)
  {
    | LocalResult::Single(local_dt) => {
      Ok(local_dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        "ambiguous local datetime; using earliest"
      );
      let first = first.with_timezone(&Utc);
      let second =
        second.with_timezone(&Utc);
      Ok(first.min(second))
    }
    | LocalResult::None => {
      Err(anyhow!(
        "local datetime does not \
         exist in display \
         timezone: {context}"
      ))
    }
  }
}

#[must_use]
pub fn format_display_date(
  dt: DateTime<Utc>
) -> String {
  display_zone()
    .date_of(dt)
    .format("%Y-%m-%d")
    .to_string()
}

#[must_use]
pub fn format_display_datetime(
  dt: DateTime<Utc>
) -> String {
  display_zone()
    .naive_of(dt)
    .format("%Y-%m-%d %H:%M")
    .to_string()
}

/// Parses a due-date expression in the
/// process display zone.
pub fn parse_date_expr(
  input: &str,
  now: DateTime<Utc>
) -> anyhow::Result<DateTime<Utc>> {
  parse_date_expr_in(
    input,
    now,
    display_zone()
  )
}

#[tracing::instrument(skip(now, zone), fields(input = input))]
pub fn parse_date_expr_in(
  input: &str,
  now: DateTime<Utc>,
  zone: DisplayZone
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let today = zone.date_of(now);

  let day_offset = match lower.as_str()
  {
    | "now" => return Ok(now),
    | "today" => Some(0),
    | "tomorrow" => Some(1),
    | "yesterday" => Some(-1),
    | _ => None
  };
  if let Some(offset) = day_offset {
    let date = today
      .checked_add_signed(
        Duration::days(offset)
      )
      .ok_or_else(|| {
        anyhow!(
          "date out of range: {input}"
        )
      })?;
    return midnight_of(
      date, zone, &lower
    );
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    let target_date = next_weekday_date(
      today,
      target_weekday
    );
    return midnight_of(
      target_date,
      zone,
      "weekday-name"
    );
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dhm])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  if let Some(caps) =
    rel_re.captures(token)
  {
    let sign = caps
      .name("sign")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative sign")
      })?;
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let unit = caps
      .name("unit")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative unit")
      })?;

    let duration = match unit {
      | "d" => Duration::try_days(num),
      | "h" => Duration::try_hours(num),
      | "m" => Duration::try_minutes(num),
      | _ => {
        return Err(anyhow!(
          "unknown relative unit: \
           {unit}"
        ));
      }
    };

    let shifted = duration.and_then(
      |duration| {
        if sign == "-" {
          now.checked_sub_signed(duration)
        } else {
          now.checked_add_signed(duration)
        }
      }
    );
    return shifted.ok_or_else(|| {
      anyhow!(
        "date out of range: {input}"
      )
    });
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return midnight_of(
      date, zone, "date"
    );
  }

  for fmt in
    ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
  {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return zone.to_utc(ndt, fmt);
    }
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     now/today/tomorrow/yesterday, \
     weekday names (e.g. monday), \
     +Nd/+Nh/+Nm, RFC3339, \
     YYYY-MM-DD, YYYY-MM-DDTHH:MM, \
     YYYY-MM-DD HH:MM"
  })
}

fn midnight_of(
  date: NaiveDate,
  zone: DisplayZone,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  let midnight = date
    .and_hms_opt(0, 0, 0)
    .ok_or_else(|| {
      anyhow!(
        "failed to construct \
         midnight for {context}"
      )
    })?;
  zone.to_utc(midnight, context)
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}
