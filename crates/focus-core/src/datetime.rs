use anyhow::anyhow;
use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

pub const TIMEZONE_ENV_VAR: &str =
  "FOCUS_TIMEZONE";
pub const ISO_DATE_FORMAT: &str =
  "%Y-%m-%d";

/// Timezone "today" is evaluated in.
/// The environment wins over the
/// config value; both fall back to UTC.
pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "config:timezone")
  {
    return tz;
  }

  chrono_tz::UTC
}

#[must_use]
pub fn today_in(
  tz: &Tz,
  now: DateTime<Utc>
) -> NaiveDate {
  now.with_timezone(tz).date_naive()
}

#[must_use]
pub fn format_iso_date(
  date: NaiveDate
) -> String {
  date.format(ISO_DATE_FORMAT).to_string()
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
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured timezone"
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

/// Parses a due-date expression relative
/// to `today`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_due_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return Ok(today + Duration::days(1));
    }
    | "yesterday" => {
      return Ok(today - Duration::days(1));
    }
    | _ => {}
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token,
      ISO_DATE_FORMAT
    )
  {
    return Ok(date);
  }

  if let Some(weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today, weekday
    ));
  }

  let rel_re = Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$"
  )?;
  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let num: i64 = caps["num"]
      .parse()
      .map_err(|err| {
        anyhow!(
          "invalid offset in {token}: \
           {err}"
        )
      })?;
    let days = match &caps["unit"] {
      | "w" => num.checked_mul(7),
      | _ => Some(num)
    };
    let delta =
      days.and_then(Duration::try_days);
    let shifted = delta.and_then(|delta| {
      if &caps["sign"] == "-" {
        today.checked_sub_signed(delta)
      } else {
        today.checked_add_signed(delta)
      }
    });
    return shifted.ok_or_else(|| {
      anyhow!(
        "date offset out of range: \
         {token}"
      )
    });
  }

  Err(anyhow!(
    "unrecognized due date: {token}; \
     expected YYYY-MM-DD, today, \
     tomorrow, yesterday, a weekday \
     name, or +Nd/+Nw"
  ))
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

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    format_iso_date,
    parse_due_expr,
    today_in
  };

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn parses_iso_and_keywords() {
    let today = day(2026, 2, 17);
    assert_eq!(
      parse_due_expr(
        "2026-03-01",
        today
      )
      .expect("iso"),
      day(2026, 3, 1)
    );
    assert_eq!(
      parse_due_expr("Tomorrow", today)
        .expect("tomorrow"),
      day(2026, 2, 18)
    );
    assert_eq!(
      parse_due_expr("yesterday", today)
        .expect("yesterday"),
      day(2026, 2, 16)
    );
  }

  #[test]
  fn parses_weekday_name() {
    // 2026-02-17 is a Tuesday.
    let today = day(2026, 2, 17);
    assert_eq!(
      parse_due_expr("wednesday", today)
        .expect("weekday"),
      day(2026, 2, 18)
    );
    assert_eq!(
      parse_due_expr("tue", today)
        .expect("same weekday"),
      day(2026, 2, 24)
    );
  }

  #[test]
  fn parses_relative_offsets() {
    let today = day(2026, 2, 17);
    assert_eq!(
      parse_due_expr("+3d", today)
        .expect("days"),
      day(2026, 2, 20)
    );
    assert_eq!(
      parse_due_expr("+2w", today)
        .expect("weeks"),
      day(2026, 3, 3)
    );
    assert!(
      parse_due_expr("someday", today)
        .is_err()
    );
    for huge in [
      "+200000000000000d",
      "+9000000000000000000w",
      "-30000000w"
    ] {
      let err = parse_due_expr(huge, today)
        .expect_err("out of range");
      assert!(
        err
          .to_string()
          .contains("out of range")
      );
    }
  }

  #[test]
  fn today_follows_timezone() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 3, 0, 0
      )
      .single()
      .expect("valid now");
    assert_eq!(
      today_in(&chrono_tz::UTC, now),
      day(2026, 2, 17)
    );
    assert_eq!(
      today_in(
        &chrono_tz::America::Mexico_City,
        now
      ),
      day(2026, 2, 16)
    );
    assert_eq!(
      format_iso_date(day(2024, 1, 5)),
      "2024-01-05"
    );
  }
}

/// `YYYY-MM-DD` dates. An empty string
/// reads as no date, which is how a
/// cleared date input is stored.
pub mod iso_date_serde {
  use chrono::NaiveDate;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  use super::ISO_DATE_FORMAT;

  pub fn serialize<S>(
    date: &NaiveDate,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &date
        .format(ISO_DATE_FORMAT)
        .to_string()
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<NaiveDate, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    NaiveDate::parse_from_str(
      raw.trim(),
      ISO_DATE_FORMAT
    )
    .map_err(serde::de::Error::custom)
  }

  pub mod option {
    use chrono::NaiveDate;
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    use super::super::ISO_DATE_FORMAT;

    pub fn serialize<S>(
      date: &Option<NaiveDate>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match date {
        | Some(value) => {
          super::serialize(
            value, serializer
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      Option<NaiveDate>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      let opt =
        Option::<String>::deserialize(
          deserializer
        )?;
      match opt.as_deref().map(str::trim)
      {
        | None | Some("") => Ok(None),
        | Some(raw) => {
          NaiveDate::parse_from_str(
            raw,
            ISO_DATE_FORMAT
          )
          .map(Some)
          .map_err(
            serde::de::Error::custom
          )
        }
      }
    }
  }
}
