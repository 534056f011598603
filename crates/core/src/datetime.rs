#![forbid(unsafe_code)]

use crate::ids::InfoAreaId;
use crate::record::{FieldValue, Record};
use time::macros::format_description;
use time::{Date, PrimitiveDateTime, Time, UtcOffset};

/// Offset between the clock the user edits in and the clock the server
/// stores split date/time fields in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeZoneAdjustment {
    pub local: UtcOffset,
    pub server: UtcOffset,
}

impl TimeZoneAdjustment {
    pub fn none() -> Self {
        Self {
            local: UtcOffset::UTC,
            server: UtcOffset::UTC,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.local == self.server
    }

    fn to_server(&self, local: PrimitiveDateTime) -> PrimitiveDateTime {
        let shifted = local.assume_offset(self.local).to_offset(self.server);
        PrimitiveDateTime::new(shifted.date(), shifted.time())
    }
}

impl Default for TimeZoneAdjustment {
    fn default() -> Self {
        Self::none()
    }
}

/// A date field and a time field that together hold one instant. Both halves
/// are converted together so that a shift across midnight also moves the date.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateTimeFieldValuePair {
    info_area_id: InfoAreaId,
    date_field_id: i32,
    time_field_id: i32,
    date: Option<String>,
    time: Option<String>,
    old_date: Option<String>,
    old_time: Option<String>,
    only_offline: bool,
}

impl DateTimeFieldValuePair {
    pub fn new(info_area_id: InfoAreaId, date_field_id: i32, time_field_id: i32) -> Self {
        Self {
            info_area_id,
            date_field_id,
            time_field_id,
            date: None,
            time: None,
            old_date: None,
            old_time: None,
            only_offline: false,
        }
    }

    /// New local values; `None` leaves that half as it was.
    pub fn with_change(mut self, date: Option<String>, time: Option<String>) -> Self {
        self.date = non_blank(date);
        self.time = non_blank(time);
        self
    }

    /// Local values the fields held before the edit.
    pub fn with_old(mut self, date: Option<String>, time: Option<String>) -> Self {
        self.old_date = non_blank(date);
        self.old_time = non_blank(time);
        self
    }

    pub fn only_offline(mut self, only_offline: bool) -> Self {
        self.only_offline = only_offline;
        self
    }

    /// Field values in server time, one per half that actually changed.
    pub fn field_values(
        &self,
        adjustment: TimeZoneAdjustment,
    ) -> Result<Vec<FieldValue>, DateTimeError> {
        let date = self.date.as_deref().or(self.old_date.as_deref());
        let time = self.time.as_deref().or(self.old_time.as_deref());
        let (new_date, new_time) = server_parts(date, time, adjustment)?;
        let (old_date, old_time) =
            server_parts(self.old_date.as_deref(), self.old_time.as_deref(), adjustment)?;

        let mut out = Vec::with_capacity(2);
        if let Some(date) = new_date
            && old_date.as_deref() != Some(date.as_str())
        {
            out.push(self.field_value(self.date_field_id, date, old_date.clone()));
        }
        if let Some(time) = new_time
            && old_time.as_deref() != Some(time.as_str())
        {
            out.push(self.field_value(self.time_field_id, time, old_time.clone()));
        }
        Ok(out)
    }

    pub fn add_to_record(
        &self,
        record: &mut Record,
        adjustment: TimeZoneAdjustment,
    ) -> Result<usize, DateTimeError> {
        let values = self.field_values(adjustment)?;
        let count = values.len();
        for value in values {
            record.add_value(value);
        }
        Ok(count)
    }

    fn field_value(&self, field_id: i32, value: String, old_value: Option<String>) -> FieldValue {
        FieldValue::set_change(
            self.info_area_id.clone(),
            field_id,
            value,
            old_value,
            self.only_offline,
        )
        .with_original_date_time(self.date.clone(), self.time.clone())
    }
}

fn server_parts(
    date: Option<&str>,
    time: Option<&str>,
    adjustment: TimeZoneAdjustment,
) -> Result<(Option<String>, Option<String>), DateTimeError> {
    match (date, time) {
        (Some(date), Some(time)) => {
            let local = PrimitiveDateTime::new(parse_date(date)?, parse_time(time)?);
            let server = adjustment.to_server(local);
            Ok((Some(format_date(server.date())?), Some(format_time(server.time())?)))
        }
        (Some(date), None) => {
            parse_date(date)?;
            Ok((Some(date.to_string()), None))
        }
        (None, Some(time)) => {
            parse_time(time)?;
            Ok((None, Some(time.to_string())))
        }
        (None, None) => Ok((None, None)),
    }
}

fn parse_date(value: &str) -> Result<Date, DateTimeError> {
    Date::parse(value, format_description!("[year][month][day]"))
        .map_err(|_| DateTimeError::InvalidDate(value.to_string()))
}

fn parse_time(value: &str) -> Result<Time, DateTimeError> {
    Time::parse(value, format_description!("[hour][minute]"))
        .map_err(|_| DateTimeError::InvalidTime(value.to_string()))
}

fn format_date(value: Date) -> Result<String, DateTimeError> {
    value
        .format(format_description!("[year][month][day]"))
        .map_err(|_| DateTimeError::OutOfRange)
}

fn format_time(value: Time) -> Result<String, DateTimeError> {
    value
        .format(format_description!("[hour][minute]"))
        .map_err(|_| DateTimeError::OutOfRange)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DateTimeError {
    InvalidDate(String),
    InvalidTime(String),
    OutOfRange,
}

impl std::fmt::Display for DateTimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDate(value) => write!(f, "invalid date (expected yyyymmdd): {value}"),
            Self::InvalidTime(value) => write!(f, "invalid time (expected hhmm): {value}"),
            Self::OutOfRange => write!(f, "date/time out of range after adjustment"),
        }
    }
}

impl std::error::Error for DateTimeError {}
