//! # Appointment slots
//!
//! Appointment times are stored as display strings. Older rows were written in
//! whatever shape the booking form produced (`"14:30"`, `"2:30 pm"`,
//! `"14:30:00"`), so every read goes through [`format_slot_time`] which turns
//! them into the canonical 12-hour form `"02:30 PM"` before comparing or
//! returning them.
//!
//! A doctor's bookable day is described by [`WorkingHours`]: an opening and
//! closing time, a slot length and the weekdays they see patients.
//! [`available_slots`] expands that into concrete slots and removes the booked
//! ones, plus the ones already in the past when the date is today.

use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SLOT_MINUTES: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("invalid time: {0}")]
    InvalidTime(String),
    #[error("invalid weekday: {0}")]
    InvalidWeekday(String),
    #[error("slot length must be between 5 and 240 minutes")]
    InvalidLength,
    #[error("closing time must be after opening time")]
    EmptyDay,
}

/// Parse a stored or user-supplied time in 24-hour or 12-hour notation.
pub fn parse_slot_time(value: &str) -> Result<NaiveTime, SlotError> {
    let invalid = || SlotError::InvalidTime(value.to_string());
    let upper = value.trim().to_ascii_uppercase().replace('.', "");

    let (clock, meridiem) = if let Some(rest) = upper.strip_suffix("AM") {
        (rest.trim_end(), Some(false))
    } else if let Some(rest) = upper.strip_suffix("PM") {
        (rest.trim_end(), Some(true))
    } else {
        (upper.as_str(), None)
    };

    let time = NaiveTime::parse_from_str(clock, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(clock, "%H:%M"))
        .map_err(|_| invalid())?;

    match meridiem {
        None => Ok(time),
        Some(pm) => {
            let hour = time.hour();
            if !(1..=12).contains(&hour) {
                return Err(invalid());
            }
            let hour24 = match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, false) => h,
                (h, true) => h + 12,
            };
            time.with_hour(hour24).ok_or_else(invalid)
        }
    }
}

/// Canonical display form of a slot: `"hh:mm AM"`.
pub fn display_time(time: NaiveTime) -> String {
    time.format("%I:%M %p").to_string()
}

/// Normalize a stored time string into the canonical display form.
pub fn format_slot_time(value: &str) -> Result<String, SlotError> {
    parse_slot_time(value).map(display_time)
}

/// Consecutive slot start times from `start` while a full slot still fits before `end`.
pub fn generate_slots(start: NaiveTime, end: NaiveTime, minutes: u32) -> Vec<NaiveTime> {
    if minutes == 0 {
        return Vec::new();
    }
    let step = i64::from(minutes) * 60;
    let end_secs = i64::from(end.num_seconds_from_midnight());
    let mut cursor = i64::from(start.num_seconds_from_midnight());
    let mut slots = Vec::new();
    while cursor + step <= end_secs {
        if let Some(t) = NaiveTime::from_num_seconds_from_midnight_opt(cursor as u32, 0) {
            slots.push(t);
        }
        cursor += step;
    }
    slots
}

/// Set of weekdays, stored as text like `"Mon,Tue,Fri"`. An empty set means every day.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub fn every_day() -> Self {
        Self(0)
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 == 0 || self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn is_every_day(&self) -> bool {
        self.0 == 0 || self.0 == 0b0111_1111
    }
}

impl FromStr for WeekdaySet {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = WeekdaySet::default();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let day = part
                .parse::<Weekday>()
                .map_err(|_| SlotError::InvalidWeekday(part.to_string()))?;
            set.insert(day);
        }
        Ok(set)
    }
}

impl std::fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let days: Vec<String> = [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]
        .into_iter()
        .filter(|d| self.0 != 0 && self.contains(*d))
        .map(|d| d.to_string())
        .collect();
        f.write_str(&days.join(","))
    }
}

/// A doctor's bookable hours.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub slot_minutes: u32,
    pub days: WeekdaySet,
}

impl WorkingHours {
    pub fn new(
        start: NaiveTime,
        end: NaiveTime,
        slot_minutes: u32,
        days: WeekdaySet,
    ) -> Result<Self, SlotError> {
        if !(5..=240).contains(&slot_minutes) {
            return Err(SlotError::InvalidLength);
        }
        if end <= start {
            return Err(SlotError::EmptyDay);
        }
        Ok(Self {
            start,
            end,
            slot_minutes,
            days,
        })
    }

    pub fn works_on(&self, date: NaiveDate) -> bool {
        self.days.contains(date.weekday())
    }

    /// All slots of a working day, or nothing on days off.
    pub fn slots_on(&self, date: NaiveDate) -> Vec<NaiveTime> {
        if !self.works_on(date) {
            return Vec::new();
        }
        generate_slots(self.start, self.end, self.slot_minutes)
    }

    /// Whether `time` is the start of one of this schedule's slots.
    pub fn is_slot_start(&self, time: NaiveTime) -> bool {
        if time < self.start || time >= self.end {
            return false;
        }
        let offset = (time - self.start).num_minutes();
        offset % i64::from(self.slot_minutes) == 0
            && time + Duration::minutes(i64::from(self.slot_minutes)) <= self.end
    }
}

/// A slot as shown on the booking calendar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotView {
    pub time: String,
    pub available: bool,
}

/// Free slots for `date`, in display form.
///
/// `booked` holds raw stored times; unparseable entries are ignored. When `date`
/// is the same day as `now`, slots starting at or before `now` are dropped.
pub fn available_slots(
    hours: &WorkingHours,
    date: NaiveDate,
    booked: &[String],
    now: NaiveDateTime,
) -> Vec<String> {
    calendar(hours, date, booked, now)
        .into_iter()
        .filter(|s| s.available)
        .map(|s| s.time)
        .collect()
}

/// Every slot of the day with its availability.
pub fn calendar(
    hours: &WorkingHours,
    date: NaiveDate,
    booked: &[String],
    now: NaiveDateTime,
) -> Vec<SlotView> {
    if date < now.date() {
        return Vec::new();
    }
    let taken: Vec<NaiveTime> = booked
        .iter()
        .filter_map(|b| parse_slot_time(b).ok())
        .collect();

    hours
        .slots_on(date)
        .into_iter()
        .filter(|t| date > now.date() || *t > now.time())
        .map(|t| SlotView {
            time: display_time(t),
            available: !taken.contains(&t),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn hours() -> WorkingHours {
        WorkingHours::new(t(9, 0), t(12, 0), 30, "Mon,Tue,Wed,Thu,Fri".parse().unwrap())
            .unwrap()
    }

    #[test]
    fn test_format_accepts_stored_variants() {
        assert_eq!(format_slot_time("14:30").unwrap(), "02:30 PM");
        assert_eq!(format_slot_time("14:30:00").unwrap(), "02:30 PM");
        assert_eq!(format_slot_time("2:30 pm").unwrap(), "02:30 PM");
        assert_eq!(format_slot_time("02:30PM").unwrap(), "02:30 PM");
        assert_eq!(format_slot_time("9:05 a.m.").unwrap(), "09:05 AM");
        assert_eq!(format_slot_time("09:00").unwrap(), "09:00 AM");
    }

    #[test]
    fn test_format_midnight_and_noon() {
        assert_eq!(format_slot_time("12:00 AM").unwrap(), "12:00 AM");
        assert_eq!(format_slot_time("00:15").unwrap(), "12:15 AM");
        assert_eq!(format_slot_time("12:45 pm").unwrap(), "12:45 PM");
        assert_eq!(parse_slot_time("12:00 AM").unwrap(), t(0, 0));
    }

    #[test]
    fn test_format_rejects_garbage() {
        assert!(format_slot_time("").is_err());
        assert!(format_slot_time("noon").is_err());
        assert!(format_slot_time("25:00").is_err());
        assert!(format_slot_time("13:00 PM").is_err());
        assert!(format_slot_time("0:30 AM").is_err());
    }

    #[test]
    fn test_generate_slots_stops_before_closing() {
        let slots = generate_slots(t(9, 0), t(10, 40), 30);
        assert_eq!(slots, vec![t(9, 0), t(9, 30), t(10, 0)]);
        assert!(generate_slots(t(9, 0), t(9, 10), 30).is_empty());
        assert!(generate_slots(t(9, 0), t(17, 0), 0).is_empty());
    }

    #[test]
    fn test_weekday_set() {
        let set: WeekdaySet = "mon, Wednesday ,FRI".parse().unwrap();
        assert!(set.contains(Weekday::Mon));
        assert!(set.contains(Weekday::Wed));
        assert!(!set.contains(Weekday::Sun));
        assert_eq!(set.to_string(), "Mon,Wed,Fri");

        let all: WeekdaySet = "".parse().unwrap();
        assert!(all.is_every_day());
        assert!(all.contains(Weekday::Sun));

        assert!("funday".parse::<WeekdaySet>().is_err());
    }

    #[test]
    fn test_working_hours_validation() {
        assert_eq!(
            WorkingHours::new(t(9, 0), t(9, 0), 30, WeekdaySet::every_day()),
            Err(SlotError::EmptyDay)
        );
        assert_eq!(
            WorkingHours::new(t(9, 0), t(17, 0), 0, WeekdaySet::every_day()),
            Err(SlotError::InvalidLength)
        );
    }

    #[test]
    fn test_is_slot_start() {
        let h = hours();
        assert!(h.is_slot_start(t(9, 0)));
        assert!(h.is_slot_start(t(11, 30)));
        assert!(!h.is_slot_start(t(9, 15)));
        assert!(!h.is_slot_start(t(12, 0)));
        assert!(!h.is_slot_start(t(8, 30)));
    }

    #[test]
    fn test_available_slots_remove_booked() {
        // 2030-01-07 is a Monday
        let date = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        let now = NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let booked = vec!["09:30".to_string(), "11:00 AM".to_string(), "bogus".into()];
        let free = available_slots(&hours(), date, &booked, now);
        assert_eq!(
            free,
            vec!["09:00 AM", "10:00 AM", "10:30 AM", "11:30 AM"]
        );
    }

    #[test]
    fn test_available_slots_skip_days_off_and_past() {
        // 2030-01-06 is a Sunday
        let sunday = NaiveDate::from_ymd_opt(2030, 1, 6).unwrap();
        let now = sunday.and_hms_opt(7, 0, 0).unwrap();
        assert!(available_slots(&hours(), sunday, &[], now).is_empty());

        let monday = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        let late_morning = monday.and_hms_opt(10, 0, 0).unwrap();
        let free = available_slots(&hours(), monday, &[], late_morning);
        assert_eq!(free, vec!["10:30 AM", "11:00 AM", "11:30 AM"]);

        let tomorrow = monday.succ_opt().unwrap().and_hms_opt(9, 0, 0).unwrap();
        assert!(available_slots(&hours(), monday, &[], tomorrow).is_empty());
    }

    #[test]
    fn test_calendar_marks_booked() {
        let monday = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        let now = NaiveDate::from_ymd_opt(2029, 12, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let view = calendar(&hours(), monday, &["09:00 AM".to_string()], now);
        assert_eq!(view.len(), 6);
        assert!(!view[0].available);
        assert!(view[1..].iter().all(|s| s.available));
    }
}
