//! National holiday calendars for the holiday effects of the forecaster
//!
//! Only nationwide holidays are listed, on their nominal dates; substitute
//! days for holidays falling on a weekend are not generated.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Country whose holidays are added to the model, or none
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HolidayCountry {
    #[default]
    #[serde(rename = "None", alias = "none")]
    None,
    #[serde(rename = "IT")]
    Italy,
    #[serde(rename = "FR")]
    France,
    #[serde(rename = "DE")]
    Germany,
    #[serde(rename = "ES")]
    Spain,
    #[serde(rename = "GB", alias = "UK")]
    UnitedKingdom,
    #[serde(rename = "US")]
    UnitedStates,
}

/// A named holiday on a given day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolidayDate {
    pub name: &'static str,
    pub date: NaiveDate,
}

impl HolidayCountry {
    /// ISO 3166 alpha-2 code, `None` for no calendar
    pub fn code(&self) -> Option<&'static str> {
        match self {
            HolidayCountry::None => None,
            HolidayCountry::Italy => Some("IT"),
            HolidayCountry::France => Some("FR"),
            HolidayCountry::Germany => Some("DE"),
            HolidayCountry::Spain => Some("ES"),
            HolidayCountry::UnitedKingdom => Some("GB"),
            HolidayCountry::UnitedStates => Some("US"),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HolidayCountry::None => "None",
            HolidayCountry::Italy => "Italy",
            HolidayCountry::France => "France",
            HolidayCountry::Germany => "Germany",
            HolidayCountry::Spain => "Spain",
            HolidayCountry::UnitedKingdom => "United Kingdom",
            HolidayCountry::UnitedStates => "United States",
        }
    }

    /// Countries with a calendar, sorted by name
    pub fn supported() -> Vec<HolidayCountry> {
        let mut countries = vec![
            HolidayCountry::Italy,
            HolidayCountry::France,
            HolidayCountry::Germany,
            HolidayCountry::Spain,
            HolidayCountry::UnitedKingdom,
            HolidayCountry::UnitedStates,
        ];
        countries.sort_by_key(|c| c.name());
        countries
    }

    /// Selection list: "None" followed by the supported countries
    pub fn options() -> Vec<HolidayCountry> {
        let mut options = vec![HolidayCountry::None];
        options.extend(Self::supported());
        options
    }
}

impl fmt::Display for HolidayCountry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code() {
            Some(code) => write!(f, "{} ({})", self.name(), code),
            None => write!(f, "None"),
        }
    }
}

impl FromStr for HolidayCountry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        if wanted.eq_ignore_ascii_case("none") {
            return Ok(HolidayCountry::None);
        }
        if wanted.eq_ignore_ascii_case("uk") {
            return Ok(HolidayCountry::UnitedKingdom);
        }
        Self::supported()
            .into_iter()
            .find(|c| {
                c.code().is_some_and(|code| code.eq_ignore_ascii_case(wanted))
                    || c.name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| format!("Unsupported holiday country: {}", s))
    }
}

/// Easter Sunday in the Gregorian calendar (anonymous computus)
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// Every holiday of `country` in the given years, sorted by date
pub fn holidays_for(country: HolidayCountry, years: RangeInclusive<i32>) -> Vec<HolidayDate> {
    let mut holidays: Vec<HolidayDate> = years
        .flat_map(|year| holidays_in_year(country, year))
        .collect();
    holidays.sort_by_key(|h| h.date);
    holidays
}

fn holidays_in_year(country: HolidayCountry, year: i32) -> Vec<HolidayDate> {
    let fixed = |name, month, day| {
        NaiveDate::from_ymd_opt(year, month, day).map(|date| HolidayDate { name, date })
    };
    let easter = easter_sunday(year);
    let from_easter = |name, offset: i64| {
        easter.and_then(|e| shift(e, offset)).map(|date| HolidayDate { name, date })
    };
    let nth = |name, month, weekday, n| {
        NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
            .map(|date| HolidayDate { name, date })
    };
    let last = |name, month, weekday| {
        last_weekday_of_month(year, month, weekday).map(|date| HolidayDate { name, date })
    };

    let days = match country {
        HolidayCountry::None => vec![],
        HolidayCountry::Italy => vec![
            fixed("New Year's Day", 1, 1),
            fixed("Epiphany", 1, 6),
            from_easter("Easter Sunday", 0),
            from_easter("Easter Monday", 1),
            fixed("Liberation Day", 4, 25),
            fixed("Labour Day", 5, 1),
            fixed("Republic Day", 6, 2),
            fixed("Assumption Day", 8, 15),
            fixed("All Saints' Day", 11, 1),
            fixed("Immaculate Conception", 12, 8),
            fixed("Christmas Day", 12, 25),
            fixed("St. Stephen's Day", 12, 26),
        ],
        HolidayCountry::France => vec![
            fixed("New Year's Day", 1, 1),
            from_easter("Easter Monday", 1),
            fixed("Labour Day", 5, 1),
            fixed("Victory Day", 5, 8),
            from_easter("Ascension Day", 39),
            from_easter("Whit Monday", 50),
            fixed("National Day", 7, 14),
            fixed("Assumption Day", 8, 15),
            fixed("All Saints' Day", 11, 1),
            fixed("Armistice Day", 11, 11),
            fixed("Christmas Day", 12, 25),
        ],
        HolidayCountry::Germany => vec![
            fixed("New Year's Day", 1, 1),
            from_easter("Good Friday", -2),
            from_easter("Easter Monday", 1),
            fixed("Labour Day", 5, 1),
            from_easter("Ascension Day", 39),
            from_easter("Whit Monday", 50),
            fixed("German Unity Day", 10, 3),
            fixed("Christmas Day", 12, 25),
            fixed("Second Day of Christmas", 12, 26),
        ],
        HolidayCountry::Spain => vec![
            fixed("New Year's Day", 1, 1),
            fixed("Epiphany", 1, 6),
            from_easter("Good Friday", -2),
            fixed("Labour Day", 5, 1),
            fixed("Assumption Day", 8, 15),
            fixed("National Day", 10, 12),
            fixed("All Saints' Day", 11, 1),
            fixed("Constitution Day", 12, 6),
            fixed("Immaculate Conception", 12, 8),
            fixed("Christmas Day", 12, 25),
        ],
        HolidayCountry::UnitedKingdom => vec![
            fixed("New Year's Day", 1, 1),
            from_easter("Good Friday", -2),
            from_easter("Easter Monday", 1),
            nth("Early May Bank Holiday", 5, Weekday::Mon, 1),
            last("Spring Bank Holiday", 5, Weekday::Mon),
            last("Summer Bank Holiday", 8, Weekday::Mon),
            fixed("Christmas Day", 12, 25),
            fixed("Boxing Day", 12, 26),
        ],
        HolidayCountry::UnitedStates => {
            let mut days = vec![
                fixed("New Year's Day", 1, 1),
                nth("Martin Luther King Jr. Day", 1, Weekday::Mon, 3),
                nth("Washington's Birthday", 2, Weekday::Mon, 3),
                last("Memorial Day", 5, Weekday::Mon),
                fixed("Independence Day", 7, 4),
                nth("Labor Day", 9, Weekday::Mon, 1),
                nth("Columbus Day", 10, Weekday::Mon, 2),
                fixed("Veterans Day", 11, 11),
                nth("Thanksgiving", 11, Weekday::Thu, 4),
                fixed("Christmas Day", 12, 25),
            ];
            if year >= 2021 {
                days.push(fixed("Juneteenth National Independence Day", 6, 19));
            }
            days
        }
    };

    days.into_iter().flatten().collect()
}

fn shift(date: NaiveDate, offset: i64) -> Option<NaiveDate> {
    if offset >= 0 {
        date.checked_add_days(Days::new(offset as u64))
    } else {
        date.checked_sub_days(Days::new(offset.unsigned_abs()))
    }
}

fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let mut day = first_of_next.pred_opt()?;
    while day.weekday() != weekday {
        day = day.pred_opt()?;
    }
    Some(day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(2019, ymd(2019, 4, 21))]
    #[case(2024, ymd(2024, 3, 31))]
    #[case(2025, ymd(2025, 4, 20))]
    fn easter_dates(#[case] year: i32, #[case] expected: NaiveDate) {
        assert_eq!(easter_sunday(year), Some(expected));
    }

    #[test]
    fn italian_calendar_has_easter_monday_and_ferragosto() {
        let days = holidays_for(HolidayCountry::Italy, 2024..=2024);
        assert_eq!(days.len(), 12);
        assert!(days.contains(&HolidayDate { name: "Easter Monday", date: ymd(2024, 4, 1) }));
        assert!(days.contains(&HolidayDate { name: "Assumption Day", date: ymd(2024, 8, 15) }));
        assert!(days.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[test]
    fn rule_based_us_holidays() {
        let days = holidays_for(HolidayCountry::UnitedStates, 2024..=2024);
        let find = |name: &str| days.iter().find(|h| h.name == name).map(|h| h.date);
        assert_eq!(find("Thanksgiving"), Some(ymd(2024, 11, 28)));
        assert_eq!(find("Memorial Day"), Some(ymd(2024, 5, 27)));
        assert_eq!(find("Labor Day"), Some(ymd(2024, 9, 2)));
        assert!(find("Juneteenth National Independence Day").is_some());

        let earlier = holidays_for(HolidayCountry::UnitedStates, 2019..=2019);
        assert!(earlier.iter().all(|h| h.name != "Juneteenth National Independence Day"));
    }

    #[test]
    fn no_calendar_for_none() {
        assert!(holidays_for(HolidayCountry::None, 2020..=2030).is_empty());
    }

    #[test]
    fn parses_codes_and_names() {
        assert_eq!("it".parse::<HolidayCountry>(), Ok(HolidayCountry::Italy));
        assert_eq!("United Kingdom".parse::<HolidayCountry>(), Ok(HolidayCountry::UnitedKingdom));
        assert_eq!("UK".parse::<HolidayCountry>(), Ok(HolidayCountry::UnitedKingdom));
        assert_eq!("None".parse::<HolidayCountry>(), Ok(HolidayCountry::None));
        assert!("Atlantis".parse::<HolidayCountry>().is_err());
    }

    #[test]
    fn options_start_with_none_then_sorted() {
        let options = HolidayCountry::options();
        assert_eq!(options[0], HolidayCountry::None);
        let names: Vec<&str> = options[1..].iter().map(|c| c.name()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
