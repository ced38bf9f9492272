use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone};

/// Length of one pay period in days. Periods always cover two full weeks.
pub const PERIOD_DAYS: i64 = 14;

const WEEK_DAYS: i64 = 7;

/// First day of a known pay period. Every other period boundary is a whole
/// multiple of fourteen days away from this date, in both directions.
pub fn default_anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 1).expect("anchor is a valid date")
}

/// Maps calendar dates onto the fixed grid of fourteen day pay periods
/// anchored at a known period start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayCalendar {
    anchor: NaiveDate,
}

impl Default for PayCalendar {
    fn default() -> Self {
        Self {
            anchor: default_anchor(),
        }
    }
}

impl PayCalendar {
    pub fn new(anchor: NaiveDate) -> Self {
        Self { anchor }
    }

    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    /// The period containing `date`. Division is floored, so dates earlier
    /// than the anchor land in the correct period instead of one period late.
    pub fn period_for(&self, date: NaiveDate) -> PayPeriod {
        let days_since_anchor = (date - self.anchor).num_days();
        let index = days_since_anchor.div_euclid(PERIOD_DAYS);
        PayPeriod {
            start: self.anchor + Duration::days(index * PERIOD_DAYS),
        }
    }

    /// The period containing the instant `at`, judged by its local calendar
    /// date. Slicing the instant as UTC instead would roll evening timestamps
    /// in western timezones into the next day, and near a boundary into the
    /// next period.
    pub fn period_at<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> PayPeriod {
        self.period_for(at.date_naive())
    }

    pub fn current_period(&self) -> PayPeriod {
        self.period_at(&Local::now())
    }

    pub fn is_current(&self, period: &PayPeriod) -> bool {
        period.start == self.current_period().start
    }

    pub fn is_future(&self, period: &PayPeriod) -> bool {
        period.start > self.current_period().start
    }

    /// The `count` periods before the current one, most recent first.
    pub fn past_periods(&self, count: usize) -> Vec<PayPeriod> {
        let current = self.current_period();
        (1..=count as i64)
            .map(|back| PayPeriod {
                start: current.start - Duration::days(back * PERIOD_DAYS),
            })
            .collect()
    }
}

/// One fourteen day pay period, identified by its start date. The start is
/// always `anchor + k * 14` days for some integer `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PayPeriod {
    start: NaiveDate,
}

impl PayPeriod {
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the period, inclusive.
    pub fn end(&self) -> NaiveDate {
        self.start + Duration::days(PERIOD_DAYS - 1)
    }

    pub fn week_1(&self) -> DateSpan {
        DateSpan {
            start: self.start,
            end: self.start + Duration::days(WEEK_DAYS - 1),
        }
    }

    pub fn week_2(&self) -> DateSpan {
        DateSpan {
            start: self.start + Duration::days(WEEK_DAYS),
            end: self.end(),
        }
    }

    pub fn previous(&self) -> PayPeriod {
        PayPeriod {
            start: self.start - Duration::days(PERIOD_DAYS),
        }
    }

    pub fn next(&self) -> PayPeriod {
        PayPeriod {
            start: self.start + Duration::days(PERIOD_DAYS),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end()
    }

    /// Which week of the period `date` falls in: 1 through the end of the
    /// first week, 2 after it.
    pub fn week_of(&self, date: NaiveDate) -> u8 {
        if date <= self.week_1().end { 1 } else { 2 }
    }

    /// Stable identifier used as the database key, e.g. `2025-12-01`. Built
    /// from calendar components, never from a timestamp.
    pub fn key(&self) -> String {
        iso_date(self.start)
    }

    /// Human readable range, e.g. `Dec 1 - Dec 14, 2025`.
    pub fn label(&self) -> String {
        range_label(self.start, self.end())
    }
}

/// Inclusive run of days inside a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    pub fn label(&self) -> String {
        format!("{} - {}", format_date(self.start), format_date(self.end))
    }
}

pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Same formatting as [`PayPeriod::label`], usable on dates read back from
/// stored invoice rows.
pub fn range_label(start: NaiveDate, end: NaiveDate) -> String {
    format!("{} - {}", format_date(start), format_date_year(end))
}

fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

fn format_date_year(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, FixedOffset, Weekday};
    use quickcheck_macros::quickcheck;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // A Sunday anchor, distinct from the default, so alignment comes from the
    // anchor and not from any weekday assumption.
    fn sunday_calendar() -> PayCalendar {
        PayCalendar::new(date(2025, 11, 16))
    }

    #[test]
    fn default_anchor_is_a_monday_period_start() {
        let calendar = PayCalendar::default();
        assert_eq!(calendar.anchor().weekday(), Weekday::Mon);
        assert_eq!(calendar.period_for(calendar.anchor()).start(), calendar.anchor());
    }

    #[test]
    fn date_inside_first_week_maps_to_anchor_period() {
        let period = sunday_calendar().period_for(date(2025, 11, 20));
        assert_eq!(period.start(), date(2025, 11, 16));
        assert_eq!(period.end(), date(2025, 11, 29));
        assert_eq!(period.week_1().start, date(2025, 11, 16));
        assert_eq!(period.week_1().end, date(2025, 11, 22));
        assert_eq!(period.week_2().start, date(2025, 11, 23));
        assert_eq!(period.week_2().end, date(2025, 11, 29));
    }

    #[test]
    fn period_end_is_inclusive() {
        let calendar = sunday_calendar();
        assert_eq!(calendar.period_for(date(2025, 11, 29)).start(), date(2025, 11, 16));
        assert_eq!(calendar.period_for(date(2025, 11, 30)).start(), date(2025, 11, 30));
    }

    #[test]
    fn dates_before_the_anchor_floor_into_earlier_periods() {
        let period = sunday_calendar().period_for(date(2025, 11, 1));
        assert_eq!(period.start(), date(2025, 10, 19));
        assert!(period.contains(date(2025, 11, 1)));
    }

    #[test]
    fn key_uses_calendar_components() {
        let period = sunday_calendar().period_for(date(2025, 11, 20));
        assert_eq!(period.key(), "2025-11-16");
    }

    #[test]
    fn label_formats_the_full_range() {
        let calendar = sunday_calendar();
        assert_eq!(
            calendar.period_for(date(2025, 11, 20)).label(),
            "Nov 16 - Nov 29, 2025"
        );
        assert_eq!(
            PayCalendar::default().period_for(date(2025, 12, 3)).label(),
            "Dec 1 - Dec 14, 2025"
        );
        assert_eq!(
            calendar.period_for(date(2025, 11, 20)).week_1().label(),
            "Nov 16 - Nov 22"
        );
    }

    #[test]
    fn late_evening_west_of_utc_stays_in_its_local_period() {
        // 23:30 on Nov 20 at UTC-10 is already Nov 21 in UTC. The period must
        // come from the local date.
        let offset = FixedOffset::west_opt(10 * 3600).unwrap();
        let at = date(2025, 11, 20)
            .and_hms_opt(23, 30, 0)
            .unwrap()
            .and_local_timezone(offset)
            .unwrap();
        assert_eq!(at.naive_utc().date(), date(2025, 11, 21));

        let period = sunday_calendar().period_at(&at);
        assert_eq!(period.key(), "2025-11-16");
    }

    #[test]
    fn boundary_evening_does_not_leak_into_the_next_period() {
        // Last day of a period, late evening, UTC-10. The UTC date is the
        // first day of the next period.
        let offset = FixedOffset::west_opt(10 * 3600).unwrap();
        let at = date(2025, 11, 29)
            .and_hms_opt(22, 0, 0)
            .unwrap()
            .and_local_timezone(offset)
            .unwrap();
        assert_eq!(at.naive_utc().date(), date(2025, 11, 30));

        let period = sunday_calendar().period_at(&at);
        assert_eq!(period.start(), date(2025, 11, 16));
    }

    #[test]
    fn week_of_splits_the_period_in_half() {
        let period = sunday_calendar().period_for(date(2025, 11, 16));
        assert_eq!(period.week_of(date(2025, 11, 16)), 1);
        assert_eq!(period.week_of(date(2025, 11, 22)), 1);
        assert_eq!(period.week_of(date(2025, 11, 23)), 2);
        assert_eq!(period.week_of(date(2025, 11, 29)), 2);
    }

    #[test]
    fn past_periods_count_backwards_from_today() {
        let calendar = PayCalendar::default();
        let current = calendar.current_period();
        let past = calendar.past_periods(3);
        assert_eq!(past.len(), 3);
        for (i, period) in past.iter().enumerate() {
            let back = (i as i64 + 1) * PERIOD_DAYS;
            assert_eq!(period.start(), current.start() - Duration::days(back));
            assert!(!calendar.is_current(period));
            assert!(!calendar.is_future(period));
        }
    }

    #[test]
    fn current_and_future_are_judged_by_start_date() {
        let calendar = PayCalendar::default();
        let current = calendar.current_period();
        assert!(calendar.is_current(&current));
        assert!(!calendar.is_future(&current));
        assert!(calendar.is_future(&current.next()));
        assert!(!calendar.is_current(&current.previous()));
    }

    #[quickcheck]
    fn period_start_is_anchor_aligned(offset: i16) -> bool {
        let calendar = sunday_calendar();
        let period = calendar.period_for(calendar.anchor() + Duration::days(offset as i64));
        let days = (period.start() - calendar.anchor()).num_days();
        days % PERIOD_DAYS == 0 && period.start().weekday() == calendar.anchor().weekday()
    }

    #[quickcheck]
    fn every_date_falls_inside_its_own_period(offset: i16) -> bool {
        let calendar = sunday_calendar();
        let target = calendar.anchor() + Duration::days(offset as i64);
        calendar.period_for(target).contains(target)
    }

    #[quickcheck]
    fn previous_then_next_round_trips(offset: i16) -> bool {
        let calendar = sunday_calendar();
        let period = calendar.period_for(calendar.anchor() + Duration::days(offset as i64));
        period.previous().next() == period && period.next().previous() == period
    }

    #[quickcheck]
    fn weeks_partition_the_period(offset: i16) -> bool {
        let calendar = sunday_calendar();
        let period = calendar.period_for(calendar.anchor() + Duration::days(offset as i64));
        let w1 = period.week_1();
        let w2 = period.week_2();
        (w1.end - w1.start).num_days() == WEEK_DAYS - 1
            && (w2.end - w2.start).num_days() == WEEK_DAYS - 1
            && w1.end + Duration::days(1) == w2.start
            && w1.start == period.start()
            && w2.end == period.end()
    }
}
