//! The date cursor calculator: pure calendar arithmetic that computes the
//! next due date of a recurring transaction from its frequency and anchor
//! fields.

use time::{Date, Duration, Month, Weekday};

use crate::models::Frequency;

/// Compute the due date that follows `from` for the given frequency and
/// anchors.
///
/// The result is always strictly after `from`. Anchors that do not apply to
/// the frequency are ignored:
///
/// - `Daily`: `from` plus one day.
/// - `Weekly`: `from` plus seven days; with `day_of_week` (0-6, 0 is Sunday)
///   the result snaps forward to that weekday, skipping a full extra week
///   when the plain seven-day jump already lands on it.
/// - `Monthly`/`Quarterly`: `from` plus one/three calendar months, the day
///   taken from `day_of_month` (or `from`'s day) and clamped to the length
///   of the target month, so day 31 in February becomes February's last day.
/// - `Yearly`: `from` plus one calendar year, the month replaced by
///   `month_of_year` (1-12) when given, with the same day clamping.
///
/// This is a pure function: no I/O, deterministic given its inputs.
pub fn next_due_date(
    frequency: Frequency,
    from: Date,
    day_of_month: Option<u8>,
    day_of_week: Option<u8>,
    month_of_year: Option<u8>,
) -> Date {
    match frequency {
        Frequency::Daily => days_after(from, 1),
        Frequency::Weekly => {
            let naive = days_after(from, 7);

            match day_of_week {
                Some(target) => {
                    let target = weekday_from_sunday_index(target);
                    let offset = days_until_weekday(naive.weekday(), target);

                    if offset == 0 {
                        // The plain seven-day jump shares `from`'s weekday;
                        // an anchor equal to it means the week after next.
                        days_after(naive, 7)
                    } else {
                        days_after(naive, i64::from(offset))
                    }
                }
                None => naive,
            }
        }
        Frequency::Monthly => months_after(from, 1, day_of_month),
        Frequency::Quarterly => months_after(from, 3, day_of_month),
        Frequency::Yearly => {
            let month = month_of_year
                .and_then(|month| Month::try_from(month).ok())
                .unwrap_or_else(|| from.month());
            let day = day_of_month.unwrap_or_else(|| from.day());

            clamped_date(from.year() + 1, month, day)
        }
    }
}

/// `date` plus `days`, saturating at the calendar's upper bound.
pub(crate) fn days_after(date: Date, days: i64) -> Date {
    date.checked_add(Duration::days(days)).unwrap_or(Date::MAX)
}

/// `from` plus `months` calendar months, the day clamped to the target
/// month's length. `preferred_day` overrides `from`'s day-of-month.
pub(crate) fn months_after(from: Date, months: i32, preferred_day: Option<u8>) -> Date {
    let zero_based_month = from.year() * 12 + i32::from(u8::from(from.month())) - 1 + months;
    let year = zero_based_month.div_euclid(12);
    let month = Month::January.nth_next(zero_based_month.rem_euclid(12) as u8);
    let day = preferred_day.unwrap_or_else(|| from.day());

    clamped_date(year, month, day)
}

/// The date at `year`/`month` with `day` clamped to the month's length.
pub(crate) fn clamped_date(year: i32, month: Month, day: u8) -> Date {
    let day = day.min(month.length(year));

    Date::from_calendar_date(year, month, day).unwrap_or(Date::MAX)
}

/// Map the 0-6 day-of-week anchor (0 is Sunday) onto [time::Weekday].
fn weekday_from_sunday_index(index: u8) -> Weekday {
    match index % 7 {
        0 => Weekday::Sunday,
        1 => Weekday::Monday,
        2 => Weekday::Tuesday,
        3 => Weekday::Wednesday,
        4 => Weekday::Thursday,
        5 => Weekday::Friday,
        _ => Weekday::Saturday,
    }
}

/// The number of days from `from` forward to the next `to`, 0 when they are
/// the same weekday.
fn days_until_weekday(from: Weekday, to: Weekday) -> u8 {
    (to.number_days_from_sunday() + 7 - from.number_days_from_sunday()) % 7
}

#[cfg(test)]
mod next_due_date_tests {
    use time::{Date, Month, Weekday};

    use crate::models::Frequency;

    use super::next_due_date;

    fn date(year: i32, month: Month, day: u8) -> Date {
        Date::from_calendar_date(year, month, day).unwrap()
    }

    #[test]
    fn daily_adds_one_day() {
        let got = next_due_date(
            Frequency::Daily,
            date(2024, Month::August, 7),
            None,
            None,
            None,
        );

        assert_eq!(got, date(2024, Month::August, 8));
    }

    #[test]
    fn daily_rolls_over_year_end() {
        let got = next_due_date(
            Frequency::Daily,
            date(2024, Month::December, 31),
            None,
            None,
            None,
        );

        assert_eq!(got, date(2025, Month::January, 1));
    }

    #[test]
    fn weekly_adds_seven_days_without_anchor() {
        let got = next_due_date(
            Frequency::Weekly,
            date(2024, Month::August, 7),
            None,
            None,
            None,
        );

        assert_eq!(got, date(2024, Month::August, 14));
    }

    #[test]
    fn weekly_snaps_forward_to_anchor_weekday() {
        // 2024-08-07 is a Wednesday; the plain jump lands on Wednesday
        // 2024-08-14 and the Monday anchor (1) pushes it to 2024-08-19.
        let got = next_due_date(
            Frequency::Weekly,
            date(2024, Month::August, 7),
            None,
            Some(1),
            None,
        );

        assert_eq!(got, date(2024, Month::August, 19));
        assert_eq!(got.weekday(), Weekday::Monday);
    }

    #[test]
    fn weekly_skips_a_week_when_anchor_matches_own_weekday() {
        // A Wednesday anchor on a Wednesday start must not return the plain
        // seven-day jump, it skips to the week after next.
        let got = next_due_date(
            Frequency::Weekly,
            date(2024, Month::August, 7),
            None,
            Some(3),
            None,
        );

        assert_eq!(got, date(2024, Month::August, 21));
        assert_eq!(got.weekday(), Weekday::Wednesday);
    }

    #[test]
    fn monthly_clamps_day_31_to_leap_february() {
        let got = next_due_date(
            Frequency::Monthly,
            date(2024, Month::January, 31),
            Some(31),
            None,
            None,
        );

        assert_eq!(got, date(2024, Month::February, 29));
    }

    #[test]
    fn monthly_clamps_day_31_to_non_leap_february() {
        let got = next_due_date(
            Frequency::Monthly,
            date(2025, Month::January, 31),
            Some(31),
            None,
            None,
        );

        assert_eq!(got, date(2025, Month::February, 28));
    }

    #[test]
    fn monthly_keeps_anchored_day_after_a_short_month() {
        // Once clamped to February's end, the day-31 anchor restores the
        // end-of-month position in the next month.
        let got = next_due_date(
            Frequency::Monthly,
            date(2024, Month::February, 29),
            Some(31),
            None,
            None,
        );

        assert_eq!(got, date(2024, Month::March, 31));
    }

    #[test]
    fn monthly_rolls_over_year_end() {
        let got = next_due_date(
            Frequency::Monthly,
            date(2024, Month::December, 15),
            None,
            None,
            None,
        );

        assert_eq!(got, date(2025, Month::January, 15));
    }

    #[test]
    fn quarterly_adds_three_months_with_clamping() {
        // November 30 plus a quarter with a day-31 anchor lands on the last
        // day of February.
        let got = next_due_date(
            Frequency::Quarterly,
            date(2023, Month::November, 30),
            Some(31),
            None,
            None,
        );

        assert_eq!(got, date(2024, Month::February, 29));
    }

    #[test]
    fn yearly_adds_one_year() {
        let got = next_due_date(
            Frequency::Yearly,
            date(2024, Month::June, 15),
            None,
            None,
            None,
        );

        assert_eq!(got, date(2025, Month::June, 15));
    }

    #[test]
    fn yearly_clamps_leap_day() {
        let got = next_due_date(
            Frequency::Yearly,
            date(2024, Month::February, 29),
            None,
            None,
            None,
        );

        assert_eq!(got, date(2025, Month::February, 28));
    }

    #[test]
    fn yearly_applies_month_and_day_anchors() {
        let got = next_due_date(
            Frequency::Yearly,
            date(2024, Month::June, 15),
            Some(31),
            None,
            Some(2),
        );

        assert_eq!(got, date(2025, Month::February, 28));
    }

    #[test]
    fn result_is_strictly_after_from_for_all_frequencies() {
        let frequencies = [
            Frequency::Daily,
            Frequency::Weekly,
            Frequency::Monthly,
            Frequency::Quarterly,
            Frequency::Yearly,
        ];
        let fixtures = [
            date(2024, Month::January, 1),
            date(2024, Month::January, 31),
            date(2024, Month::February, 29),
            date(2024, Month::December, 31),
            date(2025, Month::June, 15),
        ];

        for frequency in frequencies {
            for from in fixtures {
                for day_of_week in [None, Some(0), Some(3), Some(6)] {
                    let got = next_due_date(frequency, from, Some(31), day_of_week, Some(12));

                    assert!(
                        got > from,
                        "want a date strictly after {from} for {frequency:?}, got {got}"
                    );
                }
            }
        }
    }

    #[test]
    fn calculator_is_deterministic() {
        let from = date(2024, Month::January, 31);

        let first = next_due_date(Frequency::Monthly, from, Some(31), None, None);
        let second = next_due_date(Frequency::Monthly, from, Some(31), None, None);

        assert_eq!(first, second);
    }
}
