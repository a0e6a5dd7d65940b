use pulse_config::WindowConfig;
use pulse_core::{SECONDS_PER_DAY, TimeRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledWindow {
    pub range: TimeRange,
    pub commits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountFailure<E> {
    pub range: TimeRange,
    pub source: E,
}

pub fn horizon(end: i64, interval_secs: i64, count: u32) -> Vec<TimeRange> {
    let interval_secs = interval_secs.max(1);
    (0..i64::from(count))
        .map(|index| {
            let to = end - index * interval_secs;
            TimeRange::new(to - interval_secs, to)
        })
        .collect()
}

/// Rounds `end` up to a multiple of `interval_secs` so window boundaries
/// stay fixed while the clock moves within one interval.
pub fn align_horizon_end(end: i64, interval_secs: i64) -> i64 {
    let interval_secs = interval_secs.max(1);
    let cells = end.div_euclid(interval_secs);
    if end.rem_euclid(interval_secs) == 0 {
        cells * interval_secs
    } else {
        (cells + 1) * interval_secs
    }
}

pub fn horizon_for(config: &WindowConfig, end: i64) -> Vec<TimeRange> {
    let interval_secs = i64::from(config.interval_days) * SECONDS_PER_DAY;
    horizon(
        align_horizon_end(end, interval_secs),
        interval_secs,
        config.interval_count,
    )
}

/// Yields processing windows most-recent-first, bisecting any range whose
/// commit count exceeds the cap. The pending ranges live on an explicit
/// stack so depth is bounded by `log2(interval / min_window_secs)`.
pub struct WindowQueue<F> {
    stack: Vec<TimeRange>,
    commit_cap: u64,
    min_window_secs: i64,
    count_commits: F,
}

impl<F, E> WindowQueue<F>
where
    F: FnMut(TimeRange) -> Result<u64, E>,
{
    pub fn new(ranges: Vec<TimeRange>, config: &WindowConfig, count_commits: F) -> Self {
        let mut stack = ranges;
        stack.reverse();
        Self {
            stack,
            commit_cap: config.commit_cap,
            min_window_secs: config.min_window_secs.max(1),
            count_commits,
        }
    }

    fn can_bisect(&self, range: TimeRange) -> bool {
        range.duration() >= 2 * self.min_window_secs
    }
}

impl<F, E> Iterator for WindowQueue<F>
where
    F: FnMut(TimeRange) -> Result<u64, E>,
{
    type Item = Result<ScheduledWindow, CountFailure<E>>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(range) = self.stack.pop() {
            if range.is_empty() {
                continue;
            }

            let commits = match (self.count_commits)(range) {
                Ok(commits) => commits,
                Err(source) => {
                    self.stack.clear();
                    return Some(Err(CountFailure { range, source }));
                }
            };

            if commits > self.commit_cap && self.can_bisect(range) {
                let (older, newer) = range.bisect();
                tracing::debug!(
                    from = range.from,
                    to = range.to,
                    commits,
                    cap = self.commit_cap,
                    "bisecting window over commit cap"
                );
                self.stack.push(older);
                self.stack.push(newer);
                continue;
            }

            return Some(Ok(ScheduledWindow { range, commits }));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use proptest::prelude::*;

    use super::*;

    fn config(commit_cap: u64, min_window_secs: i64) -> WindowConfig {
        WindowConfig {
            interval_days: 100,
            interval_count: 1,
            commit_cap,
            min_window_secs,
        }
    }

    fn counter(timestamps: &[i64]) -> impl FnMut(TimeRange) -> Result<u64, Infallible> + '_ {
        move |range| {
            Ok(timestamps
                .iter()
                .filter(|timestamp| range.contains(**timestamp))
                .count() as u64)
        }
    }

    #[test]
    fn horizon_is_most_recent_first_and_contiguous() {
        let ranges = horizon(1_000, 100, 3);
        assert_eq!(
            ranges,
            vec![
                TimeRange::new(900, 1_000),
                TimeRange::new(800, 900),
                TimeRange::new(700, 800),
            ]
        );
    }

    #[test]
    fn horizon_end_snaps_up_to_the_interval_grid() {
        assert_eq!(align_horizon_end(1_000, 100), 1_000);
        assert_eq!(align_horizon_end(1_001, 100), 1_100);
        assert_eq!(align_horizon_end(1_099, 100), 1_100);
        assert_eq!(align_horizon_end(-50, 100), 0);

        let config = config(300, 3_600);
        let day = SECONDS_PER_DAY;
        assert_eq!(
            horizon_for(&config, 101 * day),
            horizon_for(&config, 200 * day)
        );
        assert_eq!(
            horizon_for(&config, 101 * day),
            vec![TimeRange::new(100 * day, 200 * day)]
        );
    }

    #[test]
    fn window_over_cap_bisects_into_two_halves() {
        let end = 100 * SECONDS_PER_DAY;
        let timestamps = (0..301).map(|index| index * 1_000).collect::<Vec<_>>();
        let config = config(300, 3_600);

        let windows = WindowQueue::new(horizon_for(&config, end), &config, counter(&timestamps))
            .collect::<Result<Vec<_>, _>>()
            .expect("schedule windows");

        assert_eq!(
            windows
                .iter()
                .map(|window| window.range)
                .collect::<Vec<_>>(),
            vec![
                TimeRange::new(50 * SECONDS_PER_DAY, 100 * SECONDS_PER_DAY),
                TimeRange::new(0, 50 * SECONDS_PER_DAY),
            ]
        );
        assert_eq!(windows[0].commits, 0);
        assert_eq!(windows[1].commits, 301);
    }

    #[test]
    fn window_at_cap_is_not_bisected() {
        let end = 100 * SECONDS_PER_DAY;
        let timestamps = (0..300).collect::<Vec<_>>();
        let config = config(300, 3_600);

        let windows = WindowQueue::new(horizon_for(&config, end), &config, counter(&timestamps))
            .collect::<Result<Vec<_>, _>>()
            .expect("schedule windows");
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].commits, 300);
    }

    #[test]
    fn dense_burst_stops_bisecting_at_minimum_window() {
        let timestamps = vec![10; 50];
        let config = config(5, 100);

        let windows = WindowQueue::new(vec![TimeRange::new(0, 1_000)], &config, counter(&timestamps))
            .collect::<Result<Vec<_>, _>>()
            .expect("schedule windows");

        let dense = windows
            .iter()
            .find(|window| window.range.contains(10))
            .expect("window containing the burst");
        assert_eq!(dense.commits, 50);
        assert!(dense.range.duration() < 200);
    }

    #[test]
    fn count_failure_stops_the_queue() {
        let config = config(1, 1);
        let mut queue = WindowQueue::new(
            horizon(100, 10, 3),
            &config,
            |_range: TimeRange| -> Result<u64, &'static str> { Err("db gone") },
        );

        assert_eq!(
            queue.next(),
            Some(Err(CountFailure {
                range: TimeRange::new(90, 100),
                source: "db gone",
            }))
        );
        assert_eq!(queue.next(), None);
    }

    proptest! {
        #[test]
        fn windows_exactly_cover_the_horizon(
            timestamps in prop::collection::vec(0i64..10_000, 0..400),
            commit_cap in 1u64..40,
            interval in 1i64..5_000,
            count in 1u32..4,
            min_window_secs in 1i64..50,
        ) {
            let end = 10_000;
            let config = WindowConfig {
                interval_days: 1,
                interval_count: count,
                commit_cap,
                min_window_secs,
            };
            let ranges = horizon(end, interval, count);
            let windows = WindowQueue::new(ranges.clone(), &config, counter(&timestamps))
                .collect::<Result<Vec<_>, _>>()
                .expect("schedule windows");

            // Emission order is strictly most-recent-first and gap-free.
            let mut expected_to = end;
            for window in &windows {
                prop_assert_eq!(window.range.to, expected_to);
                prop_assert!(window.range.from < window.range.to);
                prop_assert!(
                    window.commits <= commit_cap
                        || window.range.duration() < 2 * min_window_secs
                );
                expected_to = window.range.from;
            }
            let horizon_start = ranges.last().map(|range| range.from).unwrap_or(end);
            prop_assert_eq!(expected_to, horizon_start);

            let covered = windows.iter().map(|window| window.commits).sum::<u64>();
            let in_horizon = timestamps
                .iter()
                .filter(|timestamp| **timestamp >= horizon_start && **timestamp < end)
                .count() as u64;
            prop_assert_eq!(covered, in_horizon);
        }
    }
}
