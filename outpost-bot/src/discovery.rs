//! Free-oasis discovery around a configured center.
use chrono::NaiveDate;
use log::{debug, info, warn};
use outpost_core::{Coordinate, DiscoveryConfig, DiscoveryLog, surrounding_coordinates};

use crate::executor::{ActionExecutor, ExecutorError};

/// Result of one bounded scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryRun {
    pub inspected: usize,
    pub found: Vec<Coordinate>,
    /// Every tile in range has been looked at.
    pub complete: bool,
}

/// Inspects up to `settings.max_tiles` unscanned tiles, nearest first.
///
/// Tiles already in `known` or in the log are skipped. The day is marked as
/// done only once the whole area has been covered; a transient probe failure
/// ends the scan early and leaves the rest for the next cycle.
pub async fn scan_for_oases<E>(
    executor: &mut E,
    log: &mut DiscoveryLog,
    settings: &DiscoveryConfig,
    known: &[Coordinate],
    today: NaiveDate,
) -> DiscoveryRun
where
    E: ActionExecutor + ?Sized,
{
    let mut run = DiscoveryRun::default();
    if !log.is_due(today) {
        run.complete = true;
        return run;
    }

    let pending: Vec<Coordinate> = surrounding_coordinates(settings.center, settings.radius)
        .into_iter()
        .filter(|tile| !log.was_scanned(*tile) && !known.contains(tile))
        .collect();
    info!(
        "🔭 scanning around {} ({} tiles left)",
        settings.center,
        pending.len()
    );

    for &tile in pending.iter().take(settings.max_tiles) {
        match executor.inspect_tile(tile).await {
            Ok(true) => {
                info!("found free oasis at {tile}");
                run.found.push(tile);
            }
            Ok(false) => debug!("{tile} is not a free oasis"),
            Err(ExecutorError::InvalidTarget { reason }) => debug!("{tile}: {reason}"),
            Err(err) => {
                warn!("oasis scan stopped at {tile}: {err}");
                return run;
            }
        }
        log.mark_scanned(tile);
        run.inspected += 1;
    }

    if run.inspected == pending.len() {
        run.complete = true;
        log.mark_run(today);
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedExecutor;

    fn settings(max_tiles: usize) -> DiscoveryConfig {
        DiscoveryConfig {
            center: Coordinate::new(0, 0),
            radius: 1,
            max_tiles,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn scans_nearest_first_and_reports_free_oases() {
        let mut executor = ScriptedExecutor::default();
        executor.free_tiles.insert(Coordinate::new(1, 1));
        let mut log = DiscoveryLog::default();

        let run = tokio_test::block_on(scan_for_oases(
            &mut executor,
            &mut log,
            &settings(50),
            &[],
            today(),
        ));

        assert_eq!(run.inspected, 9);
        assert_eq!(run.found, vec![Coordinate::new(1, 1)]);
        assert!(run.complete);
        assert_eq!(executor.inspected_tiles[0], Coordinate::new(0, 0));
        assert!(!log.is_due(today()));
    }

    #[test]
    fn capped_scans_resume_where_they_stopped() {
        let mut executor = ScriptedExecutor::default();
        let mut log = DiscoveryLog::default();
        let known = [Coordinate::new(0, 0)];

        let first = tokio_test::block_on(scan_for_oases(
            &mut executor,
            &mut log,
            &settings(5),
            &known,
            today(),
        ));
        assert_eq!(first.inspected, 5);
        assert!(!first.complete);
        assert!(log.is_due(today()));

        let second = tokio_test::block_on(scan_for_oases(
            &mut executor,
            &mut log,
            &settings(5),
            &known,
            today(),
        ));
        assert_eq!(second.inspected, 3);
        assert!(second.complete);
        assert_eq!(executor.inspected_tiles.len(), 8);
        assert!(!executor.inspected_tiles.contains(&Coordinate::new(0, 0)));
    }

    #[test]
    fn does_nothing_once_done_for_the_day() {
        let mut executor = ScriptedExecutor::default();
        let mut log = DiscoveryLog::default();
        log.mark_run(today());

        let run = tokio_test::block_on(scan_for_oases(
            &mut executor,
            &mut log,
            &settings(50),
            &[],
            today(),
        ));

        assert_eq!(run.inspected, 0);
        assert!(executor.inspected_tiles.is_empty());
    }
}
