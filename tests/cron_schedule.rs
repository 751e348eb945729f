use std::error::Error;

use chrono::{DateTime, Duration as ChronoDuration, Local, TimeZone};
use trigrun::state::StateStore;
use trigrun::units::{CronTrigger, UnitRefs};

type TestResult = Result<(), Box<dyn Error>>;

fn store() -> Result<(tempfile::TempDir, StateStore), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let state = StateStore::open(dir.path().join("state.yaml"))?;
    Ok((dir, state))
}

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

#[test]
fn first_check_fires_and_anchors_to_the_scheduled_minute() -> TestResult {
    let (_dir, state) = store()?;
    let cron = CronTrigger::new("every-minute", "* * * * *", state.clone(), UnitRefs::default())?;

    let now = at(2026, 3, 10, 12, 0, 30);
    assert!(cron.check_at(now)?);

    // The persisted instant is the minute boundary, not `now`.
    let recorded = state.get_string("every-minute", "last_execution").unwrap();
    let recorded: DateTime<Local> = DateTime::parse_from_rfc3339(&recorded)?.with_timezone(&Local);
    assert_eq!(recorded, at(2026, 3, 10, 12, 0, 0));

    Ok(())
}

#[test]
fn at_most_one_fire_per_scheduled_minute() -> TestResult {
    let (_dir, state) = store()?;
    let cron = CronTrigger::new("every-minute", "* * * * *", state, UnitRefs::default())?;

    assert!(cron.check_at(at(2026, 3, 10, 12, 0, 5))?);

    // Polling sweeps re-enter the same minute every 10 seconds.
    assert!(!cron.check_at(at(2026, 3, 10, 12, 0, 15))?);
    assert!(!cron.check_at(at(2026, 3, 10, 12, 0, 25))?);
    assert!(!cron.check_at(at(2026, 3, 10, 12, 0, 55))?);

    // The next minute fires again.
    assert!(cron.check_at(at(2026, 3, 10, 12, 1, 5))?);
    assert!(!cron.check_at(at(2026, 3, 10, 12, 1, 15))?);

    Ok(())
}

#[test]
fn schedule_not_yet_due_does_not_fire() -> TestResult {
    let (_dir, state) = store()?;
    let cron = CronTrigger::new("nightly", "0 2 * * *", state.clone(), UnitRefs::default())?;

    assert!(!cron.check_at(at(2026, 3, 10, 1, 0, 0))?);
    // A non-firing first check persists nothing.
    assert_eq!(state.get_string("nightly", "last_execution"), None);

    Ok(())
}

#[test]
fn run_within_tolerance_fires_at_the_scheduled_instant() -> TestResult {
    let (_dir, state) = store()?;
    let cron = CronTrigger::new("nightly", "0 2 * * *", state.clone(), UnitRefs::default())?;

    // Last ran yesterday 02:00; it is now 02:00:40, within the 60s window.
    state.set_string(
        "nightly",
        "last_execution",
        &at(2026, 3, 9, 2, 0, 0).to_rfc3339(),
    )?;
    assert!(cron.check_at(at(2026, 3, 10, 2, 0, 40))?);

    let recorded = state.get_string("nightly", "last_execution").unwrap();
    let recorded: DateTime<Local> = DateTime::parse_from_rfc3339(&recorded)?.with_timezone(&Local);
    assert_eq!(recorded, at(2026, 3, 10, 2, 0, 0));

    Ok(())
}

#[test]
fn missed_run_is_skipped_not_caught_up() -> TestResult {
    let (_dir, state) = store()?;
    let cron = CronTrigger::new("nightly", "0 0 * * *", state.clone(), UnitRefs::default())?;

    let now = at(2026, 3, 10, 9, 30, 0);
    state.set_string(
        "nightly",
        "last_execution",
        &(now - ChronoDuration::hours(48)).to_rfc3339(),
    )?;

    // The midnight run was missed by hours: skip it and move on.
    assert!(!cron.check_at(now)?);

    let recorded = state.get_string("nightly", "last_execution").unwrap();
    let recorded: DateTime<Local> = DateTime::parse_from_rfc3339(&recorded)?.with_timezone(&Local);
    assert_eq!(recorded, now);

    // After the skip, the next scheduled run is tonight; nothing fires yet.
    assert!(!cron.check_at(now + ChronoDuration::minutes(5))?);

    Ok(())
}

#[test]
fn unparseable_recorded_instant_takes_the_first_run_path() -> TestResult {
    let (_dir, state) = store()?;
    let cron = CronTrigger::new("every-minute", "* * * * *", state.clone(), UnitRefs::default())?;

    state.set_string("every-minute", "last_execution", "not a timestamp")?;
    assert!(cron.check_at(at(2026, 3, 10, 12, 0, 30))?);

    Ok(())
}

#[test]
fn descriptor_schedules_are_accepted() -> TestResult {
    let (_dir, state) = store()?;
    let cron = CronTrigger::new("daily", "@daily", state, UnitRefs::default())?;

    // @daily = midnight; 00:00:30 is within tolerance of the first run.
    assert!(cron.check_at(at(2026, 3, 10, 0, 0, 30))?);
    assert!(!cron.check_at(at(2026, 3, 10, 0, 0, 50))?);

    Ok(())
}

#[test]
fn invalid_schedule_is_a_construction_error() {
    let dir = tempfile::tempdir().unwrap();
    let state = StateStore::open(dir.path().join("state.yaml")).unwrap();

    let err = CronTrigger::new("bad", "61 * * * *", state, UnitRefs::default()).unwrap_err();
    assert!(err.to_string().contains("failed to parse cron schedule"));
}
