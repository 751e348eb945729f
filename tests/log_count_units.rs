use std::error::Error;

use trigrun::engine::CaptureSink;
use trigrun::state::StateStore;
use trigrun::units::{CountUnit, Invocation, LogUnit, UnitRefs};

type TestResult = Result<(), Box<dyn Error>>;

fn triggered_by(name: &str, output: &str) -> Invocation {
    Invocation {
        triggered_by: Some(name.to_string()),
        output: Some(output.to_string()),
        error: None,
    }
}

#[test]
fn log_creates_parent_directories_and_appends() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("var/log/deep/build.log");
    let unit = LogUnit::new("audit", &path, UnitRefs::default());
    let sink = CaptureSink::new();

    unit.run(&sink, &triggered_by("build", "first\n"))?;
    unit.run(&sink, &triggered_by("build", "second\n"))?;

    let contents = std::fs::read_to_string(&path)?;
    let headers = contents.matches("=== Unit 'build'").count();
    assert_eq!(headers, 2);
    assert!(contents.contains("first"));
    assert!(contents.contains("second"));

    Ok(())
}

#[test]
fn log_records_entries_in_rfc3339() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("build.log");
    let unit = LogUnit::new("audit", &path, UnitRefs::default());

    unit.run(&CaptureSink::new(), &triggered_by("build", "output\n"))?;

    let contents = std::fs::read_to_string(&path)?;
    let header = contents.lines().next().unwrap();
    // `=== Unit 'build' - <timestamp> ===`
    let timestamp = header
        .trim_start_matches("=== Unit 'build' - ")
        .trim_end_matches(" ===");
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());

    Ok(())
}

#[test]
fn count_tracks_each_triggering_unit_separately() -> TestResult {
    let dir = tempfile::tempdir()?;
    let state = StateStore::open(dir.path().join("state.yaml"))?;
    let unit = CountUnit::new("tally", state.clone(), UnitRefs::default());
    let sink = CaptureSink::new();

    unit.run(&sink, &triggered_by("alpha", ""))?;
    unit.run(&sink, &triggered_by("alpha", ""))?;
    unit.run(&sink, &triggered_by("beta", ""))?;

    assert_eq!(state.get_i64("tally", "alpha"), Some(2));
    assert_eq!(state.get_i64("tally", "beta"), Some(1));

    Ok(())
}

#[test]
fn count_without_context_uses_unknown() -> TestResult {
    let dir = tempfile::tempdir()?;
    let state = StateStore::open(dir.path().join("state.yaml"))?;
    let unit = CountUnit::new("tally", state.clone(), UnitRefs::default());

    unit.run(&CaptureSink::new(), &Invocation::default())?;

    assert_eq!(state.get_i64("tally", "unknown"), Some(1));
    Ok(())
}

#[test]
fn counts_survive_a_restart() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("state.yaml");

    {
        let state = StateStore::open(&path)?;
        let unit = CountUnit::new("tally", state, UnitRefs::default());
        unit.run(&CaptureSink::new(), &triggered_by("alpha", ""))?;
    }

    let state = StateStore::open(&path)?;
    let unit = CountUnit::new("tally", state.clone(), UnitRefs::default());
    unit.run(&CaptureSink::new(), &triggered_by("alpha", ""))?;

    assert_eq!(state.get_i64("tally", "alpha"), Some(2));
    Ok(())
}
