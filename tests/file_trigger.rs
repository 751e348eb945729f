use std::error::Error;

use trigrun::state::StateStore;
use trigrun::units::{CheckMode, FileTrigger, UnitRefs};

type TestResult = Result<(), Box<dyn Error>>;

fn setup(
    pattern_suffix: &str,
) -> Result<(tempfile::TempDir, StateStore, FileTrigger), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let state = StateStore::open(dir.path().join("state.yaml"))?;
    let pattern = format!("{}/{}", dir.path().display(), pattern_suffix);
    let trigger = FileTrigger::new("watched", &pattern, state.clone(), UnitRefs::default())?;
    Ok((dir, state, trigger))
}

#[test]
fn first_check_fires_then_settles() -> TestResult {
    let (dir, _state, trigger) = setup("*.txt")?;
    std::fs::write(dir.path().join("a.txt"), "alpha")?;
    std::fs::write(dir.path().join("b.txt"), "beta")?;

    assert!(trigger.check(CheckMode::Polling)?);
    // Unchanged tree: the second check must not fire.
    assert!(!trigger.check(CheckMode::Polling)?);
    assert!(!trigger.check(CheckMode::Manual)?);

    Ok(())
}

#[test]
fn content_change_fires_once() -> TestResult {
    let (dir, _state, trigger) = setup("*.txt")?;
    std::fs::write(dir.path().join("a.txt"), "alpha")?;

    assert!(trigger.check(CheckMode::Polling)?);

    std::fs::write(dir.path().join("a.txt"), "changed")?;
    assert!(trigger.check(CheckMode::Polling)?);
    assert!(!trigger.check(CheckMode::Polling)?);

    Ok(())
}

#[test]
fn added_and_removed_files_fire() -> TestResult {
    let (dir, _state, trigger) = setup("*.txt")?;
    std::fs::write(dir.path().join("a.txt"), "alpha")?;
    assert!(trigger.check(CheckMode::Polling)?);

    std::fs::write(dir.path().join("b.txt"), "beta")?;
    assert!(trigger.check(CheckMode::Polling)?);

    std::fs::remove_file(dir.path().join("a.txt"))?;
    assert!(trigger.check(CheckMode::Polling)?);
    assert!(!trigger.check(CheckMode::Polling)?);

    Ok(())
}

#[test]
fn recursive_pattern_sees_nested_files() -> TestResult {
    let (dir, _state, trigger) = setup("src/**/*.rs")?;
    std::fs::create_dir_all(dir.path().join("src/deep/nested"))?;
    std::fs::write(dir.path().join("src/deep/nested/mod.rs"), "// nested")?;

    assert!(trigger.check(CheckMode::Polling)?);

    std::fs::write(dir.path().join("src/deep/nested/mod.rs"), "// edited")?;
    assert!(trigger.check(CheckMode::Polling)?);

    Ok(())
}

#[test]
fn directories_are_ignored() -> TestResult {
    let (dir, _state, trigger) = setup("*")?;
    std::fs::create_dir(dir.path().join("only-a-directory"))?;

    // A tree with no matching *files* still fires once (empty fingerprint
    // differs from "nothing recorded"), then settles.
    assert!(trigger.check(CheckMode::Polling)?);
    assert!(!trigger.check(CheckMode::Polling)?);

    std::fs::create_dir(dir.path().join("another-directory"))?;
    assert!(!trigger.check(CheckMode::Polling)?);

    Ok(())
}

#[test]
fn fingerprint_is_sorted_path_hash_pairs() -> TestResult {
    let (dir, _state, trigger) = setup("*.txt")?;
    std::fs::write(dir.path().join("b.txt"), "beta")?;
    std::fs::write(dir.path().join("a.txt"), "alpha")?;

    let fingerprint = trigger.fingerprint()?;
    let parts: Vec<&str> = fingerprint.split('|').collect();
    assert_eq!(parts.len(), 2);
    assert!(parts[0].contains("a.txt:"));
    assert!(parts[1].contains("b.txt:"));

    for part in parts {
        let hash = part.rsplit(':').next().unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    Ok(())
}

#[test]
fn malformed_pattern_is_a_construction_error() {
    let dir = tempfile::tempdir().unwrap();
    let state = StateStore::open(dir.path().join("state.yaml")).unwrap();

    let err = FileTrigger::new("bad", "src/[invalid", state, UnitRefs::default()).unwrap_err();
    assert!(err.to_string().contains("invalid glob pattern"));
}
