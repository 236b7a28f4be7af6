use batteryguard_core::db::{open_db, open_db_in_memory};
use batteryguard_core::{SequenceGenerator, SqliteSequenceGenerator};
use std::collections::BTreeSet;

#[test]
fn first_sequence_per_year_is_one_then_strictly_increasing() {
    let conn = open_db_in_memory().unwrap();
    let sequences = SqliteSequenceGenerator::try_new(&conn).unwrap();

    assert_eq!(sequences.next_sequence(2025).unwrap(), 1);
    assert_eq!(sequences.next_sequence(2025).unwrap(), 2);
    assert_eq!(sequences.next_sequence(2025).unwrap(), 3);
}

#[test]
fn year_rollover_restarts_at_one() {
    let conn = open_db_in_memory().unwrap();
    let sequences = SqliteSequenceGenerator::try_new(&conn).unwrap();

    assert_eq!(sequences.next_sequence(2025).unwrap(), 1);
    assert_eq!(sequences.next_sequence(2025).unwrap(), 2);
    assert_eq!(sequences.next_sequence(2026).unwrap(), 1);
    // The old year's counter is untouched by the rollover.
    assert_eq!(sequences.next_sequence(2025).unwrap(), 3);
}

#[test]
fn format_number_is_seq_slash_year() {
    let conn = open_db_in_memory().unwrap();
    let sequences = SqliteSequenceGenerator::try_new(&conn).unwrap();

    assert_eq!(sequences.format_number(2025).unwrap(), "1/2025");
    assert_eq!(sequences.format_number(2025).unwrap(), "2/2025");
}

#[test]
fn concurrent_callers_get_a_gap_free_permutation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counters.db");
    drop(open_db(&path).unwrap());

    let mut handles = Vec::new();
    for _ in 0..5 {
        let thread_path = path.clone();
        handles.push(std::thread::spawn(move || {
            let conn = open_db(&thread_path).unwrap();
            let sequences = SqliteSequenceGenerator::try_new(&conn).unwrap();
            sequences.next_sequence(2025).unwrap()
        }));
    }

    let drawn: BTreeSet<i64> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    assert_eq!(drawn, BTreeSet::from([1, 2, 3, 4, 5]));
}
