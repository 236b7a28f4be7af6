use batteryguard_core::db::open_db_in_memory;
use batteryguard_core::model::group::{BillingInfo, ObjectGroup};
use batteryguard_core::model::settings::CompanySettings;
use batteryguard_core::repo::group_repo::{GroupRepository, GroupUpdate, SqliteGroupRepository};
use batteryguard_core::repo::settings_repo::{SettingsProvider, SqliteSettingsRepository};
use batteryguard_core::RepoError;

fn group(id: &str, name: &str) -> ObjectGroup {
    let mut group = ObjectGroup::with_id(id, name);
    group.color = Some("#2563eb".to_string());
    group.default_battery_life_months = Some(48);
    group
}

#[test]
fn group_crud_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let mut repo = SqliteGroupRepository::try_new(&conn).unwrap();

    let mut created = group("g1", "Logistika a.s.");
    created.billing_info = Some(BillingInfo {
        name: "Logistika a.s.".to_string(),
        address: "Fakturační 1, Praha".to_string(),
        ico: Some("87654321".to_string()),
        dic: None,
    });
    repo.create_group(&created).unwrap();

    assert_eq!(repo.get_group("g1").unwrap(), created);

    repo.update_group(
        "g1",
        &GroupUpdate {
            notification_lead_time_weeks: Some(6),
            ..GroupUpdate::default()
        },
    )
    .unwrap();
    let updated = repo.get_group("g1").unwrap();
    assert_eq!(updated.notification_lead_time_weeks, Some(6));
    assert_eq!(updated.billing_info, created.billing_info);

    repo.delete_group("g1").unwrap();
    assert!(matches!(
        repo.get_group("g1").unwrap_err(),
        RepoError::NotFound(_)
    ));
}

#[test]
fn duplicate_group_id_is_a_conflict() {
    let conn = open_db_in_memory().unwrap();
    let mut repo = SqliteGroupRepository::try_new(&conn).unwrap();

    repo.create_group(&group("g1", "A")).unwrap();
    let err = repo.create_group(&group("g1", "B")).unwrap_err();
    assert!(matches!(err, RepoError::Conflict { entity: "group", .. }));
}

#[test]
fn replace_all_groups_swaps_the_whole_collection() {
    let conn = open_db_in_memory().unwrap();
    let mut repo = SqliteGroupRepository::try_new(&conn).unwrap();

    repo.create_group(&group("g1", "Stará")).unwrap();
    repo.create_group(&group("g2", "Také stará")).unwrap();

    repo.replace_all_groups(&[group("g3", "Nová")]).unwrap();

    let names: Vec<String> = repo
        .list_groups()
        .unwrap()
        .into_iter()
        .map(|group| group.name)
        .collect();
    assert_eq!(names, vec!["Nová"]);
}

#[test]
fn out_of_range_group_counter_reads_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    let mut repo = SqliteGroupRepository::try_new(&conn).unwrap();

    repo.create_group(&group("g1", "Logistika a.s.")).unwrap();
    conn.execute(
        "UPDATE groups SET default_battery_life_months = -1 WHERE id = 'g1';",
        [],
    )
    .unwrap();

    let err = repo.get_group("g1").unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn settings_start_absent_and_upsert_replaces_the_row() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSettingsRepository::try_new(&conn).unwrap();

    assert!(repo.company_settings().unwrap().is_none());

    let settings = CompanySettings {
        supplier_name: "Servis s.r.o.".to_string(),
        supplier_address: "Technická 5, Brno".to_string(),
        supplier_ico: Some("12345678".to_string()),
        supplier_dic: None,
        technician_name: "Petr Svoboda".to_string(),
    };
    repo.save_company_settings(&settings).unwrap();
    assert_eq!(repo.company_settings().unwrap(), Some(settings.clone()));

    let replaced = CompanySettings {
        technician_name: "Jana Dvořáková".to_string(),
        ..settings
    };
    repo.save_company_settings(&replaced).unwrap();
    assert_eq!(repo.company_settings().unwrap(), Some(replaced));

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM company_settings;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}
