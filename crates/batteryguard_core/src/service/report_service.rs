//! Report snapshot builder.
//!
//! # Responsibility
//! - Assemble numbered draft reports by snapshotting one object, its group
//!   billing identity and the company supplier settings.
//! - Clone existing reports into fresh drafts with a new sequence number.
//!
//! # Invariants
//! - Snapshot fields are frozen at build time; later object edits never
//!   change an existing report.
//! - Sequence numbers come exclusively from the sequence generator, one per
//!   built or cloned report.
//! - Absent supplier settings block building with a precondition failure.

use crate::model::group::BillingInfo;
use crate::model::new_entity_id;
use crate::model::object::{Battery, BuildingObject, DeviceType, TechKind, Technology};
use crate::model::report::{
    Report, ReportMeasurement, ReportStatus, SupplierInfo, VERDICT_PASS,
};
use crate::model::settings::CompanySettings;
use crate::repo::group_repo::GroupRepository;
use crate::repo::object_repo::ObjectRepository;
use crate::repo::report_repo::{ReportRepository, ReportUpdate};
use crate::repo::sequence_repo::SequenceGenerator;
use crate::repo::settings_repo::SettingsProvider;
use crate::repo::RepoError;
use chrono::{Datelike, Duration, Utc};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Baseline measurement rows seeded on every draft, before battery rows.
const BASELINE_MEASUREMENTS: [(&str, &str); 2] =
    [("Impedance smyčky", "Ohm"), ("Izolační odpor", "MOhm")];

/// Service error for report use-cases.
#[derive(Debug)]
pub enum ReportServiceError {
    /// Company settings are absent; the builder never invents supplier data.
    MissingSupplierSettings,
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for ReportServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSupplierSettings => write!(f, "supplier settings required"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReportServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ReportServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Report service over its repository collaborators.
pub struct ReportService<O, G, S, Q, R>
where
    O: ObjectRepository,
    G: GroupRepository,
    S: SettingsProvider,
    Q: SequenceGenerator,
    R: ReportRepository,
{
    objects: O,
    groups: G,
    settings: S,
    sequences: Q,
    reports: R,
}

impl<O, G, S, Q, R> ReportService<O, G, S, Q, R>
where
    O: ObjectRepository,
    G: GroupRepository,
    S: SettingsProvider,
    Q: SequenceGenerator,
    R: ReportRepository,
{
    /// Creates a service using the provided collaborators.
    pub fn new(objects: O, groups: G, settings: S, sequences: Q, reports: R) -> Self {
        Self {
            objects,
            groups,
            settings,
            sequences,
            reports,
        }
    }

    /// Builds and persists a draft report snapshot for one object.
    pub fn build_draft(
        &mut self,
        object_id: &str,
        report_type: &str,
    ) -> Result<Report, ReportServiceError> {
        let object = self.objects.get_object(object_id)?;
        let group = match &object.group_id {
            Some(group_id) => match self.groups.get_group(group_id) {
                Ok(group) => Some(group),
                // A dangling group id degrades to object-derived billing.
                Err(RepoError::NotFound(_)) => None,
                Err(err) => return Err(err.into()),
            },
            None => None,
        };
        let settings = self
            .settings
            .company_settings()?
            .ok_or(ReportServiceError::MissingSupplierSettings)?;

        let customer = group
            .as_ref()
            .and_then(|group| group.billing_info.clone())
            .unwrap_or_else(|| BillingInfo {
                name: group
                    .as_ref()
                    .map(|group| group.name.clone())
                    .unwrap_or_else(|| object.name.clone()),
                address: object.address.clone(),
                ico: None,
                dic: None,
            });

        let now = Utc::now();
        let year = now.year();
        let seq = self.sequences.next_sequence(year)?;
        let now_ms = now.timestamp_millis();

        let report = Report {
            id: new_entity_id(),
            object_id: object.id.clone(),
            report_type: report_type.to_string(),
            report_number: Report::format_number(seq, year),
            seq,
            year,
            status: ReportStatus::Draft,
            supplier: supplier_snapshot(&settings),
            customer,
            object_address: object.address.clone(),
            device_list: device_list(&object),
            technician_name: settings.technician_name.clone(),
            measurements: seed_measurements(&object),
            date_execution: now_ms,
            date_issue: now_ms,
            date_next: now_ms + Duration::days(365).num_milliseconds(),
        };

        self.reports.create_report(&report)?;
        info!(
            "event=report_build module=service status=ok object={} number={}",
            report.object_id, report.report_number
        );
        Ok(report)
    }

    /// Deep-copies an existing report into a fresh draft: new id, new
    /// sequence for the current year, dates reset, measurement values
    /// emptied while labels/units/verdicts are preserved.
    pub fn clone_report(&mut self, report_id: &str) -> Result<Report, ReportServiceError> {
        let mut report = self.reports.get_report(report_id)?;

        let now = Utc::now();
        let year = now.year();
        let seq = self.sequences.next_sequence(year)?;
        let now_ms = now.timestamp_millis();

        report.id = new_entity_id();
        report.seq = seq;
        report.year = year;
        report.report_number = Report::format_number(seq, year);
        report.status = ReportStatus::Draft;
        report.date_execution = now_ms;
        report.date_issue = now_ms;
        report.date_next = now_ms + Duration::days(365).num_milliseconds();
        for measurement in &mut report.measurements {
            measurement.value.clear();
        }

        self.reports.create_report(&report)?;
        info!(
            "event=report_clone module=service status=ok source={report_id} number={}",
            report.report_number
        );
        Ok(report)
    }

    /// Loads one report.
    pub fn get_report(&self, id: &str) -> Result<Report, ReportServiceError> {
        Ok(self.reports.get_report(id)?)
    }

    /// Reports for one object, newest number first.
    pub fn list_reports_for_object(
        &self,
        object_id: &str,
    ) -> Result<Vec<Report>, ReportServiceError> {
        Ok(self.reports.list_reports_for_object(object_id)?)
    }

    /// Applies allow-listed mutable changes (status, dates, technician,
    /// measurements) to one report.
    pub fn update_report(
        &mut self,
        id: &str,
        update: &ReportUpdate,
    ) -> Result<Report, ReportServiceError> {
        self.reports.update_report(id, update)?;
        Ok(self.reports.get_report(id)?)
    }

    pub fn delete_report(&mut self, id: &str) -> Result<(), ReportServiceError> {
        Ok(self.reports.delete_report(id)?)
    }
}

fn supplier_snapshot(settings: &CompanySettings) -> SupplierInfo {
    SupplierInfo {
        name: settings.supplier_name.clone(),
        address: settings.supplier_address.clone(),
        ico: settings.supplier_ico.clone(),
        dic: settings.supplier_dic.clone(),
    }
}

/// One human-readable line per technology, object's technology order.
fn device_list(object: &BuildingObject) -> Vec<String> {
    object.technologies.iter().map(device_line).collect()
}

fn device_line(technology: &Technology) -> String {
    let mut line = format!(
        "{} - {}, {}",
        kind_label(technology.kind),
        technology.name,
        device_label(technology.device_type)
    );
    if !technology.location.is_empty() {
        line.push_str(&format!(" ({})", technology.location));
    }
    line
}

fn kind_label(kind: TechKind) -> &'static str {
    match kind {
        TechKind::Eps => "EPS",
        TechKind::Pzts => "PZTS",
        TechKind::Cctv => "CCTV",
        TechKind::Skv => "SKV",
        TechKind::Other => "Jiné",
    }
}

fn device_label(device_type: DeviceType) -> &'static str {
    match device_type {
        DeviceType::Panel => "Ústředna",
        DeviceType::Unit => "Jednotka",
        DeviceType::SourceMain => "Hlavní zdroj",
        DeviceType::SourceBooster => "Posilovací zdroj",
        DeviceType::OtherDevice => "Jiné zařízení",
    }
}

/// Two fixed baseline rows, then one row per battery in (technology order,
/// battery order), seeded with nominal voltage and a passing verdict.
fn seed_measurements(object: &BuildingObject) -> Vec<ReportMeasurement> {
    let mut measurements: Vec<ReportMeasurement> = BASELINE_MEASUREMENTS
        .iter()
        .map(|(label, unit)| ReportMeasurement {
            label: (*label).to_string(),
            value: String::new(),
            unit: (*unit).to_string(),
            verdict: VERDICT_PASS.to_string(),
        })
        .collect();

    for technology in &object.technologies {
        for battery in &technology.batteries {
            measurements.push(ReportMeasurement {
                label: battery_label(technology, battery),
                value: format!("{}", battery.voltage_v),
                unit: "V".to_string(),
                verdict: VERDICT_PASS.to_string(),
            });
        }
    }
    measurements
}

fn battery_label(technology: &Technology, battery: &Battery) -> String {
    let identity = battery
        .serial_number
        .as_deref()
        .unwrap_or(battery.id.as_str());
    format!("{} - akumulátor {}", technology.name, identity)
}

#[cfg(test)]
mod tests {
    use super::{device_list, seed_measurements};
    use crate::model::object::{
        Battery, BatteryStatus, BuildingObject, DeviceType, TechKind, Technology,
    };
    use crate::model::report::VERDICT_PASS;

    fn battery(id: &str, voltage: f64) -> Battery {
        Battery {
            id: id.to_string(),
            capacity_ah: 7.0,
            voltage_v: voltage,
            install_date: String::new(),
            last_check_date: String::new(),
            next_replacement_date: String::new(),
            status: BatteryStatus::Healthy,
            serial_number: None,
            manufacture_date: None,
            notes: None,
        }
    }

    fn sample_object() -> BuildingObject {
        let mut object = BuildingObject::with_id("o1", "Site", "Street 1");
        object.technologies.push(Technology {
            id: "t1".to_string(),
            name: "Jablotron".to_string(),
            kind: TechKind::Pzts,
            device_type: DeviceType::Panel,
            location: "suterén".to_string(),
            batteries: vec![battery("b1", 12.0), battery("b2", 12.5)],
        });
        object.technologies.push(Technology {
            id: "t2".to_string(),
            name: "Hikvision".to_string(),
            kind: TechKind::Cctv,
            device_type: DeviceType::SourceMain,
            location: String::new(),
            batteries: vec![battery("b3", 24.0)],
        });
        object
    }

    #[test]
    fn device_list_follows_technology_order() {
        let lines = device_list(&sample_object());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "PZTS - Jablotron, Ústředna (suterén)");
        assert_eq!(lines[1], "CCTV - Hikvision, Hlavní zdroj");
    }

    #[test]
    fn measurements_start_with_baselines_then_batteries_in_tree_order() {
        let measurements = seed_measurements(&sample_object());
        assert_eq!(measurements.len(), 5);
        assert_eq!(measurements[0].label, "Impedance smyčky");
        assert_eq!(measurements[0].unit, "Ohm");
        assert!(measurements[0].value.is_empty());
        assert_eq!(measurements[1].label, "Izolační odpor");
        assert_eq!(measurements[2].value, "12");
        assert_eq!(measurements[3].value, "12.5");
        assert_eq!(measurements[4].value, "24");
        assert!(measurements
            .iter()
            .all(|measurement| measurement.verdict == VERDICT_PASS));
    }
}
