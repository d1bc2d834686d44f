//! In-memory queries over record lists.
//!
//! These back the `report` command and any presentation layer that needs
//! filtered, sorted or aggregated views of a generated batch.

use crate::record::Cdr;
use crate::service::ServiceType;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;

const HOURS_PER_DAY: f64 = 24.0;
const MINUTES_PER_DAY: f64 = 24.0 * 60.0;

/// Sort orders supported by [`sort_records`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Ascending originating number.
    Anum,
    /// Ascending terminating number, null first.
    Bnum,
    /// Descending usage.
    Usage,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anum" => Ok(SortKey::Anum),
            "bnum" => Ok(SortKey::Bnum),
            "usage" => Ok(SortKey::Usage),
            other => Err(format!("Unknown sort key '{other}' (expected anum, bnum or usage)")),
        }
    }
}

pub fn filter_by_service_type(records: &[Cdr], service_type: ServiceType) -> Vec<Cdr> {
    records
        .iter()
        .filter(|cdr| cdr.service_type == service_type)
        .cloned()
        .collect()
}

/// Stable sort of `records` in place.
pub fn sort_records(records: &mut [Cdr], key: SortKey) {
    match key {
        SortKey::Anum => records.sort_by(|a, b| a.anum.cmp(&b.anum)),
        SortKey::Bnum => records.sort_by(|a, b| {
            let a = a.bnum.as_deref().unwrap_or("");
            let b = b.bnum.as_deref().unwrap_or("");
            a.cmp(b)
        }),
        SortKey::Usage => {
            records.sort_by(|a, b| b.usage.partial_cmp(&a.usage).unwrap_or(Ordering::Equal))
        }
    }
}

/// Record count per service type. Every service type is present, possibly with 0.
pub fn volume_by_service_type(records: &[Cdr]) -> BTreeMap<ServiceType, u64> {
    let mut volume: BTreeMap<ServiceType, u64> =
        ServiceType::ALL.iter().map(|service| (*service, 0)).collect();
    for cdr in records {
        *volume.entry(cdr.service_type).or_default() += 1;
    }
    volume
}

/// The service type with the most records. Ties go to the earlier of call, sms, data.
pub fn most_frequent_service_type(records: &[Cdr]) -> Option<ServiceType> {
    if records.is_empty() {
        return None;
    }
    let volume = volume_by_service_type(records);
    let mut best: Option<(ServiceType, u64)> = None;
    for (service, count) in volume {
        match best {
            Some((_, best_count)) if best_count >= count => {}
            _ => best = Some((service, count)),
        }
    }
    best.map(|(service, _)| service)
}

pub fn records_of_most_frequent_service_type(records: &[Cdr]) -> Vec<Cdr> {
    most_frequent_service_type(records)
        .map(|service| filter_by_service_type(records, service))
        .unwrap_or_default()
}

/// Records originating from `number`, or terminating at it when none originate there.
pub fn find_by_number(records: &[Cdr], number: &str) -> Vec<Cdr> {
    let by_anum: Vec<Cdr> = records
        .iter()
        .filter(|cdr| cdr.anum == number)
        .cloned()
        .collect();
    if !by_anum.is_empty() {
        return by_anum;
    }
    records
        .iter()
        .filter(|cdr| cdr.bnum.as_deref() == Some(number))
        .cloned()
        .collect()
}

/// Revenue of one service type over one day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevenueLine {
    pub service_type: ServiceType,
    pub total: f64,
    pub per_hour: f64,
    pub per_minute: f64,
}

/// Revenue per service type for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct RevenueReport {
    pub date: String,
    pub records_counted: usize,
    pub lines: Vec<RevenueLine>,
}

impl RevenueReport {
    pub fn total(&self) -> f64 {
        self.lines.iter().map(|line| line.total).sum()
    }

    pub fn line(&self, service_type: ServiceType) -> Option<&RevenueLine> {
        self.lines
            .iter()
            .find(|line| line.service_type == service_type)
    }
}

/// Revenue earned by records that started on `date` (`YYYY-MM-DD`).
pub fn revenue_for_date(records: &[Cdr], date: &str) -> RevenueReport {
    let mut totals: BTreeMap<ServiceType, f64> =
        ServiceType::ALL.iter().map(|service| (*service, 0.0)).collect();
    let mut counted = 0;

    for cdr in records.iter().filter(|cdr| cdr.started_on(date)) {
        *totals.entry(cdr.service_type).or_default() += cdr.usage * cdr.service_type.rate();
        counted += 1;
    }

    let lines = totals
        .into_iter()
        .map(|(service_type, total)| RevenueLine {
            service_type,
            total,
            per_hour: total / HOURS_PER_DAY,
            per_minute: total / MINUTES_PER_DAY,
        })
        .collect();

    RevenueReport {
        date: date.to_string(),
        records_counted: counted,
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cdr(anum: &str, bnum: Option<&str>, service: ServiceType, usage: f64, start: &str) -> Cdr {
        Cdr::new(anum, bnum.map(str::to_string), service, usage, start)
    }

    fn batch() -> Vec<Cdr> {
        vec![
            cdr("300", Some("900"), ServiceType::Call, 10.0, "2024-05-01T09:00:00"),
            cdr("100", Some("800"), ServiceType::Sms, 4.0, "2024-05-01T10:00:00"),
            cdr("200", None, ServiceType::Data, 2048.0, "2024-05-02T11:00:00"),
            cdr("400", Some("100"), ServiceType::Sms, 2.0, "2024-05-01T12:00:00"),
        ]
    }

    #[test]
    fn test_filter_by_service_type() {
        let sms = filter_by_service_type(&batch(), ServiceType::Sms);
        assert_eq!(sms.len(), 2);
        assert!(sms.iter().all(|c| c.service_type == ServiceType::Sms));
    }

    #[test]
    fn test_sort_by_anum() {
        let mut records = batch();
        sort_records(&mut records, SortKey::Anum);
        let anums: Vec<&str> = records.iter().map(|c| c.anum.as_str()).collect();
        assert_eq!(anums, vec!["100", "200", "300", "400"]);
    }

    #[test]
    fn test_sort_by_bnum_puts_null_first() {
        let mut records = batch();
        sort_records(&mut records, SortKey::Bnum);
        assert_eq!(records[0].bnum, None);
        assert_eq!(records[1].bnum.as_deref(), Some("100"));
    }

    #[test]
    fn test_sort_by_usage_descending() {
        let mut records = batch();
        sort_records(&mut records, SortKey::Usage);
        let usages: Vec<f64> = records.iter().map(|c| c.usage).collect();
        assert_eq!(usages, vec![2048.0, 10.0, 4.0, 2.0]);
    }

    #[test]
    fn test_volume_includes_every_service_type() {
        let volume = volume_by_service_type(&batch()[..2]);
        assert_eq!(volume[&ServiceType::Call], 1);
        assert_eq!(volume[&ServiceType::Sms], 1);
        assert_eq!(volume[&ServiceType::Data], 0);
    }

    #[test]
    fn test_most_frequent_service_type() {
        assert_eq!(most_frequent_service_type(&batch()), Some(ServiceType::Sms));
        assert_eq!(most_frequent_service_type(&[]), None);
        assert_eq!(records_of_most_frequent_service_type(&batch()).len(), 2);
    }

    #[test]
    fn test_most_frequent_tie_breaks_in_canonical_order() {
        let records = batch()[..3].to_vec();
        assert_eq!(most_frequent_service_type(&records), Some(ServiceType::Call));
    }

    #[test]
    fn test_find_by_number_falls_back_to_bnum() {
        assert_eq!(find_by_number(&batch(), "100").len(), 1);
        assert_eq!(find_by_number(&batch(), "100")[0].anum, "100");
        let terminating = find_by_number(&batch(), "900");
        assert_eq!(terminating.len(), 1);
        assert_eq!(terminating[0].anum, "300");
        assert!(find_by_number(&batch(), "555").is_empty());
    }

    #[test]
    fn test_revenue_for_date() {
        let report = revenue_for_date(&batch(), "2024-05-01");
        assert_eq!(report.records_counted, 3);
        assert_eq!(report.line(ServiceType::Call).unwrap().total, 5.0);
        assert_eq!(report.line(ServiceType::Sms).unwrap().total, 1.5);
        assert_eq!(report.line(ServiceType::Data).unwrap().total, 0.0);
        assert_eq!(report.total(), 6.5);

        let call = report.line(ServiceType::Call).unwrap();
        assert!((call.per_hour - 5.0 / 24.0).abs() < 1e-9);
        assert!((call.per_minute - 5.0 / 1440.0).abs() < 1e-9);
    }
}
