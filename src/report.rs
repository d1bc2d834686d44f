//! The `report` command: queries over stored records.

use crate::config::parse_date;
use anyhow::Context;
use cdr_core::query::{
    filter_by_service_type, find_by_number, most_frequent_service_type, revenue_for_date,
    sort_records, volume_by_service_type,
};
use cdr_core::{Cdr, ServiceType, SortKey};
use cdr_store::CdrStore;
use chrono::NaiveDate;
use clap::Parser;
use std::fmt::Write;

#[derive(Parser, Clone, Debug, Default)]
pub struct ReportArgs {
    /// Day to compute revenue for (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Only list records of this service type
    #[arg(long)]
    pub service_type: Option<ServiceType>,

    /// Sort the listing by anum, bnum or usage (descending)
    #[arg(long)]
    pub sort: Option<SortKey>,

    /// Only list records of this number (as anum, else as bnum)
    #[arg(long)]
    pub number: Option<String>,

    /// Only list records of the most frequent service type
    #[arg(long)]
    pub most_frequent: bool,

    /// Maximum records listed
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Load every stored record and render the report.
pub async fn run_report(args: &ReportArgs, store: &dyn CdrStore) -> anyhow::Result<String> {
    let records = store
        .find_all()
        .await
        .context("Failed to load records")?;
    render_report(&records, args).context("Failed to render report")
}

pub fn render_report(records: &[Cdr], args: &ReportArgs) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    writeln!(out, "Records: {}", records.len())?;

    writeln!(out, "Volume by service type:")?;
    for (service_type, count) in volume_by_service_type(records) {
        writeln!(out, "  {service_type}: {count}")?;
    }

    let most_frequent = most_frequent_service_type(records);
    match most_frequent {
        Some(service_type) => writeln!(out, "Most frequent service type: {service_type}")?,
        None => writeln!(out, "Most frequent service type: none")?,
    }

    if let Some(date) = args.date {
        let revenue = revenue_for_date(records, &date.to_string());
        writeln!(
            out,
            "Revenue for {} ({} records):",
            revenue.date, revenue.records_counted
        )?;
        for line in &revenue.lines {
            writeln!(
                out,
                "  {}: total {:.2}, per hour {:.4}, per minute {:.6}",
                line.service_type, line.total, line.per_hour, line.per_minute
            )?;
        }
        writeln!(out, "  total: {:.2}", revenue.total())?;
    }

    let mut listing: Vec<Cdr> = match &args.number {
        Some(number) => find_by_number(records, number),
        None => records.to_vec(),
    };
    if args.most_frequent {
        listing = match most_frequent {
            Some(service_type) => filter_by_service_type(&listing, service_type),
            None => Vec::new(),
        };
    }
    if let Some(service_type) = args.service_type {
        listing = filter_by_service_type(&listing, service_type);
    }
    if let Some(key) = args.sort {
        sort_records(&mut listing, key);
    }
    if let Some(limit) = args.limit {
        listing.truncate(limit);
    }

    writeln!(out, "Listing ({} records):", listing.len())?;
    for record in &listing {
        writeln!(out, "  {record}")?;
    }
    Ok(out)
}
