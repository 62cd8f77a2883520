//! Placeholder content generators.
//!
//! Values are random within plausible ranges; only the headers and row
//! counts are fixed.

use std::fmt::Write as _;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, Utc};
use rand::Rng;
use regex::Regex;

pub const LOCUS_HEADER: &str = "Site Time,Inverter 1 (kWh),Inverter 2 (kWh),Inverter 3 (kWh),POA Irradiance (W/m²),site_name,date_range_start,date_range_end";
pub const METER_HEADER: &str = "timestamp,component_id,energy,name,asset_id,id,created_at";
pub const INVERTER_HEADER: &str = METER_HEADER;
pub const WEATHER_HEADER: &str = "timestamp,component_id,insolation,name,asset_id,id,created_at";
pub const GENERIC_HEADER: &str = "timestamp,value,description";
pub const WEEKLY_REPORT_HEADER: &str = "Date,Project,Site_ID,Energy_Production_kWh,Performance_Ratio_%,Availability_%,Maintenance_Events,Weather_Conditions,Daily_Peak_Power_kW,Irradiance_kWh_m2,Temperature_C,Notes";
pub const POWERTRACK_DEMO_HEADER: &str = "timestamp,component_id,energy,name,site_id";
pub const POWERTRACK_PLACEHOLDER_HEADER: &str = "timestamp,component_id,energy,name";
pub const WPR_DEMO_HEADER: &str = "Date,Project,Site_ID,Energy_Production_kWh,Performance_Ratio_%,Availability_%,Maintenance,Weather,Notes";

const SERIES_ROWS: usize = 100;
const GENERIC_ROWS: usize = 50;
const ASSET_ID: u32 = 42541;

/// Projects covered by weekly reports: `(name, site id, base daily kWh)`.
pub const PROJECTS: [(&str, &str, f64); 3] = [
    ("Solar Farm Alpha", "SFA-001", 4500.0),
    ("Solar Farm Beta", "SFB-002", 3200.0),
    ("Rooftop Installation C", "RIC-003", 2100.0),
];

const WEATHER: [&str; 4] = ["Sunny", "Partly cloudy", "Overcast", "Clear"];

static WEEK_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"WPR_(\d{4})_Week_(\d+)").expect("valid regex"));

/// Kind of solar export, picked from keywords in the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolarKind {
    Energy,
    Meter,
    Inverter,
    Weather,
    Generic,
}

impl SolarKind {
    /// `locus`/`energy` first, then `meter`, `inverter`, `weather`.
    pub fn detect(file_name: &str) -> Self {
        let name = file_name.to_lowercase();
        if name.contains("locus") || name.contains("energy") {
            SolarKind::Energy
        } else if name.contains("meter") {
            SolarKind::Meter
        } else if name.contains("inverter") {
            SolarKind::Inverter
        } else if name.contains("weather") {
            SolarKind::Weather
        } else {
            SolarKind::Generic
        }
    }
}

fn sql_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn iso_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Synthetic solar CSV matching the schema implied by `file_name`.
pub fn solar_csv(file_name: &str, now: DateTime<Utc>) -> String {
    solar_series(SolarKind::detect(file_name), now)
}

pub fn solar_series(kind: SolarKind, now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let mut out = String::new();

    let header = match kind {
        SolarKind::Energy => LOCUS_HEADER,
        SolarKind::Meter => METER_HEADER,
        SolarKind::Inverter => INVERTER_HEADER,
        SolarKind::Weather => WEATHER_HEADER,
        SolarKind::Generic => GENERIC_HEADER,
    };
    out.push_str(header);
    out.push('\n');

    if kind == SolarKind::Generic {
        for i in 0..GENERIC_ROWS {
            let at = now - Duration::minutes(i as i64);
            let _ = writeln!(
                out,
                "{},{:.2},Demo data point {}",
                iso_time(at),
                rng.gen_range(0.0..100.0),
                i + 1
            );
        }
        return out;
    }

    for i in 0..SERIES_ROWS {
        let at = now - Duration::minutes(15 * i as i64);
        let ts = iso_time(at);
        let _ = match kind {
            SolarKind::Energy => writeln!(
                out,
                "{},{:.2},{:.2},{:.2},{:.1},USG1,2024-01-01,2024-12-31",
                sql_time(at),
                rng.gen_range(20.0..60.0),
                rng.gen_range(20.0..60.0),
                rng.gen_range(20.0..60.0),
                rng.gen_range(200.0..1000.0),
            ),
            SolarKind::Meter => writeln!(
                out,
                "{ts},Meter 1,{:.2},Main Meter,{ASSET_ID},meter_{},{ts}",
                rng.gen_range(50.0..150.0),
                i + 1
            ),
            SolarKind::Inverter => {
                let n = i % 10 + 1;
                writeln!(
                    out,
                    "{ts},Inverter {n},{:.2},Inverter {n},{ASSET_ID},inv_{},{ts}",
                    rng.gen_range(25.0..100.0),
                    i + 1
                )
            }
            SolarKind::Weather => writeln!(
                out,
                "{ts},POA Sensor 1,{:.3},Weather Station 1,{ASSET_ID},weather_{},{ts}",
                rng.gen_range(0.2..1.0),
                i + 1
            ),
            SolarKind::Generic => Ok(()),
        };
    }
    out
}

/// Monday of the ISO-ish week named by a `WPR_<year>_Week_<n>` file name:
/// the first Monday on or after January 1st, plus `n - 1` weeks. Names
/// without that pattern use the current week.
pub fn report_week_start(file_name: &str, today: NaiveDate) -> NaiveDate {
    let parsed = WEEK_FILE.captures(file_name).and_then(|caps| {
        let year: i32 = caps.get(1)?.as_str().parse().ok()?;
        let week: i64 = caps.get(2)?.as_str().parse().ok()?;
        let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let offset = (7 - jan1.weekday().num_days_from_monday() as i64) % 7;
        let days = week.max(1).checked_sub(1)?.checked_mul(7)?.checked_add(offset)?;
        let start = jan1.checked_add_signed(Duration::try_days(days)?)?;
        // The whole week must be representable.
        start.checked_add_days(Days::new(6))?;
        Some(start)
    });
    parsed.unwrap_or_else(|| {
        today - Duration::days(today.weekday().num_days_from_monday() as i64)
    })
}

/// Weekly performance report: 7 days x 3 projects plus a summary row.
pub fn weekly_report_csv(file_name: &str, today: NaiveDate) -> String {
    let mut rng = rand::thread_rng();
    let start = report_week_start(file_name, today);
    let mut out = String::from(WEEKLY_REPORT_HEADER);
    out.push('\n');

    for date in start.iter_days().take(7) {
        for (project, site, base) in PROJECTS {
            let maintenance = rng.gen_range(0..=2);
            let _ = writeln!(
                out,
                "{},{},{},{:.0},{:.1},{:.1},{},{},{:.1},{:.2},{:.1},{}",
                date.format("%Y-%m-%d"),
                project,
                site,
                base * rng.gen_range(0.8..1.1),
                rng.gen_range(85.0..96.0),
                rng.gen_range(95.0..100.0),
                maintenance,
                WEATHER[rng.gen_range(0..WEATHER.len())],
                base / 6.0 * rng.gen_range(0.9..1.1),
                rng.gen_range(4.0..7.0),
                rng.gen_range(15.0..35.0),
                if maintenance > 0 { "Scheduled maintenance" } else { "Normal operation" },
            );
        }
    }

    let total: f64 = PROJECTS.iter().map(|(_, _, base)| base * 7.0 * 0.9).sum();
    let _ = writeln!(
        out,
        "WEEKLY TOTAL,All Projects,ALL,{},91.5,98.2,Various,Mixed,,,,Weekly summary for all solar installations",
        total.round()
    );
    out
}

/// Week number used in generated report names.
///
/// Counts Sunday-started weeks from January 1st.
pub fn week_number(date: NaiveDate) -> u32 {
    let Some(jan1) = NaiveDate::from_ymd_opt(date.year(), 1, 1) else {
        return 1;
    };
    let day_of_year = date.ordinal0();
    let jan1_weekday = jan1.weekday().num_days_from_sunday();
    (day_of_year + jan1_weekday + 1).div_ceil(7)
}

pub fn wpr_file_name(today: NaiveDate) -> String {
    format!("WPR_{}_Week_{:02}.csv", today.year(), week_number(today))
}

/// Short weekly report written by demo runs: the last seven days.
pub fn wpr_demo_csv(today: NaiveDate) -> String {
    let mut rng = rand::thread_rng();
    let mut out = String::from(WPR_DEMO_HEADER);
    out.push('\n');

    for back in (0..7).rev() {
        let date = today - Duration::days(back);
        for (project, site, base) in PROJECTS {
            let _ = writeln!(
                out,
                "{},{},{},{:.0},{:.1},{:.1},{},{},Demo data",
                date.format("%Y-%m-%d"),
                project,
                site,
                base * rng.gen_range(0.8..1.1),
                rng.gen_range(85.0..96.0),
                rng.gen_range(95.0..100.0),
                if rng.gen_bool(0.2) { "Panel cleaning" } else { "None" },
                WEATHER[rng.gen_range(0..WEATHER.len())],
            );
        }
    }
    out
}

/// Demo PowerTrack export cycling meter, inverter and weather rows.
pub fn powertrack_demo_csv(site_id: &str, now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let mut out = String::from(POWERTRACK_DEMO_HEADER);
    out.push('\n');

    for i in 0..200usize {
        let ts = iso_time(now - Duration::minutes(15 * i as i64));
        let n = i / 3 + 1;
        let _ = match i % 3 {
            0 => writeln!(
                out,
                "{ts},Meter_{n},{:.2},Main Meter {n},{site_id}",
                rng.gen_range(50.0..150.0)
            ),
            1 => writeln!(
                out,
                "{ts},Inverter_{n},{:.2},Inverter {n},{site_id}",
                rng.gen_range(25.0..100.0)
            ),
            _ => writeln!(
                out,
                "{ts},Weather_{n},{:.3},Weather Station {n},{site_id}",
                rng.gen_range(0.2..1.0)
            ),
        };
    }
    out
}

/// Written when a PowerTrack run exits cleanly but left no output directory.
pub fn powertrack_placeholder_csv(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let mut out = String::from(POWERTRACK_PLACEHOLDER_HEADER);
    out.push('\n');

    for i in 0..SERIES_ROWS {
        let ts = iso_time(now - Duration::minutes(15 * i as i64));
        let n = i % 3 + 1;
        let _ = writeln!(
            out,
            "{ts},Meter_{n},{:.2},Main Meter {n}",
            rng.gen_range(50.0..150.0)
        );
    }
    out
}

/// Ledger report rendered as an HTML table, as the demo vendor or account run
/// would have saved it.
pub fn ledger_html(title: &str, job_id: &str, columns: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>",
        escape_html(title)
    );
    let _ = writeln!(out, "<h1>{}</h1>", escape_html(title));
    let _ = writeln!(
        out,
        "<p class=\"demo-notice\">Demo mode: generated without AM Automation for job {}.</p>",
        escape_html(job_id)
    );
    out.push_str("<table>\n<tr>");
    for column in columns {
        let _ = write!(out, "<th>{}</th>", escape_html(column));
    }
    out.push_str("</tr>\n");
    for row in rows {
        out.push_str("<tr>");
        for cell in row {
            let _ = write!(out, "<td>{}</td>", escape_html(cell));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n</body>\n</html>\n");
    out
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 8, 12, 0, 0).unwrap()
    }

    fn lines(content: &str) -> Vec<&str> {
        content.lines().collect()
    }

    #[test]
    fn test_keyword_precedence() {
        assert_eq!(SolarKind::detect("locus_meter.csv"), SolarKind::Energy);
        assert_eq!(SolarKind::detect("site_ENERGY.csv"), SolarKind::Energy);
        assert_eq!(SolarKind::detect("meter_inverter.csv"), SolarKind::Meter);
        assert_eq!(SolarKind::detect("inverter_data.csv"), SolarKind::Inverter);
        assert_eq!(SolarKind::detect("weather_station.csv"), SolarKind::Weather);
        assert_eq!(SolarKind::detect("data.csv"), SolarKind::Generic);
    }

    #[test]
    fn test_series_headers_and_rows() {
        for (name, header) in [
            ("locus_energy_data.csv", LOCUS_HEADER),
            ("meter_data.csv", METER_HEADER),
            ("inverter_data.csv", INVERTER_HEADER),
            ("weather_station_data.csv", WEATHER_HEADER),
        ] {
            let content = solar_csv(name, now());
            let rows = lines(&content);
            assert_eq!(rows[0], header, "{name}");
            assert_eq!(rows.len(), 101, "{name}");
            let columns = header.split(',').count();
            assert!(rows[1..].iter().all(|r| r.split(',').count() == columns));
        }
    }

    #[test]
    fn test_generic_rows() {
        let content = solar_csv("data.csv", now());
        let rows = lines(&content);
        assert_eq!(rows[0], GENERIC_HEADER);
        assert_eq!(rows.len(), 51);
        assert!(rows[1].ends_with("Demo data point 1"));
    }

    #[test]
    fn test_series_steps_back_fifteen_minutes() {
        let content = solar_csv("meter_data.csv", now());
        let rows = lines(&content);
        assert!(rows[1].starts_with("2025-01-08T12:00:00.000Z,Meter 1,"));
        assert!(rows[2].starts_with("2025-01-08T11:45:00.000Z,"));
        assert!(rows[1].ends_with(",42541,meter_1,2025-01-08T12:00:00.000Z"));
    }

    #[test]
    fn test_weekly_report_shape() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 8).unwrap();
        let content = weekly_report_csv("WPR_2025_Week_02.csv", today);
        let rows = lines(&content);
        assert_eq!(rows[0], WEEKLY_REPORT_HEADER);
        assert_eq!(rows.len(), 1 + 7 * 3 + 1);
        assert!(rows[1].starts_with("2025-01-13,Solar Farm Alpha,SFA-001,"));
        assert_eq!(
            rows[22],
            "WEEKLY TOTAL,All Projects,ALL,61740,91.5,98.2,Various,Mixed,,,,Weekly summary for all solar installations"
        );
    }

    #[test]
    fn test_report_week_start() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 8).unwrap();
        // 2025-01-01 is a Wednesday; the first Monday is the 6th.
        assert_eq!(
            report_week_start("WPR_2025_Week_01.csv", today),
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
        );
        // 2024-01-01 is itself a Monday.
        assert_eq!(
            report_week_start("WPR_2024_Week_03.csv", today),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert_eq!(
            report_week_start("report.csv", today),
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
        );
    }

    #[test]
    fn test_out_of_range_week_uses_current_week() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        for name in [
            "WPR_2024_Week_99999999.csv",
            "WPR_9999_Week_9999999999999999999.csv",
            "WPR_9999_Week_14000000.csv",
        ] {
            assert_eq!(report_week_start(name, today), today);
        }

        let content = weekly_report_csv("WPR_2024_Week_99999999.csv", today);
        let rows = lines(&content);
        assert_eq!(rows.len(), 1 + 7 * 3 + 1);
        assert!(rows[1].starts_with("2025-01-06,"));
        assert!(rows[21].starts_with("2025-01-12,"));
    }

    #[test]
    fn test_wpr_file_name() {
        let jan8 = NaiveDate::from_ymd_opt(2025, 1, 8).unwrap();
        assert_eq!(wpr_file_name(jan8), "WPR_2025_Week_02.csv");
        let jan1 = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(wpr_file_name(jan1), "WPR_2025_Week_01.csv");
    }

    #[test]
    fn test_wpr_demo_covers_last_week() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 8).unwrap();
        let content = wpr_demo_csv(today);
        let rows = lines(&content);
        assert_eq!(rows[0], WPR_DEMO_HEADER);
        assert_eq!(rows.len(), 1 + 21);
        assert!(rows[1].starts_with("2025-01-02,"));
        assert!(rows[21].starts_with("2025-01-08,Rooftop Installation C,RIC-003,"));
    }

    #[test]
    fn test_powertrack_demo_cycles_components() {
        let content = powertrack_demo_csv("PT-7", now());
        let rows = lines(&content);
        assert_eq!(rows[0], POWERTRACK_DEMO_HEADER);
        assert_eq!(rows.len(), 201);
        assert!(rows[1].contains(",Meter_1,"));
        assert!(rows[2].contains(",Inverter_1,"));
        assert!(rows[3].contains(",Weather_1,"));
        assert!(rows[4].contains(",Meter_2,"));
        assert!(rows[1].ends_with(",PT-7"));
    }

    #[test]
    fn test_powertrack_placeholder() {
        let content = powertrack_placeholder_csv(now());
        let rows = lines(&content);
        assert_eq!(rows[0], POWERTRACK_PLACEHOLDER_HEADER);
        assert_eq!(rows.len(), 101);
    }

    #[test]
    fn test_ledger_html_escapes() {
        let html = ledger_html(
            "Vendor Report",
            "vendor_job_1",
            &["Vendor"],
            &[vec!["A & B <Co>".to_string()]],
        );
        assert!(html.contains("<td>A &amp; B &lt;Co&gt;</td>"));
        assert!(html.contains("Demo mode"));
    }
}
