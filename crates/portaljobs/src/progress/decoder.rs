//! Stdout marker decoder.
//!
//! Each platform declares an ordered table of markers. On every chunk the
//! whole accumulated output is rescanned and the first marker in table order
//! whose needle occurs anywhere in it is selected. Progress is raised to that
//! marker's floor and never lowered. Because selection is by table order, a
//! marker early in the table keeps winning once it has appeared, even after
//! later markers show up; the tables below preserve that ordering exactly.

use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerEvent {
    LoginSuccessful,
    SelectingInverters,
    DownloadingCsv,
    ProcessingChunk,
    DownloadingData,
    ProcessingMeterData,
    ProcessingInverterData,
    ProcessingWeather,
    CollectingProjectData,
    CalculatingMetrics,
    AnalyzingMaintenance,
    ReportGenerated,
}

#[derive(Debug, Clone, Copy)]
pub struct Marker {
    pub event: MarkerEvent,
    pub needle: &'static str,
    pub floor: u8,
    pub message: &'static str,
}

pub type MarkerTable = &'static [Marker];

pub const LOCUS_MARKERS: MarkerTable = &[
    Marker {
        event: MarkerEvent::LoginSuccessful,
        needle: "Login successful",
        floor: 30,
        message: "Login successful, navigating to site data...",
    },
    Marker {
        event: MarkerEvent::SelectingInverters,
        needle: "Selecting inverters",
        floor: 50,
        message: "Configuring data extraction parameters...",
    },
    Marker {
        event: MarkerEvent::DownloadingCsv,
        needle: "Downloading CSV",
        floor: 70,
        message: "Downloading energy data...",
    },
    Marker {
        event: MarkerEvent::ProcessingChunk,
        needle: "Processing chunk",
        floor: 85,
        message: "Processing data chunks...",
    },
];

pub const POWERTRACK_MARKERS: MarkerTable = &[
    Marker {
        event: MarkerEvent::LoginSuccessful,
        needle: "Login successful",
        floor: 25,
        message: "Login successful, accessing PowerTrack data...",
    },
    Marker {
        event: MarkerEvent::DownloadingData,
        needle: "Downloading data",
        floor: 50,
        message: "Downloading data in 3-month chunks...",
    },
    Marker {
        event: MarkerEvent::ProcessingMeterData,
        needle: "Processing meter data",
        floor: 70,
        message: "Processing meter data...",
    },
    Marker {
        event: MarkerEvent::ProcessingInverterData,
        needle: "Processing inverter data",
        floor: 85,
        message: "Processing inverter data...",
    },
    Marker {
        event: MarkerEvent::ProcessingWeather,
        needle: "Processing weather",
        floor: 95,
        message: "Processing weather station data...",
    },
];

pub const WPR_MARKERS: MarkerTable = &[
    Marker {
        event: MarkerEvent::CollectingProjectData,
        needle: "Collecting solar project data",
        floor: 25,
        message: "Collecting solar project data...",
    },
    Marker {
        event: MarkerEvent::CalculatingMetrics,
        needle: "Calculating performance metrics",
        floor: 50,
        message: "Calculating performance metrics...",
    },
    Marker {
        event: MarkerEvent::AnalyzingMaintenance,
        needle: "Analyzing maintenance activities",
        floor: 75,
        message: "Analyzing maintenance activities...",
    },
    Marker {
        event: MarkerEvent::ReportGenerated,
        needle: "WPR generated successfully",
        floor: 100,
        message: "WPR generated successfully!",
    },
];

/// The ledger scripts emit no progress markers.
pub const LEDGER_MARKERS: MarkerTable = &[];

static TOTAL_RECORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Total records: (\d+)").expect("valid regex"));

/// Extracts the `Total records: N` count reported by a script.
pub fn record_count(output: &str) -> Option<u64> {
    TOTAL_RECORDS
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// What a chunk did to the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub progress: u8,
    pub message: String,
    pub event: Option<MarkerEvent>,
}

#[derive(Debug)]
pub struct ProgressDecoder {
    table: MarkerTable,
    buffer: String,
    state: Option<MarkerEvent>,
    progress: u8,
    message: String,
}

impl ProgressDecoder {
    /// Starts from the progress and message the job already shows.
    pub fn new(table: MarkerTable, progress: u8, message: &str) -> Self {
        Self {
            table,
            buffer: String::new(),
            state: None,
            progress,
            message: message.to_string(),
        }
    }

    /// Appends `chunk` and re-evaluates the marker table over all output so far.
    pub fn feed(&mut self, chunk: &str) -> Decoded {
        self.buffer.push_str(chunk);

        if let Some(marker) = self
            .table
            .iter()
            .find(|marker| self.buffer.contains(marker.needle))
        {
            self.state = Some(marker.event);
            self.progress = self.progress.max(marker.floor);
            self.message = marker.message.to_string();
        }

        Decoded {
            progress: self.progress,
            message: self.message.clone(),
            event: self.state,
        }
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn state(&self) -> Option<MarkerEvent> {
        self.state
    }

    pub fn output(&self) -> &str {
        &self.buffer
    }

    pub fn record_count(&self) -> Option<u64> {
        record_count(&self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder(table: MarkerTable) -> ProgressDecoder {
        ProgressDecoder::new(table, 10, "Starting automation script...")
    }

    #[test]
    fn test_table_order_fixtures() {
        let locus: Vec<(&str, u8)> = LOCUS_MARKERS.iter().map(|m| (m.needle, m.floor)).collect();
        assert_eq!(
            locus,
            vec![
                ("Login successful", 30),
                ("Selecting inverters", 50),
                ("Downloading CSV", 70),
                ("Processing chunk", 85),
            ]
        );

        let powertrack: Vec<(&str, u8)> = POWERTRACK_MARKERS
            .iter()
            .map(|m| (m.needle, m.floor))
            .collect();
        assert_eq!(
            powertrack,
            vec![
                ("Login successful", 25),
                ("Downloading data", 50),
                ("Processing meter data", 70),
                ("Processing inverter data", 85),
                ("Processing weather", 95),
            ]
        );

        let wpr: Vec<(&str, u8)> = WPR_MARKERS.iter().map(|m| (m.needle, m.floor)).collect();
        assert_eq!(
            wpr,
            vec![
                ("Collecting solar project data", 25),
                ("Calculating performance metrics", 50),
                ("Analyzing maintenance activities", 75),
                ("WPR generated successfully", 100),
            ]
        );
        assert!(LEDGER_MARKERS.is_empty());
    }

    #[test]
    fn test_single_marker() {
        let mut decoder = decoder(LOCUS_MARKERS);
        let decoded = decoder.feed("Opening browser\nSelecting inverters\n");
        assert_eq!(decoded.progress, 50);
        assert_eq!(decoded.message, "Configuring data extraction parameters...");
        assert_eq!(decoded.event, Some(MarkerEvent::SelectingInverters));
    }

    #[test]
    fn test_earlier_marker_keeps_winning() {
        let mut decoder = decoder(POWERTRACK_MARKERS);
        decoder.feed("Login successful\n");
        let decoded = decoder.feed("Downloading data\nProcessing meter data\n");
        assert_eq!(decoded.event, Some(MarkerEvent::LoginSuccessful));
        assert_eq!(decoded.progress, 25);
        assert_eq!(decoded.message, "Login successful, accessing PowerTrack data...");
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut decoder = decoder(LOCUS_MARKERS);
        let mut last = decoder.progress();
        for chunk in [
            "Processing chunk 1\n",
            "noise\n",
            "Login successful\n",
            "Downloading CSV\n",
            "Selecting inverters\n",
        ] {
            let decoded = decoder.feed(chunk);
            assert!(decoded.progress >= last);
            last = decoded.progress;
        }
        assert_eq!(last, 85);
        assert_eq!(decoder.state(), Some(MarkerEvent::LoginSuccessful));
    }

    #[test]
    fn test_marker_split_across_chunks() {
        let mut decoder = decoder(WPR_MARKERS);
        assert_eq!(decoder.feed("Calculating perf").progress, 10);
        let decoded = decoder.feed("ormance metrics\n");
        assert_eq!(decoded.progress, 50);
        assert_eq!(decoded.event, Some(MarkerEvent::CalculatingMetrics));
    }

    #[test]
    fn test_no_markers_keeps_initial_state() {
        let mut decoder = decoder(LEDGER_MARKERS);
        let decoded = decoder.feed("Navigating to vendors page\n");
        assert_eq!(decoded.progress, 10);
        assert_eq!(decoded.message, "Starting automation script...");
        assert_eq!(decoded.event, None);
    }

    #[test]
    fn test_record_count() {
        let mut decoder = decoder(POWERTRACK_MARKERS);
        decoder.feed("Done.\nTotal records: 4312\n");
        assert_eq!(decoder.record_count(), Some(4312));
        assert_eq!(record_count("no count here"), None);
    }
}
