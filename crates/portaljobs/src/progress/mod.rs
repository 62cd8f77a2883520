pub mod decoder;

pub use decoder::{
    record_count, Decoded, Marker, MarkerEvent, MarkerTable, ProgressDecoder, LEDGER_MARKERS,
    LOCUS_MARKERS, POWERTRACK_MARKERS, WPR_MARKERS,
};
