//! Human-readable rendering of a diagnostics result.

use crate::diagnostics::DiagnosticsResult;
use crate::throughput::ThroughputSample;

/// Shown wherever a sample is absent.
pub const PLACEHOLDER: &str = "—";

pub fn format_latency(latency_ms: Option<u64>) -> String {
    match latency_ms {
        Some(ms) => format!("{}ms", ms),
        None => PLACEHOLDER.to_string(),
    }
}

pub fn format_throughput(sample: Option<ThroughputSample>) -> String {
    match sample {
        Some(s) => format!("{:.2} Mbps", s.mbps),
        None => PLACEHOLDER.to_string(),
    }
}

/// Four bars, filled up to the grade's bar count.
pub fn signal_bars(bars: u8) -> String {
    (1..=4u8).map(|i| if i <= bars { '▮' } else { '▯' }).collect()
}

/// Format a diagnostics result as a multi-line summary.
pub fn format_summary(result: &DiagnosticsResult) -> String {
    let status = if result.connectivity.is_online() {
        "Connected"
    } else {
        "Disconnected"
    };

    let mut summary = format!(
        "Status:   {}\nSignal:   {} {}\nPing:     {}\nDownload: {}\nUpload:   {}",
        status,
        signal_bars(result.grade.bars()),
        result.grade,
        format_latency(result.latency_ms),
        format_throughput(result.download),
        format_throughput(result.upload),
    );

    if result.upload.is_some() {
        summary.push_str(" (estimated from link capacity)");
    }
    if result.link.effective_type.is_some() {
        summary.push_str(&format!(
            "\nLink:     effective {}, type {}",
            result.link.effective_type_label().to_uppercase(),
            result.link.link_type_label()
        ));
    }

    summary
}
