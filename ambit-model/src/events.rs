use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::ids::ProgramId;

/// Closed set of event names flowing through the bus.
///
/// The string value doubles as the routing key: nodes declare the variants
/// they consume and the registry indexes them. A producer introducing a new
/// event name has to add a variant here or the event can never be routed.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Seeding / subdomain discovery
    SubfinderScanRequested,
    SubdomainDiscovered,
    AsnmapScanRequested,
    AsnDiscovered,
    CidrDiscovered,
    // Address-space enumeration
    MapcidrScanRequested,
    IpsExpanded,
    CidrSliced,
    IpsAggregated,
    Hakip2hostScanRequested,
    SmapScanRequested,
    SmapResults,
    PortsDiscovered,
    // DNS validation
    DnsxBasicScanRequested,
    DnsxDeepScanRequested,
    DnsxPtrScanRequested,
    DnsxFilteredHosts,
    DnsxBasicResultsBatch,
    DnsxDeepResultsBatch,
    DnsxPtrResultsBatch,
    // Service / content analysis
    HttpxScanRequested,
    HostDiscovered,
    ScanResultsBatch,
    TlsxScanRequested,
    TlsxResultsBatch,
    CertSanDiscovered,
    GauScanRequested,
    GauDiscovered,
    KatanaScanRequested,
    KatanaResultsBatch,
    JsFilesDiscovered,
    LinkfinderScanRequested,
    MantraScanRequested,
    MantraResultsBatch,
    FfufScanRequested,
    FfufResultsBatch,
    SubjackScanRequested,
    SubjackResultsBatch,
    NaabuScanRequested,
    NaabuResultsBatch,
    // Operational notifications
    ServiceEvents,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SubfinderScanRequested => "subfinder_scan_requested",
            EventType::SubdomainDiscovered => "subdomain_discovered",
            EventType::AsnmapScanRequested => "asnmap_scan_requested",
            EventType::AsnDiscovered => "asn_discovered",
            EventType::CidrDiscovered => "cidr_discovered",
            EventType::MapcidrScanRequested => "mapcidr_scan_requested",
            EventType::IpsExpanded => "ips_expanded",
            EventType::CidrSliced => "cidr_sliced",
            EventType::IpsAggregated => "ips_aggregated",
            EventType::Hakip2hostScanRequested => "hakip2host_scan_requested",
            EventType::SmapScanRequested => "smap_scan_requested",
            EventType::SmapResults => "smap_results",
            EventType::PortsDiscovered => "ports_discovered",
            EventType::DnsxBasicScanRequested => "dnsx_basic_scan_requested",
            EventType::DnsxDeepScanRequested => "dnsx_deep_scan_requested",
            EventType::DnsxPtrScanRequested => "dnsx_ptr_scan_requested",
            EventType::DnsxFilteredHosts => "dnsx_filtered_hosts",
            EventType::DnsxBasicResultsBatch => "dnsx_basic_results_batch",
            EventType::DnsxDeepResultsBatch => "dnsx_deep_results_batch",
            EventType::DnsxPtrResultsBatch => "dnsx_ptr_results_batch",
            EventType::HttpxScanRequested => "httpx_scan_requested",
            EventType::HostDiscovered => "host_discovered",
            EventType::ScanResultsBatch => "scan_results_batch",
            EventType::TlsxScanRequested => "tlsx_scan_requested",
            EventType::TlsxResultsBatch => "tlsx_results_batch",
            EventType::CertSanDiscovered => "cert_san_discovered",
            EventType::GauScanRequested => "gau_scan_requested",
            EventType::GauDiscovered => "gau_discovered",
            EventType::KatanaScanRequested => "katana_scan_requested",
            EventType::KatanaResultsBatch => "katana_results_batch",
            EventType::JsFilesDiscovered => "js_files_discovered",
            EventType::LinkfinderScanRequested => "linkfinder_scan_requested",
            EventType::MantraScanRequested => "mantra_scan_requested",
            EventType::MantraResultsBatch => "mantra_results_batch",
            EventType::FfufScanRequested => "ffuf_scan_requested",
            EventType::FfufResultsBatch => "ffuf_results_batch",
            EventType::SubjackScanRequested => "subjack_scan_requested",
            EventType::SubjackResultsBatch => "subjack_results_batch",
            EventType::NaabuScanRequested => "naabu_scan_requested",
            EventType::NaabuResultsBatch => "naabu_results_batch",
            EventType::ServiceEvents => "service_events",
        }
    }

    /// Transport partition this event travels on. The queue is a coarse
    /// grouping only; routing to nodes is by event name.
    pub fn queue(&self) -> QueueName {
        match self {
            EventType::SubfinderScanRequested
            | EventType::SubdomainDiscovered
            | EventType::AsnmapScanRequested
            | EventType::AsnDiscovered
            | EventType::CidrDiscovered => QueueName::Discovery,

            EventType::MapcidrScanRequested
            | EventType::IpsExpanded
            | EventType::CidrSliced
            | EventType::IpsAggregated
            | EventType::Hakip2hostScanRequested
            | EventType::SmapScanRequested
            | EventType::SmapResults
            | EventType::PortsDiscovered => QueueName::Enumeration,

            EventType::DnsxBasicScanRequested
            | EventType::DnsxDeepScanRequested
            | EventType::DnsxPtrScanRequested
            | EventType::DnsxFilteredHosts
            | EventType::DnsxBasicResultsBatch
            | EventType::DnsxDeepResultsBatch
            | EventType::DnsxPtrResultsBatch => QueueName::Validation,

            EventType::HttpxScanRequested
            | EventType::HostDiscovered
            | EventType::ScanResultsBatch
            | EventType::TlsxScanRequested
            | EventType::TlsxResultsBatch
            | EventType::CertSanDiscovered
            | EventType::GauScanRequested
            | EventType::GauDiscovered
            | EventType::KatanaScanRequested
            | EventType::KatanaResultsBatch
            | EventType::JsFilesDiscovered
            | EventType::LinkfinderScanRequested
            | EventType::MantraScanRequested
            | EventType::MantraResultsBatch
            | EventType::FfufScanRequested
            | EventType::FfufResultsBatch
            | EventType::SubjackScanRequested
            | EventType::SubjackResultsBatch
            | EventType::NaabuScanRequested
            | EventType::NaabuResultsBatch
            | EventType::ServiceEvents => QueueName::Analysis,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ModelError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_owned()))
            .map_err(|_| ModelError::UnknownEventType(s.to_owned()))
    }
}

/// Fixed logical queues the bus partitions traffic into.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    Discovery,
    Enumeration,
    Validation,
    Analysis,
}

impl QueueName {
    pub const ALL: [QueueName; 4] = [
        QueueName::Discovery,
        QueueName::Enumeration,
        QueueName::Validation,
        QueueName::Analysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Discovery => "discovery",
            QueueName::Enumeration => "enumeration",
            QueueName::Validation => "validation",
            QueueName::Analysis => "analysis",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_confidence() -> f64 {
    0.5
}

/// Message flowing through the bus: a named discovery or scan request
/// carrying its targets and provenance.
///
/// Events are never mutated after creation; every subscriber of the matching
/// queue receives its own clone.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub event: EventType,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    pub program_id: ProgramId,
}

impl Event {
    pub fn new(event: EventType, program_id: ProgramId, targets: Vec<String>) -> Self {
        Self {
            event,
            targets,
            source: String::new(),
            confidence: default_confidence(),
            program_id,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips_through_strings() {
        for event in [
            EventType::SubdomainDiscovered,
            EventType::Hakip2hostScanRequested,
            EventType::DnsxPtrResultsBatch,
            EventType::JsFilesDiscovered,
        ] {
            let parsed: EventType = event.as_str().parse().unwrap();
            assert_eq!(parsed, event);
            let json = serde_json::to_value(event).unwrap();
            assert_eq!(json, serde_json::Value::String(event.as_str().into()));
        }
    }

    #[test]
    fn unknown_event_name_is_a_typed_error() {
        let err = "subdmain_discovered".parse::<EventType>().unwrap_err();
        assert!(matches!(err, ModelError::UnknownEventType(_)));
    }

    #[test]
    fn queue_assignment_matches_partition_table() {
        assert_eq!(EventType::SubdomainDiscovered.queue(), QueueName::Discovery);
        assert_eq!(EventType::IpsExpanded.queue(), QueueName::Enumeration);
        assert_eq!(EventType::DnsxFilteredHosts.queue(), QueueName::Validation);
        assert_eq!(EventType::HostDiscovered.queue(), QueueName::Analysis);
        assert_eq!(EventType::SmapResults.queue(), QueueName::Enumeration);
    }

    #[test]
    fn event_serializes_program_id_as_uuid_string() {
        let program = ProgramId::new();
        let event = Event::new(
            EventType::HostDiscovered,
            program,
            vec!["app.example.com".into()],
        )
        .with_source("httpx")
        .with_confidence(0.7);

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "host_discovered");
        assert_eq!(value["program_id"], program.to_string());
        assert_eq!(value["targets"][0], "app.example.com");
        assert_eq!(value["source"], "httpx");
    }
}
