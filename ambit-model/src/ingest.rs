use serde::{Deserialize, Serialize};

/// Names the entity lists an [`IngestResult`] can carry. Scan nodes map each
/// of their output event types onto one of these fields.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IngestField {
    NewHosts,
    Hostnames,
    RawDomains,
    Urls,
    JsFiles,
    Ips,
    Asns,
    Cidrs,
}

/// Entities an ingestor actually created while persisting a batch.
///
/// Only novel discoveries are reported back; the ingestor filters anything
/// the store already knew about, which is what keeps the pipeline from
/// re-scanning known assets forever. Empty lists are valid and mean
/// "nothing new of that kind".
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IngestResult {
    #[serde(default)]
    pub new_hosts: Vec<String>,
    #[serde(default)]
    pub hostnames: Vec<String>,
    #[serde(default)]
    pub raw_domains: Vec<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub js_files: Vec<String>,
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default)]
    pub asns: Vec<String>,
    #[serde(default)]
    pub cidrs: Vec<String>,
}

impl IngestResult {
    pub fn field(&self, field: IngestField) -> &[String] {
        match field {
            IngestField::NewHosts => &self.new_hosts,
            IngestField::Hostnames => &self.hostnames,
            IngestField::RawDomains => &self.raw_domains,
            IngestField::Urls => &self.urls,
            IngestField::JsFiles => &self.js_files,
            IngestField::Ips => &self.ips,
            IngestField::Asns => &self.asns,
            IngestField::Cidrs => &self.cidrs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.new_hosts.is_empty()
            && self.hostnames.is_empty()
            && self.raw_domains.is_empty()
            && self.urls.is_empty()
            && self.js_files.is_empty()
            && self.ips.is_empty()
            && self.asns.is_empty()
            && self.cidrs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_accessor_reads_the_matching_list() {
        let result = IngestResult {
            new_hosts: vec!["a.example.com".into()],
            js_files: vec!["https://a.example.com/app.js".into()],
            ..Default::default()
        };
        assert_eq!(result.field(IngestField::NewHosts), ["a.example.com"]);
        assert_eq!(
            result.field(IngestField::JsFiles),
            ["https://a.example.com/app.js"]
        );
        assert!(result.field(IngestField::Urls).is_empty());
        assert!(!result.is_empty());
        assert!(IngestResult::default().is_empty());
    }
}
