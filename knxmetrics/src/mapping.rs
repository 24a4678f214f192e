//! Mapping table from KNX group addresses to gauges.

use std::collections::{HashMap, HashSet};

use knxmetrics_common::GroupAddress;
use tracing::{debug, warn};

use crate::config::{ConfigError, MappingConfig, validate_mappings};
use crate::dpt::DatapointType;
use crate::metrics::{GaugeHandle, LabelSet, MetricRegistry, label_set};

/// One configured group address binding, with its gauge resolved.
#[derive(Debug, Clone)]
pub struct Mapping {
    group_address: GroupAddress,
    metric_name: String,
    decoder_kind: u32,
    labels: LabelSet,
    gauge: GaugeHandle,
}

impl Mapping {
    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    /// Datapoint code used to decode payloads.
    pub fn decoder_kind(&self) -> u32 {
        self.decoder_kind
    }

    /// Write `value` to this mapping's series.
    pub fn record(&self, value: f64) {
        self.gauge.record(value, &self.labels);
    }

    /// Last recorded value, `None` before the first write.
    pub fn value(&self) -> Option<f64> {
        self.gauge.value(&self.labels)
    }
}

/// Immutable lookup from group address to [`Mapping`].
///
/// Built once during setup. When several mappings share a group address the
/// first one wins and later ones are unreachable.
#[derive(Debug)]
pub struct MappingTable {
    mappings: Vec<Mapping>,
    index: HashMap<String, usize>,
}

impl MappingTable {
    /// Validate `configs` and bind every mapping to its gauge in `registry`.
    pub fn build(
        configs: &[MappingConfig],
        registry: &mut MetricRegistry,
    ) -> Result<Self, ConfigError> {
        validate_mappings(configs)?;

        let mut mappings = Vec::with_capacity(configs.len());
        let mut index = HashMap::with_capacity(configs.len());

        for (i, config) in configs.iter().enumerate() {
            let group_address: GroupAddress = config.group_address.parse().map_err(|e| {
                ConfigError::Validation(format!("mapping {} ({}): {}", i, config.metric_name, e))
            })?;

            if DatapointType::from_kind(config.metric_type).is_none() {
                warn!(
                    group_address = %group_address,
                    metric = %config.metric_name,
                    metric_type = config.metric_type,
                    "Unknown datapoint type, events will not be recorded"
                );
            }

            let description = if config.metric_description.is_empty() {
                format!("KNX group address {}", group_address)
            } else {
                config.metric_description.clone()
            };
            let gauge = registry.gauge(&config.metric_name, &description);
            let labels = label_set(
                config
                    .metric_labels
                    .iter()
                    .map(|label| (label.name.as_str(), label.value.as_str())),
            );

            let position = mappings.len();
            mappings.push(Mapping {
                group_address,
                metric_name: config.metric_name.clone(),
                decoder_kind: config.metric_type,
                labels,
                gauge,
            });

            let key = group_address.to_string();
            if let Some(first) = index.get(&key) {
                let first: &Mapping = &mappings[*first];
                warn!(
                    group_address = %group_address,
                    metric = %config.metric_name,
                    shadowed_by = %first.metric_name,
                    "Duplicate group address, mapping is unreachable"
                );
            } else {
                index.insert(key, position);
            }
        }

        debug!(
            mappings = mappings.len(),
            addresses = index.len(),
            "Mapping table built"
        );

        Ok(Self { mappings, index })
    }

    /// Look up the mapping for a normalized bus address.
    pub fn resolve(&self, address: &str) -> Option<&Mapping> {
        self.index.get(address).map(|&i| &self.mappings[i])
    }

    /// Distinct group addresses, in configuration order.
    pub fn addresses(&self) -> Vec<GroupAddress> {
        let mut seen = HashSet::with_capacity(self.index.len());
        self.mappings
            .iter()
            .map(|m| m.group_address)
            .filter(|address| seen.insert(*address))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricLabel;

    fn mapping(address: &str, name: &str, kind: u32) -> MappingConfig {
        MappingConfig {
            group_address: address.to_string(),
            metric_name: name.to_string(),
            metric_description: String::new(),
            metric_type: kind,
            metric_labels: Vec::new(),
        }
    }

    fn label(name: &str, value: &str) -> MetricLabel {
        MetricLabel {
            name: name.into(),
            value: value.into(),
        }
    }

    fn addr(s: &str) -> GroupAddress {
        s.parse().unwrap()
    }

    #[test]
    fn test_build_and_resolve() {
        let mut registry = MetricRegistry::new();
        let table = MappingTable::build(
            &[
                mapping("1/2/3", "lamp_on", 1001),
                mapping("2/1/0", "room_temp", 9001),
            ],
            &mut registry,
        )
        .unwrap();

        assert_eq!(table.resolve("1/2/3").unwrap().metric_name(), "lamp_on");
        assert_eq!(table.resolve("2/1/0").unwrap().decoder_kind(), 9001);
        assert!(table.resolve("9/9/9").is_none());
        assert!(table.resolve("not an address").is_none());
    }

    #[test]
    fn test_resolve_uses_normalized_config_address() {
        let mut registry = MetricRegistry::new();
        let table =
            MappingTable::build(&[mapping(" 01/2/03", "lamp_on", 1001)], &mut registry).unwrap();

        assert_eq!(table.resolve("1/2/3").unwrap().metric_name(), "lamp_on");
        assert_eq!(table.addresses(), vec![addr("1/2/3")]);
    }

    #[test]
    fn test_duplicate_address_first_match_wins() {
        let mut registry = MetricRegistry::new();
        let table = MappingTable::build(
            &[
                mapping("1/2/3", "first", 1001),
                mapping("4/4/4", "other", 9001),
                mapping("1/2/3", "second", 5001),
            ],
            &mut registry,
        )
        .unwrap();

        assert_eq!(table.resolve("1/2/3").unwrap().metric_name(), "first");
        assert_eq!(table.addresses(), vec![addr("1/2/3"), addr("4/4/4")]);
    }

    #[test]
    fn test_labels_are_bound_in_order() {
        let mut registry = MetricRegistry::new();
        let mut config = mapping("2/1/0", "room_temp", 9001);
        config.metric_labels = vec![label("room", "kitchen"), label("floor-level", "0")];
        let table = MappingTable::build(&[config], &mut registry).unwrap();
        let m = table.resolve("2/1/0").unwrap();

        assert_eq!(m.value(), None);
        m.record(21.5);
        assert_eq!(m.value(), Some(21.5));

        let output = registry.render().unwrap();
        assert!(
            output.contains("room_temp{room=\"kitchen\",floor_level=\"0\"} 21.5"),
            "{output}"
        );
    }

    #[test]
    fn test_colliding_label_names_keep_last_value() {
        let mut registry = MetricRegistry::new();
        let mut config = mapping("2/1/0", "room_temp", 9001);
        config.metric_labels = vec![label("room id", "a"), label("room-id", "b")];
        let table = MappingTable::build(&[config], &mut registry).unwrap();
        table.resolve("2/1/0").unwrap().record(21.5);

        let output = registry.render().unwrap();
        assert!(output.contains("room_temp{room_id=\"b\"} 21.5"), "{output}");
        assert!(!output.contains("room_id=\"a\""), "{output}");
    }

    #[test]
    fn test_shared_metric_name_distinct_series() {
        let mut registry = MetricRegistry::new();
        let mut kitchen = mapping("2/1/0", "room_temp", 9001);
        kitchen.metric_labels = vec![label("room", "kitchen")];
        let mut bedroom = mapping("2/1/1", "room_temp", 9001);
        bedroom.metric_labels = vec![label("room", "bedroom")];

        let table = MappingTable::build(&[kitchen, bedroom], &mut registry).unwrap();
        table.resolve("2/1/0").unwrap().record(21.0);
        table.resolve("2/1/1").unwrap().record(18.0);

        assert_eq!(registry.gauge_count(), 1);
        let output = registry.render().unwrap();
        assert!(output.contains("room_temp{room=\"kitchen\"} 21.0"), "{output}");
        assert!(output.contains("room_temp{room=\"bedroom\"} 18.0"), "{output}");
    }

    #[test]
    fn test_default_description() {
        let mut registry = MetricRegistry::new();
        MappingTable::build(&[mapping("1/2/3", "lamp_on", 1001)], &mut registry).unwrap();
        let output = registry.render().unwrap();
        assert!(
            output.contains("# HELP lamp_on KNX group address 1/2/3"),
            "{output}"
        );
    }

    #[test]
    fn test_build_rejects_invalid() {
        let mut registry = MetricRegistry::new();
        assert!(MappingTable::build(&[], &mut registry).is_err());
        assert!(MappingTable::build(&[mapping("1/2/3", "", 1001)], &mut registry).is_err());
        assert!(MappingTable::build(&[mapping("1/2/3", "x", 0)], &mut registry).is_err());
        assert!(MappingTable::build(&[mapping("", "x", 1001)], &mut registry).is_err());
        assert!(
            MappingTable::build(&[mapping("1/2/3", "knxmetrics_events", 1001)], &mut registry)
                .is_err()
        );
    }

    #[test]
    fn test_unknown_kind_is_kept() {
        let mut registry = MetricRegistry::new();
        let table = MappingTable::build(&[mapping("7/0/1", "mystery", 4242)], &mut registry).unwrap();
        assert_eq!(table.resolve("7/0/1").unwrap().decoder_kind(), 4242);
    }
}
