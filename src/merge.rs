//! Merge engine.
//!
//! Combines the node list, bus list and metadata mappings of an incoming
//! document into an existing database. The polarity is asymmetric on purpose:
//! metadata conflicts keep the **incoming** value, node/bus conflicts keep the
//! **existing** record (backfilling only an empty comment). Conflicts are
//! reported through `log::warn!` and never abort the merge.

use log::warn;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::btree_map::Entry;
use std::fmt;

use crate::types::bus::Bus;
use crate::types::metadata::Metadata;
use crate::types::node::Node;

/// Merges all four metadata mappings. Applied identically to each one: an
/// incoming key with a differing value overwrites the existing entry with a
/// diagnostic; a new key is inserted silently.
pub(crate) fn merge_metadata(target: &mut Metadata, incoming: Metadata) {
    merge_map(
        &mut target.attribute_definitions,
        incoming.attribute_definitions,
        "Attribute definition",
    );
    merge_map(&mut target.attributes, incoming.attributes, "Attribute");
    merge_map(
        &mut target.environment_variables,
        incoming.environment_variables,
        "Environment variable",
    );
    merge_map(&mut target.value_tables, incoming.value_tables, "Value table");
}

fn merge_map<V: PartialEq + fmt::Debug>(
    target: &mut BTreeMap<String, V>,
    incoming: BTreeMap<String, V>,
    what: &str,
) {
    for (key, new_value) in incoming {
        match target.entry(key) {
            Entry::Occupied(mut entry) => {
                if *entry.get() != new_value {
                    warn!(
                        "{} '{}' exists in both databases with different values. \
                         Old: {:?}. New: {:?}. Using the new value.",
                        what,
                        entry.key(),
                        entry.get(),
                        new_value
                    );
                    entry.insert(new_value);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(new_value);
            }
        }
    }
}

/// Merges an incoming node list into an existing one.
///
/// Matching is by name through a lookup map over the existing records. On a
/// match the existing node is kept; only when its comment is empty is the
/// incoming comment copied in. Unmatched incoming nodes are appended.
pub(crate) fn merge_nodes(existing: &mut Vec<Node>, incoming: Vec<Node>) {
    let mut by_name: HashMap<String, usize> = existing
        .iter()
        .enumerate()
        .map(|(idx, node)| (node.name.clone(), idx))
        .collect();

    for node in incoming {
        match by_name.get(&node.name) {
            Some(&idx) => {
                let old = &mut existing[idx];
                if old.comment.is_empty() {
                    warn!(
                        "Node {} had no comment but exists in new database. \
                         Using comment from new database: {}",
                        node.name, node.comment
                    );
                    old.comment = node.comment;
                }
            }
            None => {
                warn!("Node {} does not exist in current list, importing.", node.name);
                by_name.insert(node.name.clone(), existing.len());
                existing.push(node);
            }
        }
    }
}

/// Merges an incoming bus list into an existing one. Same contract and
/// polarity as [`merge_nodes`], applied to the bus collection.
pub(crate) fn merge_buses(existing: &mut Vec<Bus>, incoming: Vec<Bus>) {
    let mut by_name: HashMap<String, usize> = existing
        .iter()
        .enumerate()
        .map(|(idx, bus)| (bus.name.clone(), idx))
        .collect();

    for bus in incoming {
        match by_name.get(&bus.name) {
            Some(&idx) => {
                let old = &mut existing[idx];
                if old.comment.is_empty() {
                    warn!(
                        "Bus {} had no comment but exists in new database. \
                         Using comment from new database: {}",
                        bus.name, bus.comment
                    );
                    old.comment = bus.comment;
                }
            }
            None => {
                warn!("Bus {} does not exist in current list, importing.", bus.name);
                by_name.insert(bus.name.clone(), existing.len());
                existing.push(bus);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::metadata::AttributeValue;

    /// Routes the merge diagnostics through the logger when a test runs with
    /// `RUST_LOG` set.
    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_metadata_incoming_wins() {
        init_logs();
        let mut target = Metadata::default();
        target
            .attributes
            .insert("BusType".to_string(), AttributeValue::Str("CAN".to_string()));

        let mut incoming = Metadata::default();
        incoming
            .attributes
            .insert("BusType".to_string(), AttributeValue::Str("CAN FD".to_string()));
        incoming
            .attributes
            .insert("DBName".to_string(), AttributeValue::Str("Body".to_string()));

        merge_metadata(&mut target, incoming);

        assert_eq!(
            target.attributes["BusType"],
            AttributeValue::Str("CAN FD".to_string())
        );
        assert_eq!(
            target.attributes["DBName"],
            AttributeValue::Str("Body".to_string())
        );
    }

    #[test]
    fn test_metadata_equal_values_untouched() {
        let mut target = Metadata::default();
        target.attributes.insert("X".to_string(), AttributeValue::Int(1));
        let mut incoming = Metadata::default();
        incoming.attributes.insert("X".to_string(), AttributeValue::Int(1));

        merge_metadata(&mut target, incoming);
        assert_eq!(target.attributes.len(), 1);
        assert_eq!(target.attributes["X"], AttributeValue::Int(1));
    }

    #[test]
    fn test_nodes_existing_comment_wins() {
        init_logs();
        let mut existing = vec![Node::new("A", "kept")];
        merge_nodes(&mut existing, vec![Node::new("A", "discarded")]);

        assert_eq!(existing.len(), 1);
        assert_eq!(existing[0].comment, "kept");
    }

    #[test]
    fn test_nodes_empty_comment_backfilled() {
        let mut existing = vec![Node::new("A", "")];
        merge_nodes(&mut existing, vec![Node::new("A", "x"), Node::new("B", "y")]);

        assert_eq!(existing.len(), 2);
        assert_eq!(existing[0].comment, "x");
        assert_eq!(existing[1].name, "B");
    }

    #[test]
    fn test_buses_same_polarity_as_nodes() {
        let mut existing = vec![Bus::new("Main", "")];
        merge_buses(&mut existing, vec![Bus::new("Main", "body bus"), Bus::new("Aux", "")]);

        assert_eq!(existing.len(), 2);
        assert_eq!(existing[0].comment, "body bus");
        assert_eq!(existing[1].name, "Aux");
    }
}
