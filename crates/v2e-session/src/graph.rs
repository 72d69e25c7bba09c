//! ItemGraph construction (§4.5): links the catalog's items so a session
//! can walk between knowledge-item types as well as within one.

use std::collections::HashMap;

use v2e_core::{SecurityItem, Urn};

/// The inter-type link order the construction algorithm follows.
const CROSS_TYPE_PAIRS: [(&str, &str); 3] = [("cve", "cwe"), ("cwe", "capec"), ("capec", "attack")];

/// A directed adjacency mapping built once, at session construction, from
/// an immutable catalog. Duplicate links are permitted.
#[derive(Debug, Clone, Default)]
pub struct ItemGraph {
    links: HashMap<Urn, Vec<Urn>>,
}

impl ItemGraph {
    /// Group by type, link every source item in a cross-type pair to the
    /// first three destination items of the target type, then chain
    /// consecutive items within each type.
    pub fn build(catalog: &[SecurityItem]) -> Self {
        let mut by_kind: HashMap<&str, Vec<&SecurityItem>> = HashMap::new();
        for item in catalog {
            by_kind.entry(item.kind.as_str()).or_default().push(item);
        }

        let mut links: HashMap<Urn, Vec<Urn>> = HashMap::new();

        for (src_kind, dst_kind) in CROSS_TYPE_PAIRS {
            let (Some(sources), Some(dests)) = (by_kind.get(src_kind), by_kind.get(dst_kind)) else {
                continue;
            };
            let first_three: Vec<Urn> = dests.iter().take(3).map(|item| item.urn.clone()).collect();
            if first_three.is_empty() {
                continue;
            }
            for source in sources {
                links.entry(source.urn.clone()).or_default().extend(first_three.iter().cloned());
            }
        }

        for items in by_kind.values() {
            for pair in items.windows(2) {
                links.entry(pair[0].urn.clone()).or_default().push(pair[1].urn.clone());
            }
        }

        Self { links }
    }

    pub fn links_from(&self, urn: &Urn) -> &[Urn] {
        self.links.get(urn).map(|v| v.as_slice()).unwrap_or(&[])
    }
}
