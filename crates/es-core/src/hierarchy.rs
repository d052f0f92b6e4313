//! Care-site hierarchy index.
//!
//! Resolves ancestor/descendant relations over the care-site forest and
//! computes the id closure used by care-site filtering: the selected sites,
//! every ancestor up to the root and every descendant down to the leaves.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use es_common::{CareSite, CareSiteId, CareSiteLevel, Error, Result};
use tracing::{debug, warn};

use crate::logging::event_names;

#[derive(Debug, Clone, Default)]
pub struct CareSiteHierarchy {
    sites: BTreeMap<CareSiteId, CareSite>,
    parent: BTreeMap<CareSiteId, CareSiteId>,
    children: BTreeMap<CareSiteId, Vec<CareSiteId>>,
    by_short_name: BTreeMap<String, Vec<CareSiteId>>,
}

impl CareSiteHierarchy {
    /// Build the index, rejecting duplicate ids and cycles.
    ///
    /// A parent id that is not in the table is treated as absent: the site
    /// becomes a root.
    pub fn new(sites: impl IntoIterator<Item = CareSite>) -> Result<Self> {
        let mut index = CareSiteHierarchy::default();

        for site in sites {
            let id = site.care_site_id;
            if index.sites.contains_key(&id) {
                return Err(Error::InvalidRecord {
                    table: "care_site".to_string(),
                    message: format!("duplicate care_site_id {}", id),
                });
            }
            index
                .by_short_name
                .entry(site.care_site_short_name.clone())
                .or_default()
                .push(id);
            index.sites.insert(id, site);
        }

        for (id, site) in &index.sites {
            let Some(parent_id) = site.parent_id else {
                continue;
            };
            if index.sites.contains_key(&parent_id) {
                index.parent.insert(*id, parent_id);
                index.children.entry(parent_id).or_default().push(*id);
            } else {
                warn!(
                    event = event_names::HIERARCHY_ORPHAN,
                    care_site_id = id.0,
                    parent_id = parent_id.0,
                    "parent care site not found, treating as root"
                );
            }
        }

        index.check_acyclic()?;
        Ok(index)
    }

    fn check_acyclic(&self) -> Result<()> {
        let mut cleared: BTreeSet<CareSiteId> = BTreeSet::new();
        for start in self.sites.keys() {
            let mut path = BTreeSet::new();
            let mut current = Some(*start);
            while let Some(id) = current {
                if cleared.contains(&id) {
                    break;
                }
                if !path.insert(id) {
                    return Err(Error::HierarchyCycle { care_site_id: id.0 });
                }
                current = self.parent.get(&id).copied();
            }
            cleared.extend(path);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn get(&self, id: CareSiteId) -> Option<&CareSite> {
        self.sites.get(&id)
    }

    pub fn level(&self, id: CareSiteId) -> Option<CareSiteLevel> {
        self.sites.get(&id).and_then(CareSite::level)
    }

    pub fn short_name(&self, id: CareSiteId) -> Option<&str> {
        self.sites.get(&id).map(|s| s.care_site_short_name.as_str())
    }

    pub fn ids_by_short_name(&self, short_name: &str) -> &[CareSiteId] {
        self.by_short_name
            .get(short_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Ancestors from the direct parent up to the root.
    pub fn ancestors(&self, id: CareSiteId) -> Vec<CareSiteId> {
        let mut out = Vec::new();
        let mut current = self.parent.get(&id).copied();
        while let Some(p) = current {
            out.push(p);
            current = self.parent.get(&p).copied();
        }
        out
    }

    /// Every descendant, breadth first.
    pub fn descendants(&self, id: CareSiteId) -> Vec<CareSiteId> {
        let mut out = Vec::new();
        let mut queue: VecDeque<CareSiteId> = self
            .children
            .get(&id)
            .map(|c| c.iter().copied().collect())
            .unwrap_or_default();
        while let Some(child) = queue.pop_front() {
            out.push(child);
            if let Some(grandchildren) = self.children.get(&child) {
                queue.extend(grandchildren.iter().copied());
            }
        }
        out
    }

    /// The site itself or its nearest ancestor at `level`.
    pub fn ancestor_at_level(&self, id: CareSiteId, level: CareSiteLevel) -> Option<CareSiteId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|candidate| self.level(*candidate) == Some(level))
    }

    /// Ids to retain when filtering on `short_names` and `ids`.
    ///
    /// Unknown names and ids are left out of the result.
    pub fn closure(&self, short_names: &[String], ids: &[CareSiteId]) -> BTreeSet<CareSiteId> {
        let mut seeds: Vec<CareSiteId> = Vec::new();
        for name in short_names {
            let matched = self.ids_by_short_name(name);
            if matched.is_empty() {
                debug!(
                    event = event_names::HIERARCHY_UNKNOWN_SHORT_NAME,
                    short_name = %name,
                    "care site short name not found, ignoring"
                );
            }
            seeds.extend_from_slice(matched);
        }
        for id in ids {
            if self.sites.contains_key(id) {
                seeds.push(*id);
            } else {
                debug!(care_site_id = id.0, "care site id not found, ignoring");
            }
        }

        let mut out = BTreeSet::new();
        for seed in seeds {
            out.insert(seed);
            out.extend(self.ancestors(seed));
            out.extend(self.descendants(seed));
        }
        out
    }
}

/// Parse configured level names, warning about unknown ones.
///
/// An empty request selects every level.
pub fn resolve_levels(requested: &[String]) -> Result<Vec<CareSiteLevel>> {
    if requested.is_empty() {
        return Ok(CareSiteLevel::all().to_vec());
    }
    let mut levels = BTreeSet::new();
    for name in requested {
        match name.parse::<CareSiteLevel>() {
            Ok(level) => {
                levels.insert(level);
            }
            Err(_) => warn!(
                event = event_names::HIERARCHY_UNKNOWN_LEVEL,
                level = %name,
                "unsupported care site level, ignoring"
            ),
        }
    }
    if levels.is_empty() {
        return Err(Error::NoCareSiteLevel {
            requested: requested.to_vec(),
            supported: CareSiteLevel::supported_names(),
        });
    }
    Ok(levels.into_iter().collect())
}
