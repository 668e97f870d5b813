//! Cross-source matching
//!
//! Clusters records judged to be the same underlying question by their
//! literal match key: lower-cased core text plus normalized response scale.
//! Year, source and variable identifier play no part in the key.
//!
//! **Algorithm:**
//! 1. Compute each item's [`MatchKey`]; items with an empty text or scale half
//!    are set aside as unmatchable
//! 2. Bucket items by key in first-appearance order
//! 3. Pick each cluster's canonical item by the [`CanonicalPolicy`]
//!
//! Batteries are clustered separately ([`group_batteries`]) on stem, item list
//! and scale.

use crate::models::{Anomaly, Battery, QuestionRecord};
use qlib_common::normalize::normalize_text;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Identity key of a question
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchKey {
    pub text: String,
    pub alternatives: String,
}

impl MatchKey {
    /// Both halves must be non-empty for an item to be matchable
    pub fn is_matchable(&self) -> bool {
        !self.text.is_empty() && !self.alternatives.is_empty()
    }
}

/// Anything that can be clustered by question identity
pub trait Clusterable {
    fn match_key(&self) -> MatchKey;

    /// Year used by [`CanonicalPolicy::MostRecentYear`]
    fn year(&self) -> Option<i32> {
        None
    }

    /// Row identifier used by [`CanonicalPolicy::LowestRowId`]
    fn row_id(&self) -> Option<u64> {
        None
    }
}

impl Clusterable for QuestionRecord {
    fn match_key(&self) -> MatchKey {
        MatchKey {
            text: self.match_text(),
            alternatives: self.alternatives_key(),
        }
    }

    fn year(&self) -> Option<i32> {
        Some(self.year)
    }
}

/// How a cluster's canonical item is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalPolicy {
    /// Most recent year; ties go to the first encountered (display)
    MostRecentYear,
    /// Lowest row identifier; ties go to the first encountered (worksheets)
    LowestRowId,
}

/// Items judged identical. Indices refer to the clustered slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub key: MatchKey,
    pub canonical: usize,
    /// Non-canonical items in input order
    pub members: Vec<usize>,
}

impl Cluster {
    /// Canonical first, then members
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::once(self.canonical).chain(self.members.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.members.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// More than one item
    pub fn is_group(&self) -> bool {
        !self.members.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSet {
    /// All clusters, singletons included, in first-appearance order
    pub clusters: Vec<Cluster>,
    /// Items with an empty key half; never clustered
    pub unmatchable: Vec<usize>,
}

impl ClusterSet {
    /// Clusters with more than one item
    pub fn groups(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter().filter(|cluster| cluster.is_group())
    }
}

/// Cluster items by match key.
pub fn cluster<T: Clusterable>(items: &[T], policy: CanonicalPolicy) -> ClusterSet {
    let mut buckets: Vec<(MatchKey, Vec<usize>)> = Vec::new();
    let mut bucket_of: HashMap<MatchKey, usize> = HashMap::new();
    let mut unmatchable = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let key = item.match_key();
        if !key.is_matchable() {
            unmatchable.push(index);
            continue;
        }
        match bucket_of.get(&key) {
            Some(&bucket) => buckets[bucket].1.push(index),
            None => {
                bucket_of.insert(key.clone(), buckets.len());
                buckets.push((key, vec![index]));
            }
        }
    }

    let clusters: Vec<Cluster> = buckets
        .into_iter()
        .map(|(key, indices)| {
            let canonical = pick_canonical(items, &indices, policy);
            let members = indices.into_iter().filter(|&i| i != canonical).collect();
            Cluster { key, canonical, members }
        })
        .collect();

    debug!(
        items = items.len(),
        clusters = clusters.len(),
        groups = clusters.iter().filter(|c| c.is_group()).count(),
        unmatchable = unmatchable.len(),
        "Clustered items"
    );

    ClusterSet { clusters, unmatchable }
}

fn pick_canonical<T: Clusterable>(items: &[T], indices: &[usize], policy: CanonicalPolicy) -> usize {
    let mut best = indices[0];
    for &index in &indices[1..] {
        let better = match policy {
            CanonicalPolicy::MostRecentYear => items[index].year() > items[best].year(),
            CanonicalPolicy::LowestRowId => {
                items[index].row_id().unwrap_or(u64::MAX) < items[best].row_id().unwrap_or(u64::MAX)
            }
        };
        if better {
            best = index;
        }
    }
    best
}

/// A battery observed in one or more years
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedBattery {
    pub stem: String,
    pub sub_items: Vec<String>,
    pub alternatives: Vec<String>,
    pub years: BTreeSet<i32>,
    /// Year -> variable root
    pub variables: BTreeMap<i32, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatteryGrouping {
    pub batteries: Vec<MergedBattery>,
    /// [`Anomaly::BatteryDivergence`] entries
    pub divergences: Vec<Anomaly>,
}

type BatteryKey = (String, Vec<String>, Vec<String>);

fn battery_key(battery: &Battery) -> BatteryKey {
    (
        normalize_text(&battery.stem).to_lowercase(),
        battery.sub_items.clone(),
        battery.alternatives.clone(),
    )
}

/// Cluster batteries across years.
///
/// Batteries with an empty stem are never merged. The merged battery takes
/// its stem from the most recent year and keeps the longest observed item and
/// scale lists.
pub fn group_batteries(batteries: &[Battery]) -> BatteryGrouping {
    let mut buckets: Vec<Vec<&Battery>> = Vec::new();
    let mut bucket_of: HashMap<BatteryKey, usize> = HashMap::new();

    for battery in batteries {
        let key = battery_key(battery);
        if key.0.is_empty() {
            buckets.push(vec![battery]);
            continue;
        }
        match bucket_of.get(&key) {
            Some(&bucket) => buckets[bucket].push(battery),
            None => {
                bucket_of.insert(key, buckets.len());
                buckets.push(vec![battery]);
            }
        }
    }

    let merged: Vec<MergedBattery> = buckets.iter().map(|bucket| merge_bucket(bucket)).collect();
    let divergences = find_divergences(&merged);

    BatteryGrouping {
        batteries: merged,
        divergences,
    }
}

fn merge_bucket(bucket: &[&Battery]) -> MergedBattery {
    let mut newest = bucket[0];
    let mut sub_items = &bucket[0].sub_items;
    let mut alternatives = &bucket[0].alternatives;
    let mut years = BTreeSet::new();
    let mut variables = BTreeMap::new();

    for &battery in bucket {
        if battery.year > newest.year {
            newest = battery;
        }
        if battery.sub_items.len() > sub_items.len() {
            sub_items = &battery.sub_items;
        }
        if battery.alternatives.len() > alternatives.len() {
            alternatives = &battery.alternatives;
        }
        years.insert(battery.year);
        variables
            .entry(battery.year)
            .or_insert_with(|| battery.variable_root.clone());
    }

    MergedBattery {
        stem: newest.stem.clone(),
        sub_items: sub_items.clone(),
        alternatives: alternatives.clone(),
        years,
        variables,
    }
}

/// Same stem and scale, different item lists
fn find_divergences(merged: &[MergedBattery]) -> Vec<Anomaly> {
    let mut variants: BTreeMap<(String, Vec<String>), Vec<&MergedBattery>> = BTreeMap::new();
    for battery in merged {
        let stem_key = normalize_text(&battery.stem).to_lowercase();
        if stem_key.is_empty() {
            continue;
        }
        variants
            .entry((stem_key, battery.alternatives.clone()))
            .or_default()
            .push(battery);
    }

    variants
        .into_values()
        .filter(|group| group.len() > 1)
        .map(|group| Anomaly::BatteryDivergence {
            stem: group[0].stem.clone(),
            sub_item_variants: group.iter().map(|battery| battery.sub_items.clone()).collect(),
        })
        .collect()
}
