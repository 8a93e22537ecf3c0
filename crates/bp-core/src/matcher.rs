//! Exhaustive contiguous-window matching between two branch graphs.
//!
//! For each window size, windows of the prior graph are bucketed by
//! fingerprint and windows of the new graph are probed against the
//! buckets. Sizes are visited in descending order so the first size that
//! yields any pair is the best match size. The matcher is a pure function
//! of its inputs and never mutates the graphs.

use std::collections::HashMap;

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::fingerprint::{Fingerprinter, WindowKey};
use crate::graph::BranchGraph;

/// Smallest window size considered when the caller does not say otherwise.
pub const DEFAULT_MIN_SIZE: u32 = 4;
/// Report cap in all-sizes mode when the caller does not say otherwise.
pub const DEFAULT_MAX_REPORT: u32 = 200;

/// Matcher operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Stop at the first (largest) size that yields a match.
    BestSize,
    /// Keep descending to the minimum size, accumulating matches.
    AllSizes,
}

/// Matching parameters.
#[derive(Debug, Clone, Copy)]
pub struct MatchParams {
    pub mode: MatchMode,
    /// Windows smaller than this are never considered.
    pub min_size: u32,
    /// When set, only matches of exactly this size are reported. The best
    /// match size is still taken over the full descent.
    pub size_filter: Option<u32>,
    /// Hard cap on the number of reported matches.
    pub max_report: u32,
}

impl MatchParams {
    pub fn best_size() -> Self {
        Self {
            mode: MatchMode::BestSize,
            min_size: DEFAULT_MIN_SIZE,
            size_filter: None,
            max_report: 1,
        }
    }

    pub fn all_sizes() -> Self {
        Self {
            mode: MatchMode::AllSizes,
            min_size: DEFAULT_MIN_SIZE,
            size_filter: None,
            max_report: DEFAULT_MAX_REPORT,
        }
    }
}

/// A pair of windows with identical fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowMatch {
    pub prior_start: u32,
    pub new_start: u32,
    pub size: u32,
}

/// Outcome of matching two graphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Comparison {
    /// Largest window size with at least one fingerprint match; 0 if none.
    pub best_match_size: u32,
    /// `best_match_size` over the smaller graph's node count, rounded to
    /// four decimal places; 0.0 when either graph is empty.
    pub fit_ratio_against_min_nodes: f64,
    pub match_count_reported: u32,
    /// Sorted by descending size, then ascending starts.
    pub matches: Vec<WindowMatch>,
}

/// Compare two graphs and report matching windows.
///
/// The descent runs from `min(|prior|, |new|)` down to `min_size`. In
/// best-size mode the first size with a match ends it; in all-sizes mode
/// it continues until the report cap is reached or the sizes run out.
pub fn compare(prior: &BranchGraph, new: &BranchGraph, params: &MatchParams) -> Comparison {
    let fp_prior = Fingerprinter::new(prior);
    let fp_new = Fingerprinter::new(new);

    let smaller = prior.node_count().min(new.node_count()) as u32;
    let min_size = params.min_size.max(1);

    let mut matches: Vec<WindowMatch> = Vec::new();
    let mut best_match_size = 0u32;

    if smaller >= min_size {
        let mut size = smaller;
        loop {
            let found = matches_at_size(&fp_prior, &fp_new, size);
            if !found.is_empty() {
                debug!("size {}: {} window pairs", size, found.len());
                if best_match_size == 0 {
                    best_match_size = size;
                }
                if params.size_filter.map_or(true, |f| f == size) {
                    matches.extend(found);
                }
            }

            if params.mode == MatchMode::BestSize {
                if best_match_size > 0 {
                    break;
                }
            } else if matches.len() >= params.max_report as usize {
                break;
            }
            // Below the filter size only the best match size can change,
            // and once it is known nothing can.
            if let Some(filter) = params.size_filter {
                if size <= filter && best_match_size > 0 {
                    break;
                }
            }
            if size == min_size {
                break;
            }
            size -= 1;
        }
    }

    matches.sort_by(|a, b| {
        b.size
            .cmp(&a.size)
            .then(a.prior_start.cmp(&b.prior_start))
            .then(a.new_start.cmp(&b.new_start))
    });
    matches.truncate(params.max_report as usize);

    let fit_ratio = if smaller == 0 {
        0.0
    } else {
        round4(f64::from(best_match_size) / f64::from(smaller))
    };

    Comparison {
        best_match_size,
        fit_ratio_against_min_nodes: fit_ratio,
        match_count_reported: matches.len() as u32,
        matches,
    }
}

/// All window pairs of one size whose fingerprints agree.
fn matches_at_size(
    fp_prior: &Fingerprinter,
    fp_new: &Fingerprinter,
    size: u32,
) -> Vec<WindowMatch> {
    let prior_keys: Vec<WindowKey> = (0..fp_prior.window_count(size))
        .into_par_iter()
        .map(|start| fp_prior.key(start, size))
        .collect();
    let new_keys: Vec<WindowKey> = (0..fp_new.window_count(size))
        .into_par_iter()
        .map(|start| fp_new.key(start, size))
        .collect();

    let mut buckets: HashMap<&WindowKey, Vec<u32>> = HashMap::new();
    for (start, key) in prior_keys.iter().enumerate() {
        buckets.entry(key).or_default().push(start as u32);
    }

    let mut found = Vec::new();
    for (new_start, key) in new_keys.iter().enumerate() {
        if let Some(prior_starts) = buckets.get(key) {
            for &prior_start in prior_starts {
                found.push(WindowMatch {
                    prior_start,
                    new_start: new_start as u32,
                    size,
                });
            }
        }
    }
    found
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
