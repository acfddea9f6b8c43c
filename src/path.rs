use std::collections::{BTreeMap, HashSet};


/// Cost and duration of each kind of operation along a path.  The split methods only use the
/// total, the breakdown is carried along for the results.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct PathDetailedCosts {
    pub loading_cost: f64,
    pub unloading_cost: f64,
    pub transit_cost: f64,
    pub transhipment_cost: f64,
    pub moving_cost: f64,
    pub stop_cost: f64,
    pub switching_cost: f64,
    pub loading_duration: f64,
    pub unloading_duration: f64,
    pub transit_duration: f64,
    pub transhipment_duration: f64,
    pub moving_duration: f64,
    pub stop_duration: f64,
    pub switching_duration: f64,
}

impl PathDetailedCosts {
    pub fn total_cost(&self) -> f64 {
        self.loading_cost + self.unloading_cost + self.transit_cost + self.transhipment_cost
            + self.moving_cost + self.stop_cost + self.switching_cost
    }

    pub fn total_duration(&self) -> f64 {
        self.loading_duration + self.unloading_duration + self.transit_duration
            + self.transhipment_duration + self.moving_duration + self.stop_duration
            + self.switching_duration
    }
}

/// One candidate path for an OD cell, as found by the path search.
#[derive(PartialEq, Debug, Clone)]
pub struct Path {
    pub cost: f64,
    pub duration: f64,
    pub length: f64,
    pub loading_mode: u8,
    pub loading_means: u8,
    pub intermodal: bool,
    /// Identifies the detailed route, so that the same route found twice is only kept once.
    pub route_key: Option<u64>,
    pub details: PathDetailedCosts,
    /// Fraction of the OD cell's quantity sent along this path, set by the split methods.
    pub market_share: f64,
}

impl Path {
    pub fn new(cost: f64, duration: f64, length: f64, loading_mode: u8, loading_means: u8)
               -> Path {
        Path {
            cost,
            duration,
            length,
            loading_mode,
            loading_means,
            intermodal: false,
            route_key: None,
            details: PathDetailedCosts::default(),
            market_share: 0.,
        }
    }

    /// Builds a path whose cost and duration are the totals of `details`.
    pub fn from_details(details: PathDetailedCosts, length: f64, loading_mode: u8,
                        loading_means: u8) -> Path {
        let mut path = Path::new(details.total_cost(), details.total_duration(), length,
                                 loading_mode, loading_means);
        path.details = details;
        path
    }

    pub fn with_route_key(mut self, route_key: u64) -> Path {
        self.route_key = Some(route_key);
        self
    }

    pub fn as_intermodal(mut self) -> Path {
        self.intermodal = true;
        self
    }
}

/// The alternative paths of one OD cell that share a loading mode.
#[derive(PartialEq, Debug, Clone)]
pub struct PathGroup {
    loading_mode: u8,
    paths: Vec<Path>,
    cheapest_idx: usize,
    cheapest_cost: f64,
    /// Fraction of the OD cell's quantity sent by this mode, set by the split methods.
    pub market_share: f64,
}

impl PathGroup {
    pub fn new(first_path: Path) -> PathGroup {
        PathGroup {
            loading_mode: first_path.loading_mode,
            cheapest_cost: first_path.cost,
            cheapest_idx: 0,
            paths: vec![first_path],
            market_share: 0.,
        }
    }

    /// Appends a path.  The cheapest path only changes if the new one is strictly cheaper, so
    /// ties go to the path added first.
    pub fn add_path(&mut self, path: Path) {
        if path.cost < self.cheapest_cost {
            self.cheapest_cost = path.cost;
            self.cheapest_idx = self.paths.len();
        }
        self.paths.push(path);
    }

    pub fn loading_mode(&self) -> u8 {
        self.loading_mode
    }

    pub fn cheapest_cost(&self) -> f64 {
        self.cheapest_cost
    }

    pub fn cheapest_path(&self) -> &Path {
        &self.paths[self.cheapest_idx]
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn paths_mut(&mut self) -> &mut [Path] {
        &mut self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Forgets the market shares of the mode and of all its paths.
    pub fn reset_market_shares(&mut self) {
        self.market_share = 0.;
        for path in self.paths.iter_mut() {
            path.market_share = 0.;
        }
    }
}

/// The path groups of one OD cell, by loading mode.
pub type PathGroups = BTreeMap<u8, PathGroup>;

/// Which candidate paths are worth splitting demand over.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct PathFilter {
    /// If positive, paths longer than this factor times the length of the cheapest path are
    /// dropped.
    pub max_detour: Option<f64>,
    /// Keep intermodal paths only when they are the cheapest solution overall.
    pub keep_only_cheapest_intermodal: bool,
}

/// Sorts the candidate paths of one OD cell into groups by loading mode, dropping duplicate
/// routes, zero-length paths, paths with a negative or undefined cost, and whatever `filter`
/// rules out.
pub fn group_paths(paths: Vec<Path>, filter: &PathFilter) -> PathGroups {
    let mut seen_routes = HashSet::new();
    let mut candidates = vec![];
    for path in paths {
        if !(path.cost >= 0.) || path.length == 0. {
            log::debug!("dropping path with cost {} and length {}", path.cost, path.length);
            continue;
        }
        if let Some(key) = path.route_key {
            if !seen_routes.insert(key) {
                continue;
            }
        }
        candidates.push(path);
    }

    let mut cheapest_cost = f64::INFINITY;
    let mut cheapest_length = f64::INFINITY;
    let mut cheapest_intermodal_cost = f64::INFINITY;
    for path in &candidates {
        if path.intermodal && path.cost < cheapest_intermodal_cost {
            cheapest_intermodal_cost = path.cost;
        }
        if path.cost < cheapest_cost {
            cheapest_cost = path.cost;
            cheapest_length = path.length;
        }
    }
    let max_length = match filter.max_detour {
        Some(detour) if detour > 0. => cheapest_length * detour,
        _ => f64::INFINITY,
    };

    let mut groups = PathGroups::new();
    for path in candidates {
        if filter.keep_only_cheapest_intermodal && path.intermodal &&
           (cheapest_cost < cheapest_intermodal_cost || path.cost > cheapest_intermodal_cost) {
            continue;
        }
        if path.length > max_length {
            continue;
        }
        match groups.get_mut(&path.loading_mode) {
            Some(group) => group.add_path(path),
            None => {
                groups.insert(path.loading_mode, PathGroup::new(path));
            },
        }
    }
    groups
}
