#[derive(Debug, Clone)]
pub struct RatingSettings {
    /// K-factor for players rated at or above `master_rating`.
    pub k_master: f64,
    /// K-factor for experienced players (>= `experienced_games` past games).
    pub k_experienced: f64,
    /// K-factor for everyone else with a full rating.
    pub k_standard: f64,
    pub master_rating: f64,
    pub experienced_games: i32,
    /// Games needed before a provisional rating becomes full.
    pub full_rating_games: i32,
    /// Rating-change threshold above which K-32 players earn bonus points.
    pub bonus_threshold: f64,
    /// Win/loss offset used by performance-rating estimation.
    pub performance_spread: f64,
    pub performance_iterations: usize,
}

impl Default for RatingSettings {
    fn default() -> Self {
        Self {
            k_master: 16.0,
            k_experienced: 24.0,
            k_standard: 32.0,
            master_rating: 2100.0,
            experienced_games: 36,
            full_rating_games: 20,
            bonus_threshold: 35.0,
            performance_spread: 400.0,
            performance_iterations: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishSettings {
    /// Published ratings never drop below this floor.
    pub min_rating: i32,
    /// Update-magnitude buckets used in the publication report.
    pub update_buckets: [i32; 3],
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            min_rating: 700,
            update_buckets: [10, 50, 100],
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub poll_interval_secs: u64,
    /// A processing run claimed longer ago than this is swept to error.
    pub stale_after_secs: i64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            stale_after_secs: 3600,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rating: RatingSettings,
    pub publish: PublishSettings,
    pub worker: WorkerSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            rating: RatingSettings::default(),
            publish: PublishSettings::default(),
            worker: WorkerSettings::default(),
        }
    }
}
