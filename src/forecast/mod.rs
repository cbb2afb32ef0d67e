//! Forecasting pipeline stages
//!
//! Offline: [`features`] builds training samples for [`crate::ml::training`].
//! Online: [`realtime`] → [`predictor`] → [`comparator`] → [`signal`], with
//! [`ramp`] scanning the same observation stream on its own.

pub mod comparator;
pub mod external;
pub mod features;
pub mod predictor;
pub mod ramp;
pub mod realtime;
pub mod signal;

pub use comparator::ForecastComparator;
pub use external::{ElexonWindForecastFeed, ExternalForecastFeed};
pub use features::{DateRange, FeatureBuilder, FeatureSet, TrainingSample};
pub use predictor::{predict, rank_by_capacity_factor, RankedFarms};
pub use ramp::RampDetector;
pub use realtime::{RealtimeFeatureFetcher, ScoringInput};
pub use signal::SignalClassifier;
