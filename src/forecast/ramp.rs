//! Ramp and weather-event detection on recent observations
//!
//! Three checks run per farm over its observations in time order:
//! a wind ramp is a large swing in hub-height speed between two successive
//! observations, a direction shift is a bearing change beyond the threshold
//! against the earliest observation still inside the direction window, and
//! turbulence is a gust factor above the threshold on a single observation.

use std::collections::HashMap;

use chrono::Duration;
use tracing::warn;

use crate::config::RampConfig;
use crate::domain::{RampAlert, RampDirection, RampEvent, RampSeverity, WeatherObservation};

#[derive(Debug, Clone)]
pub struct RampDetector {
    warning_delta: f64,
    critical_delta: f64,
    direction_shift_deg: f64,
    direction_window: Duration,
    turbulence_gust_factor: f64,
}

impl RampDetector {
    pub fn new(cfg: &RampConfig) -> Self {
        Self {
            warning_delta: cfg.warning_delta,
            critical_delta: cfg.critical_delta,
            direction_shift_deg: cfg.direction_shift_deg,
            direction_window: Duration::minutes(cfg.direction_window_minutes),
            turbulence_gust_factor: cfg.turbulence_gust_factor,
        }
    }

    pub fn classify(&self, abs_delta: f64) -> Option<RampSeverity> {
        if abs_delta >= self.critical_delta {
            Some(RampSeverity::Critical)
        } else if abs_delta >= self.warning_delta {
            Some(RampSeverity::Warning)
        } else {
            None
        }
    }

    /// Alerts ordered by timestamp, farms in first-appearance order on ties.
    pub fn detect(&self, observations: &[WeatherObservation]) -> Vec<RampAlert> {
        let mut order: Vec<&str> = Vec::new();
        let mut by_farm: HashMap<&str, Vec<&WeatherObservation>> = HashMap::new();
        for obs in observations {
            by_farm
                .entry(obs.farm_name.as_str())
                .or_insert_with(|| {
                    order.push(obs.farm_name.as_str());
                    Vec::new()
                })
                .push(obs);
        }

        let mut alerts = Vec::new();
        for farm in order {
            let Some(series) = by_farm.get_mut(farm) else {
                continue;
            };
            series.sort_by_key(|o| o.timestamp_utc);

            self.speed_ramps(series, &mut alerts);
            self.direction_shifts(series, &mut alerts);
            self.turbulence(series, &mut alerts);
        }

        for alert in &alerts {
            warn!(
                farm = %alert.farm_name,
                timestamp = %alert.timestamp,
                kind = alert.event.kind(),
                severity = %alert.severity,
                "wind event detected"
            );
        }

        alerts.sort_by_key(|a| a.timestamp);
        alerts
    }

    fn speed_ramps(&self, series: &[&WeatherObservation], alerts: &mut Vec<RampAlert>) {
        for pair in series.windows(2) {
            let (previous, current) = (pair[0], pair[1]);
            let delta = current.wind_speed_100m - previous.wind_speed_100m;
            let Some(severity) = self.classify(delta.abs()) else {
                continue;
            };
            let wind_speed_delta_pct = if previous.wind_speed_100m == 0.0 {
                None
            } else {
                Some(100.0 * delta / previous.wind_speed_100m)
            };
            let direction = if delta >= 0.0 {
                RampDirection::Rising
            } else {
                RampDirection::Falling
            };

            alerts.push(RampAlert {
                farm_name: current.farm_name.clone(),
                timestamp: current.timestamp_utc,
                severity,
                event: RampEvent::WindRamp {
                    wind_speed_delta: delta.abs(),
                    wind_speed_delta_pct,
                    direction,
                },
            });
        }
    }

    fn direction_shifts(&self, series: &[&WeatherObservation], alerts: &mut Vec<RampAlert>) {
        for (i, current) in series.iter().enumerate() {
            let window_start = current.timestamp_utc - self.direction_window;
            let Some(reference) = series[..i]
                .iter()
                .find(|o| o.timestamp_utc >= window_start)
            else {
                continue;
            };

            let change = direction_change(reference.wind_direction_10m, current.wind_direction_10m);
            if change > self.direction_shift_deg {
                alerts.push(RampAlert {
                    farm_name: current.farm_name.clone(),
                    timestamp: current.timestamp_utc,
                    severity: RampSeverity::Warning,
                    event: RampEvent::DirectionShift {
                        direction_change_deg: change,
                    },
                });
            }
        }
    }

    fn turbulence(&self, series: &[&WeatherObservation], alerts: &mut Vec<RampAlert>) {
        for obs in series {
            if !(obs.wind_speed_100m > 0.0) {
                continue;
            }
            let gust_factor = obs.wind_gusts_10m / obs.wind_speed_100m;
            if gust_factor > self.turbulence_gust_factor {
                alerts.push(RampAlert {
                    farm_name: obs.farm_name.clone(),
                    timestamp: obs.timestamp_utc,
                    severity: RampSeverity::Warning,
                    event: RampEvent::Turbulence { gust_factor },
                });
            }
        }
    }
}

/// Smallest angle between two bearings in degrees, in `[0, 180]`.
pub fn direction_change(from_deg: f64, to_deg: f64) -> f64 {
    let d = (to_deg - from_deg).rem_euclid(360.0);
    d.min(360.0 - d)
}
