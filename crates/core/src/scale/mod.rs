use serde::{Deserialize, Serialize};

use crate::BallisticsConfig;

/// Level at which the green zone hands over to yellow.
pub const YELLOW_ZONE_DB: f32 = -12.0;
/// Level at which the yellow zone hands over to red.
pub const RED_ZONE_DB: f32 = -3.0;

/// `20·log10(linear)`. Silence maps to negative infinity.
pub fn linear_to_db(linear: f32) -> f32 {
    if linear > 0.0 {
        20.0 * linear.log10()
    } else {
        f32::NEG_INFINITY
    }
}

pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Colour band a normalised position falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Green,
    Yellow,
    Red,
}

/// Maps dB values onto the `[0, 1]` display axis of one config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DbScale {
    min_db: f32,
    max_db: f32,
    yellow_start: f32,
    red_start: f32,
}

impl DbScale {
    /// Callers pass a validated range (`max_db > min_db`).
    pub fn new(min_db: f32, max_db: f32) -> Self {
        let mut scale = Self {
            min_db,
            max_db,
            yellow_start: 0.0,
            red_start: 0.0,
        };
        scale.yellow_start = scale.normalize_db(YELLOW_ZONE_DB);
        scale.red_start = scale.normalize_db(RED_ZONE_DB);
        scale
    }

    pub fn from_config(config: &BallisticsConfig) -> Self {
        Self::new(config.min_db, config.max_db)
    }

    pub fn min_db(&self) -> f32 {
        self.min_db
    }

    pub fn max_db(&self) -> f32 {
        self.max_db
    }

    pub fn normalize_db(&self, db: f32) -> f32 {
        if db.is_nan() {
            return 0.0;
        }
        ((db - self.min_db) / (self.max_db - self.min_db)).clamp(0.0, 1.0)
    }

    /// Linear amplitudes at or below zero land on the bottom of the scale.
    pub fn normalize(&self, linear: f32) -> f32 {
        if linear > 0.0 {
            self.normalize_db(linear_to_db(linear))
        } else {
            0.0
        }
    }

    /// Normalised position of the green/yellow boundary.
    pub fn yellow_start(&self) -> f32 {
        self.yellow_start
    }

    /// Normalised position of the yellow/red boundary.
    pub fn red_start(&self) -> f32 {
        self.red_start
    }

    pub fn zone_at(&self, position: f32) -> Zone {
        if position >= self.red_start {
            Zone::Red
        } else if position >= self.yellow_start {
            Zone::Yellow
        } else {
            Zone::Green
        }
    }

    /// Normalised `[start, end)` span covered by a zone.
    pub fn zone_span(&self, zone: Zone) -> (f32, f32) {
        match zone {
            Zone::Green => (0.0, self.yellow_start),
            Zone::Yellow => (self.yellow_start, self.red_start),
            Zone::Red => (self.red_start, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_between_linear_and_db() {
        assert!((linear_to_db(1.0)).abs() < 1e-6);
        assert!((linear_to_db(0.5) + 6.0206).abs() < 1e-3);
        assert!((db_to_linear(-20.0) - 0.1).abs() < 1e-6);
        assert_eq!(linear_to_db(0.0), f32::NEG_INFINITY);
    }

    #[test]
    fn normalizes_reference_levels() {
        let scale = DbScale::new(-60.0, 6.0);
        assert!((scale.normalize_db(0.0) - 0.909).abs() < 0.001);
        assert!((scale.normalize_db(-12.0) - 0.727).abs() < 0.001);
        assert!((scale.red_start() - 0.864).abs() < 0.001);
        assert!((scale.yellow_start() - 0.727).abs() < 0.001);
    }

    #[test]
    fn clamps_and_handles_silence() {
        let scale = DbScale::new(-60.0, 6.0);
        assert_eq!(scale.normalize(0.0), 0.0);
        assert_eq!(scale.normalize(-1.0), 0.0);
        assert_eq!(scale.normalize(10.0), 1.0);
        assert_eq!(scale.normalize_db(-90.0), 0.0);
    }

    #[test]
    fn classifies_zones() {
        let scale = DbScale::new(-60.0, 6.0);
        assert_eq!(scale.zone_at(scale.normalize(0.1)), Zone::Green);
        assert_eq!(scale.zone_at(scale.normalize_db(-6.0)), Zone::Yellow);
        assert_eq!(scale.zone_at(scale.normalize(0.9)), Zone::Red);
    }
}
