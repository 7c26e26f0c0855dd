//! Fibonacci price levels
//!
//! Extensions are fixed multiples of the entry price.

use serde::{Deserialize, Serialize};

/// Ratios applied directly to the entry price
pub const EXTENSION_RATIOS: [f64; 6] = [1.236, 1.382, 1.500, 1.618, 1.786, 2.618];

const LEVEL_NAMES: [&str; 6] = ["fib_236", "fib_382", "fib_500", "fib_618", "fib_786", "fib_1618"];

/// Six Fibonacci price levels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FibonacciLevels {
    pub fib_236: f64,
    pub fib_382: f64,
    pub fib_500: f64,
    pub fib_618: f64,
    pub fib_786: f64,
    pub fib_1618: f64,
}

/// Level closest to a given price
#[derive(Debug, Clone, PartialEq)]
pub struct NearestLevel {
    pub level: &'static str,
    pub price: f64,
    pub distance: f64,
}

impl FibonacciLevels {
    fn from_array(levels: [f64; 6]) -> Self {
        Self {
            fib_236: levels[0],
            fib_382: levels[1],
            fib_500: levels[2],
            fib_618: levels[3],
            fib_786: levels[4],
            fib_1618: levels[5],
        }
    }

    /// Extension targets above an entry price
    pub fn extensions(entry_price: f64) -> Self {
        Self::from_array(EXTENSION_RATIOS.map(|ratio| entry_price * ratio))
    }

    pub fn as_array(&self) -> [f64; 6] {
        [
            self.fib_236,
            self.fib_382,
            self.fib_500,
            self.fib_618,
            self.fib_786,
            self.fib_1618,
        ]
    }

    /// Find the level nearest to `price` (first level wins ties)
    pub fn nearest(&self, price: f64) -> NearestLevel {
        let levels = self.as_array();
        let mut best = NearestLevel {
            level: LEVEL_NAMES[0],
            price: levels[0],
            distance: (price - levels[0]).abs(),
        };
        for (name, &level) in LEVEL_NAMES.iter().zip(levels.iter()).skip(1) {
            let distance = (price - level).abs();
            if distance < best.distance {
                best = NearestLevel {
                    level: *name,
                    price: level,
                    distance,
                };
            }
        }
        best
    }
}
