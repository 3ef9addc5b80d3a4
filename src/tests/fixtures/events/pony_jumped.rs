// Shared test fixture for the PonyJumped event used across store tests.

use crate::shared::infrastructure::event_store::Event;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PonyJumped {
    pub pony: String,
    pub height: u32,
}

pub fn make_pony_jumped_event(pony: &str, height: u32) -> Event<PonyJumped> {
    Event::new(
        "PonyJumped",
        PonyJumped {
            pony: pony.to_string(),
            height,
        },
    )
}

#[cfg(test)]
mod pony_jumped_fixture_tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::fs;

    #[fixture]
    fn golden_pony_jumped_json() -> serde_json::Value {
        let s = fs::read_to_string("tests/fixtures/events/pony_jumped.json").unwrap();
        serde_json::from_str(&s).unwrap()
    }

    #[rstest]
    fn it_serializes_pony_jumped_stable(golden_pony_jumped_json: serde_json::Value) {
        let event = make_pony_jumped_event("SparkleHooves", 5);
        let json = serde_json::to_value(&event.payload).unwrap();
        assert_eq!(json, golden_pony_jumped_json);
    }
}
