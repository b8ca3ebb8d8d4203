//! IdGenerator port.

use ulid::Ulid;

use crate::domain::ids::{ActionId, FailureId};
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn action_id(&self) -> ActionId;

    fn failure_id(&self) -> FailureId;
}

/// Millisecond part from the clock, random part from `rand`.
///
/// With a `FixedClock` every id shares one timestamp and only the random
/// tail differs, so ordering among them is arbitrary.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn ulid(&self) -> Ulid {
        // pre-epoch clocks clamp to zero
        let ms = u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0);
        Ulid::from_parts(ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn action_id(&self) -> ActionId {
        self.ulid().into()
    }

    fn failure_id(&self) -> FailureId {
        self.ulid().into()
    }
}
