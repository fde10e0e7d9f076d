use std::cell::Cell;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Simulated clock coordinates used as the cache validity key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ClockKey {
    /// Total days elapsed in the save.
    pub day: u32,
    /// Host time of day, e.g. `630` for 6:30.
    pub time_of_day: u32,
}

impl ClockKey {
    #[must_use]
    pub fn new(day: u32, time_of_day: u32) -> Self {
        Self { day, time_of_day }
    }
}

impl Display for ClockKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "day {} @ {:04}", self.day, self.time_of_day)
    }
}

/// Host collaborator reporting the current simulated time.
pub trait ClockSource {
    /// `None` while no world is loaded.
    fn now(&self) -> Option<ClockKey>;
}

impl<C: ClockSource + ?Sized> ClockSource for Rc<C> {
    fn now(&self) -> Option<ClockKey> {
        (**self).now()
    }
}

impl<C: ClockSource + ?Sized> ClockSource for Box<C> {
    fn now(&self) -> Option<ClockKey> {
        (**self).now()
    }
}

/// A clock the host (or a test) sets explicitly.
#[derive(Debug, Default)]
pub struct ManualClock {
    current: Cell<Option<ClockKey>>,
}

impl ManualClock {
    /// A clock with no active world.
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn at(day: u32, time_of_day: u32) -> Self {
        Self { current: Cell::new(Some(ClockKey::new(day, time_of_day))) }
    }

    pub fn set(&self, day: u32, time_of_day: u32) {
        self.current.set(Some(ClockKey::new(day, time_of_day)));
    }

    /// Mark the world as unloaded.
    pub fn clear(&self) {
        self.current.set(None);
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> Option<ClockKey> {
        self.current.get()
    }
}
