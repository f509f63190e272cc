use crate::types::Status;

/// Status dominance and counter-slot policy.
///
/// The relative ordering of statuses is fixed; which statuses a sensor can
/// produce is configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPolicy {
    supported: [bool; Status::COUNT],
}

impl StatusPolicy {
    /// Policy for a sensor producing the given statuses. `Invalid` is always supported.
    pub fn new(statuses: &[Status]) -> Self {
        let mut supported = [false; Status::COUNT];
        supported[Status::Invalid.index()] = true;
        for status in statuses {
            supported[status.index()] = true;
        }
        Self { supported }
    }

    /// Policy accepting every status
    pub fn all() -> Self {
        Self::new(&Status::ALL)
    }

    /// Dominance rank, higher wins
    pub fn rank(status: Status) -> u8 {
        match status {
            Status::Invalid => 0,
            Status::Cloud => 1,
            Status::TemporalCloud => 2,
            Status::Haze => 3,
            Status::Dark => 4,
            Status::Bright => 5,
            Status::CloudShadow => 6,
            Status::Water => 7,
            Status::Snow => 8,
            Status::Land => 9,
        }
    }

    /// Whether `a` strictly dominates `b`
    pub fn dominates(&self, a: Status, b: Status) -> bool {
        Self::rank(a) > Self::rank(b)
    }

    /// Whether observations of this status carry band values into the sums
    pub fn contributes_bands(status: Status) -> bool {
        match status {
            Status::Land
            | Status::Snow
            | Status::Water
            | Status::CloudShadow
            | Status::Bright
            | Status::Dark
            | Status::Haze => true,
            Status::Invalid | Status::Cloud | Status::TemporalCloud => false,
        }
    }

    /// Atmospheric disturbance statuses ranked Bright > Dark > Haze
    pub fn is_ancillary(status: Status) -> bool {
        matches!(status, Status::Bright | Status::Dark | Status::Haze)
    }

    /// Statuses whose counters replace each other on transition
    /// (the cloud-shadow / ancillary group).
    pub fn shares_override_group(status: Status) -> bool {
        status == Status::CloudShadow || Self::is_ancillary(status)
    }

    /// Counter a status increments. Temporal clouds share the cloud counter.
    pub fn counter_slot(status: Status) -> Status {
        match status {
            Status::TemporalCloud => Status::Cloud,
            other => other,
        }
    }

    pub fn is_supported(&self, status: Status) -> bool {
        self.supported[status.index()]
    }

    /// Supported statuses in code order
    pub fn supported(&self) -> impl Iterator<Item = Status> + '_ {
        Status::ALL.into_iter().filter(|s| self.is_supported(*s))
    }

    /// Statuses reported with their own count band, in code order
    pub fn reported(&self) -> impl Iterator<Item = Status> + '_ {
        self.supported()
            .filter(|s| *s != Status::Invalid && Self::counter_slot(*s) == *s)
    }
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self::all()
    }
}
