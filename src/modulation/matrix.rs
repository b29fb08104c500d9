//! Modulation Matrix
//!
//! Fixed source/destination routing evaluated at control rate. The voice
//! writes fresh source values every sample, runs the matrix every
//! control-rate block, and reads the destination accumulators when it
//! recomputes oscillator increments and filter targets.

/// Maximum number of modulation routes.
pub const MAX_ROUTES: usize = 32;

/// Enumeration of modulation sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModSource {
    /// Note velocity, set once at note-on
    Velocity,

    /// First low-frequency oscillator
    Lfo1,

    /// Second low-frequency oscillator
    Lfo2,

    /// Filter envelope output
    FilterEnv,

    /// Amplitude envelope output
    AmpEnv,

    /// Modulation wheel (host-provided)
    ModWheel,

    /// Channel aftertouch (host-provided)
    Aftertouch,
}

/// Number of modulation sources.
pub const NUM_SOURCES: usize = 7;

/// Enumeration of modulation destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModDestination {
    /// Both oscillators' pitch, in semitones
    Pitch,

    /// Filter cutoff offset
    FilterCutoff,

    /// Filter resonance offset
    FilterRes,

    /// Oscillator 2 pitch only, in semitones
    Osc2Pitch,

    /// Oscillator 1 pulse width offset
    Pwm,

    /// Output amplitude offset
    Amplitude,
}

/// Number of modulation destinations.
pub const NUM_DESTINATIONS: usize = 6;

/// A single source-to-destination route.
#[derive(Debug, Clone, Copy)]
pub struct ModRoute {
    /// Source index
    pub source: ModSource,

    /// Destination index
    pub destination: ModDestination,

    /// Scalar amount multiplied into the source value
    pub amount: f32,

    /// Whether the route contributes
    pub active: bool,
}

/// Errors for matrix route management.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModMatrixError {
    /// All route slots are occupied
    RoutesFull,
}

/// Fixed-capacity modulation matrix.
///
/// Routes live in a plain array; source values and destination accumulators
/// are arrays indexed by the enums. [`ModMatrix::run`] zeros the
/// accumulators and sums `source * amount` for every active route.
///
/// Two default routes are installed at construction, matching the classic
/// subtractive wiring: FilterEnv -> FilterCutoff and Velocity ->
/// FilterCutoff, both at amount 1 (the voice scales their contributions by
/// its preset's envelope and velocity amounts).
#[derive(Debug, Clone)]
pub struct ModMatrix {
    /// Route slots
    routes: [ModRoute; MAX_ROUTES],

    /// Number of occupied slots
    route_count: usize,

    /// Latest source values
    sources: [f32; NUM_SOURCES],

    /// Destination accumulators from the last `run`
    destinations: [f32; NUM_DESTINATIONS],
}

impl ModMatrix {
    /// Creates a matrix with the default filter-envelope and velocity routes.
    pub fn new() -> Self {
        let mut matrix = Self {
            routes: [ModRoute {
                source: ModSource::Velocity,
                destination: ModDestination::Pitch,
                amount: 0.0,
                active: false,
            }; MAX_ROUTES],
            route_count: 0,
            sources: [0.0; NUM_SOURCES],
            destinations: [0.0; NUM_DESTINATIONS],
        };

        // Default wiring; amounts are unit scalars, scaled downstream.
        let _ = matrix.add_route(ModSource::FilterEnv, ModDestination::FilterCutoff, 1.0);
        let _ = matrix.add_route(ModSource::Velocity, ModDestination::FilterCutoff, 1.0);
        matrix
    }

    /// Adds an active route.
    ///
    /// # Returns
    ///
    /// The slot index, or [`ModMatrixError::RoutesFull`].
    pub fn add_route(
        &mut self,
        source: ModSource,
        destination: ModDestination,
        amount: f32,
    ) -> Result<usize, ModMatrixError> {
        if self.route_count >= MAX_ROUTES {
            return Err(ModMatrixError::RoutesFull);
        }
        let index = self.route_count;
        self.routes[index] = ModRoute {
            source,
            destination,
            amount,
            active: true,
        };
        self.route_count += 1;
        Ok(index)
    }

    /// Enables or disables a route slot.
    pub fn set_route_active(&mut self, index: usize, active: bool) {
        if index < self.route_count {
            self.routes[index].active = active;
        }
    }

    /// Changes a route's amount.
    pub fn set_route_amount(&mut self, index: usize, amount: f32) {
        if index < self.route_count {
            self.routes[index].amount = amount;
        }
    }

    /// Gets the occupied route slots.
    pub fn routes(&self) -> &[ModRoute] {
        &self.routes[..self.route_count]
    }

    /// Writes a source value.
    pub fn set_source(&mut self, source: ModSource, value: f32) {
        self.sources[source as usize] = value;
    }

    /// Reads back a source value.
    pub fn source(&self, source: ModSource) -> f32 {
        self.sources[source as usize]
    }

    /// Evaluates all active routes into the destination accumulators.
    pub fn run(&mut self) {
        self.destinations = [0.0; NUM_DESTINATIONS];
        for route in &self.routes[..self.route_count] {
            if route.active {
                self.destinations[route.destination as usize] +=
                    self.sources[route.source as usize] * route.amount;
            }
        }
    }

    /// Reads a destination accumulator from the last `run`.
    pub fn destination(&self, destination: ModDestination) -> f32 {
        self.destinations[destination as usize]
    }

    /// Zeros sources and accumulators. Routes are kept.
    pub fn reset(&mut self) {
        self.sources = [0.0; NUM_SOURCES];
        self.destinations = [0.0; NUM_DESTINATIONS];
    }
}

impl Default for ModMatrix {
    fn default() -> Self {
        Self::new()
    }
}
