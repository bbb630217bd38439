use std::time::{Duration, Instant};

/// Timers count down at a fixed rate whatever the instruction frequency is.
pub const TIMER_HZ: f64 = 60.0;

/// Accepted range of instruction cycles per second.
pub const MIN_FREQUENCY: f64 = 1.0;
pub const MAX_FREQUENCY: f64 = 1_000_000.0;

/// Most ticks of either kind handed out by one `Clock::advance`; after a
/// longer stall the clock drops the backlog and resyncs to `now`.
pub const MAX_TICKS_PER_ADVANCE: u32 = 100_000;

pub const ON_COLOR: (u8, u8, u8) = (0xFF, 0xFF, 0x40);
pub const OFF_COLOR: (u8, u8, u8) = (0x64, 0x32, 0x00);

/// Work that has come due since the last `Clock::advance`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Ticks {
    pub cycles: u32,
    pub timers: u32,
}

/// Schedules instruction cycles and timer ticks against wall-clock time.
///
/// Each rate keeps its own last-tick timestamp and steps it forward by whole
/// periods, so leftover time carries into the next call.
pub struct Clock {
    cycle_period: Duration,
    timer_period: Duration,
    prev_cycle: Instant,
    prev_timer: Instant,
}

impl Clock {
    /// `frequency` is instruction cycles per second, see `parse_frequency`.
    pub fn new(frequency: f64, now: Instant) -> Self {
        Self {
            cycle_period: Self::period(frequency),
            timer_period: Self::period(TIMER_HZ),
            prev_cycle: now,
            prev_timer: now,
        }
    }

    fn period(hz: f64) -> Duration {
        let hz = hz.max(MIN_FREQUENCY).min(MAX_FREQUENCY);
        Duration::from_secs_f64(1.0 / hz)
    }

    pub fn advance(&mut self, now: Instant) -> Ticks {
        Ticks {
            cycles: Self::elapsed(&mut self.prev_cycle, self.cycle_period, now),
            timers: Self::elapsed(&mut self.prev_timer, self.timer_period, now),
        }
    }

    fn elapsed(prev: &mut Instant, period: Duration, now: Instant) -> u32 {
        let mut ticks = 0;
        while now.saturating_duration_since(*prev) >= period {
            if ticks == MAX_TICKS_PER_ADVANCE {
                log::debug!("dropping backlog of {:?}", now.duration_since(*prev));
                *prev = now;
                break;
            }
            *prev += period;
            ticks += 1;
        }
        ticks
    }
}

/// Parse a command line instruction frequency.
pub fn parse_frequency(s: &str) -> Result<f64, String> {
    let frequency: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if (MIN_FREQUENCY..=MAX_FREQUENCY).contains(&frequency) {
        Ok(frequency)
    } else {
        Err(format!(
            "frequency must be between {} and {} Hz",
            MIN_FREQUENCY, MAX_FREQUENCY
        ))
    }
}

/// Map a keyboard character onto the hex keypad.
///
/// ```text
/// 1 2 3 4      1 2 3 C
/// q w e r  ->  4 5 6 D
/// a s d f      7 8 9 E
/// z x c v      A 0 B F
/// ```
pub fn keypad_index(c: char) -> Option<usize> {
    let index = match c.to_ascii_lowercase() {
        '1' => 0x1,
        '2' => 0x2,
        '3' => 0x3,
        '4' => 0xC,
        'q' => 0x4,
        'w' => 0x5,
        'e' => 0x6,
        'r' => 0xD,
        'a' => 0x7,
        's' => 0x8,
        'd' => 0x9,
        'f' => 0xE,
        'z' => 0xA,
        'x' => 0x0,
        'c' => 0xB,
        'v' => 0xF,
        _ => return None,
    };
    Some(index)
}
