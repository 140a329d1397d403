/// Time-slot windows for the bus, in nanoseconds.
///
/// Letters follow the usual 1-Wire application note naming:
///
/// * `a`: low pulse that starts every write and read slot.
/// * `b`: idle time after a released "1" write, completing the slot.
/// * `c`: additional low time for a "0" write (total low time is `a + c`).
/// * `d`: recovery after every write.
/// * `e`: delay from release until the read sample.
/// * `f`: recovery after the read sample.
/// * `g`: delay before a reset pulse.
/// * `h`: reset low time.
/// * `i`: delay from release until the presence sample.
/// * `j`: recovery after the presence sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
    pub e: u32,
    pub f: u32,
    pub g: u32,
    pub h: u32,
    pub i: u32,
    pub j: u32,
}

impl Timing {
    /// Standard speed windows.
    pub const STANDARD: Timing = Timing {
        a: 6_000,
        b: 54_000,
        c: 54_000,
        d: 10_000,
        e: 9_000,
        f: 55_000,
        g: 0,
        h: 480_000,
        i: 70_000,
        j: 410_000,
    };

    /// Overdrive speed windows. Only devices switched into overdrive will follow these.
    pub const OVERDRIVE: Timing = Timing {
        a: 1_000,
        b: 5_000,
        c: 6_500,
        d: 2_500,
        e: 1_000,
        f: 7_000,
        g: 2_500,
        h: 70_000,
        i: 8_500,
        j: 40_000,
    };

    /// The profile compiled into this build. Enable the `overdrive` feature to switch.
    #[cfg(not(feature = "overdrive"))]
    pub const DEFAULT: Timing = Timing::STANDARD;
    #[cfg(feature = "overdrive")]
    pub const DEFAULT: Timing = Timing::OVERDRIVE;

    /// Total duration of a single write slot, including recovery.
    pub const fn write_slot(&self, bit: bool) -> u32 {
        if bit {
            self.a + self.d + self.b
        } else {
            self.a + self.c + self.d
        }
    }

    /// Total duration of a single read slot.
    pub const fn read_slot(&self) -> u32 {
        self.a + self.e + self.f
    }

    /// Total duration of a reset and presence detect sequence.
    pub const fn reset_sequence(&self) -> u32 {
        self.g + self.h + self.i + self.j
    }
}

impl Default for Timing {
    fn default() -> Self {
        Timing::DEFAULT
    }
}
