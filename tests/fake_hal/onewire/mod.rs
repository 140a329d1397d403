use simple_onewire::crc::crc8;
use simple_onewire::{RomCode, Timing};
use std::collections::VecDeque;

/// Latest point after the start of a read slot at which the master may sample.
#[cfg(not(feature = "overdrive"))]
const SAMPLE_DEADLINE_NS: u64 = 15_000;
#[cfg(feature = "overdrive")]
const SAMPLE_DEADLINE_NS: u64 = 2_000;

/// Window after the end of a reset pulse in which devices hold the presence pulse.
#[cfg(not(feature = "overdrive"))]
const PRESENCE_WINDOW_NS: (u64, u64) = (15_000, 75_000);
#[cfg(feature = "overdrive")]
const PRESENCE_WINDOW_NS: (u64, u64) = (2_000, 10_000);

const DS18B20_POWER_ON_SCRATCHPAD: [u8; 8] = [0x50, 0x05, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10];

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Kind {
    Ds18b20,
    Ds2438,
    /// Echoes every byte it receives, ignoring ROM commands.
    Loopback,
    /// Answers resets but never drives the line otherwise.
    Silent,
}

#[derive(Clone, Debug, PartialEq)]
enum State {
    /// Waiting for a ROM command.
    Idle,
    Search { position: u8, phase: u8 },
    Matching(Vec<u8>),
    /// Waiting for a function command.
    Selected,
    AwaitPage(u8),
    WriteScratch { page: usize, offset: usize },
    Sending,
    Converting { busy_slots: u8 },
    Done,
    Deselected,
}

/// A simulated slave device.
#[derive(Clone, Debug)]
pub struct Device {
    pub rom: RomCode,
    pub kind: Kind,
    pub attached: bool,
    /// Resets answered before the device detaches itself.
    pub detach_after: Option<usize>,
    pub alarm: bool,
    /// Scratchpad pages. DS18B20 devices only use page 0.
    pub pages: [[u8; 8]; 8],
    pub memory: [[u8; 8]; 8],
    /// Reading loaded into the temperature register on conversion.
    pub temperature: i16,
    /// Reading loaded into the voltage register on conversion.
    pub voltage: u16,
    /// Read slots answered with 0 after a conversion starts.
    pub busy_slots: u8,
    /// Flip the CRC byte of every scratchpad read.
    pub corrupt_crc: bool,
    /// Replace byte 0 of scratchpad reads (with a correct CRC).
    pub read_back_override: Option<u8>,
    /// Ignore writes to the DS18B20 configuration register.
    pub lock_configuration: bool,
    /// Bytes received after each reset.
    pub transactions: Vec<Vec<u8>>,
    pub conversions: usize,
    state: State,
    in_byte: u8,
    in_bits: u8,
    out: VecDeque<bool>,
}

impl Device {
    pub fn new(rom: RomCode, kind: Kind) -> Device {
        let mut pages = [[0u8; 8]; 8];
        if kind == Kind::Ds18b20 {
            pages[0] = DS18B20_POWER_ON_SCRATCHPAD;
        }
        Device {
            rom,
            kind,
            attached: true,
            detach_after: None,
            alarm: false,
            pages,
            memory: pages,
            temperature: 0,
            voltage: 0,
            busy_slots: 0,
            corrupt_crc: false,
            read_back_override: None,
            lock_configuration: false,
            transactions: Vec::new(),
            conversions: 0,
            state: State::Deselected,
            in_byte: 0,
            in_bits: 0,
            out: VecDeque::new(),
        }
    }

    pub fn ds18b20(serial: u64) -> Device {
        Device::new(RomCode::new(0x28, serial), Kind::Ds18b20)
    }

    pub fn ds2438(serial: u64) -> Device {
        Device::new(RomCode::new(0x26, serial), Kind::Ds2438)
    }

    pub fn loopback() -> Device {
        Device::new(RomCode::new(0x01, 1), Kind::Loopback)
    }

    pub fn silent() -> Device {
        Device::new(RomCode::new(0x01, 2), Kind::Silent)
    }

    /// The last transaction, i.e. all bytes received since the last reset.
    pub fn last_transaction(&self) -> &[u8] {
        self.transactions.last().map(|t| t.as_slice()).unwrap_or(&[])
    }

    fn rom_bit(&self, position: u8) -> bool {
        self.rom.0[(position / 8) as usize] & (1 << (position % 8)) != 0
    }

    fn reset(&mut self) {
        self.state = State::Idle;
        self.in_byte = 0;
        self.in_bits = 0;
        self.out.clear();
        self.transactions.push(Vec::new());
    }

    fn write_slot(&mut self, bit: bool) {
        if !self.attached {
            return;
        }
        match self.state {
            State::Search { position, phase } => {
                if phase != 2 {
                    return;
                }
                if bit != self.rom_bit(position) || position == 63 {
                    self.state = State::Deselected;
                } else {
                    self.state = State::Search {
                        position: position + 1,
                        phase: 0,
                    };
                }
            }
            State::Deselected if self.kind != Kind::Loopback => {}
            _ => {
                self.in_byte |= (bit as u8) << self.in_bits;
                self.in_bits += 1;
                if self.in_bits == 8 {
                    let byte = self.in_byte;
                    self.in_byte = 0;
                    self.in_bits = 0;
                    self.on_byte(byte);
                }
            }
        }
    }

    fn read_slot(&mut self) -> bool {
        if !self.attached {
            return true;
        }
        match self.state {
            State::Search { position, phase: 0 } => {
                self.state = State::Search { position, phase: 1 };
                self.rom_bit(position)
            }
            State::Search { position, phase: 1 } => {
                self.state = State::Search { position, phase: 2 };
                !self.rom_bit(position)
            }
            State::Converting { busy_slots } if busy_slots > 0 => {
                self.state = State::Converting {
                    busy_slots: busy_slots - 1,
                };
                false
            }
            _ => self.out.pop_front().unwrap_or(true),
        }
    }

    fn queue_byte(&mut self, byte: u8) {
        for i in 0..8 {
            self.out.push_back(byte & (1 << i) != 0);
        }
    }

    fn queue_page(&mut self, page: usize) {
        let mut data = [0u8; 9];
        data[..8].copy_from_slice(&self.pages[page]);
        if let Some(value) = self.read_back_override {
            data[0] = value;
        }
        data[8] = crc8(&data[..8]);
        if self.corrupt_crc {
            data[8] ^= 0xFF;
        }
        for byte in data.iter() {
            self.queue_byte(*byte);
        }
        self.state = State::Sending;
    }

    fn on_byte(&mut self, byte: u8) {
        if let Some(transaction) = self.transactions.last_mut() {
            transaction.push(byte);
        }
        match self.kind {
            Kind::Loopback => {
                self.queue_byte(byte);
                return;
            }
            Kind::Silent => {
                self.state = State::Deselected;
                return;
            }
            _ => {}
        }

        let state = std::mem::replace(&mut self.state, State::Deselected);
        self.state = match state {
            State::Idle => match byte {
                0xF0 => State::Search {
                    position: 0,
                    phase: 0,
                },
                0xEC if self.alarm => State::Search {
                    position: 0,
                    phase: 0,
                },
                0x55 => State::Matching(Vec::new()),
                0xCC => State::Selected,
                0x33 => {
                    let rom = self.rom;
                    for byte in rom.0.iter() {
                        self.queue_byte(*byte);
                    }
                    State::Sending
                }
                _ => State::Deselected,
            },
            State::Matching(mut received) => {
                received.push(byte);
                if received.len() < 8 {
                    State::Matching(received)
                } else if received[..] == self.rom.0[..] {
                    State::Selected
                } else {
                    State::Deselected
                }
            }
            State::Selected => self.on_function(byte),
            State::AwaitPage(command) => self.on_page(command, (byte & 0x07) as usize),
            State::WriteScratch { page, offset } => {
                if offset < 8 {
                    self.write_scratch(page, offset, byte);
                }
                State::WriteScratch {
                    page,
                    offset: offset + 1,
                }
            }
            other => other,
        };
    }

    fn write_scratch(&mut self, page: usize, offset: usize, byte: u8) {
        match (self.kind, offset) {
            (Kind::Ds18b20, 2) | (Kind::Ds18b20, 3) => self.pages[0][offset] = byte,
            (Kind::Ds18b20, 4) => {
                if !self.lock_configuration {
                    self.pages[0][4] = (byte & 0x60) | 0x1F;
                }
            }
            (Kind::Ds18b20, _) => {}
            _ => self.pages[page][offset] = byte,
        }
    }

    fn on_function(&mut self, command: u8) -> State {
        match (self.kind, command) {
            (Kind::Ds18b20, 0x4E) => State::WriteScratch { page: 0, offset: 2 },
            (Kind::Ds18b20, 0xBE) => {
                self.queue_page(0);
                State::Sending
            }
            (Kind::Ds18b20, 0x44) => {
                self.pages[0][..2].copy_from_slice(&self.temperature.to_le_bytes());
                self.conversions += 1;
                State::Converting {
                    busy_slots: self.busy_slots,
                }
            }
            (Kind::Ds18b20, 0x48) => {
                self.memory[0][2..5].copy_from_slice(&self.pages[0][2..5]);
                State::Done
            }
            (Kind::Ds18b20, 0xB8) => {
                let stored = self.memory[0];
                self.pages[0][2..5].copy_from_slice(&stored[2..5]);
                State::Done
            }
            (Kind::Ds2438, 0xB4) => {
                self.pages[0][3..5].copy_from_slice(&self.voltage.to_le_bytes());
                self.conversions += 1;
                State::Converting {
                    busy_slots: self.busy_slots,
                }
            }
            (Kind::Ds2438, 0x4E) | (Kind::Ds2438, 0xBE) | (Kind::Ds2438, 0x48)
            | (Kind::Ds2438, 0xB8) => State::AwaitPage(command),
            _ => State::Deselected,
        }
    }

    fn on_page(&mut self, command: u8, page: usize) -> State {
        match command {
            0x4E => State::WriteScratch { page, offset: 0 },
            0xBE => {
                self.queue_page(page);
                State::Sending
            }
            0x48 => {
                self.memory[page] = self.pages[page];
                State::Done
            }
            0xB8 => {
                self.pages[page] = self.memory[page];
                State::Done
            }
            _ => State::Deselected,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Slot {
    Idle,
    Presence { released_at: u64 },
    /// A short low pulse: either a "1" write or the start of a read.
    Short { started_at: u64 },
}

/// A simulated bus, decoding the master's pulses into slots by their low time.
#[derive(Debug)]
pub struct SimBus {
    now: u64,
    low_since: Option<u64>,
    slot: Slot,
    devices: Vec<Device>,
    pub resets: usize,
}

impl SimBus {
    pub fn new(devices: Vec<Device>) -> SimBus {
        SimBus {
            now: 0,
            low_since: None,
            slot: Slot::Idle,
            devices,
            resets: 0,
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn device(&mut self, index: usize) -> &mut Device {
        self.flush();
        &mut self.devices[index]
    }

    pub fn advance(&mut self, ns: u32) {
        self.now += ns as u64;
    }

    pub fn drive_low(&mut self) {
        if self.low_since.is_some() {
            return;
        }
        self.flush();
        self.low_since = Some(self.now);
    }

    pub fn release(&mut self) {
        let started_at = match self.low_since.take() {
            Some(started_at) => started_at,
            None => return,
        };
        let timing = Timing::DEFAULT;
        let zero_low = (timing.a + timing.c) as u64;
        let reset_threshold = (zero_low + timing.h as u64) / 2;
        let zero_threshold = (timing.a as u64 + zero_low) / 2;

        let low_time = self.now - started_at;
        if low_time >= reset_threshold {
            self.resets += 1;
            for device in self.devices.iter_mut() {
                match device.detach_after {
                    Some(0) => device.attached = false,
                    Some(remaining) => device.detach_after = Some(remaining - 1),
                    None => {}
                }
                if device.attached {
                    device.reset();
                }
            }
            self.slot = Slot::Presence {
                released_at: self.now,
            };
        } else if low_time >= zero_threshold {
            self.write(false);
            self.slot = Slot::Idle;
        } else {
            self.slot = Slot::Short { started_at };
        }
    }

    pub fn sample(&mut self) -> bool {
        if self.low_since.is_some() {
            return false;
        }
        match self.slot {
            Slot::Presence { released_at } => {
                let elapsed = self.now - released_at;
                assert!(
                    elapsed >= PRESENCE_WINDOW_NS.0 && elapsed <= PRESENCE_WINDOW_NS.1,
                    "presence sampled {}ns after reset",
                    elapsed
                );
                !self.devices.iter().any(|device| device.attached)
            }
            Slot::Short { started_at } => {
                let elapsed = self.now - started_at;
                assert!(
                    elapsed <= SAMPLE_DEADLINE_NS,
                    "read slot sampled {}ns after start",
                    elapsed
                );
                self.slot = Slot::Idle;
                // Wired-AND: every device gets the slot, any of them may pull the line low.
                self.devices
                    .iter_mut()
                    .fold(true, |line, device| device.read_slot() && line)
            }
            Slot::Idle => true,
        }
    }

    /// Completes a pending short pulse as a "1" write.
    fn flush(&mut self) {
        if let Slot::Short { .. } = self.slot {
            self.write(true);
            self.slot = Slot::Idle;
        }
    }

    fn write(&mut self, bit: bool) {
        for device in self.devices.iter_mut() {
            device.write_slot(bit);
        }
    }
}
