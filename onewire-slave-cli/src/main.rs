use std::{cell::Cell, rc::Rc};

use clap::{Parser, ValueEnum};
use embedded_onewire_slave::{
    DeviceId, ONEWIRE_READ_ROM_CMD, ONEWIRE_SKIP_ROM_CMD, TimingBuilder,
    timing::{DEFAULT_TICK_US, DEFAULT_WAIT_LOOP_CYCLES},
};
use onewire_bus_sim::{Harness, MasterScript};

/// ROM command the simulated master sends after RESET.
#[derive(ValueEnum, Clone, Copy, Debug)]
enum Command {
    /// SEARCH, following this device's ROM
    Search,
    /// ALARM SEARCH, following this device's ROM
    AlarmSearch,
    /// READ ROM
    Read,
    /// MATCH ROM with this device's ROM
    Match,
    /// SKIP ROM
    Skip,
}

/// Run one 1-Wire transaction against a simulated slave
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Family code, e.g. 0x28
    #[arg(short, long, value_parser = parse_byte, default_value = "0x28")]
    family: u8,
    /// Serial number as 12 hex digits, least significant byte first
    #[arg(short, long, value_parser = parse_serial, default_value = "010203040506")]
    serial: [u8; 6],
    /// ROM command to send
    #[arg(short, long, value_enum, default_value_t = Command::Read)]
    command: Command,
    /// Raise the device's alarm condition
    #[arg(short, long)]
    alarm: bool,
    /// Soft timer period in microseconds
    #[arg(long, default_value_t = DEFAULT_TICK_US)]
    tick_us: u16,
    /// CPU clock of the simulated microcontroller
    #[arg(long, default_value_t = 16_000_000)]
    cpu_hz: u32,
    /// CPU cycles per polling iteration
    #[arg(long, default_value_t = DEFAULT_WAIT_LOOP_CYCLES)]
    wait_loop_cycles: u32,
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u8::from_str_radix(digits, 16).map_err(|e| format!("invalid byte {s:?}: {e}"))
}

fn parse_serial(s: &str) -> Result<[u8; 6], String> {
    if s.len() != 12 || !s.is_ascii() {
        return Err(format!("serial must be 12 hex digits, got {s:?}"));
    }
    let mut serial = [0; 6];
    for (i, byte) in serial.iter_mut().enumerate() {
        *byte = parse_byte(&s[2 * i..2 * i + 2])?;
    }
    Ok(serial)
}

fn main() {
    // Initialize the logger
    env_logger::init();
    // Parse command line arguments
    let args = Args::parse();
    let id = DeviceId::new(args.family, args.serial);
    log::info!("Device ROM: {:016x}", id.to_u64());
    // Lay out the master's side of the transaction
    let mut script = MasterScript::new();
    script.reset();
    match args.command {
        Command::Search => script.search(false, id.to_u64()),
        Command::AlarmSearch => script.search(true, id.to_u64()),
        Command::Read => script.write_byte(ONEWIRE_READ_ROM_CMD).read_bytes(8),
        Command::Match => script.match_rom(id.as_bytes()),
        Command::Skip => script.write_byte(ONEWIRE_SKIP_ROM_CMD),
    };
    // Count how often the application gets selected
    let selected = Rc::new(Cell::new(0u32));
    let handler = {
        let selected = selected.clone();
        move || selected.set(selected.get() + 1)
    };
    let builder = TimingBuilder::new(args.cpu_hz)
        .with_tick_us(args.tick_us)
        .with_wait_loop_cycles(args.wait_loop_cycles);
    let mut sim =
        Harness::new(builder, script, id, handler).expect("Failed to configure slave timing");
    if args.alarm {
        sim.slave_mut().set_alarm_on();
    }
    sim.run();

    let transcript = sim.transcript();
    log::info!("Presence: {:?}", transcript.presence);
    for (start, len) in sim.slave_pulses() {
        log::debug!("Slave pulled low at {} ns for {} ns", start, len);
    }
    log::info!("Frame: {:?}", sim.slave().last_frame());
    log::info!("Handler calls: {}", selected.get());
    match args.command {
        Command::Search | Command::AlarmSearch => {
            let pairs = transcript.bit_pairs();
            let rom = pairs
                .iter()
                .enumerate()
                .filter(|(_, (bit, _))| *bit)
                .fold(0u64, |rom, (i, _)| rom | 1 << i);
            let answered = pairs.iter().filter(|(bit, cmp)| bit != cmp).count();
            log::info!("Search: {} of 64 bits answered, ROM {:016x}", answered, rom);
        }
        Command::Read => {
            log::info!("Read: {:02x?}", transcript.bytes());
        }
        Command::Match | Command::Skip => {}
    }
}
