//! Lists the devices of the software backend.

use std::io::Write as _;

use clap::Parser;

use audio_stream_core::{ContextDelegate, DeviceList, StreamError};
use samples::device_info::DeviceInfo;

/// List every input and output device with its capabilities.
#[derive(Debug, Parser)]
#[command(name = "list-devices")]
struct Cli {
    /// Print device names only.
    #[arg(long)]
    short: bool,

    /// Print the device snapshot as JSON.
    #[arg(long)]
    json: bool,

    /// Re-print whenever the device set changes.
    #[arg(long)]
    watch: bool,
}

#[derive(Clone, Copy)]
struct Printer {
    short: bool,
    json: bool,
}

impl Printer {
    fn print(&self, devices: &DeviceList) -> anyhow::Result<()> {
        let infos = DeviceInfo::from_list(devices);
        let mut out = std::io::stdout().lock();
        if self.json {
            serde_json::to_writer_pretty(&mut out, &infos)?;
            writeln!(out)?;
            return Ok(());
        }

        let input_count = devices.inputs.len();
        writeln!(out, "--------Input Devices--------")?;
        for info in &infos[..input_count] {
            write!(out, "{}", info.describe(self.short))?;
            if !self.short {
                writeln!(out)?;
            }
        }
        writeln!(out)?;
        writeln!(out, "--------Output Devices--------")?;
        for info in &infos[input_count..] {
            write!(out, "{}", info.describe(self.short))?;
            if !self.short {
                writeln!(out)?;
            }
        }
        writeln!(out)?;
        writeln!(out, "{} devices found", infos.len())?;
        Ok(())
    }
}

struct Watcher(Printer);

impl ContextDelegate for Watcher {
    fn on_devices_change(&mut self, devices: &DeviceList) {
        if let Err(e) = self.0.print(devices) {
            log::error!("failed to print devices: {}", e);
        }
    }

    fn on_backend_disconnect(&mut self, error: &StreamError) {
        eprintln!("backend disconnected: {}", error);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let printer = Printer {
        short: cli.short,
        json: cli.json,
    };

    let (_backend, mut context) = samples::connect()?;
    if !cli.watch {
        if let Some(devices) = context.devices() {
            printer.print(devices)?;
        }
        return Ok(());
    }

    if let Some(devices) = context.devices() {
        printer.print(devices)?;
    }
    context.set_delegate(Watcher(printer));
    loop {
        context.wait_events()?;
        if let Some(err) = context.disconnect_error() {
            anyhow::bail!("backend disconnected: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_default_off() {
        let cli = Cli::try_parse_from(["list-devices", "--json"]).unwrap();
        assert!(cli.json);
        assert!(!cli.short && !cli.watch);
        assert!(Cli::try_parse_from(["list-devices", "--device"]).is_err());
    }
}
