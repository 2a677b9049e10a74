//! Default logging setup for the proptree binaries and tests.
//!
//! Log lines are prefixed with the time since setup and the resident memory of the process, which
//! makes it easy to see what a stress run costs. The filter is read from `PROPTREE_LOG` (default
//! `info`) and the color choice from `PROPTREE_LOG_STYLE`.
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![warn(missing_docs)]

use std::{
    fmt,
    io::Write,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Instant,
};

use anstyle::{AnsiColor, Color, Style};

/// Environment variable holding the log filter.
pub const FILTER_ENV: &str = "PROPTREE_LOG";
/// Environment variable selecting whether log output is styled.
pub const STYLE_ENV: &str = "PROPTREE_LOG_STYLE";

const ELAPSED_STYLE: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack)));
const RESIDENT_STYLE: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Blue)));
const PEAK_STYLE: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack)));
const NEW_PEAK_STYLE: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));
const TARGET_STYLE: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Magenta)));

/// An amount of memory in bytes, displayed with a binary unit suffix in a fixed width.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Bytes(pub usize);

impl fmt::Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 1000 {
            return write!(f, "{:5}B", self.0);
        }
        for (shift, unit) in [(10, 'K'), (20, 'M'), (30, 'G')] {
            if shift == 30 || self.0 < 1000 << shift {
                return write!(f, "{:5.1}{unit}", self.0 as f64 / (1u64 << shift) as f64);
            }
        }
        Ok(())
    }
}

/// Resident memory of the current process.
#[derive(Clone, Copy, Default, Debug)]
pub struct Residency {
    /// Currently resident memory, zero where unavailable.
    pub current: Bytes,
    /// Peak resident memory, zero where unavailable.
    pub peak: Bytes,
}

impl Residency {
    /// Samples the resident memory of the current process.
    pub fn sample() -> Self {
        Self {
            current: current_resident().unwrap_or_default(),
            peak: peak_resident().unwrap_or_default(),
        }
    }
}

#[cfg(all(unix, not(miri)))]
fn peak_resident() -> Option<Bytes> {
    // SAFETY: rusage is plain old data so all zeros is valid
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    // SAFETY: getrusage only writes to the passed pointer, which is valid for writes
    if unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) } < 0 {
        return None;
    }
    let max_rss = usize::try_from(usage.ru_maxrss).ok()?;
    // Linux reports kilobytes, macOS bytes.
    Some(Bytes(if cfg!(target_os = "macos") {
        max_rss
    } else {
        max_rss * 1024
    }))
}

#[cfg(not(all(unix, not(miri))))]
fn peak_resident() -> Option<Bytes> {
    None
}

#[cfg(all(target_os = "linux", not(miri)))]
fn current_resident() -> Option<Bytes> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: usize = statm.split_ascii_whitespace().nth(1)?.parse().ok()?;
    // SAFETY: sysconf has no preconditions
    let page_size = usize::try_from(unsafe { libc::sysconf(libc::_SC_PAGESIZE) }).ok()?;
    Some(Bytes(pages * page_size))
}

#[cfg(not(all(target_os = "linux", not(miri))))]
fn current_resident() -> Option<Bytes> {
    None
}

/// Installs the default logger, panicking if a logger is already installed.
pub fn setup() {
    builder().init();
}

/// Installs the default logger unless a logger is already installed.
///
/// Tests call this from every test function.
pub fn try_setup() {
    let _ = builder().try_init();
}

/// Returns the builder used by [`setup`], for binaries that need further customization.
pub fn builder() -> env_logger::Builder {
    let start = Instant::now();
    let peak = AtomicUsize::new(Residency::sample().peak.0);
    let previous_target = Mutex::new(String::new());

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::new()
            .filter_or(FILTER_ENV, "info")
            .write_style(STYLE_ENV),
    );

    builder.format(move |buf, record| {
        let elapsed = start.elapsed();
        let Residency { current, peak: max } = Residency::sample();
        let peak_style = if peak.fetch_max(max.0, Ordering::Relaxed) < max.0 {
            NEW_PEAK_STYLE
        } else {
            PEAK_STYLE
        };

        let prefix = format!(
            "{ELAPSED_STYLE}{elapsed:>9.2?}{ELAPSED_STYLE:#} \
             {RESIDENT_STYLE}{current}{RESIDENT_STYLE:#} \
             {peak_style}{max}{peak_style:#}"
        );

        let target = record.target();
        let target_changed = match previous_target.lock() {
            Ok(mut previous) if *previous != target => {
                previous.clear();
                previous.push_str(target);
                true
            }
            _ => false,
        };
        if target_changed {
            writeln!(buf, "{prefix} {TARGET_STYLE}{target}{TARGET_STYLE:#}")?;
        }

        let level_style = buf.default_level_style(record.level());
        writeln!(
            buf,
            "{prefix} {level_style}{:<5}{level_style:#} {}",
            record.level(),
            record.args()
        )
    });

    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_amounts_use_fixed_width() {
        assert_eq!(Bytes(12).to_string(), "   12B");
        assert_eq!(Bytes(2048).to_string(), "  2.0K");
        assert_eq!(Bytes(3 << 20).to_string(), "  3.0M");
        assert_eq!(Bytes(5 << 30).to_string(), "  5.0G");
    }

    #[test]
    fn setup_twice_is_harmless() {
        try_setup();
        try_setup();
        log::info!("logger installed");
    }
}
