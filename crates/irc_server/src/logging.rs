//! Logging (§6, C10): `log` facade with `flexi_logger` as the backend,
//! using a custom line formatter so the wire shape matches §6 exactly:
//! `[YYYY-MM-DD HH:MM:SS] LEVEL prefix -- message`.

use flexi_logger::{DeferredNow, Logger, Record};
use std::io::Write;

fn format_line(
    w: &mut dyn Write,
    now: &mut DeferredNow,
    record: &Record,
) -> std::io::Result<()> {
    write!(
        w,
        "[{}] {} {} -- {}",
        now.format("%Y-%m-%d %H:%M:%S"),
        record.level(),
        record.target(),
        record.args()
    )
}

pub fn init(level: log::LevelFilter) {
    Logger::try_with_str(level.as_str())
        .expect("valid log level")
        .format(format_line)
        .log_to_stderr()
        .start()
        .expect("logger starts exactly once");
}
