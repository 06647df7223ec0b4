use std::io::Write;

use chrono::Local;
use env_logger::{Builder, Env, Target};
use log::LevelFilter;

/// Installs the global logger on stderr so stdout stays free for results.
/// `RUST_LOG`, when set, takes precedence over the flags.
pub fn init(verbose: bool, quiet: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Info
    };

    let mut builder = Builder::new();
    builder.filter_level(level);
    builder.parse_env(Env::default());
    builder.target(Target::Stderr);

    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.args()
        )
    });

    // a second init (e.g. from tests) is harmless
    let _ = builder.try_init();
}
