use chrono::Local;
use fern::Dispatch;
use log::LevelFilter;
use std::fs;
use std::path::Path;

/// Initializes the global logger.
///
/// This function should be called once at the very beginning of the
/// application's `main` function.
///
/// `level` overrides the `RUST_LOG` environment variable; without either the
/// level defaults to `warn`, so command output stays readable. When `log_file`
/// is given, records are additionally written there without colors.
pub fn init(level: Option<LevelFilter>, log_file: Option<&Path>) {
    let log_level_filter = level.unwrap_or_else(|| {
        std::env::var("RUST_LOG").ok().and_then(|value| value.parse::<LevelFilter>().ok()).unwrap_or(LevelFilter::Warn)
    });

    let base_config = Dispatch::new().level(log_level_filter).level_for("serde", LevelFilter::Warn);

    let console_config = Dispatch::new()
        .format(|out, message, record| {
            let colors = fern::colors::ColoredLevelConfig::new()
                .error(fern::colors::Color::Red)
                .warn(fern::colors::Color::Yellow)
                .info(fern::colors::Color::Green)
                .debug(fern::colors::Color::Blue)
                .trace(fern::colors::Color::BrightBlack);

            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .chain(std::io::stderr());

    let mut dispatch = base_config.chain(console_config);

    if let Some(path) = log_file {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(dir) {
                eprintln!("Failed to create log directory at '{}': {}", dir.display(), e);
            }
        }

        match fern::log_file(path) {
            Ok(file) => {
                let file_config = Dispatch::new()
                    .format(|out, message, record| {
                        out.finish(format_args!("[{} {} {}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), record.level(), record.target(), message))
                    })
                    .chain(file);
                dispatch = dispatch.chain(file_config);
            }
            Err(e) => eprintln!("Failed to open log file '{}': {}", path.display(), e),
        }
    }

    dispatch.apply().unwrap_or_else(|e| {
        eprintln!("Failed to apply logger configuration: {}", e);
    });

    log::debug!("Logger initialized at level {}.", log_level_filter);
}
