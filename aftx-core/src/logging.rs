use std::path::Path;

/// Initialise the global logger.
///
/// `RUST_LOG` wins when set; otherwise `verbosity` picks info/debug/trace. With a log file the
/// output is appended there, falling back to stderr if the file cannot be opened.
pub fn init_with(log_file: Option<&Path>, verbosity: u8) {
    use env_logger::Target;
    use std::fs;
    use std::io;

    let target = log_file
        .map(|path| -> io::Result<Target> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Ok(Target::Pipe(Box::new(file)))
        })
        .and_then(Result::ok)
        .unwrap_or(Target::Stderr);

    let level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    let _ = builder.target(target).try_init();
}
