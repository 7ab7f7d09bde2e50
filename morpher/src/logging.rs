use std::path::Path;

/// Log files kept in the log directory after a run.
const KEEP_LOG_FILES: usize = 10;

pub fn setup_logging(log_dir: &Path, level: log::LevelFilter) -> Result<(), fern::InitError> {
    std::fs::create_dir_all(log_dir)?;

    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let log_file = log_dir.join(format!("morpher_{}.log", timestamp));

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}:{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .chain(fern::log_file(&log_file)?)
        .apply()?;

    log::info!("Logging initialized, writing to: {:?}", log_file);

    cleanup_old_logs(log_dir, KEEP_LOG_FILES);

    Ok(())
}

fn cleanup_old_logs(log_dir: &Path, keep_count: usize) {
    log::debug!(
        "Cleaning up old log files, keeping {} most recent",
        keep_count
    );

    let mut log_files: Vec<_> = match std::fs::read_dir(log_dir) {
        Ok(entries) => entries
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let path = entry.path();
                if path.extension()? == "log" {
                    let metadata = entry.metadata().ok()?;
                    let modified = metadata.modified().ok()?;
                    Some((path, modified))
                } else {
                    None
                }
            })
            .collect(),
        Err(e) => {
            log::warn!("Failed to read log directory: {}", e);
            return;
        }
    };

    if log_files.len() <= keep_count {
        return;
    }

    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.into_iter().skip(keep_count) {
        match std::fs::remove_file(&path) {
            Ok(()) => log::debug!("Removed old log file: {:?}", path),
            Err(e) => log::warn!("Failed to remove old log file {:?}: {}", path, e),
        }
    }
}
