use env_logger::{Builder, Env};
use log::error;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт info.
    // Пример: RUST_LOG=debug autosnap -c ./autosnap.conf daily
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = autosnap::cli::run() {
        // 2: конфиг или команда; 1: не удалось получить список datasets/snapshots.
        error!("{:#}", e);
        std::process::exit(autosnap::cli::exit_code(&e));
    }
}
