fn main() {
    if let Err(err) = oioi_cpo_sync::app::run() {
        eprintln!("application startup failed: {err}");
        std::process::exit(1);
    }
}
