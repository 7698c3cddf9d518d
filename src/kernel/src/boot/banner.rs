//! Boot banner.

/// Log the Kaya boot banner.
pub fn print_banner() {
    log::info!(target: "boot", " _  __");
    log::info!(target: "boot", "| |/ /__ _ _   _  __ _");
    log::info!(target: "boot", "| ' // _` | | | |/ _` |");
    log::info!(target: "boot", "| . \\ (_| | |_| | (_| |");
    log::info!(target: "boot", "|_|\\_\\__,_|\\__, |\\__,_|");
    log::info!(target: "boot", "           |___/");
    log::info!(target: "boot", " Kaya nucleus v{}", env!("CARGO_PKG_VERSION"));
}
