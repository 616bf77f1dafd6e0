/// Display version information
pub fn execute() {
    println!("anker {}", env!("CARGO_PKG_VERSION"));
    println!("Telegram bot that turns translated words into Anki cards");
}
