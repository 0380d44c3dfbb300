use std::{thread, time::Duration};

/// Give the freshly bound socket a moment before pointing a browser at it.
static OPEN_DELAY: Duration = Duration::from_millis(1500);

/// Opens the default browser at `url` from a detached thread. A failed or
/// slow launch only prints a note; the serving loop never sees it.
pub fn spawn_open(url: String) {
    thread::spawn(move || {
        thread::sleep(OPEN_DELAY);

        if let Err(error) = open::that(&url) {
            println!("Could not auto-open browser: {error}");
            println!("Please manually open: {url}");
        }
    });
}
