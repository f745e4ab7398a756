use std::io::{BufRead, Write};

use regex::Regex;
use tokio::sync::oneshot;

use crate::error::StationError;

/// Serial numbers are exactly eight digits.
pub fn is_valid_serial(input: &str) -> bool {
    Regex::new(r"^[0-9]{8}$")
        .expect("static serial pattern")
        .is_match(input)
}

/// Accepts aa:bb:cc:dd:ee:ff, aa-bb-..., or bare hex, case-insensitive.
/// The separator must be consistent throughout.
pub fn is_valid_mac(input: &str) -> bool {
    let input = input.to_lowercase();

    [
        r"^[0-9a-f]{2}(:[0-9a-f]{2}){5}$",
        r"^[0-9a-f]{2}(-[0-9a-f]{2}){5}$",
        r"^[0-9a-f]{12}$",
    ]
    .iter()
    .any(|pattern| {
        Regex::new(pattern)
            .expect("static mac pattern")
            .is_match(&input)
    })
}

/// Prompts the operator for the device serial number.
///
/// A blocking thread owns stdin and fulfills the oneshot exactly once, after
/// validation; the async side just waits on the channel. Entering `0` aborts
/// the run.
pub async fn prompt_serial() -> Result<String, StationError> {
    let (sender, receiver) = oneshot::channel();

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut lines = stdin.lock().lines();

        loop {
            print!("Please insert device serial number (type 0 for EXIT): ");
            let _ = std::io::stdout().flush();

            let line = match lines.next() {
                Some(Ok(line)) => line.trim().to_string(),
                _ => {
                    let _ = sender.send(None);
                    return;
                }
            };

            if line == "0" {
                let _ = sender.send(None);
                return;
            }

            if is_valid_serial(&line) {
                let _ = sender.send(Some(line));
                return;
            }

            println!("Serial number must be 8 digits");
        }
    });

    match receiver.await {
        Ok(Some(serial)) => Ok(serial),
        _ => Err(StationError::Input("aborted by operator".to_string())),
    }
}
