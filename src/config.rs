use dotenv::dotenv;
use std::{env::var, path::PathBuf};

pub struct Config {
    pub port: u16,
    pub root: PathBuf,
    pub open_browser: bool,
}

impl Config {
    pub fn get() -> Self {
        dotenv().ok();

        Self {
            port: var("SDS_PORT")
                .ok()
                .and_then(|port| port.trim().parse::<u16>().ok())
                .unwrap_or(8000),
            root: var("SDS_ROOT")
                .ok()
                .map(|root| PathBuf::from(root.trim()))
                .unwrap_or_else(|| PathBuf::from(".")),
            open_browser: var("SDS_OPEN_BROWSER").map_or(true, |open_browser| {
                open_browser.trim().to_lowercase() != "false"
            }),
        }
    }
}
