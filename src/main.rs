mod browser;
mod config;
mod file;
mod pages;
mod site_server;

use config::Config;
use site_server::{SiteServer, StartError};
use std::{io::stdin, process::exit};

fn main() {
    let config = Config::get();

    let missing = pages::missing_required(&config.root);

    if !missing.is_empty() {
        println!("ERROR: Missing files: {}", missing.join(", "));
        acknowledge();
        exit(1);
    }

    if let Err(error) = SiteServer::new(config).start() {
        match error.downcast_ref::<StartError>() {
            Some(StartError::PortInUse(port)) => {
                println!("ERROR: Port {port} is already in use!");
                println!("Solutions:");
                println!("  * Close other servers running on this port");
                println!("  * Wait a moment and try again");
                println!("  * Use a different port: SDS_PORT={}", port.wrapping_add(1));
            }
            _ => println!("Server error: {error}"),
        }

        acknowledge();
        exit(1);
    }
}

fn acknowledge() {
    println!("Press Enter to exit...");
    let _ = stdin().read_line(&mut String::new());
}
