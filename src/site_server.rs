use crate::{
    browser,
    config::Config,
    file::{self, File},
    pages::{self, Pages},
};
use anyhow::{Result, bail};
use std::{
    io::{Error as IoError, ErrorKind, Read},
    net::{Ipv4Addr, SocketAddrV4},
    path::{Component, Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use thiserror::Error;
use tiny_http::{Method, Request, Response, Server};

#[derive(Debug, Error)]
pub enum StartError {
    #[error("port {0} is already in use")]
    PortInUse(u16),
    #[error("{0}")]
    Bind(String),
}

pub struct SiteServer {
    config: Config,
}

impl SiteServer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn start(&self) -> Result<()> {
        let server = Arc::new(self.bind()?);
        let pages = Pages::discover(&self.config.root)?;

        self.print_banner(&pages);

        let stopped = Arc::new(AtomicBool::new(false));

        {
            let server = server.clone();
            let stopped = stopped.clone();
            let handler = ctrlc::set_handler(move || {
                stopped.store(true, Ordering::SeqCst);
                server.unblock();
            });

            if handler.is_err() {
                println!("Could not install the Ctrl+C handler, stop the server by killing the process");
            }
        }

        if self.config.open_browser {
            println!("Opening browser automatically...");
            browser::spawn_open(format!("http://localhost:{}/", self.config.port));
        }

        println!();
        self.serve(&server);

        if stopped.load(Ordering::SeqCst) {
            println!();
            println!("{}", "=".repeat(60));
            println!("Server stopped by user");
            println!("{}", "=".repeat(60));
        }

        Ok(())
    }

    fn bind(&self) -> Result<Server> {
        let address = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.config.port);

        match Server::http(address) {
            Ok(server) => Ok(server),
            Err(error) => {
                let port_in_use = error
                    .downcast_ref::<IoError>()
                    .is_some_and(|io_error| io_error.kind() == ErrorKind::AddrInUse);

                if port_in_use {
                    bail!(StartError::PortInUse(self.config.port));
                }

                bail!(StartError::Bind(error.to_string()));
            }
        }
    }

    fn serve(&self, server: &Server) {
        for request in server.incoming_requests() {
            if let Err(error) = self.handle(request) {
                println!("Error while processing request: {error}");
            }
        }
    }

    fn handle(&self, request: Request) -> Result<()> {
        let method = request.method().clone();
        let url = request.url().to_string();
        let remote = request
            .remote_addr()
            .map_or_else(|| "-".into(), |address| address.to_string());

        if !matches!(method, Method::Get | Method::Head) {
            let response =
                with_no_cache(Response::from_string("Method Not Allowed").with_status_code(405))?;

            print_log_line(&remote, &method, &url, 405, None);
            request.respond(response)?;

            return Ok(());
        }

        match resolve(&self.config.root, &url) {
            Some(path) => {
                let file = File::new(path)?;
                let response = file.get_response()?;

                print_log_line(&remote, &method, &url, 200, Some(file.size));
                request.respond(response)?;
            }
            None => {
                let response = with_no_cache(
                    Response::from_string(pages::not_found_html(&url))
                        .with_status_code(404)
                        .with_header(file::header("Content-Type", "text/html")?),
                )?;

                print_log_line(&remote, &method, &url, 404, None);
                request.respond(response)?;
            }
        }

        Ok(())
    }

    fn print_banner(&self, pages: &Pages) {
        let rule = "=".repeat(60);
        let port = self.config.port;

        println!("{rule}");
        println!("Site dev server");
        println!("{rule}");
        println!("Serving files from: {}", self.config.root.display());
        println!("Local URL: http://localhost:{port}/");
        println!("{rule}");
        println!("Available pages:");

        for url in pages.urls(port) {
            println!("  * {url}");
        }

        println!("{rule}");
        println!("Press Ctrl+C to stop the server");
        println!("{rule}");
        println!("Server started successfully!");
    }
}

/// Maps a request URL to a file under the serving root. Query strings are
/// dropped, `%20` decodes to a space and `..` segments never escape the
/// root. A directory resolves to its `index.html`.
fn resolve(root: &Path, url: &str) -> Option<PathBuf> {
    let path = url.split('?').next().unwrap_or_default().replace("%20", " ");
    let mut resolved = root.to_path_buf();

    for component in Path::new(path.trim_matches('/')).components() {
        match component {
            Component::Normal(segment) => resolved.push(segment),
            Component::ParentDir => return None,
            _ => {}
        }
    }

    if resolved.is_dir() {
        resolved.push("index.html");
    }

    resolved.is_file().then_some(resolved)
}

fn print_log_line(remote: &str, method: &Method, url: &str, status: u16, bytes: Option<u64>) {
    if let Some(line) = log_line(remote, method, url, status, bytes) {
        println!("{line}");
    }
}

/// Not-found responses stay out of the request log so favicon and asset
/// probes from the browser do not clutter the output.
fn log_line(
    remote: &str,
    method: &Method,
    url: &str,
    status: u16,
    bytes: Option<u64>,
) -> Option<String> {
    let bytes = bytes.map_or_else(|| "-".into(), |bytes| bytes.to_string());

    (status != 404).then(|| format!("{remote} \"{method} {url}\" {status} {bytes}"))
}

fn with_no_cache<R: Read>(mut response: Response<R>) -> Result<Response<R>> {
    for header in file::no_cache_headers()? {
        response = response.with_header(header);
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        fs::{create_dir, write},
        io::Write as IoWrite,
        net::{TcpListener, TcpStream},
        thread,
    };
    use tempfile::TempDir;

    fn site_root() -> TempDir {
        let dir = TempDir::new().unwrap();

        write(dir.path().join("index.html"), "<!DOCTYPE html><title>Home</title>").unwrap();
        write(dir.path().join("styles.css"), "body { margin: 0; }").unwrap();
        write(dir.path().join("script.js"), "console.log('hi');").unwrap();

        dir
    }

    fn test_config(root: &Path, port: u16) -> Config {
        Config {
            port,
            root: root.to_path_buf(),
            open_browser: false,
        }
    }

    #[test]
    fn resolves_the_root_url_to_the_entry_page() {
        let dir = site_root();

        assert_eq!(
            resolve(dir.path(), "/"),
            Some(dir.path().join("index.html")),
        );
    }

    #[test]
    fn resolves_subdirectories_to_their_index() {
        let dir = site_root();
        create_dir(dir.path().join("blog")).unwrap();
        write(dir.path().join("blog").join("index.html"), "").unwrap();

        assert_eq!(
            resolve(dir.path(), "/blog/"),
            Some(dir.path().join("blog").join("index.html")),
        );
    }

    #[test]
    fn strips_query_strings_and_decodes_spaces() {
        let dir = site_root();
        write(dir.path().join("over ons.html"), "").unwrap();

        assert_eq!(
            resolve(dir.path(), "/styles.css?v=3"),
            Some(dir.path().join("styles.css")),
        );
        assert_eq!(
            resolve(dir.path(), "/over%20ons.html"),
            Some(dir.path().join("over ons.html")),
        );
    }

    #[test]
    fn rejects_parent_directory_traversal() {
        let dir = site_root();

        assert_eq!(resolve(dir.path(), "/../index.html"), None);
        assert_eq!(resolve(dir.path(), "/blog/../../secret"), None);
    }

    #[test]
    fn unknown_paths_do_not_resolve() {
        let dir = site_root();

        assert_eq!(resolve(dir.path(), "/nope.html"), None);
    }

    #[test]
    fn log_line_suppresses_not_found() {
        assert_eq!(
            log_line("127.0.0.1:9", &Method::Get, "/styles.css", 200, Some(19)),
            Some(r#"127.0.0.1:9 "GET /styles.css" 200 19"#.into()),
        );
        assert_eq!(
            log_line("127.0.0.1:9", &Method::Post, "/", 405, None),
            Some(r#"127.0.0.1:9 "POST /" 405 -"#.into()),
        );
        assert_eq!(
            log_line("127.0.0.1:9", &Method::Get, "/favicon.ico", 404, None),
            None,
        );
    }

    #[test]
    fn classifies_a_port_already_in_use() {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        let dir = site_root();
        let server = SiteServer::new(test_config(dir.path(), port));

        let error = server.bind().err().unwrap();

        assert!(matches!(
            error.downcast_ref::<StartError>(),
            Some(StartError::PortInUse(bound)) if *bound == port,
        ));
    }

    #[test]
    fn serves_files_with_no_cache_headers_and_404s_the_rest() {
        let dir = site_root();
        let server = SiteServer::new(test_config(dir.path(), 0));
        let tiny = Arc::new(server.bind().unwrap());
        let port = tiny.server_addr().to_ip().unwrap().port();

        let worker = thread::spawn({
            let tiny = tiny.clone();
            move || server.serve(&tiny)
        });

        let response = http_get(port, "/styles.css");
        assert!(status_line(&response).contains("200"));
        assert!(response.contains("Content-Type: text/css"));
        assert!(response.contains("Cache-Control: no-cache, no-store, must-revalidate"));
        assert!(response.contains("Pragma: no-cache"));
        assert!(response.contains("Expires: 0"));
        assert!(response.contains("margin: 0"));

        let entry_page = http_get(port, "/");
        assert!(status_line(&entry_page).contains("200"));
        assert!(entry_page.contains("Content-Type: text/html"));

        let missing = http_get(port, "/nope.html");
        assert!(status_line(&missing).contains("404"));
        assert!(missing.contains("Cache-Control: no-cache, no-store, must-revalidate"));

        tiny.unblock();
        worker.join().unwrap();
    }

    fn http_get(port: u16, path: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();

        write!(stream, "GET {path} HTTP/1.0\r\nHost: localhost\r\n\r\n").unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();

        response
    }

    fn status_line(response: &str) -> &str {
        response.lines().next().unwrap_or_default()
    }
}
