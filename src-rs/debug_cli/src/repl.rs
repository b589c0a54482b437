use std::io;
use std::thread;
use std::time::Duration;

use crate::client::HTTPClient;
use crate::models::{CLIConfig, DownloadRequest};
use crate::render;

pub struct REPL {
    pub config: CLIConfig,
    pub client: HTTPClient,
}

impl REPL {
    pub fn new(config: CLIConfig, client: HTTPClient) -> Self {
        Self { config, client }
    }

    pub fn run(&mut self) {
        render::banner(&self.config);
        loop {
            render::prompt();
            let mut line = String::new();
            match io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if !line.starts_with('/') {
                render::info("commands start with '/', type /help");
                continue;
            }
            if self.handle_command(&line) {
                break;
            }
        }
    }

    fn handle_command(&mut self, line: &str) -> bool {
        let mut parts = line.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("").trim_start_matches('/');
        let rest = parts.next().unwrap_or("").trim();
        match cmd {
            "exit" | "quit" => return true,
            "help" => render::help(),
            "download" => self.download(rest),
            "update" => match self.client.submit_update() {
                Ok(id) => render::info(&format!("update started: {}", id)),
                Err(err) => render::error(&err),
            },
            "status" => match required_id(rest) {
                Some(id) => match self.client.status(id) {
                    Ok(job) => render::job(&job),
                    Err(err) => render::error(&err),
                },
                None => render::error("usage: /status <id>"),
            },
            "watch" => match required_id(rest) {
                Some(id) => self.watch(id),
                None => render::error("usage: /watch <id>"),
            },
            "jobs" => {
                let limit = rest.parse::<usize>().unwrap_or(20);
                match self.client.list_jobs(limit) {
                    Ok(jobs) => render::jobs(&jobs),
                    Err(err) => render::error(&err),
                }
            }
            "cancel" => match required_id(rest) {
                Some(id) => match self.client.cancel(id) {
                    Ok(job) => render::job(&job),
                    Err(err) => render::error(&err),
                },
                None => render::error("usage: /cancel <id>"),
            },
            "check" => match self.client.check() {
                Ok(check) => render::check(&check),
                Err(err) => render::error(&err),
            },
            "version" => match self.client.update_status() {
                Ok(status) => render::version(&status),
                Err(err) => render::error(&err),
            },
            "config" => render::config(&self.config),
            "base" => {
                if rest.is_empty() {
                    render::info(&format!("base: {}", self.config.base_url));
                } else {
                    match HTTPClient::new(rest) {
                        Ok(client) => {
                            self.config.base_url = rest.to_string();
                            self.client = client;
                            render::info("base url updated");
                        }
                        Err(err) => render::error(&err),
                    }
                }
            }
            "interval" => {
                if rest.is_empty() {
                    render::info(&format!("poll: {}s", self.config.poll_secs));
                } else if let Ok(secs) = rest.parse::<u64>() {
                    self.config.poll_secs = secs.max(1);
                    render::info("poll interval updated");
                } else {
                    render::error("invalid interval");
                }
            }
            _ => render::info("unknown command, type /help"),
        }
        false
    }

    fn download(&self, rest: &str) {
        let args: Vec<&str> = rest.split_whitespace().collect();
        let (server_type, mc_version, build_version) = match args.as_slice() {
            [server_type, mc_version, build_version] => (*server_type, *mc_version, *build_version),
            _ => {
                render::error("usage: /download <type> <mc-version> <build>");
                return;
            }
        };
        let req = DownloadRequest {
            server_type: server_type.to_string(),
            mc_version: mc_version.to_string(),
            build_version: build_version.to_string(),
        };
        match self.client.submit_download(&req) {
            Ok(id) => render::info(&format!("download started: {}", id)),
            Err(err) => render::error(&err),
        }
    }

    fn watch(&self, id: &str) {
        loop {
            match self.client.status(id) {
                Ok(job) => {
                    render::job(&job);
                    if job.is_terminal() {
                        return;
                    }
                }
                Err(err) => {
                    render::error(&err);
                    return;
                }
            }
            thread::sleep(Duration::from_secs(self.config.poll_secs));
        }
    }
}

fn required_id(rest: &str) -> Option<&str> {
    rest.split_whitespace().next()
}
