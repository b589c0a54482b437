use std::io::{self, Write};

use crate::models::{CLIConfig, JobInfo, UpdateCheck, UpdateStatus};

pub fn banner(cfg: &CLIConfig) {
    println!("mc-jobs debug CLI");
    println!("API: {}  poll: {}s", cfg.base_url, cfg.poll_secs);
    println!("Type /help for commands.");
}

pub fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

pub fn help() {
    println!("Commands:");
    println!("  /help                          Show commands");
    println!("  /exit | /quit                  Exit");
    println!("  /download <type> <mc> <build>  Start a server jar download");
    println!("  /update                        Start a self-update");
    println!("  /status <id>                   Show one job");
    println!("  /watch <id>                    Poll a job until it finishes");
    println!("  /jobs [limit]                  List recent jobs");
    println!("  /cancel <id>                   Cancel a running job");
    println!("  /check                         Check the remote for a newer version");
    println!("  /version                       Show installed version info");
    println!("  /config                        Show current config");
    println!("  /base <url>                    Update base URL");
    println!("  /interval <secs>               Update poll interval");
}

pub fn job(job: &JobInfo) {
    let mut line = format!(
        "[{}] {} {} {:>3}% {}",
        job.status,
        job.kind,
        job.id,
        job.progress,
        bar(job.progress)
    );
    if let Some(err) = &job.error {
        line.push_str(&format!("  error: {}", err));
    }
    println!("{}", line);
    if job.status == "completed" {
        if let Some(result) = &job.result {
            println!("  result: {}", result);
        }
    }
}

pub fn jobs(jobs: &[JobInfo]) {
    if jobs.is_empty() {
        println!("no jobs");
        return;
    }
    for job in jobs {
        println!(
            "[{}] {} {} {}% created {}",
            job.status, job.kind, job.id, job.progress, job.created_at
        );
    }
}

pub fn check(check: &UpdateCheck) {
    if check.update_available {
        println!(
            "update available: {} -> {}",
            check.current_version, check.latest_version
        );
    } else {
        println!("up to date ({})", check.current_version);
    }
}

pub fn version(status: &UpdateStatus) {
    println!("version: {}", status.current_version);
    println!(
        "  last checked: {}",
        status.last_checked.as_deref().unwrap_or("never")
    );
    println!(
        "  last updated: {}",
        status.last_updated.as_deref().unwrap_or("never")
    );
}

pub fn config(cfg: &CLIConfig) {
    println!("config:");
    println!("  base: {}", cfg.base_url);
    println!("  poll: {}s", cfg.poll_secs);
}

pub fn info(msg: &str) {
    println!("{}", msg);
}

pub fn error(msg: &str) {
    eprintln!("error: {}", msg);
}

fn bar(progress: u8) -> String {
    let filled = (progress.min(100) / 5) as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(20 - filled))
}
