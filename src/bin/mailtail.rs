//! Operator CLI: provision (or resume) a throwaway mailbox and tail the
//! inbox on the polling interval.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use chrono::Local;
use tmpmail::{Config, Event, HostAdapter, KeyringStore, MailboxController, Page, StandaloneHost};

/// Standalone host with an optional embedded override so the mini-app
/// bootstrap rules can be exercised from the command line.
struct CliHost {
    inner: StandaloneHost,
    embedded: bool,
}

#[async_trait::async_trait]
impl HostAdapter for CliHost {
    fn is_embedded(&self) -> bool {
        self.embedded
    }

    fn launch_params(&self) -> HashMap<String, String> {
        self.inner.launch_params()
    }

    async fn confirm(&self, prompt: &str) -> bool {
        println!("{prompt} (auto-confirmed)");
        true
    }

    fn open_link(&self, url: &str) {
        self.inner.open_link(url);
    }
}

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} [--auth <handoff-token>] [--page inbox] [--embedded]");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let mut host = StandaloneHost::new();
    let mut embedded = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--auth" => {
                i += 1;
                let Some(token) = args.get(i) else {
                    usage(&args[0]);
                };
                host = host.with_param("auth", token);
            }
            "--page" => {
                i += 1;
                let Some(page) = args.get(i) else {
                    usage(&args[0]);
                };
                host = host.with_param("page", page);
            }
            "--embedded" => embedded = true,
            other => {
                eprintln!("Unknown argument: {other}");
                usage(&args[0]);
            }
        }
        i += 1;
    }

    let config = Config::load();
    let interval = Duration::from_secs(config.poll_interval_secs);
    let store = KeyringStore::new(config.keyring_service.clone());
    let controller = MailboxController::new(config, store, CliHost { inner: host, embedded });

    let mut events = controller.subscribe();
    controller.bootstrap().await;
    controller.navigate(Page::Inbox);
    controller.start_polling(interval);

    while let Some(event) = events.recv().await {
        match event {
            Event::IdentityReady(identity) => println!("Mailbox: {}", identity.address),
            Event::SessionChanged(state) => println!("Session: {state:?}"),
            Event::InboxReplaced(messages) => {
                println!("--- {} message(s) ---", messages.len());
                for msg in &messages {
                    let time = msg
                        .created_at
                        .with_timezone(&Local)
                        .format("%b %d, %l:%M %p");
                    let marker = if msg.seen { ' ' } else { '*' };
                    println!(
                        "{marker} [{}] {}: {} ({time})",
                        msg.id,
                        msg.display_sender(),
                        msg.display_subject()
                    );
                }
            }
            Event::Notice(kind, text) => println!("[{kind:?}] {text}"),
            Event::PageChanged(_) | Event::MessageOpened(_) | Event::MessageDeleted(_) => {}
        }
    }

    Ok(())
}
